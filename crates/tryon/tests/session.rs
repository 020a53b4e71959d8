use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion};
use tryon::{
    asset::{AssetParam, ColorVariant},
    config::Config,
    hand::{HandObservation, Handedness, Keypoint},
    headless::{watch_model, HeadlessConfig, HeadlessPlatform, SyntheticHand},
    image::{Image, Resolution},
    pose::RigidTransform,
    scene::{Node, NodeKind, Scene, MODEL_NODE},
    session::{Camera, FrameOutcome, HandDetector, Platform, SceneRenderer, Session, Stage},
};

const FRAME: Resolution = Resolution::new(320, 240);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Started(Stage),
    Capture,
    Estimate,
    Render,
}

type Log = Rc<RefCell<Vec<Event>>>;

struct ScriptedCamera {
    log: Log,
}

impl Camera for ScriptedCamera {
    fn resolution(&self) -> Resolution {
        FRAME
    }

    fn capture(&mut self) -> anyhow::Result<Image> {
        self.log.borrow_mut().push(Event::Capture);
        Ok(Image::new(FRAME.width(), FRAME.height()))
    }
}

struct ScriptedDetector {
    log: Log,
    hands: VecDeque<Option<HandObservation>>,
}

impl HandDetector for ScriptedDetector {
    async fn estimate(&mut self, _frame: &Image) -> anyhow::Result<Option<HandObservation>> {
        self.log.borrow_mut().push(Event::Estimate);
        Ok(self.hands.pop_front().flatten())
    }
}

#[derive(Default)]
struct RecordingRenderer {
    log: Log,
    anchors: Vec<RigidTransform>,
    textured: Vec<bool>,
}

impl SceneRenderer for RecordingRenderer {
    fn render(&mut self, _frame: &Image, scene: &Scene) -> anyhow::Result<()> {
        self.log.borrow_mut().push(Event::Render);
        self.anchors.push(*scene.anchor_transform());
        self.textured.push(scene.screen_texture().is_some());
        Ok(())
    }
}

struct ScriptedPlatform {
    log: Log,
    hands: Vec<Option<HandObservation>>,
    fail_at: Option<Stage>,
}

impl ScriptedPlatform {
    fn new(hands: Vec<Option<HandObservation>>) -> Self {
        Self {
            log: Log::default(),
            hands,
            fail_at: None,
        }
    }

    fn enter(&self, stage: Stage) -> anyhow::Result<()> {
        if self.fail_at == Some(stage) {
            anyhow::bail!("{stage} unavailable");
        }
        self.log.borrow_mut().push(Event::Started(stage));
        Ok(())
    }
}

impl Platform for ScriptedPlatform {
    type Camera = ScriptedCamera;
    type Renderer = RecordingRenderer;
    type Detector = ScriptedDetector;

    async fn open_camera(&mut self, _resolution: Resolution) -> anyhow::Result<ScriptedCamera> {
        self.enter(Stage::Camera)?;
        Ok(ScriptedCamera {
            log: self.log.clone(),
        })
    }

    async fn load_scene(&mut self) -> anyhow::Result<Node> {
        self.enter(Stage::Scene)?;
        Ok(watch_model())
    }

    async fn create_renderer(
        &mut self,
        _frame: Resolution,
    ) -> anyhow::Result<RecordingRenderer> {
        self.enter(Stage::Renderer)?;
        Ok(RecordingRenderer {
            log: self.log.clone(),
            ..RecordingRenderer::default()
        })
    }

    async fn create_detector(&mut self) -> anyhow::Result<ScriptedDetector> {
        self.enter(Stage::Detector)?;
        Ok(ScriptedDetector {
            log: self.log.clone(),
            hands: self.hands.drain(..).collect(),
        })
    }
}

fn hand_at(x: f32, y: f32) -> HandObservation {
    SyntheticHand::new(Handedness::Right)
        .observe((x, y), UnitQuaternion::identity())
        .unwrap()
}

fn start(
    platform: &mut ScriptedPlatform,
) -> Session<ScriptedCamera, ScriptedDetector, RecordingRenderer> {
    pollster::block_on(Session::start(platform, Config::default())).unwrap()
}

#[test]
fn missing_hand_keeps_last_pose() {
    let mut platform = ScriptedPlatform::new(vec![
        Some(hand_at(160.0, 120.0)),
        None,
        None,
        Some(hand_at(160.0, 120.0)),
    ]);
    let mut session = start(&mut platform);
    let rest = *session.scene().anchor_transform();

    let first = pollster::block_on(session.run_frame()).unwrap();
    let FrameOutcome::Tracked(tracked) = first else {
        panic!("expected a tracked frame, got {first:?}");
    };
    assert_ne!(tracked, rest);

    for _ in 0..2 {
        assert_eq!(pollster::block_on(session.run_frame()).unwrap(), FrameOutcome::Lost);
        assert_eq!(*session.scene().anchor_transform(), tracked);
        assert_eq!(session.smoothed_position(), tracked.position);
    }

    // Tracking resumes from the held position instead of the rest position.
    let resumed = pollster::block_on(session.run_frame()).unwrap();
    assert!(resumed.is_tracked());

    let anchors = &session.renderer().anchors;
    assert_eq!(anchors.len(), 4);
    assert_eq!(anchors[0], tracked);
    assert_eq!(anchors[1], tracked);
    assert_eq!(anchors[2], tracked);
    assert_eq!(session.frame_count(), 4);
    assert_eq!(session.tracked_frame_count(), 2);
    assert!(session.renderer().textured.iter().all(|&t| t));
}

#[test]
fn position_is_smoothed_from_rest() {
    // Wrist in the top left corner of the frame.
    let mut platform = ScriptedPlatform::new(vec![Some(hand_at(0.0, 0.0)); 3]);
    let mut session = start(&mut platform);
    let target = Point3::new(-160.0 * 4.0 / 240.0, 120.0 * 4.0 / 240.0, 0.0);

    let mut expected = Point3::origin();
    for _ in 0..3 {
        expected = expected + (target - expected) * 0.5;
        let FrameOutcome::Tracked(t) = pollster::block_on(session.run_frame()).unwrap() else {
            panic!("hand not tracked");
        };
        assert_relative_eq!(t.position, expected, epsilon = 1e-5);
    }
}

#[test]
fn hand_without_3d_keypoints_is_ignored() {
    let flat = HandObservation::new(
        Handedness::Left,
        vec![Keypoint::new(10.0, 10.0); 21],
        None,
    )
    .unwrap();
    let mut platform = ScriptedPlatform::new(vec![Some(flat)]);
    let mut session = start(&mut platform);
    let rest = *session.scene().anchor_transform();

    assert_eq!(pollster::block_on(session.run_frame()).unwrap(), FrameOutcome::Lost);
    assert_eq!(*session.scene().anchor_transform(), rest);
}

#[test]
fn frames_run_sequentially() {
    let mut platform = ScriptedPlatform::new(vec![Some(hand_at(100.0, 100.0)), None, None]);
    let log = platform.log.clone();
    let mut session = start(&mut platform);
    pollster::block_on(session.run(Some(3))).unwrap();

    let events = log.borrow();
    assert_eq!(
        events[..4],
        [
            Event::Started(Stage::Camera),
            Event::Started(Stage::Scene),
            Event::Started(Stage::Renderer),
            Event::Started(Stage::Detector),
        ]
    );
    let frames = &events[4..];
    assert_eq!(frames.len(), 9);
    for frame in frames.chunks(3) {
        assert_eq!(frame, [Event::Capture, Event::Estimate, Event::Render]);
    }
}

#[test]
fn startup_reports_failing_stage() {
    for stage in [Stage::Camera, Stage::Scene, Stage::Renderer, Stage::Detector] {
        let mut platform = ScriptedPlatform::new(Vec::new());
        platform.fail_at = Some(stage);
        let log = platform.log.clone();

        let err = match pollster::block_on(Session::start(&mut platform, Config::default())) {
            Ok(_) => panic!("startup succeeded despite failing {stage}"),
            Err(e) => e,
        };
        assert_eq!(err.stage, stage);
        assert_eq!(err.source.to_string(), format!("{stage} unavailable"));
        assert_eq!(err.to_string(), format!("failed to initialize {stage}"));

        // No later stage was attempted.
        let started = log.borrow();
        assert!(started.iter().all(|e| matches!(e, Event::Started(_))));
        assert!(!started.contains(&Event::Started(stage)));
        assert_eq!(started.len(), stage as usize);
    }
}

#[test]
fn invalid_calibration_fails_before_any_stage() {
    let mut platform = ScriptedPlatform::new(Vec::new());
    let log = platform.log.clone();
    let mut config = Config::default();
    config.asset.scale_calibration = -0.006;

    let err = match pollster::block_on(Session::start(&mut platform, config)) {
        Ok(_) => panic!("startup accepted a negative scale calibration"),
        Err(e) => e,
    };
    assert_eq!(err.stage, Stage::Scene);
    assert!(err.source.to_string().contains("-0.006"), "{:#}", err.source);
    assert!(log.borrow().is_empty());
}

#[test]
fn runtime_adjustments() {
    let mut platform = ScriptedPlatform::new(Vec::new());
    let mut session = start(&mut platform);

    assert_eq!(session.set_asset_param(AssetParam::Ry, 400.0), 360.0);
    assert_eq!(session.scene().asset().rotation_deg.y, 360.0);
    let model = session.scene().anchor().find(MODEL_NODE).unwrap();
    assert_eq!(model.transform, session.scene().asset().model_transform());

    session.apply_color_variant(ColorVariant::Pink);
    let strap = session.scene().anchor().find("Strap_Rubber").unwrap();
    let NodeKind::Mesh(mesh) = &strap.kind else {
        panic!("strap is not a mesh");
    };
    assert_eq!(mesh.material.color, ColorVariant::Pink.strap_color());
}

#[test]
fn headless_pipeline() {
    let config = Config {
        camera_resolution: FRAME,
        color: ColorVariant::Green,
        ..Config::default()
    };
    let mut platform = HeadlessPlatform::new(HeadlessConfig {
        visible_frames: 4,
        hidden_frames: 2,
        ..HeadlessConfig::default()
    });
    let mut session = pollster::block_on(Session::start(&mut platform, config)).unwrap();
    pollster::block_on(session.run(Some(12))).unwrap();

    assert_eq!(session.frame_count(), 12);
    assert_eq!(session.tracked_frame_count(), 8);
    assert_eq!(session.renderer().rendered_frames(), 12);
    let output = session.renderer().output().unwrap();
    assert_eq!(output.resolution(), FRAME);
    assert!(session.scene().anchor_transform().is_finite());
}
