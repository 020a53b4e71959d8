//! Collaborators that run the pipeline without camera, detector or GPU.
//!
//! The synthetic camera produces blank frames, the synthetic detector reports an animated hand
//! that periodically leaves the frame, and the headless renderer composites a debug view of the
//! scene (watch axes, mesh origins and the clock face) onto the frame. This is what the `tryon`
//! binary and the integration tests run on.

use std::{
    f32::consts::FRAC_PI_2,
    fs,
    path::PathBuf,
};

use anyhow::Context;
use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::{
    hand::{HandObservation, Handedness, Keypoint, ObservationError, NUM_LANDMARKS},
    image::{draw, Color, Image, Resolution},
    pose::RigidTransform,
    scene::{Material, Node, Scene, OCCLUDER_MESH, SCREEN_MESH},
    session::{Camera, HandDetector, Platform, SceneRenderer},
};

/// Landmarks of a relaxed right hand with the palm facing the camera, in meters.
///
/// Detector orientation: X points right, Y points down, smaller Z is closer to the camera. The
/// wrist is at the origin.
const RIGHT_HAND: [[f32; 3]; NUM_LANDMARKS] = [
    [0.0, 0.0, 0.0],
    [-0.030, -0.020, -0.010],
    [-0.050, -0.040, -0.015],
    [-0.065, -0.060, -0.020],
    [-0.075, -0.080, -0.022],
    [-0.025, -0.090, -0.005],
    [-0.030, -0.125, -0.008],
    [-0.032, -0.150, -0.010],
    [-0.034, -0.170, -0.012],
    [-0.005, -0.095, -0.003],
    [-0.006, -0.135, -0.006],
    [-0.007, -0.160, -0.008],
    [-0.008, -0.180, -0.010],
    [0.014, -0.090, -0.002],
    [0.018, -0.125, -0.004],
    [0.020, -0.148, -0.006],
    [0.022, -0.165, -0.008],
    [0.030, -0.080, 0.000],
    [0.036, -0.105, -0.002],
    [0.040, -0.120, -0.004],
    [0.043, -0.135, -0.006],
];

/// A rigid hand model that can be posed and projected into a frame.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticHand {
    handedness: Handedness,
    pixels_per_meter: f32,
}

impl SyntheticHand {
    pub fn new(handedness: Handedness) -> Self {
        Self {
            handedness,
            pixels_per_meter: 1500.0,
        }
    }

    /// Returns the landmark positions of the unposed hand, in detector orientation.
    pub fn landmarks(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        RIGHT_HAND.iter().map(move |&[x, y, z]| match self.handedness {
            Handedness::Right => Point3::new(x, y, z),
            Handedness::Left => Point3::new(-x, y, z),
        })
    }

    /// Poses the hand and projects it into the frame.
    ///
    /// `rotation` is applied around the wrist (in detector orientation), and the wrist is placed
    /// at pixel position `wrist`. The projection is orthographic.
    pub fn observe(
        &self,
        wrist: (f32, f32),
        rotation: UnitQuaternion<f32>,
    ) -> Result<HandObservation, ObservationError> {
        let landmarks = self.landmarks().map(|p| rotation * p).collect::<Vec<_>>();
        let keypoints = landmarks
            .iter()
            .map(|p| {
                Keypoint::new(
                    wrist.0 + p.x * self.pixels_per_meter,
                    wrist.1 + p.y * self.pixels_per_meter,
                )
            })
            .collect();
        HandObservation::new(self.handedness, keypoints, Some(landmarks))
    }

    /// Returns the hand at animation time `t` (in seconds) for a frame of resolution `frame`.
    ///
    /// The wrist drifts on a Lissajous curve around the lower half of the frame while the hand
    /// sways and tilts.
    pub fn animated(
        &self,
        frame: Resolution,
        t: f32,
    ) -> Result<HandObservation, ObservationError> {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let wrist = (
            w * (0.5 + 0.2 * (t * 0.5).cos()),
            h * (0.7 + 0.1 * (t * 0.7).sin()),
        );
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3 * (t * 0.6).sin())
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.6 * t.sin())
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.4 * (t * 0.8).sin());
        self.observe(wrist, rotation)
    }
}

/// Returns a stand-in for the watch model file: case, screen, strap and wrist occluder.
pub fn watch_model() -> Node {
    let at = |x, y, z| RigidTransform::new(Point3::new(x, y, z), UnitQuaternion::identity(), 1.0);
    Node::group(
        "smartwatch",
        vec![
            Node::mesh(OCCLUDER_MESH, Material::default()).with_transform(RigidTransform::new(
                Point3::new(0.0, -0.6, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
                1.0,
            )),
            Node::mesh("case", Material::standard(Color::from_hex(0x202020), 0.3, 0.9)),
            Node::mesh(SCREEN_MESH, Material::standard(Color::BLACK, 0.1, 0.0))
                .with_transform(at(0.0, 0.0, 0.05)),
            Node::mesh("Strap_Rubber", Material::default()).with_transform(at(0.0, -0.3, 0.0)),
        ],
    )
}

/// Settings of the headless collaborators.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub handedness: Handedness,
    /// Frame rate the synthetic detector assumes when animating the hand.
    pub fps: f32,
    /// Number of consecutive frames the hand is visible for.
    pub visible_frames: u64,
    /// Number of consecutive frames the hand is missing for after being visible.
    pub hidden_frames: u64,
    /// Directory to write composited frames to.
    pub snapshot_dir: Option<PathBuf>,
    /// Every how many rendered frames a snapshot is written.
    pub snapshot_interval: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            handedness: Handedness::Right,
            fps: 30.0,
            visible_frames: 90,
            hidden_frames: 15,
            snapshot_dir: None,
            snapshot_interval: 30,
        }
    }
}

/// Produces uniformly colored frames.
pub struct SyntheticCamera {
    resolution: Resolution,
    background: Color,
}

impl SyntheticCamera {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            background: Color::from_rgb8(40, 40, 48),
        }
    }
}

impl Camera for SyntheticCamera {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn capture(&mut self) -> anyhow::Result<Image> {
        Ok(Image::filled(self.resolution, self.background))
    }
}

/// Reports a [`SyntheticHand`] that is visible for a while, then missing for a while.
pub struct SyntheticDetector {
    hand: SyntheticHand,
    fps: f32,
    visible_frames: u64,
    hidden_frames: u64,
    frame: u64,
}

impl SyntheticDetector {
    pub fn new(config: &HeadlessConfig) -> Self {
        Self {
            hand: SyntheticHand::new(config.handedness),
            fps: config.fps,
            visible_frames: config.visible_frames,
            hidden_frames: config.hidden_frames,
            frame: 0,
        }
    }

    fn hand_visible(&self, frame: u64) -> bool {
        let cycle = self.visible_frames + self.hidden_frames;
        cycle == 0 || frame % cycle < self.visible_frames
    }
}

impl HandDetector for SyntheticDetector {
    async fn estimate(&mut self, frame: &Image) -> anyhow::Result<Option<HandObservation>> {
        let index = self.frame;
        self.frame += 1;
        if !self.hand_visible(index) {
            return Ok(None);
        }

        let t = index as f32 / self.fps;
        Ok(Some(self.hand.animated(frame.resolution(), t)?))
    }
}

/// Composites a debug view of the scene onto each camera frame.
pub struct HeadlessRenderer {
    snapshot_dir: Option<PathBuf>,
    snapshot_interval: u64,
    rendered: u64,
    output: Option<Image>,
}

impl HeadlessRenderer {
    /// Creates a renderer, creating the snapshot directory if one is configured.
    pub fn new(config: &HeadlessConfig) -> anyhow::Result<Self> {
        if let Some(dir) = &config.snapshot_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create '{}'", dir.display()))?;
            log::info!("writing snapshots to '{}'", dir.display());
        }
        Ok(Self {
            snapshot_dir: config.snapshot_dir.clone(),
            snapshot_interval: config.snapshot_interval.max(1),
            rendered: 0,
            output: None,
        })
    }

    /// Returns the most recently composited frame.
    pub fn output(&self) -> Option<&Image> {
        self.output.as_ref()
    }

    /// Returns the number of frames rendered so far.
    pub fn rendered_frames(&self) -> u64 {
        self.rendered
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn render(&mut self, frame: &Image, scene: &Scene) -> anyhow::Result<()> {
        let mut out = frame.clone();
        let res = frame.resolution();
        let camera = scene.camera();

        scene.for_each_mesh(|node, mesh, world| {
            if !mesh.material.color_write {
                return;
            }
            if let Some((x, y)) = camera.project(&world.position, res) {
                draw::marker(&mut out, x as i32, y as i32)
                    .color(mesh.material.color)
                    .size(7);
                draw::text(&mut out, x as i32, y as i32 - 12, &node.name).color(Color::WHITE);
            }
        });

        let anchor = scene.anchor_transform();
        if let Some((x, y)) = camera.project(&anchor.position, res) {
            draw::quaternion(&mut out, x as i32, y as i32, anchor.rotation)
                .axis_length(60)
                .stroke_width(2);
        }

        if let Some(texture) = scene.screen_texture() {
            out.blend_from(texture);
        }

        if let Some(dir) = &self.snapshot_dir {
            if self.rendered % self.snapshot_interval == 0 {
                let path = dir.join(format!("frame-{:05}.png", self.rendered));
                out.save(&path)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                log::trace!("wrote {}", path.display());
            }
        }

        self.rendered += 1;
        self.output = Some(out);
        Ok(())
    }
}

/// Creates the headless collaborators.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    config: HeadlessConfig,
}

impl HeadlessPlatform {
    pub fn new(config: HeadlessConfig) -> Self {
        Self { config }
    }
}

impl Platform for HeadlessPlatform {
    type Camera = SyntheticCamera;
    type Renderer = HeadlessRenderer;
    type Detector = SyntheticDetector;

    async fn open_camera(&mut self, resolution: Resolution) -> anyhow::Result<SyntheticCamera> {
        anyhow::ensure!(
            resolution.aspect_ratio().is_some(),
            "cannot open a camera at {resolution}"
        );
        Ok(SyntheticCamera::new(resolution))
    }

    async fn load_scene(&mut self) -> anyhow::Result<Node> {
        Ok(watch_model())
    }

    async fn create_renderer(&mut self, frame: Resolution) -> anyhow::Result<HeadlessRenderer> {
        log::debug!("headless renderer for {frame} frames");
        HeadlessRenderer::new(&self.config)
    }

    async fn create_detector(&mut self) -> anyhow::Result<SyntheticDetector> {
        Ok(SyntheticDetector::new(&self.config))
    }
}
