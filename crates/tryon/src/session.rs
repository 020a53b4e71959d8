//! The try-on pipeline: staged startup and the per-frame loop.
//!
//! A [`Session`] owns every collaborator and all per-frame state. Frames are processed strictly
//! one after another: [`Session::run_frame`] captures a camera frame, waits for the hand detector,
//! solves and smooths the wrist pose, applies it to the scene, refreshes the clock face and asks
//! the renderer to draw.

use std::fmt;

use nalgebra::Point3;

use crate::{
    asset::{AssetParam, ColorVariant},
    clock::ClockFace,
    config::Config,
    filter::{Filter, PositionSmoother},
    hand::HandObservation,
    image::{Image, Resolution},
    pose::RigidTransform,
    scene::{Node, Scene},
    solver::OrientationSolver,
    timer::{FpsCounter, Timer},
};

/// A source of camera frames.
pub trait Camera {
    /// Returns the resolution of the frames returned by [`Camera::capture`].
    fn resolution(&self) -> Resolution;

    /// Captures the next frame.
    fn capture(&mut self) -> anyhow::Result<Image>;
}

/// A hand landmark detector that reports at most one hand per frame.
#[allow(async_fn_in_trait)]
pub trait HandDetector {
    /// Estimates the hand visible in `frame`.
    ///
    /// Returns `Ok(None)` when there is no hand in the frame. The 2D keypoints of the returned
    /// observation are pixel coordinates in `frame`.
    async fn estimate(&mut self, frame: &Image) -> anyhow::Result<Option<HandObservation>>;
}

/// Draws the scene on top of a camera frame.
pub trait SceneRenderer {
    fn render(&mut self, frame: &Image, scene: &Scene) -> anyhow::Result<()>;
}

/// Creates the collaborators of a [`Session`].
///
/// Each method is one startup stage. They are called in declaration order, and the first failure
/// aborts startup.
#[allow(async_fn_in_trait)]
pub trait Platform {
    type Camera: Camera;
    type Renderer: SceneRenderer;
    type Detector: HandDetector;

    /// Opens the camera, ideally at `resolution`.
    async fn open_camera(&mut self, resolution: Resolution) -> anyhow::Result<Self::Camera>;

    /// Loads the watch model as a node tree.
    async fn load_scene(&mut self) -> anyhow::Result<Node>;

    /// Creates a renderer for frames of the camera's resolution.
    async fn create_renderer(&mut self, frame: Resolution) -> anyhow::Result<Self::Renderer>;

    async fn create_detector(&mut self) -> anyhow::Result<Self::Detector>;
}

/// The startup stages of a [`Session`], in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Camera,
    Scene,
    Renderer,
    Detector,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Camera => "camera",
            Stage::Scene => "scene",
            Stage::Renderer => "renderer",
            Stage::Detector => "detector",
        })
    }
}

/// Error returned by [`Session::start`], naming the stage that failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialize {stage}")]
pub struct StartupError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

fn stage<T>(stage: Stage, result: anyhow::Result<T>) -> Result<T, StartupError> {
    match result {
        Ok(value) => {
            log::info!("{stage} ready");
            Ok(value)
        }
        Err(source) => {
            log::error!("{stage} failed: {source:#}");
            Err(StartupError { stage, source })
        }
    }
}

/// What happened to the watch during one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// A hand was found; the anchor was moved to this (smoothed) transform.
    Tracked(RigidTransform),
    /// No usable hand; the anchor kept its previous transform.
    Lost,
}

impl FrameOutcome {
    pub fn is_tracked(&self) -> bool {
        matches!(self, FrameOutcome::Tracked(_))
    }
}

/// A running try-on session.
pub struct Session<C, D, R> {
    camera: C,
    detector: D,
    renderer: R,
    scene: Scene,
    solver: OrientationSolver,
    smoother: PositionSmoother,
    clock: ClockFace,
    fps: FpsCounter,
    t_detect: Timer,
    frames: u64,
    tracked_frames: u64,
    tracking: bool,
}

impl<C: Camera, D: HandDetector, R: SceneRenderer> Session<C, D, R> {
    /// Runs the startup stages of `platform` and assembles a session from the results.
    pub async fn start<P>(platform: &mut P, config: Config) -> Result<Self, StartupError>
    where
        P: Platform<Camera = C, Detector = D, Renderer = R>,
    {
        // The calibration belongs to the watch asset, so a bad value fails the scene stage before
        // any collaborator is created.
        let solver = match OrientationSolver::new(config.asset.scale_calibration) {
            Ok(solver) => solver.with_fov_constant(config.fov_constant),
            Err(e) => return stage(Stage::Scene, Err(e.into())),
        };

        let camera = stage(
            Stage::Camera,
            platform.open_camera(config.camera_resolution).await,
        )?;
        let frame = camera.resolution();
        log::debug!("camera resolution: {frame}");

        let model = stage(Stage::Scene, platform.load_scene().await)?;
        let mut scene = Scene::new(model, config.asset.clone(), frame);
        scene.apply_color_variant(config.color);

        let renderer = stage(Stage::Renderer, platform.create_renderer(frame).await)?;
        let detector = stage(Stage::Detector, platform.create_detector().await)?;

        let smoother = PositionSmoother::new(scene.anchor_transform().position);

        Ok(Self {
            camera,
            detector,
            renderer,
            scene,
            solver,
            smoother,
            clock: ClockFace::new(),
            fps: FpsCounter::new("try-on"),
            t_detect: Timer::new("detect"),
            frames: 0,
            tracked_frames: 0,
            tracking: false,
        })
    }

    /// Processes a single frame.
    ///
    /// Capture, detection and rendering errors are returned; a frame without a usable hand is not
    /// an error.
    pub async fn run_frame(&mut self) -> anyhow::Result<FrameOutcome> {
        let frame = self.camera.capture()?;
        let observation = {
            let _guard = self.t_detect.start();
            self.detector.estimate(&frame).await?
        };

        let outcome = match observation {
            Some(hand) => match self.solver.solve(&hand, frame.resolution()) {
                Ok(pose) => {
                    let transform = RigidTransform {
                        position: self.smoother.push(pose.position),
                        ..pose
                    };
                    log::trace!("frame {}: {:?} -> {:?}", self.frames, pose, transform);
                    self.scene.set_anchor_transform(transform);
                    FrameOutcome::Tracked(transform)
                }
                Err(e) => {
                    log::trace!(
                        "frame {}: discarding {} hand: {e}",
                        self.frames,
                        hand.handedness()
                    );
                    FrameOutcome::Lost
                }
            },
            None => FrameOutcome::Lost,
        };

        if outcome.is_tracked() != self.tracking {
            self.tracking = outcome.is_tracked();
            if self.tracking {
                log::debug!("hand found at frame {}", self.frames);
            } else {
                log::debug!("hand lost at frame {}", self.frames);
            }
        }

        let face = self.clock.update();
        self.scene.set_screen_texture(face);
        self.renderer.render(&frame, &self.scene)?;

        self.frames += 1;
        if outcome.is_tracked() {
            self.tracked_frames += 1;
        }
        self.fps.tick_with(&mut [&mut self.t_detect]);

        Ok(outcome)
    }

    /// Processes frames until `max_frames` have been processed or an error occurs.
    ///
    /// With `max_frames` set to `None`, this runs until the camera or a collaborator fails.
    pub async fn run(&mut self, max_frames: Option<u64>) -> anyhow::Result<()> {
        let mut processed = 0;
        while max_frames.map_or(true, |max| processed < max) {
            self.run_frame().await?;
            processed += 1;
        }
        log::info!(
            "processed {} frames, hand tracked in {}",
            self.frames,
            self.tracked_frames
        );
        Ok(())
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[inline]
    pub fn solver(&self) -> &OrientationSolver {
        &self.solver
    }

    /// Returns the position the smoother emitted last.
    #[inline]
    pub fn smoothed_position(&self) -> Point3<f32> {
        self.smoother.position()
    }

    /// Returns the number of frames processed so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Returns the number of processed frames in which a hand was tracked.
    #[inline]
    pub fn tracked_frame_count(&self) -> u64 {
        self.tracked_frames
    }

    /// Tunes the watch calibration while the session runs. Returns the clamped value.
    pub fn set_asset_param(&mut self, param: AssetParam, value: f32) -> f32 {
        self.scene.set_asset_param(param, value)
    }

    pub fn apply_color_variant(&mut self, variant: ColorVariant) {
        self.scene.apply_color_variant(variant);
    }
}
