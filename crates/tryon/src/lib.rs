//! Wrist pose estimation for a virtual watch try-on.
//!
//! Every camera frame, an external hand landmark detector reports (at most) one hand. This crate
//! turns the reported landmarks into a pose for a watch model anchored to the wrist, damps the
//! position of that pose over time, and hands the result to an external renderer together with an
//! animated clock face used as the watch screen.
//!
//! The pieces, roughly in the order a frame passes through them:
//!
//! - [`hand`]: landmark naming and the per-frame [`HandObservation`][hand::HandObservation].
//! - [`solver`]: the stateless hand-to-pose solver.
//! - [`filter`]: the position smoother.
//! - [`scene`] and [`asset`]: the scene description the pose is applied to.
//! - [`clock`]: the watch face bitmap.
//! - [`session`]: startup pipeline and the sequential frame loop.
//!
//! # 3D Coordinates
//!
//! Scene coordinates are right-handed: X points to the right, Y points up, and Z points from the
//! scene towards the viewer.
//!
//! Hand landmark detectors report 3D landmarks in image orientation instead: Y points *down*, and
//! smaller Z values are closer to the camera. The solver converts between the two by negating Y
//! and Z.
//!
//! # Environment Variables
//!
//! Some defaults of [`Config`][config::Config] can be overridden by setting environment
//! variables:
//!
//! * `TRYON_COLOR`: initial strap color. One of `red`, `pink`, `blue`, `white`, `green`.
//! * `TRYON_FOV`: the field-of-view constant tying pixel offsets to scene units.
//! * `TRYON_SNAPSHOT_DIR`: makes the headless renderer write PNG snapshots into this directory.

use log::LevelFilter;

pub mod asset;
pub mod clock;
pub mod config;
pub mod filter;
pub mod hand;
pub mod headless;
pub mod image;
pub mod pose;
pub mod scene;
pub mod session;
pub mod solver;
pub mod timer;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `tryon` will log at *trace*
/// level. Otherwise, they will log at *debug* level. `RUST_LOG` is honored on top of that.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
