//! Session configuration and its environment variable overrides.

use std::{
    env::{self, VarError},
    path::PathBuf,
};

use crate::{
    asset::{ColorVariant, WatchAsset},
    image::Resolution,
    solver::DEFAULT_FOV_CONSTANT,
};

const COLOR_VAR: &str = "TRYON_COLOR";
const FOV_VAR: &str = "TRYON_FOV";
const SNAPSHOT_DIR_VAR: &str = "TRYON_SNAPSHOT_DIR";

/// Everything a [`Session`][crate::session::Session] needs to know up front.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scene units spanned by one frame height on the wrist's plane.
    pub fov_constant: f32,
    /// Resolution requested from the camera.
    pub camera_resolution: Resolution,
    pub asset: WatchAsset,
    /// Strap color applied after the scene is loaded.
    pub color: ColorVariant,
    /// Directory the headless renderer writes PNG snapshots into, if any.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fov_constant: DEFAULT_FOV_CONSTANT,
            camera_resolution: Resolution::RES_720P,
            asset: WatchAsset::smartwatch(),
            color: ColorVariant::default(),
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Returns the default configuration, overridden by the `TRYON_*` environment variables.
    ///
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name))
    }

    /// Like [`Config::from_env`], but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Result<String, VarError>) -> Self {
        let mut config = Self::default();

        match lookup(COLOR_VAR).as_deref() {
            Ok(value) => match value.parse() {
                Ok(color) => config.color = color,
                Err(e) => log::warn!("ignoring `{COLOR_VAR}`: {e}"),
            },
            Err(VarError::NotPresent) => {}
            Err(VarError::NotUnicode(s)) => {
                log::warn!("ignoring `{COLOR_VAR}`: {}", s.to_string_lossy());
            }
        }

        match lookup(FOV_VAR).as_deref() {
            Ok(value) => match value.trim().parse::<f32>() {
                Ok(fov) if fov.is_finite() && fov > 0.0 => config.fov_constant = fov,
                _ => log::warn!("ignoring `{FOV_VAR}`: '{value}' is not a positive number"),
            },
            Err(VarError::NotPresent) => {}
            Err(VarError::NotUnicode(s)) => {
                log::warn!("ignoring `{FOV_VAR}`: {}", s.to_string_lossy());
            }
        }

        match lookup(SNAPSHOT_DIR_VAR) {
            Ok(dir) if !dir.is_empty() => config.snapshot_dir = Some(dir.into()),
            Ok(_) | Err(VarError::NotPresent) => {}
            Err(VarError::NotUnicode(s)) => {
                // Paths need not be UTF-8.
                config.snapshot_dir = Some(s.into());
            }
        }

        log::debug!(
            "config: fov={}, camera={}, color={}, snapshots={:?}",
            config.fov_constant,
            config.camera_resolution,
            config.color,
            config.snapshot_dir,
        );
        config
    }
}
