//! Per-model calibration of the watch asset and its color variants.

use std::{fmt, str::FromStr};

use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::{image::Color, pose::RigidTransform, scene::Material};

/// Calibration constants of one watch model.
///
/// The offset and rotation place the model relative to the wrist anchor; they compensate for
/// where the model's origin and axes happen to be in the model file.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchAsset {
    /// Position of the model relative to the wrist anchor, in anchor units.
    pub offset: Vector3<f32>,
    /// Rotation of the model relative to the wrist anchor, as XYZ Euler angles in degrees.
    pub rotation_deg: Vector3<f32>,
    /// Uniform scale applied to the model inside the anchor.
    pub model_scale: f32,
    /// Anchor scale per pixel of (foreshortening-corrected) palm length.
    pub scale_calibration: f32,
    /// Name of the strap mesh whose material changes with the [`ColorVariant`].
    pub strap_mesh: String,
}

impl WatchAsset {
    /// Calibration of the bundled smartwatch model.
    pub fn smartwatch() -> Self {
        Self {
            offset: Vector3::new(-0.3, 0.04, 0.04),
            rotation_deg: Vector3::new(71.93, 311.93, 317.89),
            model_scale: 0.3,
            scale_calibration: 0.006,
            strap_mesh: "Strap_Rubber".into(),
        }
    }

    /// Returns the model's transform relative to the wrist anchor.
    pub fn model_transform(&self) -> RigidTransform {
        let r = self.rotation_deg.map(f32::to_radians);
        // Intrinsic XYZ order: rotate about X first, then Y, then Z.
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), r.x)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), r.y)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), r.z);
        RigidTransform::new(Point3::from(self.offset), rotation, self.model_scale)
    }

    /// Returns the current value of an adjustable parameter.
    pub fn get(&self, param: AssetParam) -> f32 {
        match param {
            AssetParam::X => self.offset.x,
            AssetParam::Y => self.offset.y,
            AssetParam::Z => self.offset.z,
            AssetParam::Rx => self.rotation_deg.x,
            AssetParam::Ry => self.rotation_deg.y,
            AssetParam::Rz => self.rotation_deg.z,
        }
    }

    /// Sets an adjustable parameter, clamped to its range, and returns the value that was set.
    pub fn set(&mut self, param: AssetParam, value: f32) -> f32 {
        let (min, max) = param.range();
        let value = value.clamp(min, max);
        let slot = match param {
            AssetParam::X => &mut self.offset.x,
            AssetParam::Y => &mut self.offset.y,
            AssetParam::Z => &mut self.offset.z,
            AssetParam::Rx => &mut self.rotation_deg.x,
            AssetParam::Ry => &mut self.rotation_deg.y,
            AssetParam::Rz => &mut self.rotation_deg.z,
        };
        *slot = value;
        value
    }

    /// Returns the materials to use for a color variant, keyed by mesh name.
    pub fn palette(&self, variant: ColorVariant) -> Vec<(String, Material)> {
        vec![(
            self.strap_mesh.clone(),
            Material::standard(variant.strap_color(), 0.5, 0.7),
        )]
    }
}

impl Default for WatchAsset {
    fn default() -> Self {
        Self::smartwatch()
    }
}

/// A calibration value of [`WatchAsset`] that can be tuned while the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetParam {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

impl AssetParam {
    pub const ALL: [AssetParam; 6] = [
        AssetParam::X,
        AssetParam::Y,
        AssetParam::Z,
        AssetParam::Rx,
        AssetParam::Ry,
        AssetParam::Rz,
    ];

    /// Returns the inclusive `(min, max)` range of the parameter.
    ///
    /// Offsets are in anchor units, rotations in degrees.
    pub fn range(self) -> (f32, f32) {
        match self {
            AssetParam::X | AssetParam::Y | AssetParam::Z => (-2.0, 2.0),
            AssetParam::Rx | AssetParam::Ry | AssetParam::Rz => (0.0, 360.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetParam::X => "x",
            AssetParam::Y => "y",
            AssetParam::Z => "z",
            AssetParam::Rx => "rx",
            AssetParam::Ry => "ry",
            AssetParam::Rz => "rz",
        }
    }
}

/// Strap colors offered for the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorVariant {
    Red,
    Pink,
    Blue,
    #[default]
    White,
    Green,
}

impl ColorVariant {
    pub const ALL: [ColorVariant; 5] = [
        ColorVariant::Red,
        ColorVariant::Pink,
        ColorVariant::Blue,
        ColorVariant::White,
        ColorVariant::Green,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorVariant::Red => "red",
            ColorVariant::Pink => "pink",
            ColorVariant::Blue => "blue",
            ColorVariant::White => "white",
            ColorVariant::Green => "green",
        }
    }

    pub fn strap_color(self) -> Color {
        match self {
            ColorVariant::White => Color::from_hex(0xFFFFFF),
            ColorVariant::Red => Color::from_hex(0xFF3333),
            ColorVariant::Pink => Color::from_hex(0xFF1E87),
            ColorVariant::Green => Color::from_hex(0x66FF66),
            ColorVariant::Blue => Color::from_hex(0x6666FF),
        }
    }
}

impl fmt::Display for ColorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown [`ColorVariant`] name.
#[derive(Debug, thiserror::Error)]
#[error("unknown color variant '{0}' (expected one of red, pink, blue, white, green)")]
pub struct ParseVariantError(String);

impl FromStr for ColorVariant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorVariant::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseVariantError(s.to_string()))
    }
}
