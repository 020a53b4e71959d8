//! Hand observations reported by a hand landmark detector.

use std::{fmt, str::FromStr};

use nalgebra::{Point2, Point3};

/// Number of landmarks in the hand skeleton.
pub const NUM_LANDMARKS: usize = 21;

/// Which hand an observation belongs to, as labeled by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Returns the label the detector uses for this hand.
    pub fn label(self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Handedness {
    type Err = ObservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Left" => Ok(Handedness::Left),
            "Right" => Ok(Handedness::Right),
            _ => Err(ObservationError::UnknownHandedness(s.to_string())),
        }
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// A landmark's position in the camera image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_point(self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    /// Euclidean distance between two keypoints, in pixels.
    pub fn distance(self, other: Keypoint) -> f32 {
        nalgebra::distance(&self.to_point(), &other.to_point())
    }
}

/// Errors produced when a detector result does not have the shape of a hand.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ObservationError {
    #[error("expected 21 2D keypoints, got {0}")]
    KeypointCount(usize),
    #[error("expected 21 3D keypoints parallel to the 2D keypoints, got {0}")]
    Keypoint3dCount(usize),
    #[error("unknown handedness label '{0}' (expected 'Left' or 'Right')")]
    UnknownHandedness(String),
}

/// One hand detected in one camera frame.
///
/// Holds exactly [`NUM_LANDMARKS`] 2D keypoints in pixel coordinates and, if the detector provides
/// them, the same number of 3D keypoints in a hand-local coordinate system with unknown scale.
/// 3D keypoints use the detector's image orientation (Y pointing down).
#[derive(Debug, Clone)]
pub struct HandObservation {
    handedness: Handedness,
    keypoints: Box<[Keypoint]>,
    keypoints_3d: Option<Box<[Point3<f32>]>>,
}

impl HandObservation {
    /// Creates an observation from detector output.
    ///
    /// Fails if `keypoints` does not contain exactly [`NUM_LANDMARKS`] entries, or if
    /// `keypoints_3d` is present and does not share its indices with `keypoints`.
    pub fn new(
        handedness: Handedness,
        keypoints: Vec<Keypoint>,
        keypoints_3d: Option<Vec<Point3<f32>>>,
    ) -> Result<Self, ObservationError> {
        if keypoints.len() != NUM_LANDMARKS {
            return Err(ObservationError::KeypointCount(keypoints.len()));
        }
        if let Some(kp) = &keypoints_3d {
            if kp.len() != keypoints.len() {
                return Err(ObservationError::Keypoint3dCount(kp.len()));
            }
        }

        Ok(Self {
            handedness,
            keypoints: keypoints.into_boxed_slice(),
            keypoints_3d: keypoints_3d.map(Vec::into_boxed_slice),
        })
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Returns the 2D keypoints, indexed by [`LandmarkIdx`].
    #[inline]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the 3D keypoints, if the detector provided them.
    #[inline]
    pub fn keypoints_3d(&self) -> Option<&[Point3<f32>]> {
        self.keypoints_3d.as_deref()
    }

    /// Returns the 2D keypoint of a landmark.
    #[inline]
    pub fn keypoint(&self, idx: LandmarkIdx) -> Keypoint {
        self.keypoints[idx as usize]
    }

    /// Returns the 3D keypoint of a landmark, if the detector provided 3D keypoints.
    #[inline]
    pub fn keypoint_3d(&self, idx: LandmarkIdx) -> Option<Point3<f32>> {
        self.keypoints_3d.as_ref().map(|kp| kp[idx as usize])
    }

    /// Returns a copy of `self` with every keypoint moved by the given offsets.
    ///
    /// `dx` and `dy` are in pixels, `offset_3d` in the detector's 3D units.
    pub fn translated(&self, dx: f32, dy: f32, offset_3d: nalgebra::Vector3<f32>) -> Self {
        Self {
            handedness: self.handedness,
            keypoints: self
                .keypoints
                .iter()
                .map(|kp| Keypoint::new(kp.x + dx, kp.y + dy))
                .collect(),
            keypoints_3d: self
                .keypoints_3d
                .as_ref()
                .map(|kp| kp.iter().map(|p| p + offset_3d).collect()),
        }
    }
}
