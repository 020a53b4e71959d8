//! Computes the pose of a wrist-anchored object from hand landmarks.
//!
//! The solver looks at three landmarks that are rigidly connected through the palm: the wrist,
//! the index finger MCP and the pinky MCP. The edge from the wrist to the index finger MCP defines
//! the hand's X axis, and the normal of the triangle spanned by all three defines its Y axis. The
//! object's rotation is the composition of two minimal rotations: one that tilts the reference up
//! axis onto the hand's Y axis, and one about that axis that swings the reference X axis onto the
//! hand's X axis.
//!
//! Scale is derived from the length of the palm in the image, corrected for foreshortening using
//! the (scale-free) 3D landmarks. Position is the wrist's pixel position mapped onto the plane
//! `z = 0` of the scene.
//!
//! The solver is stateless. Temporal smoothing lives in [`crate::filter`].

use std::f32::consts::PI;

use nalgebra::{Point3, Unit, UnitQuaternion, Vector2, Vector3};

use crate::{
    hand::{HandObservation, Handedness, Keypoint, LandmarkIdx},
    image::Resolution,
    pose::RigidTransform,
};

/// Field-of-view constant used when none is configured.
///
/// A wrist offset of one frame height from the image center maps to this many scene units at the
/// assumed camera distance.
pub const DEFAULT_FOV_CONSTANT: f32 = 4.0;

/// Relative length below which a vector is considered to have no usable direction.
const EPSILON: f32 = 1e-6;

/// Reasons the solver could not produce a pose for a frame.
///
/// All of them are expected while tracking; callers should keep the previous pose.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("hand observation carries no 3D keypoints")]
    Missing3dKeypoints,
    #[error("camera frame has zero height")]
    EmptyFrame,
}

/// Error returned by [`OrientationSolver::new`] for a scale calibration that is negative or not
/// finite.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("scale calibration must be a non-negative number (got {0})")]
pub struct InvalidCalibration(pub f32);

/// The three palm landmarks the solver is based on, in scene orientation (Y up, Z towards the
/// viewer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub wrist: Point3<f32>,
    pub index_mcp: Point3<f32>,
    pub pinky_mcp: Point3<f32>,
}

impl Anchors {
    /// Extracts the anchors from an observation, converting them from the detector's image
    /// orientation into scene orientation.
    pub fn from_observation(hand: &HandObservation) -> Result<Self, SolveError> {
        let get = |idx| {
            hand.keypoint_3d(idx)
                .map(detector_to_scene)
                .ok_or(SolveError::Missing3dKeypoints)
        };

        Ok(Self {
            wrist: get(LandmarkIdx::Wrist)?,
            index_mcp: get(LandmarkIdx::IndexFingerMcp)?,
            pinky_mcp: get(LandmarkIdx::PinkyMcp)?,
        })
    }

    /// Edge from the wrist to the index finger MCP.
    #[inline]
    pub fn index_edge(&self) -> Vector3<f32> {
        self.index_mcp - self.wrist
    }

    /// Edge from the wrist to the pinky MCP.
    #[inline]
    pub fn pinky_edge(&self) -> Vector3<f32> {
        self.pinky_mcp - self.wrist
    }

    /// Direction of the hand's X axis, or `None` if the index edge has no length.
    pub fn hand_x(&self) -> Option<Unit<Vector3<f32>>> {
        let (v0, v1) = (self.index_edge(), self.pinky_edge());
        Unit::try_new(v0, EPSILON * v0.norm().max(v1.norm()))
    }

    /// Direction of the palm normal, or `None` if the anchors are collinear.
    ///
    /// The winding of the anchors is mirrored between left and right hands, so the cross product
    /// is taken in opposite order for each.
    pub fn hand_y(&self, handedness: Handedness) -> Option<Unit<Vector3<f32>>> {
        let (v0, v1) = (self.index_edge(), self.pinky_edge());
        let normal = match handedness {
            Handedness::Right => v0.cross(&v1),
            Handedness::Left => v1.cross(&v0),
        };
        Unit::try_new(normal, EPSILON * v0.norm() * v1.norm())
    }
}

/// Converts a detector 3D keypoint (Y down, Z towards the camera) into scene orientation.
#[inline]
fn detector_to_scene(p: Point3<f32>) -> Point3<f32> {
    Point3::new(p.x, -p.y, -p.z)
}

/// Orthonormal coordinate frame of a hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub x: Unit<Vector3<f32>>,
    pub y: Unit<Vector3<f32>>,
    pub z: Unit<Vector3<f32>>,
}

impl Basis {
    /// Computes the hand's coordinate frame, or `None` if the anchors are degenerate.
    pub fn from_anchors(anchors: &Anchors, handedness: Handedness) -> Option<Self> {
        let x = anchors.hand_x()?;
        let y = anchors.hand_y(handedness)?;
        let z = Unit::new_normalize(x.cross(&y));
        Some(Self { x, y, z })
    }
}

/// Returns the minimal rotation that turns `from` into `to`.
///
/// If both directions coincide, this is the identity. If they are opposite, any axis
/// perpendicular to `from` yields a minimal rotation, so the half turn is taken about
/// `half_turn_axis`, which must be perpendicular to `from`.
pub fn rotation_onto(
    from: &Unit<Vector3<f32>>,
    to: &Unit<Vector3<f32>>,
    half_turn_axis: &Unit<Vector3<f32>>,
) -> UnitQuaternion<f32> {
    let cos = from.dot(to).clamp(-1.0, 1.0);
    match Unit::try_new(from.cross(to), EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, cos.acos()),
        None if cos > 0.0 => UnitQuaternion::identity(),
        None => UnitQuaternion::from_axis_angle(half_turn_axis, PI),
    }
}

/// Returns the rotation about `axis` that turns `from` into `to`.
///
/// Both directions must be perpendicular to `axis`. The signed angle is measured around `axis`,
/// so opposite directions yield a half turn about `axis` no matter how the rounding error in
/// their cross product points.
pub fn swing_about(
    axis: &Unit<Vector3<f32>>,
    from: &Unit<Vector3<f32>>,
    to: &Unit<Vector3<f32>>,
) -> UnitQuaternion<f32> {
    let angle = axis.dot(&from.cross(to)).atan2(from.dot(to));
    UnitQuaternion::from_axis_angle(axis, angle)
}

/// Computes the rotation that aligns the reference X and Y axes with the hand's axes.
///
/// The Y axis is aligned first, then the X axis is swung into place about the new Y axis. Missing
/// axes contribute no rotation.
pub fn wrist_rotation(
    hand_x: Option<Unit<Vector3<f32>>>,
    hand_y: Option<Unit<Vector3<f32>>>,
) -> UnitQuaternion<f32> {
    let right = Vector3::x_axis();
    let up = Vector3::y_axis();

    let qy = match hand_y {
        Some(hand_y) => rotation_onto(&up, &hand_y, &right),
        None => UnitQuaternion::identity(),
    };

    let Some(hand_x) = hand_x else {
        return qy;
    };

    let model_x2 = Unit::new_normalize(qy * right.into_inner());
    let qx = match hand_y {
        // `qy` keeps the reference X axis perpendicular to the hand's Y axis.
        Some(hand_y) => swing_about(&hand_y, &model_x2, &hand_x),
        None => rotation_onto(&model_x2, &hand_x, &up),
    };

    qx * qy
}

/// Estimates the palm length in pixels, compensating for the palm being tilted out of the image
/// plane.
///
/// The 3D landmarks have no absolute scale, but the ratio between the pinky edge and its
/// projection onto the image plane tells how much the 2D palm length is foreshortened.
pub fn palm_length(hand: &HandObservation, anchors: &Anchors) -> f32 {
    let v1 = anchors.pinky_edge();
    let full = v1.norm();
    let planar = Vector2::new(v1.x, v1.y).norm();
    // No planar extent means the 2D palm length is ~0 as well, so the ratio does not matter.
    let ratio = if planar <= EPSILON * full || planar == 0.0 {
        1.0
    } else {
        full / planar
    };

    let palm_2d = hand
        .keypoint(LandmarkIdx::Wrist)
        .distance(hand.keypoint(LandmarkIdx::PinkyMcp));

    ratio * palm_2d
}

/// Maps a pixel position onto the scene plane `z = 0`.
///
/// The frame center maps to the origin; one frame height corresponds to `fov_constant` scene
/// units. Pixel Y points down, scene Y points up.
pub fn pixel_to_scene(kp: Keypoint, frame: Resolution, fov_constant: f32) -> Point3<f32> {
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    Point3::new(
        (kp.x - w / 2.0) * fov_constant / h,
        -(kp.y - h / 2.0) * fov_constant / h,
        0.0,
    )
}

/// Maps hand observations to the pose of an object worn on the wrist.
#[derive(Debug, Clone, Copy)]
pub struct OrientationSolver {
    fov_constant: f32,
    scale_calibration: f32,
}

impl OrientationSolver {
    /// Creates a solver for an object whose scale per pixel of palm length is
    /// `scale_calibration`.
    ///
    /// Returns an error if `scale_calibration` is negative or not finite.
    pub fn new(scale_calibration: f32) -> Result<Self, InvalidCalibration> {
        if !scale_calibration.is_finite() || scale_calibration < 0.0 {
            return Err(InvalidCalibration(scale_calibration));
        }
        Ok(Self {
            fov_constant: DEFAULT_FOV_CONSTANT,
            scale_calibration,
        })
    }

    /// Returns a copy of `self` using a different field-of-view constant.
    pub fn with_fov_constant(self, fov_constant: f32) -> Self {
        Self {
            fov_constant,
            ..self
        }
    }

    #[inline]
    pub fn fov_constant(&self) -> f32 {
        self.fov_constant
    }

    #[inline]
    pub fn scale_calibration(&self) -> f32 {
        self.scale_calibration
    }

    /// Computes the object pose for one hand observation in a frame of resolution `frame`.
    pub fn solve(
        &self,
        hand: &HandObservation,
        frame: Resolution,
    ) -> Result<RigidTransform, SolveError> {
        if frame.height() == 0 {
            return Err(SolveError::EmptyFrame);
        }

        let anchors = Anchors::from_observation(hand)?;
        let hand_x = anchors.hand_x();
        let hand_y = hand_x.and(anchors.hand_y(hand.handedness()));
        if hand_y.is_none() {
            log::trace!("degenerate palm anchors {anchors:?}, rotation falls back to identity");
        }

        let rotation = wrist_rotation(hand_x, hand_y);
        let scale = palm_length(hand, &anchors) * self.scale_calibration;
        let position = pixel_to_scene(
            hand.keypoint(LandmarkIdx::Wrist),
            frame,
            self.fov_constant,
        );

        Ok(RigidTransform {
            position,
            rotation,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::test::{observation, random_anchors, right_hand};

    const TOLERANCE: f32 = 1e-5;

    fn anchors(wrist: [f32; 3], index: [f32; 3], pinky: [f32; 3]) -> Anchors {
        Anchors {
            wrist: wrist.into(),
            index_mcp: index.into(),
            pinky_mcp: pinky.into(),
        }
    }

    #[test]
    fn basis_is_orthonormal() {
        let mut rng = fastrand::Rng::with_seed(0x7a11);
        for _ in 0..500 {
            let anchors = random_anchors(&mut rng);
            for handedness in [Handedness::Left, Handedness::Right] {
                let Some(basis) = Basis::from_anchors(&anchors, handedness) else {
                    continue;
                };
                assert_relative_eq!(basis.x.norm(), 1.0, epsilon = TOLERANCE);
                assert_relative_eq!(basis.y.norm(), 1.0, epsilon = TOLERANCE);
                assert_relative_eq!(basis.z.norm(), 1.0, epsilon = TOLERANCE);
                assert!(basis.x.dot(&basis.y).abs() < TOLERANCE);
                assert!(basis.y.dot(&basis.z).abs() < TOLERANCE);
                assert!(basis.z.dot(&basis.x).abs() < TOLERANCE);
            }
        }
    }

    #[test]
    fn handedness_flips_normal() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..200 {
            let anchors = random_anchors(&mut rng);
            let (Some(right), Some(left)) = (
                anchors.hand_y(Handedness::Right),
                anchors.hand_y(Handedness::Left),
            ) else {
                continue;
            };
            assert_eq!(left.into_inner(), -right.into_inner());

            let right = Basis::from_anchors(&anchors, Handedness::Right).unwrap();
            let left = Basis::from_anchors(&anchors, Handedness::Left).unwrap();
            // Same X, mirrored Y and Z: the basis changes chirality relative to the anchors.
            assert_eq!(left.x, right.x);
            assert_relative_eq!(left.z.into_inner(), -right.z.into_inner(), epsilon = 1e-6);
        }
    }

    #[test]
    fn reference_scenario() {
        let anchors = anchors([0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert_eq!(anchors.index_edge(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(anchors.pinky_edge(), Vector3::new(1.0, -1.0, 0.0));

        let basis = Basis::from_anchors(&anchors, Handedness::Right).unwrap();
        assert_relative_eq!(basis.x.into_inner(), Vector3::x(), epsilon = 1e-6);
        assert_relative_eq!(basis.y.into_inner(), -Vector3::z(), epsilon = 1e-6);

        let rotation = wrist_rotation(Some(basis.x), Some(basis.y));
        assert!(rotation.coords.iter().all(|c| c.is_finite()));
        assert_relative_eq!(rotation.coords.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(rotation * Vector3::x(), Vector3::x(), epsilon = 1e-5);
        assert_relative_eq!(rotation * Vector3::y(), -Vector3::z(), epsilon = 1e-5);
    }

    #[test]
    fn reference_scenario_through_solver() {
        // Same anchors as `reference_scenario`, but expressed in detector orientation.
        let mut kp3d = vec![Point3::origin(); 21];
        kp3d[LandmarkIdx::Wrist as usize] = Point3::new(0.0, -1.0, 0.0);
        kp3d[LandmarkIdx::IndexFingerMcp as usize] = Point3::new(1.0, -1.0, 0.0);
        kp3d[LandmarkIdx::PinkyMcp as usize] = Point3::new(1.0, 0.0, 0.0);
        let mut kp2d = vec![Keypoint::new(640.0, 360.0); 21];
        kp2d[LandmarkIdx::PinkyMcp as usize] = Keypoint::new(740.0, 360.0);
        let hand = observation(Handedness::Right, kp2d, Some(kp3d));

        let transform = OrientationSolver::new(0.006)
            .unwrap()
            .solve(&hand, Resolution::RES_720P)
            .unwrap();
        assert!(transform.is_finite());
        assert_relative_eq!(transform.rotation.coords.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(transform.position, Point3::origin(), epsilon = 1e-6);
        // Pinky edge lies in the image plane, so the palm is not foreshortened.
        assert_relative_eq!(transform.scale, 100.0 * 0.006, epsilon = 1e-5);
    }

    #[test]
    fn rotation_aligns_reference_axes_with_hand() {
        let mut rng = fastrand::Rng::with_seed(1234);
        for _ in 0..500 {
            let anchors = random_anchors(&mut rng);
            let Some(basis) = Basis::from_anchors(&anchors, Handedness::Right) else {
                continue;
            };
            let q = wrist_rotation(Some(basis.x), Some(basis.y));
            assert_relative_eq!(q * Vector3::x(), basis.x.into_inner(), epsilon = 1e-3);
            assert_relative_eq!(q * Vector3::y(), basis.y.into_inner(), epsilon = 1e-3);
            assert_relative_eq!(q * Vector3::z(), basis.z.into_inner(), epsilon = 1e-3);
        }
    }

    #[test]
    fn parallel_axes_need_no_rotation() {
        let up = Vector3::y_axis();
        let q = rotation_onto(&up, &up, &Vector3::x_axis());
        assert_eq!(q, UnitQuaternion::identity());

        // Hand already in the reference orientation.
        let q = wrist_rotation(Some(Vector3::x_axis()), Some(Vector3::y_axis()));
        assert_relative_eq!(q, UnitQuaternion::identity(), epsilon = 1e-6);
    }

    #[test]
    fn opposite_axes_turn_halfway() {
        let up = Vector3::y_axis();
        let down = -Vector3::y_axis();
        let q = rotation_onto(&up, &down, &Vector3::x_axis());
        assert!(q.coords.iter().all(|c| c.is_finite()));
        assert_relative_eq!(q * up.into_inner(), down.into_inner(), epsilon = 1e-6);

        // Palm facing down and hand pointing left.
        let hand_x = -Vector3::x_axis();
        let hand_y = -Vector3::y_axis();
        let q = wrist_rotation(Some(hand_x), Some(hand_y));
        assert_relative_eq!(q * Vector3::x(), hand_x.into_inner(), epsilon = 1e-5);
        assert_relative_eq!(q * Vector3::y(), hand_y.into_inner(), epsilon = 1e-5);
    }

    #[test]
    fn nearly_opposite_x_axis_keeps_palm_normal() {
        // Palm facing down with the hand pointing almost exactly along -X after the first
        // rotation, so the swing is a half turn up to rounding.
        let solver = OrientationSolver::new(0.006).unwrap();
        for step in 1..400 {
            let tilt = step as f32 * 1e-4;
            let mut kp3d = vec![Point3::origin(); 21];
            kp3d[LandmarkIdx::IndexFingerMcp as usize] = Point3::new(1.0, -tilt, 0.0);
            kp3d[LandmarkIdx::PinkyMcp as usize] = Point3::new(0.0, 0.0, -1.0);
            let hand = observation(
                Handedness::Right,
                vec![Keypoint::new(640.0, 360.0); 21],
                Some(kp3d),
            );

            let basis = Basis::from_anchors(
                &Anchors::from_observation(&hand).unwrap(),
                Handedness::Right,
            )
            .unwrap();
            let q = solver.solve(&hand, Resolution::RES_720P).unwrap().rotation;
            assert_relative_eq!(q * Vector3::x(), basis.x.into_inner(), epsilon = 1e-3);
            assert_relative_eq!(q * Vector3::y(), basis.y.into_inner(), epsilon = 1e-3);
        }
    }

    #[test]
    fn swing_handles_opposite_directions() {
        let axis = Vector3::y_axis();
        let q = swing_about(&axis, &Vector3::x_axis(), &-Vector3::x_axis());
        assert_relative_eq!(q * Vector3::x(), -Vector3::x(), epsilon = 1e-6);
        assert_relative_eq!(q * Vector3::y(), Vector3::y(), epsilon = 1e-6);

        let q = swing_about(&axis, &Vector3::x_axis(), &Vector3::x_axis());
        assert_relative_eq!(q, UnitQuaternion::identity(), epsilon = 1e-6);
    }

    #[test]
    fn calibration_must_be_non_negative() {
        assert_eq!(OrientationSolver::new(-0.5).unwrap_err(), InvalidCalibration(-0.5));
        assert!(OrientationSolver::new(f32::INFINITY).is_err());
        assert!(OrientationSolver::new(f32::NAN).is_err());
        assert_eq!(OrientationSolver::new(0.0).unwrap().scale_calibration(), 0.0);
    }

    #[test]
    fn degenerate_anchors_stay_finite() {
        let cases = [
            // All anchors coincide.
            anchors([0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, 0.5]),
            // Collinear anchors.
            anchors([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]),
            // Pinky MCP on top of the wrist.
            anchors([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
        ];
        for anchors in cases {
            for handedness in [Handedness::Left, Handedness::Right] {
                assert!(Basis::from_anchors(&anchors, handedness).is_none());
                let hand_x = anchors.hand_x();
                let hand_y = anchors.hand_y(handedness);
                let q = wrist_rotation(hand_x, hand_y);
                assert!(q.coords.iter().all(|c| c.is_finite()), "{anchors:?}");
                if let Some(hand_x) = hand_x {
                    assert_relative_eq!(q * Vector3::x(), hand_x.into_inner(), epsilon = 1e-5);
                }
            }
        }

        assert_eq!(
            wrist_rotation(None, None),
            UnitQuaternion::identity(),
        );
    }

    #[test]
    fn solver_requires_3d_keypoints() {
        let hand = observation(Handedness::Left, vec![Keypoint::new(0.0, 0.0); 21], None);
        assert_eq!(
            OrientationSolver::new(1.0).unwrap().solve(&hand, Resolution::RES_720P),
            Err(SolveError::Missing3dKeypoints),
        );
        assert_eq!(
            OrientationSolver::new(1.0).unwrap().solve(&right_hand(), Resolution::new(640, 0)),
            Err(SolveError::EmptyFrame),
        );
    }

    #[test]
    fn scale_is_non_negative_and_translation_invariant() {
        let solver = OrientationSolver::new(0.006).unwrap();
        let mut rng = fastrand::Rng::with_seed(99);
        let hand = right_hand();
        let base = solver.solve(&hand, Resolution::RES_720P).unwrap();
        assert!(base.scale > 0.0);

        for _ in 0..100 {
            let dx = rng.f32() * 400.0 - 200.0;
            let dy = rng.f32() * 400.0 - 200.0;
            let offset = Vector3::new(rng.f32(), rng.f32(), rng.f32()) * 2.0;
            let moved = hand.translated(dx, dy, offset);
            let transform = solver.solve(&moved, Resolution::RES_720P).unwrap();
            assert!(transform.scale >= 0.0);
            assert_relative_eq!(transform.scale, base.scale, max_relative = 1e-3);
            assert_relative_eq!(transform.rotation, base.rotation, epsilon = 1e-3);
        }
    }

    #[test]
    fn foreshortened_palm_grows() {
        let flat = anchors([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let tilted = anchors([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 1.0]);
        let mut kp2d = vec![Keypoint::new(0.0, 0.0); 21];
        kp2d[LandmarkIdx::PinkyMcp as usize] = Keypoint::new(0.0, 50.0);
        let hand = observation(Handedness::Right, kp2d, None);

        assert_relative_eq!(palm_length(&hand, &flat), 50.0);
        assert_relative_eq!(palm_length(&hand, &tilted), 50.0 * 2f32.sqrt(), epsilon = 1e-4);

        // Pinky edge pointing straight at the camera.
        let edge_on = anchors([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        assert!(palm_length(&hand, &edge_on).is_finite());
    }

    #[test]
    fn wrist_position_mapping() {
        let frame = Resolution::new(1280, 720);
        let center = pixel_to_scene(Keypoint::new(640.0, 360.0), frame, 4.0);
        assert_eq!(center, Point3::origin());

        // Top right corner: one half-height up maps to +2 with K = 4.
        let p = pixel_to_scene(Keypoint::new(1280.0, 0.0), frame, 4.0);
        assert_relative_eq!(p, Point3::new(640.0 * 4.0 / 720.0, 2.0, 0.0), epsilon = 1e-6);
    }
}
