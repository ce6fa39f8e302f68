//! Gaze direction from tracked eye landmarks.
//!
//! Each eye is modelled as a sphere behind the eye corners. The gaze of an
//! eye is the direction from the sphere centre to the point where the camera
//! ray through the pupil meets the sphere.

use crate::types::{FaceState, GazeSample, Intrinsics, Point3D};

/// Eyeball radius in millimetres
const EYEBALL_RADIUS: f32 = 12.0;
/// Eyeball centre relative to the mid-point of the eye corners, in head coordinates
const EYEBALL_OFFSET: Point3D = Point3D { x: 0.0, y: -3.5, z: 7.0 };

pub trait GazeEstimator {
    /// Unit gaze vector of one eye in camera space. `left_eye` selects the
    /// eye on the image's left side.
    fn estimate(&self, face: &FaceState, intrinsics: &Intrinsics, left_eye: bool) -> Point3D;

    /// Combined (horizontal, vertical) angle in radians
    fn angle(&self, gaze0: Point3D, gaze1: Point3D) -> (f32, f32) {
        gaze_angle(gaze0, gaze1)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EyeballGazeEstimator;

impl GazeEstimator for EyeballGazeEstimator {
    fn estimate(&self, face: &FaceState, _intrinsics: &Intrinsics, left_eye: bool) -> Point3D {
        let Some(eye) = &face.eyes[if left_eye { 0 } else { 1 }] else {
            return Point3D::ZERO;
        };
        if eye.iris_3d.is_empty() {
            return Point3D::ZERO;
        }

        let centre = Point3D::mean(&eye.corners_3d).add(face.rotate(EYEBALL_OFFSET));
        let ray = eye.pupil().normalized();
        let hit = ray_sphere_intersect(Point3D::ZERO, ray, centre, EYEBALL_RADIUS);
        hit.sub(centre).normalized()
    }
}

/// Nearest intersection of a ray with a sphere. A ray that misses gives its
/// point of closest approach.
pub fn ray_sphere_intersect(origin: Point3D, dir: Point3D, centre: Point3D, radius: f32) -> Point3D {
    let oc = origin.sub(centre);
    let a = dir.dot(dir);
    if a <= f32::EPSILON {
        return origin;
    }
    let b = 2.0 * dir.dot(oc);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    let t = if disc < 0.0 {
        -b / (2.0 * a)
    } else {
        (-b - disc.sqrt()) / (2.0 * a)
    };
    origin.add(dir.scale(t))
}

/// Angles of the mean of two gaze vectors, zero when looking into the camera.
/// Two missing (zero) vectors give a zero angle.
pub fn gaze_angle(gaze0: Point3D, gaze1: Point3D) -> (f32, f32) {
    let m = gaze0.add(gaze1).scale(0.5);
    if m.norm() <= f32::EPSILON {
        return (0.0, 0.0);
    }
    (m.x.atan2(-m.z), m.y.atan2(-m.z))
}

/// Gaze for one frame. All zero unless detection succeeded and the tracker
/// can see eyes.
pub fn derive_gaze<G: GazeEstimator + ?Sized>(
    estimator: &G,
    success: bool,
    has_eye_model: bool,
    face: &FaceState,
    intrinsics: &Intrinsics,
) -> GazeSample {
    if !(success && has_eye_model) {
        return GazeSample::default();
    }
    let eye0 = estimator.estimate(face, intrinsics, true);
    let eye1 = estimator.estimate(face, intrinsics, false);
    GazeSample {
        eye0,
        eye1,
        angle: estimator.angle(eye0, eye1),
    }
}
