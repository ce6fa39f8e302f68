use image::{GrayImage, RgbImage};

/// A point in image coordinates (pixels)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point or direction in camera space (millimetres, z away from the camera)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub const ZERO: Point3D = Point3D { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, o: Point3D) -> Point3D {
        Point3D::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    pub fn sub(self, o: Point3D) -> Point3D {
        Point3D::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    pub fn scale(self, s: f32) -> Point3D {
        Point3D::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, o: Point3D) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Point3D) -> Point3D {
        Point3D::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector, or zero when the length is zero
    pub fn normalized(self) -> Point3D {
        let n = self.norm();
        if n > f32::EPSILON {
            self.scale(1.0 / n)
        } else {
            Point3D::ZERO
        }
    }

    pub fn mean(points: &[Point3D]) -> Point3D {
        if points.is_empty() {
            return Point3D::ZERO;
        }
        let sum = points.iter().fold(Point3D::ZERO, |acc, p| acc.add(*p));
        sum.scale(1.0 / points.len() as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing every point
    pub fn bounding(points: &[Point2D]) -> Option<Rect> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Grow by `factor` of the size on each axis, keeping the centre
    pub fn padded(&self, factor: f32) -> Rect {
        let pad_w = self.width * factor;
        let pad_h = self.height * factor;
        Rect::new(
            self.x - pad_w / 2.0,
            self.y - pad_h / 2.0,
            self.width + pad_w,
            self.height + pad_h,
        )
    }

    /// Clip to an image of the given size; `None` when nothing is left
    pub fn clipped(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = (self.x + self.width).min(width as f32);
        let y1 = (self.y + self.height).min(height as f32);
        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Pinhole camera intrinsics of a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// Rough guess used when the user gives none: 500px focal length at 640px width.
    pub fn guess(width: u32, height: u32) -> Self {
        let f = 500.0 * (width as f32 / 640.0);
        Self {
            fx: f,
            fy: f,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
        }
    }

    pub fn project(&self, p: Point3D) -> Option<Point2D> {
        if p.z <= f32::EPSILON {
            return None;
        }
        Some(Point2D::new(
            p.x * self.fx / p.z + self.cx,
            p.y * self.fy / p.z + self.cy,
        ))
    }

    pub fn unproject(&self, p: Point2D, depth: f32) -> Point3D {
        Point3D::new(
            (p.x - self.cx) * depth / self.fx,
            (p.y - self.cy) * depth / self.fy,
            depth,
        )
    }
}

/// One frame as handed out by a sequence
#[derive(Debug, Clone)]
pub struct Frame {
    pub number: u64,
    pub timestamp: f64,
    pub image: RgbImage,
    pub gray: GrayImage,
    pub intrinsics: Intrinsics,
}

impl Frame {
    pub fn new(number: u64, timestamp: f64, image: RgbImage, intrinsics: Intrinsics) -> Self {
        let gray = image::imageops::grayscale(&image);
        Self {
            number,
            timestamp,
            image,
            gray,
            intrinsics,
        }
    }
}

/// Landmarks of one eye
#[derive(Debug, Clone, Default)]
pub struct EyeLandmarks {
    /// Eye contour and iris points in the image
    pub points: Vec<Point2D>,
    /// Iris points in camera space
    pub iris_3d: Vec<Point3D>,
    /// Outer and inner eye corners in camera space
    pub corners_3d: [Point3D; 2],
}

impl EyeLandmarks {
    pub fn pupil(&self) -> Point3D {
        Point3D::mean(&self.iris_3d)
    }
}

/// Tracker state after the latest detection
#[derive(Debug, Clone)]
pub struct FaceState {
    pub landmarks: Vec<Point2D>,
    pub visibilities: Vec<bool>,
    pub certainty: f32,
    /// Landmarks lifted to camera space
    pub shape_3d: Vec<Point3D>,
    /// Head rotation, row-major
    pub rotation: [[f32; 3]; 3],
    /// Index 0 is the eye on the image's left side
    pub eyes: [Option<EyeLandmarks>; 2],
}

impl Default for FaceState {
    fn default() -> Self {
        Self {
            landmarks: Vec::new(),
            visibilities: Vec::new(),
            certainty: 0.0,
            shape_3d: Vec::new(),
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            eyes: [None, None],
        }
    }
}

impl FaceState {
    pub fn rotate(&self, v: Point3D) -> Point3D {
        let r = &self.rotation;
        Point3D::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }
}

/// Gaze vectors of both eyes plus the combined angle (radians)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GazeSample {
    pub eye0: Point3D,
    pub eye1: Point3D,
    pub angle: (f32, f32),
}

impl GazeSample {
    pub fn is_zero(&self) -> bool {
        *self == GazeSample::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_roundtrips_unproject() {
        let k = Intrinsics::guess(640, 480);
        let p = k.unproject(Point2D::new(100.0, 50.0), 600.0);
        let back = k.project(p).unwrap();
        assert!((back.x - 100.0).abs() < 1e-3);
        assert!((back.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_guess_scales_with_width() {
        let k = Intrinsics::guess(1280, 720);
        assert_eq!(k.fx, 1000.0);
        assert_eq!(k.cx, 640.0);
        assert_eq!(k.cy, 360.0);
    }

    #[test]
    fn test_rect_clip_drops_empty() {
        let r = Rect::new(-50.0, -50.0, 40.0, 40.0);
        assert!(r.clipped(100, 100).is_none());
        let r = Rect::new(-10.0, 90.0, 40.0, 40.0).clipped(100, 100).unwrap();
        assert_eq!(r, Rect::new(0.0, 90.0, 30.0, 10.0));
    }

    #[test]
    fn test_default_gaze_is_zero() {
        assert!(GazeSample::default().is_zero());
    }
}
