//! Annotations drawn onto a copy of the frame before it is shown.

use image::{Rgb, RgbImage};

use crate::config::{parse_hex, PreviewConfig};
use crate::font;
use crate::types::{FaceState, GazeSample, Intrinsics, Point2D};

pub struct Canvas {
    pub image: RgbImage,
}

impl Canvas {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    fn put(&mut self, x: i32, y: i32, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Square dot of `size` pixels centred on `p`
    pub fn dot(&mut self, p: Point2D, size: usize, color: Rgb<u8>) {
        let half = (size / 2) as i32;
        let (x0, y0) = (p.x.round() as i32 - half, p.y.round() as i32 - half);
        for dy in 0..size.max(1) as i32 {
            for dx in 0..size.max(1) as i32 {
                self.put(x0 + dx, y0 + dy, color);
            }
        }
    }

    pub fn line(&mut self, from: Point2D, to: Point2D, color: Rgb<u8>) {
        let steps = (to.x - from.x).abs().max((to.y - from.y).abs()).ceil().max(1.0) as i32;
        // Lines far outside the frame are not worth walking.
        if steps > 8192 {
            return;
        }
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            self.put(x.round() as i32, y.round() as i32, color);
        }
    }

    pub fn text(&mut self, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: usize) {
        font::draw_text_line(&mut self.image, x, y, text, color, scale);
    }
}

/// Everything the preview shows about one frame
pub struct Annotation<'a> {
    pub face: Option<&'a FaceState>,
    pub gaze: &'a GazeSample,
    pub intrinsics: &'a Intrinsics,
    pub fps: f64,
}

pub fn gaze_label(gaze: &GazeSample) -> String {
    format!("gaze_angle: ({:.3}, {:.3}) rad", gaze.angle.0, gaze.angle.1)
}

/// Dim `color` with the tracker's certainty; never fully dark
pub fn shade(color: Rgb<u8>, certainty: f32) -> Rgb<u8> {
    let k = certainty.clamp(0.3, 1.0);
    Rgb(color.0.map(|c| (c as f32 * k).round() as u8))
}

/// Draw landmarks, eye landmarks, gaze rays, fps and the gaze angle
pub fn annotate(canvas: &mut Canvas, note: &Annotation<'_>, style: &PreviewConfig) {
    let rgb = |hex: &str| {
        let (r, g, b) = parse_hex(hex);
        Rgb([r, g, b])
    };
    let visible = rgb(&style.landmark_color_hex);
    let hidden = rgb(&style.hidden_landmark_color_hex);
    let ray = rgb(&style.gaze_color_hex);
    let text = rgb(&style.text_color_hex);

    if let Some(face) = note.face {
        let (visible, hidden) = (shade(visible, face.certainty), shade(hidden, face.certainty));
        for (i, p) in face.landmarks.iter().enumerate() {
            let seen = face.visibilities.get(i).copied().unwrap_or(true);
            canvas.dot(*p, style.dot_size, if seen { visible } else { hidden });
        }

        let gazes = [note.gaze.eye0, note.gaze.eye1];
        for (eye, gaze) in face.eyes.iter().zip(gazes) {
            let Some(eye) = eye else { continue };
            for p in &eye.points {
                canvas.dot(*p, 1, ray);
            }
            if gaze.norm() <= f32::EPSILON {
                continue;
            }
            let pupil = eye.pupil();
            let tip = pupil.add(gaze.scale(style.gaze_ray_length));
            if let (Some(a), Some(b)) = (note.intrinsics.project(pupil), note.intrinsics.project(tip)) {
                canvas.line(a, b, ray);
            }
        }
    }

    let scale = style.text_scale.max(1);
    canvas.text(10, 10, &format!("FPS:{:.0}", note.fps), text, scale);
    canvas.text(10, 45, &gaze_label(note.gaze), text, scale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EyeLandmarks, Point3D};

    #[test]
    fn test_line_reaches_both_ends() {
        let mut c = Canvas::new(RgbImage::new(20, 20));
        let red = Rgb([255, 0, 0]);
        c.line(Point2D::new(2.0, 3.0), Point2D::new(15.0, 11.0), red);
        assert_eq!(*c.image.get_pixel(2, 3), red);
        assert_eq!(*c.image.get_pixel(15, 11), red);
    }

    #[test]
    fn test_gaze_ray_starts_at_pupil() {
        let k = Intrinsics::guess(640, 480);
        let pupil = Point3D::new(0.0, 0.0, 500.0);
        let face = FaceState {
            eyes: [
                Some(EyeLandmarks {
                    points: Vec::new(),
                    iris_3d: vec![pupil],
                    corners_3d: [pupil, pupil],
                }),
                None,
            ],
            ..FaceState::default()
        };
        let gaze = GazeSample {
            eye0: Point3D::new(0.6, 0.0, -0.8),
            ..GazeSample::default()
        };
        let style = PreviewConfig::default();
        let mut canvas = Canvas::new(RgbImage::new(640, 480));
        annotate(
            &mut canvas,
            &Annotation { face: Some(&face), gaze: &gaze, intrinsics: &k, fps: 30.0 },
            &style,
        );

        let (r, g, b) = parse_hex(&style.gaze_color_hex);
        assert_eq!(*canvas.image.get_pixel(320, 240), Rgb([r, g, b]));
    }

    #[test]
    fn test_landmarks_dim_with_certainty() {
        let k = Intrinsics::guess(64, 64);
        let style = PreviewConfig::default();
        let gaze = GazeSample::default();
        let draw = |certainty: f32| {
            let face = FaceState {
                landmarks: vec![Point2D::new(30.0, 40.0)],
                visibilities: vec![true],
                certainty,
                ..FaceState::default()
            };
            let mut canvas = Canvas::new(RgbImage::new(64, 64));
            annotate(
                &mut canvas,
                &Annotation { face: Some(&face), gaze: &gaze, intrinsics: &k, fps: 0.0 },
                &style,
            );
            *canvas.image.get_pixel(30, 40)
        };

        let (r, g, b) = parse_hex(&style.landmark_color_hex);
        assert_eq!(draw(1.0), Rgb([r, g, b]));
        let faint = draw(0.5);
        assert!(faint[1] < g && faint[1] > 0, "{:?}", faint);
        assert_eq!(draw(0.0), shade(Rgb([r, g, b]), 0.3));
    }

    #[test]
    fn test_label_format() {
        let g = GazeSample { angle: (0.1, -0.25), ..GazeSample::default() };
        assert_eq!(gaze_label(&g), "gaze_angle: (0.100, -0.250) rad");
    }
}
