use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::warn;

use crate::config::PreviewConfig;
use crate::error::GazeError;
use crate::overlay::{annotate, Annotation, Canvas};
use crate::types::{FaceState, Frame, GazeSample};

/// What the user asked for with the last keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    None,
    Quit,
    Reset,
}

/// Map the first key pressed this frame
pub fn key_command(keys: &[Key]) -> KeyCommand {
    match keys.first() {
        Some(Key::Q) | Some(Key::Escape) => KeyCommand::Quit,
        Some(Key::R) => KeyCommand::Reset,
        _ => KeyCommand::None,
    }
}

/// One processed frame as handed to the live view
pub struct FrameView<'a> {
    pub frame: &'a Frame,
    pub face: &'a FaceState,
    pub detected: bool,
    pub gaze: &'a GazeSample,
    pub fps: f64,
}

/// Renders a frame and reports the keystroke that came in meanwhile
pub trait LiveView {
    fn show(&mut self, view: &FrameView<'_>) -> Result<KeyCommand>;
}

/// Compose the annotated RGB image for a frame
pub fn compose(view: &FrameView<'_>, style: &PreviewConfig) -> image::RgbImage {
    let mut canvas = Canvas::new(view.frame.image.clone());
    let note = Annotation {
        face: view.detected.then_some(view.face),
        gaze: view.gaze,
        intrinsics: &view.frame.intrinsics,
        fps: view.fps,
    };
    annotate(&mut canvas, &note, style);
    canvas.image
}

/// `minifb` window, opened on the first frame
pub struct PreviewWindow {
    window: Option<Window>,
    buffer: Vec<u32>,
    style: PreviewConfig,
    disabled: bool,
}

impl PreviewWindow {
    pub fn new(style: PreviewConfig) -> Self {
        Self {
            window: None,
            buffer: Vec::new(),
            style,
            disabled: false,
        }
    }

    fn window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(
                &self.style.window_title,
                width,
                height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| GazeError::preview(format!("Failed to create window: {e}")))?;

            window.limit_update_rate(Some(std::time::Duration::from_micros(16600))); // ~60 FPS
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("window missing"))
    }
}

impl LiveView for PreviewWindow {
    fn show(&mut self, view: &FrameView<'_>) -> Result<KeyCommand> {
        if self.disabled {
            return Ok(KeyCommand::None);
        }

        let image = compose(view, &self.style);
        let (width, height) = (image.width() as usize, image.height() as usize);

        // RGB8 to 0RGB u32
        self.buffer.clear();
        self.buffer.extend(
            image
                .pixels()
                .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
        );

        if let Err(e) = self.window(width, height) {
            warn!("{:#}; continuing without preview", e);
            self.disabled = true;
            return Ok(KeyCommand::None);
        }
        let buffer = std::mem::take(&mut self.buffer);
        let Some(window) = self.window.as_mut() else {
            return Ok(KeyCommand::None);
        };
        let shown = window
            .update_with_buffer(&buffer, width, height)
            .map_err(|e| GazeError::preview(format!("Window update failed: {e}")));

        let command = if window.is_open() {
            key_command(&window.get_keys_pressed(KeyRepeat::No))
        } else {
            KeyCommand::Quit
        };
        self.buffer = buffer;

        shown?;
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intrinsics;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_quit_and_reset_keys() {
        assert_eq!(key_command(&[Key::Q]), KeyCommand::Quit);
        assert_eq!(key_command(&[Key::Escape]), KeyCommand::Quit);
        assert_eq!(key_command(&[Key::R]), KeyCommand::Reset);
        assert_eq!(key_command(&[Key::Space]), KeyCommand::None);
        assert_eq!(key_command(&[]), KeyCommand::None);
    }

    #[test]
    fn test_compose_skips_landmarks_without_detection() {
        let frame = Frame::new(1, 0.0, RgbImage::new(100, 100), Intrinsics::guess(100, 100));
        let face = FaceState {
            landmarks: vec![crate::types::Point2D::new(80.0, 90.0)],
            visibilities: vec![true],
            ..FaceState::default()
        };
        let gaze = GazeSample::default();
        let style = PreviewConfig::default();
        let mut view = FrameView { frame: &frame, face: &face, detected: false, gaze: &gaze, fps: 0.0 };

        let img = compose(&view, &style);
        assert_eq!(*img.get_pixel(80, 90), Rgb([0, 0, 0]));

        view.detected = true;
        let img = compose(&view, &style);
        assert_ne!(*img.get_pixel(80, 90), Rgb([0, 0, 0]));
    }
}
