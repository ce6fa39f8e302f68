//! Frame sequences and the argument-driven opener that hands them out.
//!
//! Each `-device`, `-f` or `-fdir` flag designates one sequence. Every call to
//! [`SequenceOpener::open`] consumes the next designating flag, so a command
//! line with three inputs yields three sequences and then `None`.

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::args::extract_flags;
use crate::config::CaptureConfig;
use crate::error::{GazeError, GazeResult};
use crate::types::{Frame, Intrinsics};

/// An open stream of frames
pub trait SequenceSource {
    fn name(&self) -> String;

    /// Next frame, or `None` once the sequence is exhausted. Read errors are
    /// reported here and end the sequence.
    fn next_frame(&mut self) -> Option<Frame>;

    fn close(&mut self) {}
}

/// Opens sequences one after another until none are left
pub trait SequenceOpener {
    fn open(&mut self) -> Option<Box<dyn SequenceSource>>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp", "pgm", "ppm"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Parser, Debug, Default)]
#[command(disable_help_flag = true, disable_version_flag = true, args_override_self = true)]
struct CaptureArgs {
    #[arg(long, allow_hyphen_values = true)]
    fx: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    fy: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    cx: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    cy: Option<f32>,
    #[arg(long)]
    fps: Option<f64>,
}

/// User supplied intrinsics; missing values are guessed from the frame size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntrinsicsOverride {
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    pub cx: Option<f32>,
    pub cy: Option<f32>,
}

impl IntrinsicsOverride {
    pub fn resolve(&self, width: u32, height: u32) -> Intrinsics {
        let guess = Intrinsics::guess(width, height);
        Intrinsics {
            fx: self.fx.unwrap_or(guess.fx),
            fy: self.fy.unwrap_or(guess.fy),
            cx: self.cx.unwrap_or(guess.cx),
            cy: self.cy.unwrap_or(guess.cy),
        }
    }
}

/// Settings shared by every sequence of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub intrinsics: IntrinsicsOverride,
    pub image_fps: f64,
}

impl CaptureSettings {
    pub fn from_tokens(tokens: &[String], config: &CaptureConfig) -> Self {
        let flags = extract_flags(tokens, &["fx", "fy", "cx", "cy", "fps"]);
        let parsed = CaptureArgs::try_parse_from(&flags).unwrap_or_else(|e| {
            warn!("Ignoring malformed capture arguments: {}", e.kind());
            CaptureArgs::default()
        });

        let image_fps = parsed
            .fps
            .filter(|f| *f > 0.0)
            .unwrap_or(config.image_fps);

        Self {
            intrinsics: IntrinsicsOverride {
                fx: parsed.fx,
                fy: parsed.fy,
                cx: parsed.cx,
                cy: parsed.cy,
            },
            image_fps,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceTarget {
    Device(u32),
    File(PathBuf),
    Directory(PathBuf),
}

/// Opener driven by the residual command line
pub struct SequenceCapture {
    args: Vec<String>,
    settings: CaptureSettings,
}

impl SequenceCapture {
    pub fn new(args: Vec<String>, config: &CaptureConfig) -> Self {
        let settings = CaptureSettings::from_tokens(&args, config);
        Self { args, settings }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Remove the next sequence-designating flag and its value
    pub fn take_next_target(&mut self) -> Option<SequenceTarget> {
        let mut i = 0;
        while i + 1 < self.args.len() {
            let flag = self.args[i].clone();
            let target = match flag.as_str() {
                "-device" => match self.args[i + 1].trim().parse::<u32>() {
                    Ok(index) => Some(SequenceTarget::Device(index)),
                    Err(_) => {
                        warn!("Ignoring -device with non-numeric index {:?}", self.args[i + 1]);
                        self.args.drain(i..i + 2);
                        continue;
                    }
                },
                "-f" => Some(SequenceTarget::File(PathBuf::from(&self.args[i + 1]))),
                "-fdir" => Some(SequenceTarget::Directory(PathBuf::from(&self.args[i + 1]))),
                _ => None,
            };

            if let Some(target) = target {
                self.args.drain(i..i + 2);
                return Some(target);
            }
            i += 1;
        }
        None
    }

    fn open_target(&self, target: &SequenceTarget) -> GazeResult<Box<dyn SequenceSource>> {
        let intrinsics = self.settings.intrinsics;
        match target {
            SequenceTarget::Directory(dir) => Ok(Box::new(ImageSequence::from_dir(
                dir,
                intrinsics,
                self.settings.image_fps,
            )?)),
            SequenceTarget::File(path) if is_image_path(path) => Ok(Box::new(
                ImageSequence::from_files(
                    path.display().to_string(),
                    vec![path.clone()],
                    intrinsics,
                    self.settings.image_fps,
                ),
            )),
            SequenceTarget::File(path) => open_video(path, intrinsics),
            SequenceTarget::Device(index) => open_device(*index, intrinsics),
        }
    }
}

impl SequenceOpener for SequenceCapture {
    fn open(&mut self) -> Option<Box<dyn SequenceSource>> {
        let target = self.take_next_target()?;
        match self.open_target(&target) {
            Ok(sequence) => {
                info!("Opened sequence {}", sequence.name());
                Some(sequence)
            }
            Err(e) => {
                error!("Could not open {:?}: {}", target, e);
                None
            }
        }
    }
}

#[cfg(feature = "video")]
fn open_video(path: &Path, intrinsics: IntrinsicsOverride) -> GazeResult<Box<dyn SequenceSource>> {
    Ok(Box::new(crate::video::VideoSequence::open(path, intrinsics)?))
}

#[cfg(not(feature = "video"))]
fn open_video(path: &Path, _intrinsics: IntrinsicsOverride) -> GazeResult<Box<dyn SequenceSource>> {
    Err(GazeError::capture(format!(
        "{} looks like a video, but this build has no video support (enable the `video` feature)",
        path.display()
    )))
}

#[cfg(feature = "camera")]
fn open_device(index: u32, intrinsics: IntrinsicsOverride) -> GazeResult<Box<dyn SequenceSource>> {
    Ok(Box::new(crate::camera::CameraSequence::open(index, intrinsics)?))
}

#[cfg(not(feature = "camera"))]
fn open_device(index: u32, _intrinsics: IntrinsicsOverride) -> GazeResult<Box<dyn SequenceSource>> {
    Err(GazeError::capture(format!(
        "device {} requested, but this build has no camera support (enable the `camera` feature)",
        index
    )))
}

/// Still images read one by one, as a single file or a sorted directory
pub struct ImageSequence {
    name: String,
    files: std::vec::IntoIter<PathBuf>,
    intrinsics: IntrinsicsOverride,
    resolved: Option<Intrinsics>,
    fps: f64,
    frame_number: u64,
}

impl ImageSequence {
    pub fn from_files(
        name: String,
        files: Vec<PathBuf>,
        intrinsics: IntrinsicsOverride,
        fps: f64,
    ) -> Self {
        Self {
            name,
            files: files.into_iter(),
            intrinsics,
            resolved: None,
            fps,
            frame_number: 0,
        }
    }

    pub fn from_dir(dir: &Path, intrinsics: IntrinsicsOverride, fps: f64) -> GazeResult<Self> {
        if !dir.is_dir() {
            return Err(GazeError::capture(format!("{} is not a directory", dir.display())));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_path(p))
            .collect();
        files.sort();

        if files.is_empty() {
            warn!("No images found in {}", dir.display());
        }

        Ok(Self::from_files(dir.display().to_string(), files, intrinsics, fps))
    }
}

impl SequenceSource for ImageSequence {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        for path in self.files.by_ref() {
            let image = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    warn!("Skipping unreadable image {}: {}", path.display(), e);
                    continue;
                }
            };

            let intrinsics = *self
                .resolved
                .get_or_insert_with(|| self.intrinsics.resolve(image.width(), image.height()));
            self.frame_number += 1;
            let timestamp = (self.frame_number - 1) as f64 / self.fps;
            return Some(Frame::new(self.frame_number, timestamp, image, intrinsics));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_targets_are_consumed_in_order() {
        let mut cap = SequenceCapture::new(
            argv(&["-fdir", "a", "-mloc", "m", "-f", "b.png", "-device", "2"]),
            &CaptureConfig::default(),
        );
        assert_eq!(cap.take_next_target(), Some(SequenceTarget::Directory("a".into())));
        assert_eq!(cap.take_next_target(), Some(SequenceTarget::File("b.png".into())));
        assert_eq!(cap.take_next_target(), Some(SequenceTarget::Device(2)));
        assert_eq!(cap.take_next_target(), None);
        assert_eq!(cap.args, argv(&["-mloc", "m"]));
    }

    #[test]
    fn test_bad_device_index_is_skipped() {
        let mut cap = SequenceCapture::new(
            argv(&["-device", "cam", "-fdir", "x"]),
            &CaptureConfig::default(),
        );
        assert_eq!(cap.take_next_target(), Some(SequenceTarget::Directory("x".into())));
    }

    #[test]
    fn test_settings_read_intrinsics_and_fps() {
        let settings = CaptureSettings::from_tokens(
            &argv(&["-f", "v.mp4", "-fx", "600", "-cy", "240.5", "-fps", "25"]),
            &CaptureConfig::default(),
        );
        assert_eq!(settings.intrinsics.fx, Some(600.0));
        assert_eq!(settings.intrinsics.fy, None);
        assert_eq!(settings.intrinsics.cy, Some(240.5));
        assert_eq!(settings.image_fps, 25.0);

        let k = settings.intrinsics.resolve(640, 480);
        assert_eq!(k.fx, 600.0);
        assert_eq!(k.fy, 500.0);
        assert_eq!(k.cx, 320.0);
    }

    #[test]
    fn test_repeated_capture_flags_keep_the_last_value() {
        let settings = CaptureSettings::from_tokens(
            &argv(&["-fx", "600", "-fps", "25", "-fdir", "a", "-fx", "610", "-fps", "12"]),
            &CaptureConfig::default(),
        );
        assert_eq!(settings.intrinsics.fx, Some(610.0));
        assert_eq!(settings.image_fps, 12.0);
    }

    #[test]
    fn test_missing_source_ends_opening() {
        let mut cap = SequenceCapture::new(
            argv(&["-fdir", "/nonexistent/frames"]),
            &CaptureConfig::default(),
        );
        assert!(cap.open().is_none());
        assert!(cap.open().is_none());
    }

    #[test]
    fn test_image_dir_numbers_frames_from_one() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.png"] {
            RgbImage::new(8, 6).save(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        fs::write(dir.path().join("broken.png"), "garbage").unwrap();

        let mut seq = ImageSequence::from_dir(dir.path(), IntrinsicsOverride::default(), 10.0).unwrap();
        let frames: Vec<Frame> = std::iter::from_fn(|| seq.next_frame()).collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames.iter().map(|f| f.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!((frames[2].timestamp - 0.2).abs() < 1e-9);
        assert_eq!(frames[0].intrinsics, Intrinsics::guess(8, 6));
        assert_eq!(frames[0].gray.dimensions(), (8, 6));
    }
}
