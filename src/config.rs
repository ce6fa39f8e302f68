use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GazeError, GazeResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub tracker: TrackerConfig,
    pub capture: CaptureConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum UltraFace score for a face box
    pub detection_threshold: f32,
    /// Minimum face-mesh presence score to keep tracking
    pub presence_threshold: f32,
    /// Fraction of the face box added around it before meshing
    pub roi_padding: f32,
    /// Intra-op threads for the inference sessions; unset keeps the runtime default
    pub intra_threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame rate assumed for image sequences when `-fps` is not given
    pub image_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub window_title: String,
    pub landmark_color_hex: String,
    pub hidden_landmark_color_hex: String,
    pub gaze_color_hex: String,
    pub text_color_hex: String,
    pub dot_size: usize,
    pub text_scale: usize,
    /// Length of the drawn gaze rays in millimetres
    pub gaze_ray_length: f32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.7,
            presence_threshold: 0.5,
            roi_padding: 0.25,
            intra_threads: None,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { image_fps: 30.0 }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            window_title: "Rusty Gaze".to_string(),
            landmark_color_hex: "#00FF00".to_string(),
            hidden_landmark_color_hex: "#FF0000".to_string(),
            gaze_color_hex: "#00FFFF".to_string(),
            text_color_hex: "#00FF00".to_string(),
            dot_size: 2,
            text_scale: 3,
            gaze_ray_length: 50.0,
        }
    }
}

impl AppConfig {
    pub const ENV_PATH: &'static str = "RUSTY_GAZE_CONFIG";
    const DEFAULT_PATH: &'static str = "rusty_gaze.json";

    /// Where the configuration is looked up
    pub fn path() -> PathBuf {
        std::env::var_os(Self::ENV_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_PATH))
    }

    /// Load from `path`; a missing file gives the defaults.
    pub fn load_from(path: &Path) -> GazeResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| GazeError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }
}

/// `#RRGGBB` to an RGB triple; anything else is red
pub fn parse_hex(hex: &str) -> (u8, u8, u8) {
    if hex.len() == 7 && hex.starts_with('#') {
        let r = u8::from_str_radix(&hex[1..3], 16).unwrap_or(255);
        let g = u8::from_str_radix(&hex[3..5], 16).unwrap_or(0);
        let b = u8::from_str_radix(&hex[5..7], 16).unwrap_or(0);
        (r, g, b)
    } else {
        (255, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#FF0000"), (255, 0, 0));
        assert_eq!(parse_hex("#00FF00"), (0, 255, 0));
        assert_eq!(parse_hex("#0000FF"), (0, 0, 255));
        assert_eq!(parse_hex("#FFFFFF"), (255, 255, 255));
        assert_eq!(parse_hex("invalid"), (255, 0, 0));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{ "tracker": { "presence_threshold": 0.8 } }"#).unwrap();
        assert_eq!(cfg.tracker.presence_threshold, 0.8);
        assert_eq!(cfg.tracker.detection_threshold, 0.7);
        assert_eq!(cfg.capture.image_fps, 30.0);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = AppConfig::load_from(Path::new("/nonexistent/rusty_gaze.json")).unwrap();
        assert_eq!(cfg.preview.window_title, "Rusty Gaze");
        assert!(cfg.tracker.intra_threads.is_none());
    }

    #[test]
    fn test_broken_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, "{ not json").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, GazeError::Config { .. }));
    }
}
