pub mod args;
pub mod budget;
#[cfg(feature = "camera")]
pub mod camera;
pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod font;
pub mod fps;
pub mod gaze;
pub mod logging;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod runtime;
pub mod telemetry;
pub mod tracker;
pub mod types;
#[cfg(feature = "video")]
pub mod video;

pub use error::{GazeError, GazeResult};
pub use pipeline::{Pipeline, Termination};
