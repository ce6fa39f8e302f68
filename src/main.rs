use std::process::ExitCode;

use tracing::{error, info, warn};

use rusty_gaze::args::{usage, AppOptions};
use rusty_gaze::capture::SequenceCapture;
use rusty_gaze::config::AppConfig;
use rusty_gaze::gaze::EyeballGazeEstimator;
use rusty_gaze::logging::init_logging;
use rusty_gaze::output::PreviewWindow;
use rusty_gaze::runtime::ComputeThreads;
use rusty_gaze::telemetry::TelemetryEmitter;
use rusty_gaze::tracker::{FaceTracker, MeshTracker, ModelPaths};
use rusty_gaze::Pipeline;

fn main() -> ExitCode {
    let mut arguments: Vec<String> = std::env::args().collect();
    let exe = arguments.first().cloned().unwrap_or_else(|| "rusty-gaze".to_string());

    if arguments.len() == 1 {
        print!("{}", usage(&exe));
        return ExitCode::SUCCESS;
    }

    let options = AppOptions::consume(&mut arguments);
    let residual = arguments.split_off(1);

    // Logging is not up yet, so a broken config is reported right after.
    let config_path = AppConfig::path();
    let (config, config_error) = match AppConfig::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&config.logging);
    if let Some(e) = config_error {
        warn!("{}; using default configuration", e);
    }

    let threads = ComputeThreads::resolve(&config.tracker);
    info!("Compute threads: {:?}", threads);

    let location = ModelPaths::location_from_tokens(&residual);
    let tracker = match ModelPaths::locate(&location).and_then(|paths| {
        info!("Loading models from {}", location.display());
        MeshTracker::load(&paths, &config.tracker, threads)
    }) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!("Could not load the face tracking model: {}", e);
            error!("Tip: pass -mloc with the directory holding face_detection.onnx and face_mesh.onnx");
            return ExitCode::FAILURE;
        }
    };

    if !tracker.has_eye_model() {
        warn!("The loaded model has no eye tracking; gaze will be zero for this run");
        warn!("Tip: place iris_landmark.onnx next to face_mesh.onnx to enable gaze");
    }

    let mut capture = SequenceCapture::new(residual, &config.capture);

    let telemetry = match TelemetryEmitter::new(std::io::stdout().lock()) {
        Ok(telemetry) => telemetry,
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return ExitCode::SUCCESS,
        Err(e) => {
            error!("Could not write telemetry header: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut pipeline = Pipeline::new(tracker, EyeballGazeEstimator, telemetry, &options);
    if options.show {
        pipeline = pipeline.with_view(Box::new(PreviewWindow::new(config.preview.clone())));
    }

    match pipeline.run(&mut capture) {
        Ok(termination) => {
            info!(
                "Finished after {} frames ({:?})",
                pipeline.frames_processed(),
                termination
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
