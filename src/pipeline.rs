//! The per-frame loop: open a sequence, track, derive gaze, emit a row,
//! optionally show the frame, and stop on quit, frame budget or when no
//! sequences are left.

use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use tracing::{debug, info, info_span, warn};

use crate::args::AppOptions;
use crate::budget::FrameBudget;
use crate::capture::SequenceOpener;
use crate::fps::FpsTracker;
use crate::gaze::{derive_gaze, GazeEstimator};
use crate::output::{FrameView, KeyCommand, LiveView};
use crate::telemetry::TelemetryEmitter;
use crate::tracker::FaceTracker;
use crate::types::Frame;

/// Why the loop stopped. Every variant is a normal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    SequencesExhausted,
    UserQuit,
    FrameBudget,
    /// Whoever reads the telemetry went away
    OutputClosed,
}

pub struct Pipeline<T: FaceTracker, G: GazeEstimator, W: Write> {
    tracker: T,
    estimator: G,
    telemetry: TelemetryEmitter<W>,
    view: Option<Box<dyn LiveView>>,
    budget: FrameBudget,
    fps: FpsTracker,
}

impl<T: FaceTracker, G: GazeEstimator, W: Write> Pipeline<T, G, W> {
    pub fn new(tracker: T, estimator: G, telemetry: TelemetryEmitter<W>, options: &AppOptions) -> Self {
        Self {
            tracker,
            estimator,
            telemetry,
            view: None,
            budget: FrameBudget::new(options.frame_limit()),
            fps: FpsTracker::default(),
        }
    }

    /// Show every processed frame in `view`
    pub fn with_view(mut self, view: Box<dyn LiveView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn telemetry(&self) -> &TelemetryEmitter<W> {
        &self.telemetry
    }

    pub fn frames_processed(&self) -> u64 {
        self.budget.processed()
    }

    pub fn into_telemetry(self) -> TelemetryEmitter<W> {
        self.telemetry
    }

    pub fn run(&mut self, opener: &mut dyn SequenceOpener) -> Result<Termination> {
        loop {
            let Some(mut sequence) = opener.open() else {
                info!("No more sequences to open");
                return Ok(Termination::SequencesExhausted);
            };

            let name = sequence.name();
            let _span = info_span!("sequence", name = %name).entered();
            let mut frames = 0u64;

            while let Some(frame) = sequence.next_frame() {
                frames += 1;
                let stop = match self.process_frame(&frame) {
                    Ok(stop) => stop,
                    Err(e) => {
                        sequence.close();
                        return Err(e);
                    }
                };
                if let Some(stop) = stop {
                    info!("Stopping after frame {}: {:?}", frame.number, stop);
                    sequence.close();
                    return Ok(stop);
                }
            }

            info!("Sequence exhausted after {} frames", frames);
            self.tracker.reset();
            sequence.close();
        }
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<Option<Termination>> {
        let detected = self.tracker.detect(frame);
        let gaze = derive_gaze(
            &self.estimator,
            detected,
            self.tracker.has_eye_model(),
            self.tracker.state(),
            &frame.intrinsics,
        );
        debug!(frame = frame.number, detected, "processed");

        match self.telemetry.emit(frame.number, frame.timestamp, &gaze) {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(Some(Termination::OutputClosed)),
            other => other.context("Failed to write telemetry")?,
        }

        if let Some(view) = self.view.as_mut() {
            self.fps.add_frame();
            let shown = view.show(&FrameView {
                frame,
                face: self.tracker.state(),
                detected,
                gaze: &gaze,
                fps: self.fps.fps(),
            });
            let command = shown.unwrap_or_else(|e| {
                warn!("Preview failed: {:#}", e);
                KeyCommand::None
            });

            match command {
                KeyCommand::Quit => return Ok(Some(Termination::UserQuit)),
                KeyCommand::Reset => {
                    info!("Tracker reset requested");
                    self.tracker.reset();
                }
                KeyCommand::None => {}
            }
        }

        if self.budget.record_frame() {
            return Ok(Some(Termination::FrameBudget));
        }
        Ok(None)
    }
}
