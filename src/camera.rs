use anyhow::anyhow;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::capture::{IntrinsicsOverride, SequenceSource};
use crate::error::{GazeError, GazeResult};
use crate::types::{Frame, Intrinsics};

/// Live webcam stream; it never runs dry on its own
pub struct CameraSequence {
    camera: Camera,
    index: u32,
    intrinsics: Intrinsics,
    started: Instant,
    frame_number: u64,
}

impl CameraSequence {
    pub fn open(index: u32, intrinsics: IntrinsicsOverride) -> GazeResult<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| GazeError::capture(format!("Failed to create camera instance: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| GazeError::capture(format!("Failed to open camera stream: {e}")))?;

        info!(
            "Opened camera {} ({})",
            camera.info().human_name(),
            camera.camera_format()
        );

        let resolution = camera.resolution();
        Ok(Self {
            intrinsics: intrinsics.resolve(resolution.width(), resolution.height()),
            camera,
            index,
            started: Instant::now(),
            frame_number: 0,
        })
    }

    fn capture(&mut self) -> anyhow::Result<image::RgbImage> {
        let frame = self.camera.frame().map_err(|e| anyhow!(e))?;
        let decoded = frame.decode_image::<RgbFormat>().map_err(|e| anyhow!(e))?;
        Ok(decoded)
    }
}

impl SequenceSource for CameraSequence {
    fn name(&self) -> String {
        format!("device {}", self.index)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.capture() {
            Ok(image) => {
                self.frame_number += 1;
                let timestamp = self.started.elapsed().as_secs_f64();
                Some(Frame::new(self.frame_number, timestamp, image, self.intrinsics))
            }
            Err(e) => {
                warn!("Camera {} stopped delivering frames: {:#}", self.index, e);
                None
            }
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera {}: {}", self.index, e);
        }
    }
}
