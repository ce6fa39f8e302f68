//! Video files decoded through a GStreamer `appsink`.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use image::RgbImage;
use std::path::Path;
use tracing::{debug, warn};

use crate::capture::{IntrinsicsOverride, SequenceSource};
use crate::error::{GazeError, GazeResult};
use crate::types::{Frame, Intrinsics};

pub struct VideoSequence {
    name: String,
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    intrinsics: IntrinsicsOverride,
    resolved: Option<Intrinsics>,
    frame_number: u64,
}

impl VideoSequence {
    pub fn open(path: &Path, intrinsics: IntrinsicsOverride) -> GazeResult<Self> {
        if !path.is_file() {
            return Err(GazeError::capture(format!("{} does not exist", path.display())));
        }
        gst::init().map_err(|e| GazeError::capture(format!("GStreamer init failed: {e}")))?;

        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false",
            path.display()
        );
        let pipeline = gst::parse::launch(&description)
            .map_err(|e| GazeError::capture(format!("Failed to build decoder: {e}")))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| GazeError::capture("decoder is not a pipeline"))?;

        let sink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| GazeError::capture("decoder has no appsink"))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| GazeError::capture(format!("Failed to start decoding: {e}")))?;

        Ok(Self {
            name: path.display().to_string(),
            pipeline,
            sink,
            intrinsics,
            resolved: None,
            frame_number: 0,
        })
    }

    fn pull(&mut self) -> anyhow::Result<Option<(RgbImage, f64)>> {
        let sample = match self.sink.pull_sample() {
            Ok(sample) => sample,
            Err(_) => {
                debug!("End of stream in {}", self.name);
                return Ok(None);
            }
        };

        let caps = sample.caps().ok_or_else(|| anyhow::anyhow!("sample without caps"))?;
        let s = caps.structure(0).ok_or_else(|| anyhow::anyhow!("empty caps"))?;
        let width = s.get::<i32>("width")? as u32;
        let height = s.get::<i32>("height")? as u32;

        let buffer = sample.buffer().ok_or_else(|| anyhow::anyhow!("sample without buffer"))?;
        let timestamp = buffer
            .pts()
            .map(|t| t.nseconds() as f64 / 1e9)
            .unwrap_or(0.0);
        let map = buffer.map_readable()?;

        // Rows are padded to four bytes.
        let row = width as usize * 3;
        let stride = if height > 0 { map.len() / height as usize } else { row };
        let mut pixels = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            pixels.extend_from_slice(&map[start..start + row]);
        }

        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow::anyhow!("frame buffer too small"))?;
        Ok(Some((image, timestamp)))
    }
}

impl SequenceSource for VideoSequence {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.pull() {
            Ok(Some((image, timestamp))) => {
                let intrinsics = *self
                    .resolved
                    .get_or_insert_with(|| self.intrinsics.resolve(image.width(), image.height()));
                self.frame_number += 1;
                Some(Frame::new(self.frame_number, timestamp, image, intrinsics))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to decode a frame of {}: {:#}", self.name, e);
                None
            }
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop decoder for {}: {}", self.name, e);
        }
    }
}

impl Drop for VideoSequence {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
