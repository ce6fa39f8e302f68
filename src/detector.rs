use anyhow::Result;
use image::{imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

use crate::runtime::ComputeThreads;
use crate::types::Rect;

const INPUT_W: u32 = 320;
const INPUT_H: u32 = 240;

/// Build an inference session for one model file
pub fn load_session(model_path: &Path, threads: ComputeThreads) -> Result<Session> {
    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if let Some(n) = threads.count() {
        builder = builder.with_intra_threads(n)?;
    }
    let session = builder
        .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// UltraFace (RFB-320) face box detector
pub struct FaceDetector {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h
    threshold: f32,
}

impl FaceDetector {
    pub fn new(model_path: &Path, threshold: f32, threads: ComputeThreads) -> Result<Self> {
        let session = load_session(model_path, threads)?;
        Ok(Self {
            session,
            anchors: generate_anchors(INPUT_W as usize, INPUT_H as usize),
            threshold,
        })
    }

    /// Highest scoring face in the frame, in frame pixels
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Option<Rect>> {
        let resized = image::imageops::resize(frame, INPUT_W, INPUT_H, FilterType::Triangle);

        // NCHW, (pixel - 127) / 128
        let plane = (INPUT_W * INPUT_H) as usize;
        let mut input_data = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                input_data[c * plane + i] = (pixel[c] as f32 - 127.0) / 128.0;
            }
        }

        let input_tensor =
            Tensor::from_array((vec![1, 3, INPUT_H as usize, INPUT_W as usize], input_data))?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_scores_shape, scores_data) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = outputs["boxes"].try_extract_tensor::<f32>()?;

        let best = best_box(&self.anchors, scores_data, boxes_data, self.threshold);

        Ok(best.map(|(x, y, w, h)| {
            let sx = frame.width() as f32;
            let sy = frame.height() as f32;
            Rect::new(x * sx, y * sy, w * sx, h * sy)
        }))
    }
}

/// Decode the best anchor above `threshold`; the box is in normalised
/// image coordinates (x, y, w, h).
fn best_box(
    anchors: &[(f32, f32, f32, f32)],
    scores_raw: &[f32],
    boxes_raw: &[f32],
    threshold: f32,
) -> Option<(f32, f32, f32, f32)> {
    let center_variance = 0.1;
    let size_variance = 0.2;

    let count = anchors
        .len()
        .min(scores_raw.len() / 2)
        .min(boxes_raw.len() / 4);

    let mut best_score = threshold;
    let mut best = None;
    for i in 0..count {
        let score = scores_raw[i * 2 + 1];
        if score <= best_score {
            continue;
        }
        let (ax, ay, aw, ah) = anchors[i];
        let cx = boxes_raw[i * 4] * center_variance * aw + ax;
        let cy = boxes_raw[i * 4 + 1] * center_variance * ah + ay;
        let w = (boxes_raw[i * 4 + 2] * size_variance).exp() * aw;
        let h = (boxes_raw[i * 4 + 3] * size_variance).exp() * ah;

        best_score = score;
        best = Some((cx - w / 2.0, cy - h / 2.0, w, h));
    }
    best
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];

    let w = width as f32;
    let h = height as f32;
    let mut anchors = Vec::new();

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let step = shrinkage as f32;
        let feature_h = (h / step).ceil() as usize;
        let feature_w = (w / step).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * step + step / 2.0) / w;
                let cy = (v as f32 * step + step / 2.0) / h;
                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}
