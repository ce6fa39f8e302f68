//! Persistent face tracking.
//!
//! [`MeshTracker`] keeps the previous frame's face region and meshes it
//! again on the next frame, falling back to the box detector when the mesh
//! loses the face. The state lives until [`FaceTracker::reset`].

use anyhow::Result;
use clap::Parser;
use image::{imageops::FilterType, RgbImage};
use ort::session::Session;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::args::extract_flags;
use crate::config::TrackerConfig;
use crate::detector::{load_session, FaceDetector};
use crate::error::{GazeError, GazeResult};
use crate::runtime::ComputeThreads;
use crate::types::{EyeLandmarks, FaceState, Frame, Intrinsics, Point2D, Point3D, Rect};

/// Stateful face landmark tracker
pub trait FaceTracker {
    /// Track the face in `frame`. `false` is a per-frame failure; the
    /// state is then left without a face.
    fn detect(&mut self, frame: &Frame) -> bool;

    /// Forget everything learned from earlier frames
    fn reset(&mut self);

    /// Whether the loaded model can locate pupils
    fn has_eye_model(&self) -> bool;

    fn state(&self) -> &FaceState;
}

pub const DETECTOR_FILE: &str = "face_detection.onnx";
pub const MESH_FILE: &str = "face_mesh.onnx";
pub const IRIS_FILE: &str = "iris_landmark.onnx";

#[derive(Parser, Debug)]
#[command(disable_help_flag = true, disable_version_flag = true, args_override_self = true)]
struct ModelArgs {
    #[arg(long, default_value = "models")]
    mloc: PathBuf,
}

/// Model files resolved from `-mloc`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub mesh: PathBuf,
    pub iris: Option<PathBuf>,
}

impl ModelPaths {
    /// `-mloc` from the residual arguments, `models` when absent
    pub fn location_from_tokens(tokens: &[String]) -> PathBuf {
        let flags = extract_flags(tokens, &["mloc"]);
        ModelArgs::try_parse_from(&flags)
            .map(|a| a.mloc)
            .unwrap_or_else(|_| PathBuf::from("models"))
    }

    /// `location` is either the model directory or the mesh model inside it
    pub fn locate(location: &Path) -> GazeResult<Self> {
        let (dir, mesh) = if location.is_file() {
            let dir = location.parent().map(Path::to_path_buf).unwrap_or_default();
            (dir, location.to_path_buf())
        } else {
            (location.to_path_buf(), location.join(MESH_FILE))
        };

        let detector = dir.join(DETECTOR_FILE);
        for required in [&mesh, &detector] {
            if !required.is_file() {
                return Err(GazeError::ModelNotFound {
                    path: required.clone(),
                });
            }
        }

        let iris = Some(dir.join(IRIS_FILE)).filter(|p| p.is_file());
        Ok(Self {
            detector,
            mesh,
            iris,
        })
    }
}

// Face mesh indices. Eye 0 is the one on the image's left.
const EYE_CORNERS: [(usize, usize); 2] = [(33, 133), (263, 362)];
const FOREHEAD: usize = 10;
const CHIN: usize = 152;
const MESH_POINTS: usize = 468;
const MESH_INPUT: u32 = 192;
const IRIS_INPUT: u32 = 64;
/// Typical distance between the outer eye corners
const OUTER_CANTHI_MM: f32 = 90.0;

pub struct MeshTracker {
    detector: FaceDetector,
    mesh: Session,
    iris: Option<Session>,
    config: TrackerConfig,
    roi: Option<Rect>,
    state: FaceState,
}

impl MeshTracker {
    pub fn load(paths: &ModelPaths, config: &TrackerConfig, threads: ComputeThreads) -> GazeResult<Self> {
        let wrap = |path: &Path| {
            let path = path.to_path_buf();
            move |e: anyhow::Error| GazeError::ModelLoad {
                path,
                message: format!("{e:#}"),
            }
        };

        info!("Loading face detector from {}", paths.detector.display());
        let detector = FaceDetector::new(&paths.detector, config.detection_threshold, threads)
            .map_err(wrap(&paths.detector))?;

        info!("Loading face mesh from {}", paths.mesh.display());
        let mesh = load_session(&paths.mesh, threads).map_err(wrap(&paths.mesh))?;

        let iris = match &paths.iris {
            Some(path) => {
                info!("Loading iris model from {}", path.display());
                Some(load_session(path, threads).map_err(wrap(path))?)
            }
            None => None,
        };

        Ok(Self {
            detector,
            mesh,
            iris,
            config: config.clone(),
            roi: None,
            state: FaceState::default(),
        })
    }

    fn track(&mut self, frame: &Frame) -> Result<bool> {
        if let Some(roi) = self.roi {
            if self.fit(frame, roi)? {
                return Ok(true);
            }
            debug!("Lost track in frame {}, re-detecting", frame.number);
            self.roi = None;
        }

        match self.detector.detect(&frame.image)? {
            Some(face) => self.fit(frame, face),
            None => Ok(false),
        }
    }

    /// Mesh the face inside `region` and update the state on success
    fn fit(&mut self, frame: &Frame, region: Rect) -> Result<bool> {
        let (width, height) = frame.image.dimensions();
        let Some(crop) = region.padded(self.config.roi_padding).clipped(width, height) else {
            return Ok(false);
        };

        let patch = crop_resized(&frame.image, crop, MESH_INPUT, false);
        let (raw, presence) = run_mesh(&mut self.mesh, &patch)?;
        if raw.len() < MESH_POINTS * 3 || presence < self.config.presence_threshold {
            return Ok(false);
        }

        let scale = crop.width / MESH_INPUT as f32;
        let scale_y = crop.height / MESH_INPUT as f32;
        let mesh_points: Vec<Point3D> = raw
            .chunks_exact(3)
            .take(MESH_POINTS)
            .map(|p| Point3D::new(crop.x + p[0] * scale, crop.y + p[1] * scale_y, p[2] * scale))
            .collect();

        let landmarks: Vec<Point2D> = mesh_points.iter().map(|p| Point2D::new(p.x, p.y)).collect();
        let visibilities = landmarks
            .iter()
            .map(|p| p.x >= 0.0 && p.y >= 0.0 && p.x < width as f32 && p.y < height as f32)
            .collect();

        let lift = Lift::new(&mesh_points, &frame.intrinsics);
        let shape_3d: Vec<Point3D> = mesh_points.iter().map(|p| lift.apply(*p)).collect();
        let rotation = head_rotation(&shape_3d);

        let mut eyes = [None, None];
        if self.iris.is_some() {
            for (eye, slot) in eyes.iter_mut().enumerate() {
                *slot = self.fit_eye(frame, eye, &landmarks, &shape_3d, &lift)?;
            }
        }

        self.roi = Rect::bounding(&landmarks);
        self.state = FaceState {
            landmarks,
            visibilities,
            certainty: presence,
            shape_3d,
            rotation,
            eyes,
        };
        Ok(true)
    }

    fn fit_eye(
        &mut self,
        frame: &Frame,
        eye: usize,
        landmarks: &[Point2D],
        shape_3d: &[Point3D],
        lift: &Lift,
    ) -> Result<Option<EyeLandmarks>> {
        let Some(session) = self.iris.as_mut() else {
            return Ok(None);
        };
        let (outer, inner) = EYE_CORNERS[eye];
        let (a, b) = (landmarks[outer], landmarks[inner]);
        let span = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        let side = span * 2.3;
        let centre = Point2D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        let (width, height) = frame.image.dimensions();
        let Some(crop) = Rect::new(centre.x - side / 2.0, centre.y - side / 2.0, side, side)
            .clipped(width, height)
        else {
            return Ok(None);
        };

        // The iris model expects one eye orientation; mirror the other.
        let mirrored = eye == 1;
        let patch = crop_resized(&frame.image, crop, IRIS_INPUT, mirrored);
        let (contour, iris) = run_iris(session, &patch)?;
        if iris.len() < 15 {
            return Ok(None);
        }

        let to_frame = |p: &[f32]| {
            let x = if mirrored { IRIS_INPUT as f32 - p[0] } else { p[0] };
            Point3D::new(
                crop.x + x * crop.width / IRIS_INPUT as f32,
                crop.y + p[1] * crop.height / IRIS_INPUT as f32,
                p[2] * crop.width / IRIS_INPUT as f32,
            )
        };

        let iris_px: Vec<Point3D> = iris.chunks_exact(3).map(to_frame).collect();
        let mut points: Vec<Point2D> = contour
            .chunks_exact(3)
            .map(to_frame)
            .map(|p| Point2D::new(p.x, p.y))
            .collect();
        points.extend(iris_px.iter().map(|p| Point2D::new(p.x, p.y)));

        let corners_3d = [shape_3d[outer], shape_3d[inner]];
        let eye_depth = (corners_3d[0].z + corners_3d[1].z) / 2.0;
        let iris_3d = iris_px
            .iter()
            .map(|p| {
                frame
                    .intrinsics
                    .unproject(Point2D::new(p.x, p.y), eye_depth + p.z * lift.mm_per_px)
            })
            .collect();

        Ok(Some(EyeLandmarks {
            points,
            iris_3d,
            corners_3d,
        }))
    }
}

impl FaceTracker for MeshTracker {
    fn detect(&mut self, frame: &Frame) -> bool {
        let found = match self.track(frame) {
            Ok(found) => found,
            Err(e) => {
                warn!("Tracking failed on frame {}: {:#}", frame.number, e);
                false
            }
        };
        if !found {
            self.roi = None;
            self.state = FaceState::default();
        }
        found
    }

    fn reset(&mut self) {
        debug!("Tracker reset");
        self.roi = None;
        self.state = FaceState::default();
    }

    fn has_eye_model(&self) -> bool {
        self.iris.is_some()
    }

    fn state(&self) -> &FaceState {
        &self.state
    }
}

/// Weak-perspective lift of image landmarks into millimetres
struct Lift {
    depth: f32,
    mm_per_px: f32,
    intrinsics: Intrinsics,
}

impl Lift {
    fn new(points: &[Point3D], intrinsics: &Intrinsics) -> Self {
        let (a, b) = (points[EYE_CORNERS[0].0], points[EYE_CORNERS[1].0]);
        let span = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt().max(1.0);
        let depth = intrinsics.fx * OUTER_CANTHI_MM / span;
        Self {
            depth,
            mm_per_px: depth / intrinsics.fx,
            intrinsics: *intrinsics,
        }
    }

    fn apply(&self, p: Point3D) -> Point3D {
        self.intrinsics
            .unproject(Point2D::new(p.x, p.y), self.depth + p.z * self.mm_per_px)
    }
}

/// Rotation whose columns are the face's right, down and forward axes
fn head_rotation(shape: &[Point3D]) -> [[f32; 3]; 3] {
    let x = shape[EYE_CORNERS[1].0].sub(shape[EYE_CORNERS[0].0]).normalized();
    let down = shape[CHIN].sub(shape[FOREHEAD]);
    let z = x.cross(down).normalized();
    let y = z.cross(x);
    [[x.x, y.x, z.x], [x.y, y.y, z.y], [x.z, y.z, z.z]]
}

fn crop_resized(image: &RgbImage, crop: Rect, size: u32, mirrored: bool) -> RgbImage {
    let patch = image::imageops::crop_imm(
        image,
        crop.x as u32,
        crop.y as u32,
        (crop.width as u32).max(1),
        (crop.height as u32).max(1),
    )
    .to_image();
    let resized = image::imageops::resize(&patch, size, size, FilterType::Triangle);
    if mirrored {
        image::imageops::flip_horizontal(&resized)
    } else {
        resized
    }
}

/// NHWC tensor scaled to [-1, 1]
fn to_tensor(patch: &RgbImage) -> Result<ort::value::Tensor<f32>> {
    let (w, h) = patch.dimensions();
    let data: Vec<f32> = patch
        .pixels()
        .flat_map(|p| p.0.map(|c| c as f32 / 127.5 - 1.0))
        .collect();
    Ok(ort::value::Tensor::from_array((vec![1, h as usize, w as usize, 3], data))?)
}

/// Mesh coordinates plus the face presence score
fn run_mesh(session: &mut Session, patch: &RgbImage) -> Result<(Vec<f32>, f32)> {
    let input = to_tensor(patch)?;
    let outputs = session.run(ort::inputs![input])?;
    let (_shape, points) = outputs[0].try_extract_tensor::<f32>()?;
    let points = points.to_vec();
    let presence = if outputs.len() > 1 {
        let (_shape, flag) = outputs[1].try_extract_tensor::<f32>()?;
        flag.first().map(|logit| sigmoid(*logit)).unwrap_or(0.0)
    } else {
        1.0
    };
    Ok((points, presence))
}

/// Eye contour and iris points, both flat xyz
fn run_iris(session: &mut Session, patch: &RgbImage) -> Result<(Vec<f32>, Vec<f32>)> {
    let input = to_tensor(patch)?;
    let outputs = session.run(ort::inputs![input])?;
    let (_shape, contour) = outputs[0].try_extract_tensor::<f32>()?;
    let contour = contour.to_vec();
    let iris = if outputs.len() > 1 {
        let (_shape, iris) = outputs[1].try_extract_tensor::<f32>()?;
        iris.to_vec()
    } else {
        Vec::new()
    };
    Ok((contour, iris))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontal_face_has_identity_rotation() {
        let mut shape = vec![Point3D::new(0.0, 0.0, 600.0); MESH_POINTS];
        shape[EYE_CORNERS[0].0] = Point3D::new(-45.0, 0.0, 600.0);
        shape[EYE_CORNERS[1].0] = Point3D::new(45.0, 0.0, 600.0);
        shape[FOREHEAD] = Point3D::new(0.0, -60.0, 600.0);
        shape[CHIN] = Point3D::new(0.0, 80.0, 600.0);

        let r = head_rotation(&shape);
        for (i, row) in r.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-5, "r[{i}][{j}] = {v}");
            }
        }
    }

    #[test]
    fn test_lift_puts_eye_corners_at_typical_distance() {
        let k = Intrinsics::guess(640, 480);
        let mut points = vec![Point3D::new(320.0, 240.0, 0.0); MESH_POINTS];
        points[EYE_CORNERS[0].0] = Point3D::new(270.0, 240.0, 0.0);
        points[EYE_CORNERS[1].0] = Point3D::new(370.0, 240.0, 0.0);

        let lift = Lift::new(&points, &k);
        assert!((lift.depth - 450.0).abs() < 1e-3);
        let a = lift.apply(points[EYE_CORNERS[0].0]);
        let b = lift.apply(points[EYE_CORNERS[1].0]);
        assert!((b.sub(a).norm() - OUTER_CANTHI_MM).abs() < 1e-3);
    }

    #[test]
    fn test_locate_requires_detector_and_mesh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MESH_FILE), b"").unwrap();
        let err = ModelPaths::locate(dir.path()).unwrap_err();
        assert!(matches!(err, GazeError::ModelNotFound { ref path } if path.ends_with(DETECTOR_FILE)));

        std::fs::write(dir.path().join(DETECTOR_FILE), b"").unwrap();
        let paths = ModelPaths::locate(dir.path()).unwrap();
        assert_eq!(paths.iris, None);

        std::fs::write(dir.path().join(IRIS_FILE), b"").unwrap();
        let paths = ModelPaths::locate(&dir.path().join(MESH_FILE)).unwrap();
        assert_eq!(paths.iris, Some(dir.path().join(IRIS_FILE)));
    }

    #[test]
    fn test_mloc_defaults_to_models() {
        let tokens: Vec<String> = vec!["-f".into(), "x.png".into()];
        assert_eq!(ModelPaths::location_from_tokens(&tokens), PathBuf::from("models"));
        let tokens: Vec<String> = vec!["-mloc".into(), "/opt/gaze".into()];
        assert_eq!(ModelPaths::location_from_tokens(&tokens), PathBuf::from("/opt/gaze"));
    }

    #[test]
    fn test_last_mloc_wins() {
        let tokens: Vec<String> = ["-mloc", "/a", "-f", "x.png", "-mloc", "/b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ModelPaths::location_from_tokens(&tokens), PathBuf::from("/b"));
    }
}
