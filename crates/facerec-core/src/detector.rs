//! Face location.
//!
//! [`FaceLocator`] is the seam the run loop depends on; [`ScrfdLocator`] is
//! the bundled implementation, running an SCRFD ONNX model with anchor-free
//! decoding over three strides followed by NMS.

use crate::normalizer::resize_bilinear;
use crate::runtime;
use crate::types::Region;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
/// Score + bbox tensors per stride; keypoint tensors, when present, are ignored.
const SCRFD_MIN_OUTPUTS: usize = 6;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that can find faces in a grayscale frame.
pub trait FaceLocator {
    /// Regions believed to contain a face. Order is not significant.
    fn locate(&mut self, frame: &GrayImage) -> Result<Vec<Region>, DetectorError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        }
    }
}

/// Raw detection in frame coordinates, before clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Detection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

/// Mapping between letterboxed model input and the original frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    /// Scaled frame size inside the model input.
    width: u32,
    height: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, target);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, target);
        Self {
            scale,
            pad_x: ((target - new_w) / 2) as f32,
            pad_y: ((target - new_h) / 2) as f32,
            width: new_w,
            height: new_h,
        }
    }

    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// (score, bbox) output tensor indices for one stride.
type StrideOutputs = (usize, usize);

/// SCRFD face detector.
pub struct ScrfdLocator {
    session: Session,
    config: DetectorConfig,
    stride_outputs: [StrideOutputs; 3],
}

impl ScrfdLocator {
    /// Load an SCRFD ONNX model (e.g. `det_10g.onnx`).
    pub fn load(model_path: &Path, config: DetectorConfig) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        runtime::init();

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < SCRFD_MIN_OUTPUTS {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires at least {SCRFD_MIN_OUTPUTS} outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = map_outputs(&output_names);
        tracing::debug!(?stride_outputs, "SCRFD output mapping");

        Ok(Self {
            session,
            config,
            stride_outputs,
        })
    }

    fn infer(&mut self, frame: &GrayImage) -> Result<Vec<Detection>, DetectorError> {
        let (input, letterbox) = preprocess(frame);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_outputs[pos];
            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            detections.extend(decode_stride(
                scores,
                bboxes,
                stride,
                &letterbox,
                self.config.confidence_threshold,
            ));
        }

        Ok(nms(detections, self.config.nms_threshold))
    }
}

impl FaceLocator for ScrfdLocator {
    fn locate(&mut self, frame: &GrayImage) -> Result<Vec<Region>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let detections = self.infer(frame)?;
        let regions: Vec<Region> = detections
            .iter()
            .filter_map(|d| Region::from_corners(d.x1, d.y1, d.x2, d.y2, width, height))
            .collect();

        tracing::debug!(found = regions.len(), "located faces");
        Ok(regions)
    }
}

/// Letterbox a grayscale frame into a normalized 1×3×640×640 tensor.
///
/// Padding is left at zero, which is the normalized value of the model mean.
fn preprocess(frame: &GrayImage) -> (Array4<f32>, Letterbox) {
    let size = SCRFD_INPUT_SIZE;
    let letterbox = Letterbox::fit(frame.width(), frame.height(), size);
    let resized = resize_bilinear(frame, letterbox.width, letterbox.height);

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    let (ox, oy) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let v = (pixel[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
        let (tx, ty) = (ox + x as usize, oy + y as usize);
        // Grayscale replicated into all three channels
        tensor[[0, 0, ty, tx]] = v;
        tensor[[0, 1, ty, tx]] = v;
        tensor[[0, 2, ty, tx]] = v;
    }

    (tensor, letterbox)
}

/// Find score/bbox tensors by name (`score_8`, `bbox_16`, ...), falling back
/// to the standard export order `[scores 8/16/32, bboxes 8/16/32, ...]`.
fn map_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match named {
        Some(found) => [found[0], found[1], found[2]],
        None => {
            tracing::debug!(?names, "SCRFD output names not recognized, using positional mapping");
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode the detections of one stride level into frame coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<Detection> {
    let grid_w = SCRFD_INPUT_SIZE as usize / stride;
    let grid_h = SCRFD_INPUT_SIZE as usize / stride;
    let anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    (0..anchors)
        .filter_map(|idx| {
            let score = scores.get(idx).copied()?;
            if score <= threshold {
                return None;
            }
            let offsets = bboxes.get(idx * 4..idx * 4 + 4)?;

            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * step;
            let cy = (cell / grid_w) as f32 * step;

            let (x1, y1) = letterbox.to_frame(cx - offsets[0] * step, cy - offsets[1] * step);
            let (x2, y2) = letterbox.to_frame(cx + offsets[2] * step, cy + offsets[3] * step);
            Some(Detection {
                x1,
                y1,
                x2,
                y2,
                confidence: score,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression. Output is sorted by descending confidence.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        if keep.iter().all(|kept| iou(kept, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = (a.x2 - a.x1) * (a.y2 - a.y1) + (b.x2 - b.x1) * (b.y2 - b.y1) - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
