/// ONNX Runtime implementation of the [`FaceEncoder`] port.
///
/// Two sessions: a YOLO-face detector (letterbox preprocessing, confidence
/// filter, greedy NMS) and an ArcFace embedder (112×112 crop, mean/std
/// normalization, L2-normalized output).
use std::path::Path;
use std::sync::Mutex;

use crate::recognition::domain::embedding::FaceEmbedding;
use crate::recognition::domain::face_encoder::{DetectedFace, FaceBox, FaceEncoder};
use crate::shared::constants::{
    DETECT_MODEL_NAME, DETECT_MODEL_URL, EMBED_MODEL_NAME, EMBED_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver;

pub const DEFAULT_DETECT_CONFIDENCE: f64 = 0.5;

/// Fallback detector input resolution when the model has a dynamic shape.
const DEFAULT_DETECT_INPUT: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

const EMBED_INPUT_SIZE: usize = 112;
const EMBED_NORM_MEAN: f32 = 127.5;
const EMBED_NORM_STD: f32 = 127.5;

type EncodeError = Box<dyn std::error::Error + Send + Sync>;

pub struct OnnxFaceEncoder {
    detector: Mutex<ort::session::Session>,
    embedder: Mutex<ort::session::Session>,
    confidence: f64,
    detect_input: u32,
}

impl OnnxFaceEncoder {
    pub fn new(
        detect_model: &Path,
        embed_model: &Path,
        confidence: f64,
    ) -> Result<Self, EncodeError> {
        let detector = build_session(detect_model)?;
        let embedder = build_session(embed_model)?;
        let detect_input = input_resolution(&detector).unwrap_or(DEFAULT_DETECT_INPUT);
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            confidence,
            detect_input,
        })
    }

    /// Resolve both models (cache → local dir → download) and build the
    /// encoder.
    pub fn from_resolved_models(
        confidence: f64,
        models_dir: Option<&Path>,
    ) -> Result<Self, EncodeError> {
        let detect = model_resolver::resolve(DETECT_MODEL_NAME, DETECT_MODEL_URL, models_dir, None)?;
        let embed = model_resolver::resolve(EMBED_MODEL_NAME, EMBED_MODEL_URL, models_dir, None)?;
        Self::new(&detect, &embed, confidence)
    }

    fn detect_faces(&self, frame: &Frame) -> Result<Vec<ScoredBox>, EncodeError> {
        let (tensor, scale, pad_x, pad_y) = letterbox(frame, self.detect_input);
        let input = ort::value::Tensor::from_array(tensor)?;

        let mut session = self
            .detector
            .lock()
            .map_err(|e| format!("detector lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("face detection model produced no outputs".into());
        }
        let output = outputs[0].try_extract_array::<f32>()?;
        let shape = output.shape().to_vec();
        let data = output
            .as_slice()
            .ok_or("cannot view detection output as a slice")?;

        let mut boxes = parse_detections(data, &shape, self.confidence, scale, pad_x, pad_y)?;
        Ok(nms(&mut boxes, NMS_IOU_THRESH))
    }

    fn embed_crop(&self, crop: &[u8], width: u32, height: u32) -> Result<FaceEmbedding, EncodeError> {
        let tensor = embed_preprocess(crop, width, height);
        let input = ort::value::Tensor::from_array(tensor)?;

        let mut session = self
            .embedder
            .lock()
            .map_err(|e| format!("embedder lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let slice = output
            .as_slice()
            .ok_or("cannot view embedding output as a slice")?;

        let mut values = slice.to_vec();
        l2_normalize(&mut values);
        Ok(FaceEmbedding::new(values))
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<DetectedFace>, EncodeError> {
        let mut faces = Vec::new();
        for scored in self.detect_faces(frame)? {
            let Some(region) = scored.clamp_to(frame.width(), frame.height()) else {
                continue;
            };
            let crop = crop_region(frame, region);
            let embedding = self.embed_crop(&crop, region.width, region.height)?;
            faces.push(DetectedFace { region, embedding });
        }
        Ok(faces)
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, EncodeError> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Read the square NCHW input resolution from the model, if static.
fn input_resolution(session: &ort::session::Session) -> Option<u32> {
    let input = session.inputs().first()?;
    if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
        if shape.len() >= 4 && shape[2] > 0 {
            return Some(shape[2] as u32);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Detection pre/post-processing
// ---------------------------------------------------------------------------

/// Detection candidate in original frame coordinates.
#[derive(Clone, Copy, Debug)]
struct ScoredBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

impl ScoredBox {
    /// Clamp to frame bounds; `None` if the box degenerates to zero area.
    fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<FaceBox> {
        let x1 = self.x1.max(0.0) as u32;
        let y1 = self.y1.max(0.0) as u32;
        let x2 = (self.x2.min(frame_width as f64)).max(0.0) as u32;
        let y2 = (self.y2.min(frame_height as f64)).max(0.0) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// Letterbox-resize a frame to a square model input.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Pad with 114/255 gray, the YOLO training convention.
    let fill = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), fill);

    let src = frame.as_ndarray();
    let src_w = frame.width() as usize;
    let src_h = frame.height() as usize;

    for y in 0..new_h as usize {
        let sy = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let sx = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Parse YOLO rows `[cx, cy, w, h, conf, ...]` from either output layout
/// (`[1, features, detections]` or `[1, detections, features]`), mapping
/// letterbox coordinates back to the original frame.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Result<Vec<ScoredBox>, EncodeError> {
    if shape.len() != 3 {
        return Err(format!("unexpected detection output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Err(format!("detection rows too short: {num_feats} features").into());
    }

    let feature = |det: usize, feat: usize| {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let score = feature(i, 4) as f64;
        if score < confidence {
            continue;
        }
        let cx = feature(i, 0) as f64;
        let cy = feature(i, 1) as f64;
        let w = feature(i, 2) as f64;
        let h = feature(i, 3) as f64;

        boxes.push(ScoredBox {
            x1: ((cx - w / 2.0) - pad_x as f64) / scale,
            y1: ((cy - h / 2.0) - pad_y as f64) / scale,
            x2: ((cx + w / 2.0) - pad_x as f64) / scale,
            y2: ((cy + h / 2.0) - pad_y as f64) / scale,
            score,
        });
    }
    Ok(boxes)
}

/// Greedy NMS: sort by score descending, suppress overlapping boxes.
fn nms(boxes: &mut [ScoredBox], iou_thresh: f64) -> Vec<ScoredBox> {
    boxes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<ScoredBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep.iter().all(|k| iou(k, candidate) <= iou_thresh) {
            keep.push(*candidate);
        }
    }
    keep
}

fn iou(a: &ScoredBox, b: &ScoredBox) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Embedding pre-processing
// ---------------------------------------------------------------------------

fn crop_region(frame: &Frame, region: FaceBox) -> Vec<u8> {
    let fw = frame.width() as usize;
    let data = frame.data();
    let mut crop = Vec::with_capacity((region.width * region.height * 3) as usize);
    for row in 0..region.height as usize {
        let start = ((region.y as usize + row) * fw + region.x as usize) * 3;
        crop.extend_from_slice(&data[start..start + region.width as usize * 3]);
    }
    crop
}

/// Resize an RGB crop to 112×112 and normalize into an NCHW tensor.
fn embed_preprocess(rgb: &[u8], width: u32, height: u32) -> ndarray::Array4<f32> {
    let src_w = width as usize;
    let src_h = height as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));

    for y in 0..EMBED_INPUT_SIZE {
        let sy = (((y as f64 + 0.5) * src_h as f64 / EMBED_INPUT_SIZE as f64) as usize)
            .min(src_h.saturating_sub(1));
        for x in 0..EMBED_INPUT_SIZE {
            let sx = (((x as f64 + 0.5) * src_w as f64 / EMBED_INPUT_SIZE as f64) as usize)
                .min(src_w.saturating_sub(1));
            let offset = (sy * src_w + sx) * 3;
            if offset + 2 < rgb.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] =
                        (rgb[offset + c] as f32 - EMBED_NORM_MEAN) / EMBED_NORM_STD;
                }
            }
        }
    }
    tensor
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_wide_frame_pads_vertically() {
        // 200x100 → scale 3.2, new 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);

        // Pad area carries the 114-gray fill, image area the pixel value.
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
        assert!((tensor[[0, 0, 200, 10]] - 128.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_detections_maps_back_through_letterbox() {
        // Eight detection rows in plain layout [1, 8, 5]; only the first
        // clears the confidence threshold. cx=320, cy=320, w=64, h=64 in a
        // letterboxed 640 input with scale=2, pad_x=0, pad_y=160.
        let mut data = [0.0f32; 8 * 5];
        data[..5].copy_from_slice(&[320.0, 320.0, 64.0, 64.0, 0.9]);
        let boxes = parse_detections(&data, &[1, 8, 5], 0.5, 2.0, 0, 160).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert!((b.x1 - 144.0).abs() < 1e-9);
        assert!((b.y1 - 64.0).abs() < 1e-9);
        assert!((b.x2 - 176.0).abs() < 1e-9);
        assert!((b.y2 - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_detections_filters_by_confidence() {
        let mut data = [0.0f32; 8 * 5];
        data[..5].copy_from_slice(&[320.0, 320.0, 64.0, 64.0, 0.3]);
        let boxes = parse_detections(&data, &[1, 8, 5], 0.5, 1.0, 0, 0).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_parse_detections_transposed_layout() {
        // [1, 5, 8]: eight detections column-major, only the first above
        // the confidence threshold.
        let mut data = [0.0f32; 5 * 8];
        data[0] = 100.0; // cx of detection 0
        data[8] = 200.0; // cy
        data[16] = 40.0; // w
        data[24] = 40.0; // h
        data[32] = 0.9; // conf
        for det in 1..8 {
            data[32 + det] = 0.2;
        }
        let boxes = parse_detections(&data, &[1, 5, 8], 0.5, 1.0, 0, 0).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].x1 - 80.0).abs() < 1e-9);
        assert!((boxes[0].y1 - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_detections_rejects_bad_shape() {
        assert!(parse_detections(&[], &[1, 5], 0.5, 1.0, 0, 0).is_err());
    }

    #[test]
    fn test_nms_suppresses_overlapping_lower_score() {
        let mut boxes = vec![
            ScoredBox { x1: 0.0, y1: 0.0, x2: 100.0, y2: 100.0, score: 0.8 },
            ScoredBox { x1: 5.0, y1: 5.0, x2: 105.0, y2: 105.0, score: 0.9 },
        ];
        let kept = nms(&mut boxes, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let mut boxes = vec![
            ScoredBox { x1: 0.0, y1: 0.0, x2: 50.0, y2: 50.0, score: 0.9 },
            ScoredBox { x1: 200.0, y1: 200.0, x2: 250.0, y2: 250.0, score: 0.8 },
        ];
        assert_eq!(nms(&mut boxes, 0.3).len(), 2);
    }

    #[test]
    fn test_scored_box_clamped_to_frame() {
        let b = ScoredBox { x1: -10.0, y1: 5.0, x2: 120.0, y2: 95.0, score: 0.9 };
        let clamped = b.clamp_to(100, 90).unwrap();
        assert_eq!(clamped, FaceBox { x: 0, y: 5, width: 100, height: 85 });
    }

    #[test]
    fn test_degenerate_box_dropped() {
        let b = ScoredBox { x1: -30.0, y1: -30.0, x2: -1.0, y2: -1.0, score: 0.9 };
        assert!(b.clamp_to(100, 100).is_none());
    }

    #[test]
    fn test_crop_region_extracts_expected_pixels() {
        // 4x4 frame, red pixel at (2, 1)
        let mut data = vec![0u8; 4 * 4 * 3];
        data[(1 * 4 + 2) * 3] = 255;
        let frame = Frame::new(data, 4, 4, 3, 0);

        let crop = crop_region(&frame, FaceBox { x: 2, y: 1, width: 2, height: 2 });
        assert_eq!(crop.len(), 2 * 2 * 3);
        assert_eq!(crop[0], 255);
    }

    #[test]
    fn test_embed_preprocess_shape_and_range() {
        let rgb = vec![255u8; 50 * 50 * 3];
        let tensor = embed_preprocess(&rgb, 50, 50);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);

        let rgb = vec![0u8; 50 * 50 * 3];
        let tensor = embed_preprocess(&rgb, 50, 50);
        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
