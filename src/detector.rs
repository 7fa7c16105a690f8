// src/detector.rs

use crate::error::AuditError;
use crate::types::{Detection, DetectionLabel, Frame, ModelConfig};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info};

const NUM_CLASSES: usize = 6;
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Detection capability consumed by the pipeline. One handle is constructed
/// per stage and injected explicitly, so tests can substitute scripted
/// detectors and parallel stages never share a session.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AuditError>;
}

/// YOLO-family site-safety model (6 classes: gloves, hard hat, mask, person,
/// safety boots, vest) running on an ONNX Runtime session.
pub struct YoloDetector {
    session: Session,
    input_size: usize,
    confidence_floor: f32,
}

impl YoloDetector {
    pub fn new(config: &ModelConfig) -> Result<Self, AuditError> {
        info!("Loading safety model: {}", config.path);

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(config.num_threads))
            .and_then(|b| b.commit_from_file(&config.path))
            .map_err(|e| AuditError::Detection(format!("model load failed: {e}")))?;

        info!("✓ Safety detector initialized");
        Ok(Self {
            session,
            input_size: config.input_size,
            confidence_floor: config.confidence_floor,
        })
    }

    fn preprocess(&self, frame: &Frame) -> (Vec<f32>, f32, f32, f32) {
        let target = self.input_size;
        let (src_w, src_h) = (frame.width, frame.height);

        // Letterbox: fit inside the square input while keeping aspect ratio.
        let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
        let scaled_w = (src_w as f32 * scale) as usize;
        let scaled_h = (src_h as f32 * scale) as usize;

        let pad_x = (target - scaled_w) as f32 / 2.0;
        let pad_y = (target - scaled_h) as f32 / 2.0;

        let resized = resize_bilinear(&frame.data, src_w, src_h, scaled_w, scaled_h);

        let mut canvas = vec![114u8; target * target * 3];
        for y in 0..scaled_h {
            for x in 0..scaled_w {
                let src_idx = (y * scaled_w + x) * 3;
                let dst_x = x + pad_x as usize;
                let dst_y = y + pad_y as usize;
                let dst_idx = (dst_y * target + dst_x) * 3;
                canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
            }
        }

        // [0, 255] -> [0, 1], HWC -> CHW
        let mut input = vec![0.0f32; 3 * target * target];
        for c in 0..3 {
            for h in 0..target {
                for w in 0..target {
                    let hwc_idx = (h * target + w) * 3 + c;
                    let chw_idx = c * target * target + h * target + w;
                    input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
                }
            }
        }

        (input, scale, pad_x, pad_y)
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, AuditError> {
        let shape = [1, 3, self.input_size, self.input_size];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.to_vec().into_boxed_slice()))
                .map_err(|e| AuditError::Detection(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs!["images" => input_value])
            .map_err(|e| AuditError::Detection(e.to_string()))?;
        let output = &outputs[0];
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AuditError::Detection(e.to_string()))?;

        Ok(data.to_vec())
    }

    fn postprocess(&self, output: &[f32], scale: f32, pad_x: f32, pad_y: f32) -> Vec<Detection> {
        let mut detections = Vec::new();

        // YOLO output: [1, 4 + NUM_CLASSES, N] — columns are predictions.
        let num_preds = output.len() / (4 + NUM_CLASSES);

        for i in 0..num_preds {
            let cx = output[i];
            let cy = output[num_preds + i];
            let w = output[num_preds * 2 + i];
            let h = output[num_preds * 3 + i];

            let mut max_conf = 0.0f32;
            let mut best_class = 0;
            for c in 0..NUM_CLASSES {
                let conf = output[num_preds * (4 + c) + i];
                if conf > max_conf {
                    max_conf = conf;
                    best_class = c;
                }
            }

            if max_conf < self.confidence_floor {
                continue;
            }
            let Some(label) = DetectionLabel::from_class_id(best_class) else {
                continue;
            };

            // Center format -> corners, then reverse the letterbox transform.
            let x1 = (cx - w / 2.0 - pad_x) / scale;
            let y1 = (cy - h / 2.0 - pad_y) / scale;
            let x2 = (cx + w / 2.0 - pad_x) / scale;
            let y2 = (cy + h / 2.0 - pad_y) / scale;

            detections.push(Detection::new(label, max_conf, [x1, y1, x2, y2]));
        }

        nms(detections, NMS_IOU_THRESHOLD)
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AuditError> {
        if frame.data.len() != frame.width * frame.height * 3 {
            return Err(AuditError::Detection(format!(
                "frame buffer size {} does not match {}x{} RGB",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let (input, scale, pad_x, pad_y) = self.preprocess(frame);
        let output = self.infer(&input)?;
        let detections = self.postprocess(&output, scale, pad_x, pad_y);

        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }
    dst
}

fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();

    while !detections.is_empty() {
        let current = detections.remove(0);

        detections.retain(|det| {
            det.label != current.label || calculate_iou(&current.bbox, &det.bbox) < iou_threshold
        });
        keep.push(current);
    }

    keep
}

fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_det(label: DetectionLabel, conf: f32, bbox: [f32; 4]) -> Detection {
        Detection::new(label, conf, bbox)
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let dets = vec![
            make_det(DetectionLabel::Person, 0.9, [0.0, 0.0, 100.0, 100.0]),
            make_det(DetectionLabel::Person, 0.6, [5.0, 5.0, 105.0, 105.0]),
        ];
        let kept = nms(dets, 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_overlapping_different_classes() {
        // A hard hat box sits inside the person box; both must survive.
        let dets = vec![
            make_det(DetectionLabel::Person, 0.9, [0.0, 0.0, 100.0, 200.0]),
            make_det(DetectionLabel::HardHat, 0.8, [20.0, 0.0, 80.0, 40.0]),
        ];
        let kept = nms(dets, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(calculate_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((calculate_iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_class_id_mapping_round_trip() {
        for id in 0..6 {
            let label = DetectionLabel::from_class_id(id).unwrap();
            assert_eq!(DetectionLabel::from_class_id(id), Some(label));
        }
        assert!(DetectionLabel::from_class_id(6).is_none());
    }
}
