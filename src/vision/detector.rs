use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use super::error::VisionError;
use super::labels::class_name;
use super::models::{BoundingBox, Detection, DetectionResult};

/// Anything that can turn a frame into detections
pub trait ObjectDetector {
    /// Run inference on one frame. Detections scoring below
    /// `confidence_threshold` are dropped; no detections is not an error.
    fn detect(
        &self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError>;
}

/// Tunables for YOLO post-processing
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Side of the square model input
    pub input_size: u32,
    /// Boxes of the same class overlapping more than this are suppressed
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Aspect-preserving resize parameters mapping frame pixels to model input pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    pub fn new(frame_width: u32, frame_height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / frame_width as f32)
            .min(input_size as f32 / frame_height as f32);
        let scaled_width = ((frame_width as f32 * scale).round() as u32).clamp(1, input_size);
        let scaled_height = ((frame_height as f32 * scale).round() as u32).clamp(1, input_size);

        Self {
            scale,
            pad_x: ((input_size - scaled_width) / 2) as f32,
            pad_y: ((input_size - scaled_height) / 2) as f32,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a centre/size box from model input space back to the frame
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox::from_center(
            (cx - self.pad_x) / self.scale,
            (cy - self.pad_y) / self.scale,
            w / self.scale,
            h / self.scale,
        )
    }
}

/// Resize `frame` into a grey-padded square and lay it out as NCHW floats in [0, 1]
pub fn letterbox_tensor(frame: &RgbImage, input_size: u32) -> (Vec<f32>, Letterbox) {
    let letterbox = Letterbox::new(frame.width(), frame.height(), input_size);
    let resized = imageops::resize(
        frame,
        letterbox.scaled_width,
        letterbox.scaled_height,
        FilterType::Triangle,
    );

    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([114, 114, 114]));
    imageops::overlay(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let plane = (input_size * input_size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = (y * input_size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }

    (data, letterbox)
}

/// Decode a `[4 + classes, anchors]` YOLOv8 output (batch dimension removed).
///
/// Rows 0..4 are cx, cy, w, h in model input pixels; the remaining rows are
/// per-class scores. Keeps the best class per anchor if it reaches `threshold`.
pub fn decode_predictions(
    data: &[f32],
    channels: usize,
    anchors: usize,
    threshold: f32,
    letterbox: &Letterbox,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Detection> {
    if channels <= 4 || data.len() < channels * anchors {
        return Vec::new();
    }

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut detections = Vec::new();

    for anchor in 0..anchors {
        let (class_id, confidence) = (4..channels)
            .map(|row| (row - 4, at(row, anchor)))
            .fold((0, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            });

        if confidence < threshold {
            continue;
        }

        let bbox = letterbox
            .unmap(at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor))
            .clamp_to(frame_width, frame_height);
        if bbox.area() <= 0.0 {
            continue;
        }

        detections.push(Detection {
            bbox,
            class_id,
            label: class_name(class_id),
            confidence,
        });
    }

    detections
}

/// Greedy per-class non-maximum suppression; output is sorted by confidence
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

/// Whether running the model on `frame` could yield anything.
///
/// No score can exceed 1.0, and an empty frame has nothing to detect.
fn needs_inference(frame: &RgbImage, confidence_threshold: f32) -> bool {
    confidence_threshold <= 1.0 && frame.width() > 0 && frame.height() > 0
}

/// YOLOv8 detector running an `.rten` model on the CPU
pub struct YoloDetector {
    model: Model,
    config: DetectorConfig,
}

impl YoloDetector {
    /// Load model weights. The model is released when the detector is dropped.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, VisionError> {
        let model_path = model_path.as_ref();

        if !model_path.is_file() {
            return Err(VisionError::ModelLoad {
                path: model_path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let model = Model::load_file(model_path).map_err(|e| VisionError::ModelLoad {
            path: model_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!("Model loaded successfully from {}", model_path.display());

        Ok(Self {
            model,
            config: DetectorConfig::default(),
        })
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    fn run_model(&self, input: Vec<f32>) -> Result<(Vec<f32>, usize, usize), VisionError> {
        let size = self.config.input_size as usize;
        let input = NdTensor::from_data([1, 3, size, size], input);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| VisionError::Inference(e.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| VisionError::Inference(format!("unexpected output: {:?}", e)))?;

        let [batch, channels, anchors] = output.shape();
        if batch != 1 {
            return Err(VisionError::Inference(format!(
                "expected batch of 1, model returned {}",
                batch
            )));
        }

        Ok((output.to_vec(), channels, anchors))
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(
        &self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError> {
        let (width, height) = frame.dimensions();

        if !needs_inference(frame, confidence_threshold) {
            return Ok(DetectionResult::empty(width, height));
        }

        let (input, letterbox) = letterbox_tensor(frame, self.config.input_size);
        let (output, channels, anchors) = self.run_model(input)?;

        let candidates = decode_predictions(
            &output,
            channels,
            anchors,
            confidence_threshold,
            &letterbox,
            width,
            height,
        );
        let detections = non_max_suppression(
            candidates,
            self.config.iou_threshold,
            self.config.max_detections,
        );

        debug!("{} detections above {:.2}", detections.len(), confidence_threshold);

        Ok(DetectionResult {
            frame_width: width,
            frame_height: height,
            detections,
        })
    }
}
