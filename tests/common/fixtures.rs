use image::{ImageBuffer, Rgb, RgbImage};
use std::cell::Cell;
use tempfile::NamedTempFile;
use textvision::vision::{
    BoundingBox, Detection, DetectionResult, FrameSink, FrameSource, ObjectDetector, SinkStatus,
    VisionError,
};

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([255u8, 0u8, 0u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Solid-colour frame
pub fn make_frame(width: u32, height: u32, shade: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]))
}

/// Detector that reports the same scored boxes on every frame
pub struct FixedDetector {
    pub boxes: Vec<(BoundingBox, f32)>,
    pub calls: Cell<usize>,
}

impl FixedDetector {
    pub fn new(boxes: Vec<(BoundingBox, f32)>) -> Self {
        Self {
            boxes,
            calls: Cell::new(0),
        }
    }

    /// One box per frame at (10, 10), 20x20, scoring 0.8
    pub fn single() -> Self {
        Self::new(vec![(
            BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 20.0,
                height: 20.0,
            },
            0.8,
        )])
    }
}

impl ObjectDetector for FixedDetector {
    fn detect(
        &self,
        frame: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<DetectionResult, VisionError> {
        self.calls.set(self.calls.get() + 1);
        let detections = self
            .boxes
            .iter()
            .filter(|(_, score)| *score >= confidence_threshold)
            .map(|(bbox, score)| Detection {
                bbox: *bbox,
                class_id: 0,
                label: "person".to_string(),
                confidence: *score,
            })
            .collect();

        Ok(DetectionResult {
            frame_width: frame.width(),
            frame_height: frame.height(),
            detections,
        })
    }
}

/// Detector that always fails
pub struct FailingDetector;

impl ObjectDetector for FailingDetector {
    fn detect(&self, _frame: &RgbImage, _threshold: f32) -> Result<DetectionResult, VisionError> {
        Err(VisionError::Inference("model exploded".to_string()))
    }
}

/// In-memory frame source; `None` entries simulate undecodable frames
pub struct MemorySource {
    frames: std::vec::IntoIter<Option<RgbImage>>,
    pub reads: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self::with_gaps(frames.into_iter().map(Some).collect())
    }

    pub fn with_gaps(frames: Vec<Option<RgbImage>>) -> Self {
        Self {
            frames: frames.into_iter(),
            reads: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Option<RgbImage> {
        self.reads += 1;
        self.frames.next().flatten()
    }
}

/// Sink that records frames and can cancel after a given number of writes
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<RgbImage>,
    pub cancel_after: Option<usize>,
}

impl RecordingSink {
    pub fn cancelling_after(writes: usize) -> Self {
        Self {
            frames: Vec::new(),
            cancel_after: Some(writes),
        }
    }
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<SinkStatus, VisionError> {
        self.frames.push(frame.clone());
        match self.cancel_after {
            Some(limit) if self.frames.len() >= limit => Ok(SinkStatus::Cancelled),
            _ => Ok(SinkStatus::Continue),
        }
    }
}
