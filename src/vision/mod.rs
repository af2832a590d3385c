pub mod annotation;
pub mod detector;
pub mod error;
pub mod inference;
pub mod labels;
pub mod media;
pub mod models;

pub use annotation::annotate;
pub use detector::{DetectorConfig, ObjectDetector, YoloDetector};
pub use error::VisionError;
pub use inference::{
    StreamEnd, StreamState, StreamSummary, derive_output_path, infer_image, infer_video,
    infer_webcam, run_stream,
};
pub use media::{FrameSink, FrameSource, SinkStatus};
pub use models::{BoundingBox, Detection, DetectionResult};
