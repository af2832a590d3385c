pub mod text;
pub mod vision;

pub use text::{Lexicon, Normalizer, TextReport, Tokenizer, TokenizerKind};
pub use vision::{
    Detection, DetectionResult, ObjectDetector, VisionError, YoloDetector, infer_image,
    infer_video, infer_webcam,
};
