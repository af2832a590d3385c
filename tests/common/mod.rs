#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from textvision for tests
pub use textvision::text::{Lexicon, Normalizer, Tokenizer, TokenizerKind};
pub use textvision::vision::{
    BoundingBox, StreamEnd, VisionError, derive_output_path, infer_image, infer_video, run_stream,
};
