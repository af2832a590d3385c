//! Integration tests for the inference drivers.
//!
//! Tests cover:
//! - Single image inference and output path handling
//! - The streaming loop: end-of-stream, undecodable frames, cancellation
//! - Open failures for missing sources and models

mod common;

use common::*;
use image::Rgb;
use textvision::vision::{YoloDetector, annotation::class_color};

#[test]
fn test_infer_image_writes_annotated_copy() -> anyhow::Result<()> {
    let img_file = create_test_image();
    let dir = tempfile::TempDir::new()?;
    let output = dir.path().join("annotated.png");
    let detector = FixedDetector::single();

    let written = infer_image(&detector, img_file.path(), 0.5, Some(&output))?;

    assert_eq!(written, output);
    let annotated = image::open(&output)?.to_rgb8();
    assert_eq!(annotated.dimensions(), (100, 100));
    assert_eq!(*annotated.get_pixel(10, 20), class_color(0));
    assert_eq!(*annotated.get_pixel(50, 50), Rgb([255, 0, 0]));
    assert_eq!(detector.calls.get(), 1);

    Ok(())
}

#[test]
fn test_infer_image_default_output_path() -> anyhow::Result<()> {
    let img_file = create_test_image();
    let detector = FixedDetector::single();

    let written = infer_image(&detector, img_file.path(), 0.5, None)?;

    assert_eq!(written, derive_output_path(img_file.path(), "png"));
    assert!(written.exists());
    std::fs::remove_file(&written)?;

    Ok(())
}

#[test]
fn test_infer_image_threshold_filters_everything() -> anyhow::Result<()> {
    let img_file = create_test_image();
    let dir = tempfile::TempDir::new()?;
    let output = dir.path().join("clean.png");

    infer_image(&FixedDetector::single(), img_file.path(), 1.01, Some(&output))?;

    // No detections: the output is the untouched input
    let annotated = image::open(&output)?.to_rgb8();
    assert!(annotated.pixels().all(|p| *p == Rgb([255, 0, 0])));

    Ok(())
}

#[test]
fn test_infer_image_missing_source_writes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let missing = dir.path().join("nope.png");
    let output = dir.path().join("nope_output.png");

    let result = infer_image(&FixedDetector::single(), &missing, 0.5, None);

    assert!(matches!(result, Err(VisionError::SourceNotFound { .. })));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

    Ok(())
}

#[test]
fn test_infer_image_undecodable_source() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"not an image")?;

    let result = infer_image(&FixedDetector::single(), &bogus, 0.5, None);

    assert!(matches!(result, Err(VisionError::SourceNotFound { .. })));
    assert!(!dir.path().join("bogus_output.png").exists());

    Ok(())
}

#[test]
fn test_infer_video_missing_source() {
    let result = infer_video(
        &FixedDetector::single(),
        std::path::Path::new("/no/such/video.mp4"),
        0.5,
        None,
    );
    assert!(matches!(result, Err(VisionError::SourceNotFound { .. })));
}

#[test]
fn test_model_load_failure() {
    let result = YoloDetector::load("/no/such/weights.rten");
    assert!(matches!(result, Err(VisionError::ModelLoad { .. })));
}

#[test]
fn test_model_load_rejects_garbage() -> anyhow::Result<()> {
    let weights = tempfile::Builder::new().suffix(".rten").tempfile()?;
    std::fs::write(weights.path(), b"definitely not a model")?;

    let result = YoloDetector::load(weights.path());
    assert!(matches!(result, Err(VisionError::ModelLoad { .. })));

    Ok(())
}

#[test]
fn test_stream_zero_frames_terminates() -> anyhow::Result<()> {
    let detector = FixedDetector::single();
    let mut source = MemorySource::new(vec![]);
    let mut sink = RecordingSink::default();

    let summary = run_stream(&detector, &mut source, &mut sink, 0.5)?;

    assert_eq!(summary.frames, 0);
    assert_eq!(summary.end, StreamEnd::EndOfStream);
    assert_eq!(source.reads, 1);
    assert!(sink.frames.is_empty());
    assert_eq!(detector.calls.get(), 0);

    Ok(())
}

#[test]
fn test_stream_processes_every_frame() -> anyhow::Result<()> {
    let detector = FixedDetector::single();
    let frames = (0..5).map(|i| make_frame(64, 48, i * 10)).collect();
    let mut source = MemorySource::new(frames);
    let mut sink = RecordingSink::default();

    let summary = run_stream(&detector, &mut source, &mut sink, 0.5)?;

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.detections, 5);
    assert_eq!(summary.end, StreamEnd::EndOfStream);
    assert_eq!(sink.frames.len(), 5);
    for frame in &sink.frames {
        assert_eq!(frame.dimensions(), (64, 48));
        assert_eq!(*frame.get_pixel(10, 20), class_color(0));
    }

    Ok(())
}

#[test]
fn test_stream_undecodable_frame_ends_stream() -> anyhow::Result<()> {
    let detector = FixedDetector::single();
    let mut source = MemorySource::with_gaps(vec![
        Some(make_frame(32, 32, 0)),
        Some(make_frame(32, 32, 0)),
        None,
        Some(make_frame(32, 32, 0)),
    ]);
    let mut sink = RecordingSink::default();

    let summary = run_stream(&detector, &mut source, &mut sink, 0.5)?;

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.end, StreamEnd::EndOfStream);
    assert_eq!(sink.frames.len(), 2);

    Ok(())
}

#[test]
fn test_stream_stops_on_cancel() -> anyhow::Result<()> {
    let detector = FixedDetector::single();
    let frames = (0..10).map(|_| make_frame(32, 32, 0)).collect();
    let mut source = MemorySource::new(frames);
    let mut sink = RecordingSink::cancelling_after(3);

    let summary = run_stream(&detector, &mut source, &mut sink, 0.5)?;

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.end, StreamEnd::Cancelled);
    assert_eq!(source.reads, 3);

    Ok(())
}

#[test]
fn test_stream_threshold_above_one_keeps_frames_clean() -> anyhow::Result<()> {
    let detector = FixedDetector::single();
    let mut source = MemorySource::new(vec![make_frame(32, 32, 7)]);
    let mut sink = RecordingSink::default();

    let summary = run_stream(&detector, &mut source, &mut sink, 1.01)?;

    assert_eq!(summary.detections, 0);
    assert_eq!(sink.frames[0], make_frame(32, 32, 7));

    Ok(())
}

#[test]
fn test_stream_propagates_detector_errors() {
    let mut source = MemorySource::new(vec![make_frame(8, 8, 0)]);
    let mut sink = RecordingSink::default();

    let result = run_stream(&FailingDetector, &mut source, &mut sink, 0.5);

    assert!(matches!(result, Err(VisionError::Inference(_))));
    assert!(sink.frames.is_empty());
}
