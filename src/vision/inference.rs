use image::ImageReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::annotation::annotate;
use super::detector::ObjectDetector;
use super::error::VisionError;
use super::media::{
    CameraCapture, DisplayWindow, FrameSink, FrameSource, OUTPUT_FPS, SinkStatus, VideoReader,
    VideoWriter,
};

/// Title of the live display window
pub const WEBCAM_WINDOW_TITLE: &str = "Webcam inference";

/// Capture size requested from cameras
pub const WEBCAM_FRAME_SIZE: (u32, u32) = (640, 480);

/// Why a stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// No more frames, or a frame could not be decoded
    EndOfStream,
    /// The consumer asked to stop
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Opened,
    FrameRead,
    EndOfStream,
    Cancelled,
}

/// Lifecycle of a streaming driver. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opening,
    Streaming,
    Closed(StreamEnd),
}

impl StreamState {
    pub fn next(self, event: StreamEvent) -> StreamState {
        match (self, event) {
            (StreamState::Closed(end), _) => StreamState::Closed(end),
            (_, StreamEvent::EndOfStream) => StreamState::Closed(StreamEnd::EndOfStream),
            (_, StreamEvent::Cancelled) => StreamState::Closed(StreamEnd::Cancelled),
            (StreamState::Opening, StreamEvent::Opened) => StreamState::Streaming,
            (StreamState::Streaming, StreamEvent::FrameRead) => StreamState::Streaming,
            (state, _) => state,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StreamState::Closed(_))
    }
}

/// Counters for one streaming run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: u64,
    pub detections: u64,
    pub end: StreamEnd,
}

/// `dir/name.ext` → `dir/name_output.ext`; `default_ext` is used when the input has none
pub fn derive_output_path(input: &Path, default_ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| default_ext.to_string());

    input.with_file_name(format!("{}_output.{}", stem, ext))
}

/// Detect, annotate and forward frames until the source runs dry or the sink cancels
pub fn run_stream<D, S, K>(
    detector: &D,
    source: &mut S,
    sink: &mut K,
    confidence_threshold: f32,
) -> Result<StreamSummary, VisionError>
where
    D: ObjectDetector + ?Sized,
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let mut state = StreamState::Opening.next(StreamEvent::Opened);
    let mut frames = 0u64;
    let mut detections = 0u64;

    while !state.is_closed() {
        let Some(frame) = source.read_frame() else {
            state = state.next(StreamEvent::EndOfStream);
            continue;
        };
        state = state.next(StreamEvent::FrameRead);
        frames += 1;

        let result = detector.detect(&frame, confidence_threshold)?;
        detections += result.len() as u64;
        debug!("Frame {}: {} detections", frames, result.len());

        let annotated = annotate(&frame, &result);
        if sink.write_frame(&annotated)? == SinkStatus::Cancelled {
            state = state.next(StreamEvent::Cancelled);
        }
    }

    let end = match state {
        StreamState::Closed(end) => end,
        _ => StreamEnd::EndOfStream,
    };

    Ok(StreamSummary {
        frames,
        detections,
        end,
    })
}

/// Run detection on a single image and save the annotated copy.
///
/// Returns the path written. Nothing is written if the image cannot be decoded.
pub fn infer_image<D: ObjectDetector + ?Sized>(
    detector: &D,
    image_path: &Path,
    confidence_threshold: f32,
    output_path: Option<&Path>,
) -> Result<PathBuf, VisionError> {
    let image = ImageReader::open(image_path)
        .map_err(|_| VisionError::source_not_found(image_path.display()))?
        .with_guessed_format()
        .map_err(|_| VisionError::source_not_found(image_path.display()))?
        .decode()
        .map_err(|e| {
            debug!("Failed to decode {}: {}", image_path.display(), e);
            VisionError::source_not_found(image_path.display())
        })?
        .to_rgb8();

    let result = detector.detect(&image, confidence_threshold)?;
    info!("{} detections in {}", result.len(), image_path.display());
    for detection in &result.detections {
        debug!(
            "  {} ({:.2}) at ({:.0}, {:.0})",
            detection.label, detection.confidence, detection.bbox.x, detection.bbox.y
        );
    }

    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_output_path(image_path, "png"));

    annotate(&image, &result)
        .save(&output_path)
        .map_err(|e| VisionError::Output {
            path: output_path.clone(),
            reason: e.to_string(),
        })?;

    info!("Image predict completed. Results saved to {}", output_path.display());
    Ok(output_path)
}

/// Run detection on every frame of a video and encode the annotated frames
/// at a fixed frame rate
pub fn infer_video<D: ObjectDetector + ?Sized>(
    detector: &D,
    video_path: &Path,
    confidence_threshold: f32,
    output_path: Option<&Path>,
) -> Result<(PathBuf, StreamSummary), VisionError> {
    let mut reader = VideoReader::open(video_path)?;
    let stream = reader.info();

    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_output_path(video_path, "mp4"));
    let mut writer = VideoWriter::create(&output_path, (stream.width, stream.height), OUTPUT_FPS)?;

    let summary = run_stream(detector, &mut reader, &mut writer, confidence_threshold)?;
    drop(reader);
    let output_path = writer.finish()?;

    info!(
        "Video predict completed. {} frames processed. Results saved to {}",
        summary.frames,
        output_path.display()
    );
    Ok((output_path, summary))
}

/// Run detection on a live camera feed and show it until the user quits
/// (`q` in the window) or the device stops producing frames
pub fn infer_webcam<D: ObjectDetector + ?Sized>(
    detector: &D,
    device_index: u32,
    confidence_threshold: f32,
) -> Result<StreamSummary, VisionError> {
    let mut camera = CameraCapture::open(device_index, WEBCAM_FRAME_SIZE)?;
    let mut window = DisplayWindow::open(WEBCAM_WINDOW_TITLE, WEBCAM_FRAME_SIZE)?;

    let summary = run_stream(detector, &mut camera, &mut window, confidence_threshold)?;

    match summary.end {
        StreamEnd::Cancelled => info!("Exiting webcam inference..."),
        StreamEnd::EndOfStream => info!("Camera {} stopped producing frames", device_index),
    }
    Ok(summary)
}
