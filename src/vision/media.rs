//! Frame sources and sinks backed by the `ffmpeg` command line tools.
//!
//! Decoding and encoding happen in child processes exchanging raw `rgb24`
//! frames over pipes. Every wrapper owns its child and reaps it on drop.

use image::RgbImage;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

use super::error::VisionError;

/// Producer of frames. `None` means the stream is over.
///
/// A frame that cannot be decoded also yields `None`: callers cannot tell a
/// corrupt frame from the end of the stream.
pub trait FrameSource {
    fn read_frame(&mut self) -> Option<RgbImage>;
}

/// Whether a sink wants more frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Continue,
    /// The consumer went away, e.g. the user closed the display window
    Cancelled,
}

/// Consumer of annotated frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<SinkStatus, VisionError>;
}

/// Coded frame size reported by `ffprobe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    /// Parse `width,height` as printed by
    /// `ffprobe -show_entries stream=width,height -of csv=p=0`
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(',');
        let width = fields.next()?.trim().parse().ok()?;
        let height = fields.next()?.trim().parse().ok()?;

        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Bytes in one `rgb24` frame
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Query the first video stream of `path`
pub fn probe(path: &Path) -> Result<StreamInfo, VisionError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height"])
        .args(["-of", "csv=p=0"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            warn!("Failed to run ffprobe: {}", e);
            VisionError::source_not_found(path.display())
        })?;

    if !output.status.success() {
        return Err(VisionError::source_not_found(path.display()));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(StreamInfo::parse)
        .ok_or_else(|| VisionError::source_not_found(path.display()))
}

/// Reads fixed-size raw frames from a decoder's stdout
struct RawFrameReader {
    child: Child,
    stdout: ChildStdout,
    info: StreamInfo,
    frames_read: u64,
}

impl RawFrameReader {
    fn spawn(mut cmd: Command, info: StreamInfo) -> Result<Self, VisionError> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VisionError::Inference("decoder stdout not captured".to_string()));
            }
        };

        Ok(Self {
            child,
            stdout,
            info,
            frames_read: 0,
        })
    }

    fn read_frame(&mut self) -> Option<RgbImage> {
        let mut buf = vec![0u8; self.info.frame_len()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {
                self.frames_read += 1;
                RgbImage::from_raw(self.info.width, self.info.height, buf)
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("End of stream after {} frames", self.frames_read);
                None
            }
            Err(e) => {
                debug!("Frame {} unreadable, ending stream: {}", self.frames_read + 1, e);
                None
            }
        }
    }
}

impl Drop for RawFrameReader {
    fn drop(&mut self) {
        // The decoder may still be running if the consumer stopped early
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Decode the first video stream of `path` to raw frames on stdout.
///
/// Rotation metadata is ignored so frames keep the coded size `probe` reports.
fn decoder_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-noautorotate", "-i"])
        .arg(path)
        .args(["-map", "0:v:0"])
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);
    cmd
}

/// Frames of a video file, decoded by `ffmpeg`
pub struct VideoReader {
    reader: RawFrameReader,
    info: StreamInfo,
}

impl VideoReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VisionError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VisionError::source_not_found(path.display()));
        }

        let info = probe(path)?;
        let reader = RawFrameReader::spawn(decoder_command(path), info)?;
        debug!("Opened {} ({}x{})", path.display(), info.width, info.height);

        Ok(Self { reader, info })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }
}

impl FrameSource for VideoReader {
    fn read_frame(&mut self) -> Option<RgbImage> {
        self.reader.read_frame()
    }
}

/// Live frames from a camera device
pub struct CameraCapture {
    reader: RawFrameReader,
}

impl CameraCapture {
    /// Open camera `device_index`, scaling frames to `size` (width, height)
    pub fn open(device_index: u32, size: (u32, u32)) -> Result<Self, VisionError> {
        let (width, height) = size;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        add_camera_input(&mut cmd, device_index)?;
        cmd.args(["-vf", &format!("scale={}:{}", width, height)])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);

        let reader = RawFrameReader::spawn(cmd, StreamInfo { width, height })?;
        debug!("Opened camera {} at {}x{}", device_index, width, height);

        Ok(Self { reader })
    }
}

impl FrameSource for CameraCapture {
    fn read_frame(&mut self) -> Option<RgbImage> {
        self.reader.read_frame()
    }
}

#[cfg(target_os = "linux")]
fn add_camera_input(cmd: &mut Command, device_index: u32) -> Result<(), VisionError> {
    let device = format!("/dev/video{}", device_index);
    if !Path::new(&device).exists() {
        return Err(VisionError::source_not_found(device));
    }
    cmd.args(["-f", "video4linux2", "-i", &device]);
    Ok(())
}

#[cfg(target_os = "macos")]
fn add_camera_input(cmd: &mut Command, device_index: u32) -> Result<(), VisionError> {
    cmd.args(["-f", "avfoundation", "-framerate", "30", "-i", &device_index.to_string()]);
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn add_camera_input(_cmd: &mut Command, device_index: u32) -> Result<(), VisionError> {
    Err(VisionError::source_not_found(format!("camera {}", device_index)))
}

/// Feeds raw frames into an encoder or player's stdin
struct RawFrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl RawFrameWriter {
    fn spawn(mut cmd: Command, width: u32, height: u32) -> Result<Self, VisionError> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take();

        Ok(Self {
            child,
            stdin,
            width,
            height,
            frames_written: 0,
        })
    }

    fn write(&mut self, frame: &RgbImage) -> std::io::Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "frame is {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            ));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "stdin closed"))?;
        stdin.write_all(frame.as_raw())?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close stdin and wait for the child to exit
    fn close(&mut self) -> std::io::Result<std::process::ExitStatus> {
        drop(self.stdin.take());
        self.child.wait()
    }
}

impl Drop for RawFrameWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Frame rate of written videos
pub const OUTPUT_FPS: u32 = 20;

/// Encodes frames into a video file with `ffmpeg` (MPEG-4 Part 2, `mp4v`)
pub struct VideoWriter {
    writer: RawFrameWriter,
    path: PathBuf,
}

impl VideoWriter {
    pub fn create<P: AsRef<Path>>(
        path: P,
        size: (u32, u32),
        fps: u32,
    ) -> Result<Self, VisionError> {
        let path = path.as_ref().to_path_buf();
        let (width, height) = size;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &fps.to_string()])
            .args(["-i", "-"])
            // yuv420p needs even dimensions
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", "mpeg4", "-q:v", "5", "-pix_fmt", "yuv420p"])
            .arg(&path);

        let writer = RawFrameWriter::spawn(cmd, width, height).map_err(|e| VisionError::Output {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { writer, path })
    }

    /// Flush the encoder and finalize the container
    pub fn finish(mut self) -> Result<PathBuf, VisionError> {
        let status = self.writer.close()?;

        if encoder_failed(status.success(), self.writer.frames_written) {
            return Err(VisionError::Output {
                path: self.path.clone(),
                reason: format!("encoder exited with {}", status),
            });
        }

        Ok(self.path.clone())
    }
}

/// An encoder fed zero frames exits non-zero; the empty output is expected
fn encoder_failed(exit_success: bool, frames_written: u64) -> bool {
    !exit_success && frames_written > 0
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<SinkStatus, VisionError> {
        self.writer.write(frame).map_err(|e| VisionError::Output {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(SinkStatus::Continue)
    }
}

/// Interactive window showing frames through `ffplay`.
///
/// Pressing `q` or `Esc` in the window (or closing it) ends the player;
/// the next write then reports [`SinkStatus::Cancelled`].
pub struct DisplayWindow {
    writer: RawFrameWriter,
}

impl DisplayWindow {
    pub fn open(title: &str, size: (u32, u32)) -> Result<Self, VisionError> {
        let (width, height) = size;

        let mut cmd = Command::new("ffplay");
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(["-window_title", title])
            .args(["-fflags", "nobuffer"])
            .args(["-f", "rawvideo", "-pixel_format", "rgb24"])
            .args(["-video_size", &format!("{}x{}", width, height)])
            .args(["-i", "-"]);

        let writer = RawFrameWriter::spawn(cmd, width, height)?;
        Ok(Self { writer })
    }
}

impl FrameSink for DisplayWindow {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<SinkStatus, VisionError> {
        if let Ok(Some(status)) = self.writer.child.try_wait() {
            debug!("Display closed ({})", status);
            return Ok(SinkStatus::Cancelled);
        }

        display_status(self.writer.write(frame))
    }
}

/// A player that stopped reading means the user closed it
fn display_status(written: std::io::Result<()>) -> Result<SinkStatus, VisionError> {
    match written {
        Ok(()) => Ok(SinkStatus::Continue),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(SinkStatus::Cancelled),
        Err(e) => Err(VisionError::Io(e)),
    }
}

impl Drop for DisplayWindow {
    fn drop(&mut self) {
        // ffplay keeps showing the last frame after stdin closes
        let _ = self.writer.child.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_info() {
        let info = StreamInfo::parse("1920,1080\n").unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.frame_len(), 1920 * 1080 * 3);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_frame_len_does_not_overflow_u32() {
        let info = StreamInfo::parse("65536,32768").unwrap();
        assert_eq!(info.frame_len(), 65536 * 32768 * 3);
    }

    #[test]
    fn test_parse_stream_info_rejects_garbage() {
        assert!(StreamInfo::parse("").is_none());
        assert!(StreamInfo::parse("N/A,N/A").is_none());
        assert!(StreamInfo::parse("0,480").is_none());
    }

    #[test]
    fn test_decoder_keeps_coded_orientation() {
        let cmd = decoder_command(Path::new("clip.mov"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], "clip.mov");
        assert_eq!(args[pos("-map") + 1], "0:v:0");
        assert!(pos("-map") > pos("-i"));
    }

    #[test]
    fn test_encoder_exit_tolerated_without_frames() {
        assert!(!encoder_failed(true, 0));
        assert!(!encoder_failed(false, 0));
        assert!(!encoder_failed(true, 12));
        assert!(encoder_failed(false, 12));
    }

    #[test]
    fn test_display_write_errors() {
        assert_eq!(display_status(Ok(())).unwrap(), SinkStatus::Continue);

        let closed = std::io::Error::new(ErrorKind::BrokenPipe, "player gone");
        assert_eq!(display_status(Err(closed)).unwrap(), SinkStatus::Cancelled);

        let other = std::io::Error::new(ErrorKind::InvalidInput, "bad frame");
        assert!(matches!(display_status(Err(other)), Err(VisionError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_display_cancelled_once_player_exits() -> Result<(), VisionError> {
        let mut window = DisplayWindow {
            writer: RawFrameWriter::spawn(Command::new("true"), 4, 4)?,
        };
        window.writer.child.wait()?;

        let status = window.write_frame(&RgbImage::new(4, 4))?;
        assert_eq!(status, SinkStatus::Cancelled);
        Ok(())
    }

    #[test]
    fn test_video_reader_missing_file() {
        let err = VideoReader::open("/definitely/not/here.mp4").err().unwrap();
        assert!(matches!(err, VisionError::SourceNotFound { .. }));
    }
}
