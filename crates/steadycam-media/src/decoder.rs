//! Video decoder using FFmpeg via ffmpeg-sidecar.

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use ffmpeg_sidecar::iter::FfmpegIterator;
use std::path::Path;
use steadycam_core::{FrameBuffer, PixelFormat, Result, SteadyError};
use tracing::{debug, info, warn};

/// A decoded video frame.
pub struct VideoFrame {
    /// Packed 3-channel pixels.
    pub buffer: FrameBuffer,
    /// Zero-based position in the stream.
    pub frame_number: u64,
}

/// Decodes a video file into packed frames, one at a time.
///
/// FFmpeg runs as a child process writing raw video to a pipe, so no FFmpeg
/// development headers are needed. Audio is ignored.
pub struct VideoDecoder {
    format: PixelFormat,
    child: FfmpegChild,
    events: FfmpegIterator,
    decoded: u64,
    frame_rate: Option<f64>,
}

impl VideoDecoder {
    /// Open a video file for decoding into `format`.
    pub fn open<P: AsRef<Path>>(path: P, format: PixelFormat) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SteadyError::Media(format!(
                "File not found: {}",
                path.display()
            )));
        }
        info!("Opening video file: {}", path.display());

        let mut child = FfmpegCommand::new()
            .hide_banner()
            .input(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", format.ffmpeg_name()])
            .output("-")
            .spawn()
            .map_err(|e| SteadyError::Media(format!("Failed to spawn ffmpeg: {e}")))?;
        let events = child
            .iter()
            .map_err(|e| SteadyError::Media(format!("Failed to read ffmpeg output: {e}")))?;

        Ok(Self {
            format,
            child,
            events,
            decoded: 0,
            frame_rate: None,
        })
    }

    /// Frame rate of the input video stream, once FFmpeg has reported it.
    ///
    /// Known by the time the first frame has been returned.
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// Wait for the FFmpeg process to exit after the last frame.
    pub fn wait(&mut self) -> Result<()> {
        let status = self.child.wait()?;
        if !status.success() {
            return Err(SteadyError::Media(format!(
                "ffmpeg decoder exited with status: {status}"
            )));
        }
        info!(frames = self.decoded, "Decoding finished");
        Ok(())
    }
}

impl Iterator for VideoDecoder {
    type Item = Result<VideoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        for event in self.events.by_ref() {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    let frame_number = self.decoded;
                    self.decoded += 1;
                    return Some(
                        FrameBuffer::from_raw(frame.width, frame.height, self.format, frame.data)
                            .map(|buffer| VideoFrame {
                                buffer,
                                frame_number,
                            }),
                    );
                }
                FfmpegEvent::ParsedInputStream(stream) if self.frame_rate.is_none() => {
                    if let Some(video) = stream.video_data() {
                        self.frame_rate = source_fps(video.fps);
                        debug!(fps = ?self.frame_rate, "Input stream parsed");
                    }
                }
                FfmpegEvent::Error(msg) => warn!("ffmpeg: {}", msg),
                _ => {}
            }
        }
        None
    }
}

/// A usable frame rate from FFmpeg's stream report.
fn source_fps(fps: f32) -> Option<f64> {
    let fps = f64::from(fps);
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        // No-op when the process already exited.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
