//! Raw frame encoder feeding an FFmpeg child process over stdin.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use steadycam_core::{FrameBuffer, PixelFormat, Result, SteadyError};
use tracing::info;

/// Output encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Output frame rate. Follows the input video when `None`.
    pub fps: Option<f64>,
    /// FFmpeg encoder name.
    pub codec: String,
    /// Constant rate factor (0-51, lower = better). Encoder default when `None`.
    pub crf: Option<u32>,
    /// Pixel format of the encoded stream.
    pub output_pix_fmt: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            fps: None,
            codec: "libx264".into(),
            crf: None,
            output_pix_fmt: "yuv420p".into(),
        }
    }
}

impl EncoderSettings {
    /// Rate used when neither the settings nor the input provide one.
    pub const FALLBACK_FPS: f64 = 30.0;

    pub fn validate(&self) -> Result<()> {
        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(SteadyError::InvalidParameter(format!(
                    "fps must be positive, got {fps}"
                )));
            }
        }
        if matches!(self.crf, Some(crf) if crf > 51) {
            return Err(SteadyError::InvalidParameter("crf must be in 0-51".into()));
        }
        Ok(())
    }

    /// Fill in the frame rate from the input stream unless one is set.
    pub fn with_source_rate(&self, source_fps: Option<f64>) -> Self {
        Self {
            fps: self.fps.or(source_fps),
            ..self.clone()
        }
    }

    /// Frame rate the encoder runs at.
    pub fn frame_rate(&self) -> f64 {
        self.fps.unwrap_or(Self::FALLBACK_FPS)
    }

    /// Build the FFmpeg arguments for encoding raw `format` frames of
    /// `width` x `height` read from stdin into `output`.
    pub fn ffmpeg_args(&self, output: &Path, width: u32, height: u32, format: PixelFormat) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            format.ffmpeg_name().into(),
            "-video_size".into(),
            format!("{width}x{height}"),
            "-framerate".into(),
            self.frame_rate().to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            self.codec.clone(),
        ];
        if let Some(crf) = self.crf {
            args.extend(["-crf".into(), crf.to_string()]);
        }
        args.extend(["-pix_fmt".into(), self.output_pix_fmt.clone()]);
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

/// Streams fixed-size frames into an FFmpeg encoder.
pub struct VideoEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    format: PixelFormat,
    written: u64,
}

impl VideoEncoder {
    pub fn spawn(
        output: impl AsRef<Path>,
        settings: &EncoderSettings,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self> {
        settings.validate()?;
        let output = output.as_ref();
        let args = settings.ffmpeg_args(output, width, height, format);

        let mut child = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SteadyError::Media(format!("Failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SteadyError::Media("Failed to open ffmpeg stdin".into()))?;

        info!(
            output = %output.display(),
            width,
            height,
            fps = settings.frame_rate(),
            codec = %settings.codec,
            "Encoder started"
        );
        Ok(Self {
            child,
            stdin: Some(stdin),
            width,
            height,
            format,
            written: 0,
        })
    }

    /// Append one frame. It must match the size and layout the encoder was
    /// started with.
    pub fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(SteadyError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }
        if frame.format != self.format {
            return Err(SteadyError::InvalidFrame(format!(
                "encoder expects {:?} frames, got {:?}",
                self.format, frame.format
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SteadyError::Media("Encoder already finished".into()))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| SteadyError::Media(format!("Failed to write frame: {e}")))?;
        self.written += 1;
        Ok(())
    }

    /// Close the input stream and wait for FFmpeg to finish the file.
    pub fn finish(mut self) -> Result<u64> {
        // Closing stdin signals end-of-stream.
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| SteadyError::Media(format!("Failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(SteadyError::Media(format!(
                "ffmpeg exited with status: {status}"
            )));
        }
        info!(frames = self.written, "Encoding finished");
        Ok(self.written)
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        // Unfinished encoders are aborted.
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
