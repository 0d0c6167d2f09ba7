//! Decode, transform and re-encode a whole video.

use crate::decoder::{VideoDecoder, VideoFrame};
use crate::encoder::{EncoderSettings, VideoEncoder};
use std::path::Path;
use steadycam_core::{FrameBuffer, PixelFormat, Result, SteadyError};
use tracing::info;

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSummary {
    pub frames: u64,
    pub width: u32,
    pub height: u32,
}

/// Decode `input`, pass every frame through `callback` in stream order and
/// encode the (possibly replaced) frames into `output`.
///
/// The callback receives the zero-based frame index. Unless `settings` fixes
/// a frame rate, the output keeps the frame rate of the input. An error from the
/// callback aborts the run and discards the partial output stream.
pub fn transform_video<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    settings: &EncoderSettings,
    mut callback: F,
) -> Result<TransformSummary>
where
    F: FnMut(u64, &mut FrameBuffer) -> Result<()>,
{
    settings.validate()?;
    let format = PixelFormat::Rgb8;
    let mut decoder = VideoDecoder::open(input.as_ref(), format)?;

    let Some(first) = decoder.next().transpose()? else {
        return Err(SteadyError::Media(format!(
            "No video frames in {}",
            input.as_ref().display()
        )));
    };
    let (width, height) = first.buffer.dimensions();
    let settings = settings.with_source_rate(decoder.frame_rate());
    let mut encoder = VideoEncoder::spawn(output, &settings, width, height, format)?;

    for frame in std::iter::once(Ok(first)).chain(decoder.by_ref()) {
        let VideoFrame {
            mut buffer,
            frame_number,
        } = frame?;
        callback(frame_number, &mut buffer)?;
        encoder.write_frame(&buffer)?;
    }

    let frames = encoder.finish()?;
    decoder.wait()?;
    info!(frames, width, height, "Video transformed");
    Ok(TransformSummary {
        frames,
        width,
        height,
    })
}
