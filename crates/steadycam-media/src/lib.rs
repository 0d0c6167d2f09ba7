//! SteadyCam Media - FFmpeg integration for frame-by-frame video transforms
//!
//! This crate handles:
//! - Decoding a video file into packed RGB frames
//! - Re-encoding processed frames to H.264
//! - Driving a per-frame callback between the two

pub mod decoder;
pub mod encoder;
pub mod transform;

pub use decoder::{VideoDecoder, VideoFrame};
pub use encoder::{EncoderSettings, VideoEncoder};
pub use transform::{transform_video, TransformSummary};
