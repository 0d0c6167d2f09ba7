//! Error types for SteadyCam.

use thiserror::Error;

/// Main error type for SteadyCam operations.
#[derive(Error, Debug)]
pub enum SteadyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Frame dimensions changed mid-stream: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Frame {width}x{height} is too small to crop, need at least {min_width}x{min_height}")]
    FrameTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for SteadyCam operations.
pub type Result<T> = std::result::Result<T, SteadyError>;
