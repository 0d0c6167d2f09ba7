//! SteadyCam Core - Foundation types for video stabilization
//!
//! This crate provides the fundamental types used throughout SteadyCam:
//! - Color frame buffers exchanged with the decode/encode pipeline
//! - Poses (translation + rotation) and rigid 2D transforms
//! - The shared error type

pub mod error;
pub mod frame;
pub mod geometry;

pub use error::{Result, SteadyError};
pub use frame::{FrameBuffer, PixelFormat};
pub use geometry::{Pose, RigidTransform};
