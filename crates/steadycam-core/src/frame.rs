//! Frame buffer types for decoded video frames in CPU memory.
//!
//! The stabilizer works on packed 3-channel 8-bit images, which is what the
//! decode side hands over and what the encode side expects back.

use crate::error::{Result, SteadyError};
use serde::{Deserialize, Serialize};

/// Channel order of a packed 3-channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit R, G, B (ffmpeg `rgb24`)
    #[default]
    Rgb8,
    /// 8-bit B, G, R (ffmpeg `bgr24`)
    Bgr8,
}

impl PixelFormat {
    /// Bytes per pixel. Both supported formats are packed 24-bit.
    pub const fn bytes_per_pixel(self) -> usize {
        3
    }

    /// Rec.601 luma weights in channel order.
    pub fn luma_weights(self) -> [f32; 3] {
        match self {
            Self::Rgb8 => [0.299, 0.587, 0.114],
            Self::Bgr8 => [0.114, 0.587, 0.299],
        }
    }

    /// Name of the matching ffmpeg raw pixel format.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Rgb8 => "rgb24",
            Self::Bgr8 => "bgr24",
        }
    }

    /// Total bytes for a frame of the given size.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A packed 3-channel video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Channel order
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Tightly packed pixel rows
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a black frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0u8; format.frame_size(width, height)],
        }
    }

    /// Wrap raw packed pixel data, checking its length.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(SteadyError::InvalidFrame(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// `(width, height)` of the frame.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Check that the data length agrees with the stated dimensions.
    pub fn validate(&self) -> Result<()> {
        let expected = self.format.frame_size(self.width, self.height);
        if self.data.len() != expected {
            return Err(SteadyError::InvalidFrame(format!(
                "{}x{} frame holds {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Read one pixel.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = y as usize * self.stride() + x as usize * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Write one pixel. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, px: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = y as usize * self.stride() + x as usize * 3;
            self.data[i..i + 3].copy_from_slice(&px);
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 3]; 8] = [
            [255, 255, 255], // White
            [255, 255, 0],   // Yellow
            [0, 255, 255],   // Cyan
            [0, 255, 0],     // Green
            [255, 0, 255],   // Magenta
            [255, 0, 0],     // Red
            [0, 0, 255],     // Blue
            [0, 0, 0],       // Black
        ];

        let mut frame = Self::new(width, height, PixelFormat::Rgb8);
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let bar = (x * 8 / width) as usize;
                let i = x as usize * 3;
                row[i..i + 3].copy_from_slice(&BARS[bar]);
            }
        }
        frame
    }
}
