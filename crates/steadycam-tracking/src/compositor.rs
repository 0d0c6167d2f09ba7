//! Warp, border crop and resize of the stabilized frame.
//!
//! Warping leaves undefined (black) pixels along the frame edges. A fixed
//! border is cropped from every side and the remainder scaled back up to the
//! input size, trading a slight zoom for clean edges.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use steadycam_core::{FrameBuffer, Result, RigidTransform, SteadyError};

/// Compositor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorParams {
    /// Pixels cropped from the left and right edges. The top/bottom crop is
    /// derived from this and the aspect ratio.
    pub horizontal_border_crop: u32,
}

impl CompositorParams {
    /// Largest accepted `horizontal_border_crop`.
    pub const MAX_BORDER_CROP: u32 = 1 << 15;

    pub fn validate(&self) -> Result<()> {
        if self.horizontal_border_crop > Self::MAX_BORDER_CROP {
            return Err(SteadyError::InvalidParameter(format!(
                "horizontal_border_crop must be at most {}, got {}",
                Self::MAX_BORDER_CROP,
                self.horizontal_border_crop
            )));
        }
        Ok(())
    }
}

impl Default for CompositorParams {
    fn default() -> Self {
        Self {
            horizontal_border_crop: 20,
        }
    }
}

/// Pixels removed from each side of the warped frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderCrop {
    pub horizontal: u32,
    pub vertical: u32,
}

impl BorderCrop {
    /// `vertical = horizontal * height / width`, using integer division.
    pub fn for_frame(horizontal: u32, width: u32, height: u32) -> Self {
        let vertical = if width == 0 {
            0
        } else {
            let v = horizontal as u64 * height as u64 / width as u64;
            u32::try_from(v).unwrap_or(u32::MAX)
        };
        Self {
            horizontal,
            vertical,
        }
    }

    /// Reject frames the crop would leave empty.
    pub fn check(&self, width: u32, height: u32) -> Result<()> {
        let min_width = self.horizontal.saturating_mul(2).saturating_add(1);
        let min_height = self.vertical.saturating_mul(2).saturating_add(1);
        if width < min_width || height < min_height {
            return Err(SteadyError::FrameTooSmall {
                width,
                height,
                min_width,
                min_height,
            });
        }
        Ok(())
    }
}

/// Applies the corrective transform to the previous color frame.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    pub params: CompositorParams,
}

impl Compositor {
    pub fn new(params: CompositorParams) -> Self {
        Self { params }
    }

    pub fn border_crop(&self, width: u32, height: u32) -> BorderCrop {
        BorderCrop::for_frame(self.params.horizontal_border_crop, width, height)
    }

    /// Warp `prev` by `transform`, crop the border and resize back to the
    /// size of `prev`.
    pub fn composite(&self, prev: &FrameBuffer, transform: &RigidTransform) -> Result<FrameBuffer> {
        let (w, h) = prev.dimensions();
        let crop = self.border_crop(w, h);
        crop.check(w, h)?;
        let warped = warp_affine(prev, transform);
        Ok(crop_resize(&warped, crop, w, h))
    }
}

/// Warp `src` by a forward transform onto a canvas of the same size.
///
/// Each output pixel samples the source at the inverse-mapped position with
/// bilinear interpolation; taps outside the source read as black.
pub fn warp_affine(src: &FrameBuffer, transform: &RigidTransform) -> FrameBuffer {
    let (w, h) = src.dimensions();
    let mut out = FrameBuffer::new(w, h, src.format);
    if w == 0 || h == 0 {
        return out;
    }
    let inv = transform.inverse().rows();
    let stride = out.stride();

    out.data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let yf = y as f64;
            for x in 0..w as usize {
                let xf = x as f64;
                let sx = inv[0][0] * xf + inv[0][1] * yf + inv[0][2];
                let sy = inv[1][0] * xf + inv[1][1] * yf + inv[1][2];
                let px = sample_constant(src, sx, sy);
                row[x * 3..x * 3 + 3].copy_from_slice(&px);
            }
        });
    out
}

/// Crop `crop` from every side of `src` and resize the rest to `out_w` x `out_h`.
///
/// Bilinear with pixel-center alignment; edge pixels of the cropped region
/// are replicated.
pub fn crop_resize(src: &FrameBuffer, crop: BorderCrop, out_w: u32, out_h: u32) -> FrameBuffer {
    let mut out = FrameBuffer::new(out_w, out_h, src.format);
    let x0 = crop.horizontal as f64;
    let y0 = crop.vertical as f64;
    let cw = src.width.saturating_sub(crop.horizontal.saturating_mul(2));
    let ch = src.height.saturating_sub(crop.vertical.saturating_mul(2));
    if cw == 0 || ch == 0 || out_w == 0 || out_h == 0 {
        return out;
    }
    let sx_scale = cw as f64 / out_w as f64;
    let sy_scale = ch as f64 / out_h as f64;
    let (max_x, max_y) = ((cw - 1) as f64, (ch - 1) as f64);
    let stride = out.stride();

    out.data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = ((y as f64 + 0.5) * sy_scale - 0.5).clamp(0.0, max_y) + y0;
            for x in 0..out_w as usize {
                let sx = ((x as f64 + 0.5) * sx_scale - 0.5).clamp(0.0, max_x) + x0;
                let px = sample_bilinear(src, sx, sy);
                row[x * 3..x * 3 + 3].copy_from_slice(&px);
            }
        });
    out
}

/// Bilinear sample treating everything outside the frame as black.
fn sample_constant(src: &FrameBuffer, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (src.width as i64, src.height as i64);
    let x0f = x.floor();
    let y0f = y.floor();
    let (x0, y0) = (x0f as i64, y0f as i64);
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return [0, 0, 0];
    }
    let fx = x - x0f;
    let fy = y - y0f;
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 3];
    for (tx, ty, weight) in taps {
        if tx < 0 || ty < 0 || tx >= w || ty >= h || weight == 0.0 {
            continue;
        }
        let px = src.pixel(tx as u32, ty as u32);
        for (a, v) in acc.iter_mut().zip(px) {
            *a += v as f64 * weight;
        }
    }
    acc.map(to_u8)
}

/// Bilinear sample at an in-bounds position.
fn sample_bilinear(src: &FrameBuffer, x: f64, y: f64) -> [u8; 3] {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let (p00, p10) = (src.pixel(x0, y0), src.pixel(x1, y0));
    let (p01, p11) = (src.pixel(x0, y1), src.pixel(x1, y1));
    std::array::from_fn(|c| {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        to_u8(top * (1.0 - fy) + bottom * fy)
    })
}

#[inline]
fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
