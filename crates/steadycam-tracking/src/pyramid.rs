//! Grayscale images and pyramids for multi-scale tracking.

use steadycam_core::FrameBuffer;

/// A grayscale image stored as f32 values [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut img = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.data[(y * width + x) as usize] = f(x, y);
            }
        }
        img
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel value with coordinates clamped to the border.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Bilinear sample at a sub-pixel position, replicating the border.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as i32, y0 as i32);

        let top = self.get(xi, yi) * (1.0 - fx) + self.get(xi + 1, yi) * fx;
        let bottom = self.get(xi, yi + 1) * (1.0 - fx) + self.get(xi + 1, yi + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Whether a sub-pixel position lies inside the image.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= (self.width - 1) as f32 && y <= (self.height - 1) as f32
    }
}

/// Smallest side a pyramid level may have.
const MIN_LEVEL_SIZE: u32 = 8;

/// Multi-scale image pyramid.
pub struct ImagePyramid {
    pub levels: Vec<GrayImage>,
}

impl ImagePyramid {
    /// Build up to `num_levels` levels by 2x2 box downsampling.
    ///
    /// Fewer levels are produced when the image gets too small to halve.
    pub fn build(gray: &GrayImage, num_levels: u32) -> Self {
        let mut levels = vec![gray.clone()];
        for _ in 1..num_levels {
            let Some(prev) = levels.last() else { break };
            let nw = prev.width.div_ceil(2);
            let nh = prev.height.div_ceil(2);
            if nw < MIN_LEVEL_SIZE || nh < MIN_LEVEL_SIZE {
                break;
            }
            let mut level = GrayImage::new(nw, nh);
            for y in 0..nh {
                for x in 0..nw {
                    let sx = (x * 2) as i32;
                    let sy = (y * 2) as i32;
                    let avg = (prev.get(sx, sy)
                        + prev.get(sx + 1, sy)
                        + prev.get(sx, sy + 1)
                        + prev.get(sx + 1, sy + 1))
                        * 0.25;
                    level.set(x, y, avg);
                }
            }
            levels.push(level);
        }
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Convert a packed 3-channel frame to a grayscale image.
pub fn frame_to_gray(frame: &FrameBuffer) -> GrayImage {
    let [w0, w1, w2] = frame.format.luma_weights();
    let mut gray = GrayImage::new(frame.width, frame.height);
    for (dst, px) in gray.data.iter_mut().zip(frame.data.chunks_exact(3)) {
        *dst = (w0 * px[0] as f32 + w1 * px[1] as f32 + w2 * px[2] as f32) / 255.0;
    }
    gray
}

/// Compute spatial gradients (Ix, Iy) using central differences.
pub fn compute_gradients(img: &GrayImage) -> (GrayImage, GrayImage) {
    let mut ix = GrayImage::new(img.width, img.height);
    let mut iy = GrayImage::new(img.width, img.height);
    for y in 0..img.height as i32 {
        for x in 0..img.width as i32 {
            let idx = (y as u32 * img.width + x as u32) as usize;
            ix.data[idx] = (img.get(x + 1, y) - img.get(x - 1, y)) * 0.5;
            iy.data[idx] = (img.get(x, y + 1) - img.get(x, y - 1)) * 0.5;
        }
    }
    (ix, iy)
}
