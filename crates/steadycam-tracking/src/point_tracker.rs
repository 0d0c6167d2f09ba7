//! Pyramidal Lucas-Kanade point tracker.

use crate::pyramid::{compute_gradients, GrayImage, ImagePyramid};
use glam::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Optical flow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    /// Side of the square integration window, in pixels. Must be odd.
    pub window_size: u32,
    /// Number of pyramid levels, including the full-resolution one.
    pub pyramid_levels: u32,
    /// Gauss-Newton iterations per level.
    pub max_iterations: u32,
    /// Stop iterating once the update is shorter than this, in pixels.
    pub epsilon: f32,
    /// Minimum mean eigenvalue of the window's gradient matrix.
    pub min_eigen_threshold: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            window_size: 21,
            pyramid_levels: 4,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen_threshold: 1e-6,
        }
    }
}

/// Outcome of tracking one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Tracked,
    /// The window had too little texture to solve for motion.
    Lost,
    /// The point left the image.
    OutOfBounds,
}

/// A point correspondence between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    pub from: Vec2,
    pub to: Vec2,
    pub status: TrackStatus,
    /// Mean absolute intensity difference over the window, in [0, 1].
    pub error: f32,
}

impl TrackedPoint {
    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.status == TrackStatus::Tracked
    }

    fn failed(from: Vec2, to: Vec2, status: TrackStatus) -> Self {
        Self {
            from,
            to,
            status,
            error: f32::INFINITY,
        }
    }
}

/// Template pixel of the integration window.
struct WindowSample {
    offset: Vec2,
    value: f32,
    ix: f32,
    iy: f32,
}

/// Lucas-Kanade optical flow point tracker with pyramidal support.
#[derive(Debug, Clone, Default)]
pub struct PointTracker {
    pub params: FlowParams,
}

impl PointTracker {
    pub fn new(params: FlowParams) -> Self {
        Self { params }
    }

    /// Track `points` from `prev` into `curr`, building the pyramids internally.
    pub fn track_frame(&self, prev: &GrayImage, curr: &GrayImage, points: &[Vec2]) -> Vec<TrackedPoint> {
        let prev_pyr = ImagePyramid::build(prev, self.params.pyramid_levels);
        let curr_pyr = ImagePyramid::build(curr, self.params.pyramid_levels);
        self.track(&prev_pyr, &curr_pyr, points)
    }

    /// Track `points` between two prebuilt pyramids.
    ///
    /// Returns one entry per input point, in input order.
    pub fn track(
        &self,
        prev_pyr: &ImagePyramid,
        curr_pyr: &ImagePyramid,
        points: &[Vec2],
    ) -> Vec<TrackedPoint> {
        let levels = prev_pyr.num_levels().min(curr_pyr.num_levels());
        let gradients: Vec<(GrayImage, GrayImage)> = prev_pyr.levels[..levels]
            .par_iter()
            .map(compute_gradients)
            .collect();

        points
            .par_iter()
            .map(|&p| self.track_point(prev_pyr, curr_pyr, &gradients, p))
            .collect()
    }

    fn track_point(
        &self,
        prev_pyr: &ImagePyramid,
        curr_pyr: &ImagePyramid,
        gradients: &[(GrayImage, GrayImage)],
        from: Vec2,
    ) -> TrackedPoint {
        let half = (self.params.window_size / 2) as i32;
        let area = ((2 * half + 1) * (2 * half + 1)) as f32;
        let eps_sq = self.params.epsilon * self.params.epsilon;

        let mut d = Vec2::ZERO;
        let mut window: Vec<WindowSample> = Vec::with_capacity(area as usize);

        for level in (0..gradients.len()).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let p = from * scale;
            let prev_img = &prev_pyr.levels[level];
            let curr_img = &curr_pyr.levels[level];
            let (gx, gy) = &gradients[level];

            window.clear();
            let (mut g11, mut g12, mut g22) = (0.0f32, 0.0f32, 0.0f32);
            for wy in -half..=half {
                for wx in -half..=half {
                    let o = Vec2::new(wx as f32, wy as f32);
                    let q = p + o;
                    let ix = gx.sample(q.x, q.y);
                    let iy = gy.sample(q.x, q.y);
                    g11 += ix * ix;
                    g12 += ix * iy;
                    g22 += iy * iy;
                    window.push(WindowSample {
                        offset: o,
                        value: prev_img.sample(q.x, q.y),
                        ix,
                        iy,
                    });
                }
            }

            let det = g11 * g22 - g12 * g12;
            let min_eig =
                0.5 * (g11 + g22 - ((g11 - g22) * (g11 - g22) + 4.0 * g12 * g12).sqrt()) / area;
            if min_eig < self.params.min_eigen_threshold || det.abs() < f32::EPSILON {
                if level == 0 {
                    return TrackedPoint::failed(from, from + d, TrackStatus::Lost);
                }
                d *= 2.0;
                continue;
            }
            let inv_det = 1.0 / det;

            for _ in 0..self.params.max_iterations {
                let q = p + d;
                let (mut bx, mut by) = (0.0f32, 0.0f32);
                for s in &window {
                    let diff = s.value - curr_img.sample(q.x + s.offset.x, q.y + s.offset.y);
                    bx += diff * s.ix;
                    by += diff * s.iy;
                }
                let delta = Vec2::new(
                    inv_det * (g22 * bx - g12 * by),
                    inv_det * (g11 * by - g12 * bx),
                );
                d += delta;
                if !d.is_finite() {
                    return TrackedPoint::failed(from, from, TrackStatus::Lost);
                }
                if delta.length_squared() < eps_sq {
                    break;
                }
            }

            if level > 0 {
                d *= 2.0;
            }
        }

        let to = from + d;
        let prev_img = &prev_pyr.levels[0];
        let curr_img = &curr_pyr.levels[0];
        if !curr_img.contains(to.x, to.y) {
            return TrackedPoint::failed(from, to, TrackStatus::OutOfBounds);
        }

        let error = window
            .iter()
            .map(|s| {
                let o = s.offset;
                (prev_img.sample(from.x + o.x, from.y + o.y) - curr_img.sample(to.x + o.x, to.y + o.y))
                    .abs()
            })
            .sum::<f32>()
            / window.len().max(1) as f32;

        TrackedPoint {
            from,
            to,
            status: TrackStatus::Tracked,
            error,
        }
    }
}
