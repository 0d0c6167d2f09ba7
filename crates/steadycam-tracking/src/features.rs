//! Shi-Tomasi corner detection ("good features to track").

use crate::pyramid::{compute_gradients, GrayImage};
use glam::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Corner detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Maximum number of corners returned, strongest first.
    pub max_corners: usize,
    /// Minimum accepted response as a fraction of the strongest response.
    pub quality_level: f32,
    /// Minimum Euclidean distance between returned corners, in pixels.
    pub min_distance: f32,
    /// Side of the window the structure tensor is summed over.
    pub block_size: u32,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_corners: 200,
            quality_level: 0.01,
            min_distance: 30.0,
            block_size: 3,
        }
    }
}

/// Minimum eigenvalue of the gradient structure tensor at every pixel.
pub fn corner_response(img: &GrayImage, block_size: u32) -> GrayImage {
    let (ix, iy) = compute_gradients(img);
    let w = img.width as usize;
    let half = (block_size / 2) as i32;

    let mut response = GrayImage::new(img.width, img.height);
    response
        .data
        .par_chunks_mut(w.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i32;
            for (x, out) in row.iter_mut().enumerate() {
                let x = x as i32;
                let mut gxx = 0.0f32;
                let mut gxy = 0.0f32;
                let mut gyy = 0.0f32;
                for by in -half..=half {
                    for bx in -half..=half {
                        let dx = ix.get(x + bx, y + by);
                        let dy = iy.get(x + bx, y + by);
                        gxx += dx * dx;
                        gxy += dx * dy;
                        gyy += dy * dy;
                    }
                }
                let tr = gxx + gyy;
                let diff = gxx - gyy;
                *out = 0.5 * (tr - (diff * diff + 4.0 * gxy * gxy).sqrt());
            }
        });
    response
}

/// Detect up to `params.max_corners` well-separated strong corners.
///
/// Candidates must exceed `quality_level` times the strongest response and be
/// a local maximum in their 3x3 neighbourhood. They are then accepted
/// strongest first, skipping any closer than `min_distance` to an accepted one.
pub fn detect_corners(img: &GrayImage, params: &FeatureParams) -> Vec<Vec2> {
    if img.width < 3 || img.height < 3 || params.max_corners == 0 {
        return Vec::new();
    }

    let response = corner_response(img, params.block_size);
    let max_response = response.data.iter().copied().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = max_response * params.quality_level;

    let mut candidates = Vec::new();
    for y in 1..(img.height as i32 - 1) {
        for x in 1..(img.width as i32 - 1) {
            let v = response.get(x, y);
            if v <= threshold {
                continue;
            }
            let is_peak = (-1..=1)
                .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                .all(|(dx, dy)| response.get(x + dx, y + dy) <= v);
            if is_peak {
                candidates.push((v, x as u32, y as u32));
            }
        }
    }

    // Strongest first; ties go to the earlier pixel so the order is stable.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then((a.2, a.1).cmp(&(b.2, b.1))));

    let mut grid = SpatialGrid::new(img.width, img.height, params.min_distance);
    let mut corners = Vec::with_capacity(params.max_corners.min(candidates.len()));
    for (_, x, y) in candidates {
        let p = Vec2::new(x as f32, y as f32);
        if grid.try_insert(p) {
            corners.push(p);
            if corners.len() >= params.max_corners {
                break;
            }
        }
    }
    corners
}

/// Bucket grid for minimum-distance checks.
struct SpatialGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Vec2>>,
}

impl SpatialGrid {
    fn new(width: u32, height: u32, min_distance: f32) -> Self {
        let cell = min_distance.max(1.0);
        let cols = (width as f32 / cell).ceil() as usize + 1;
        let rows = (height as f32 / cell).ceil() as usize + 1;
        Self {
            cell,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    /// Insert `p` unless an existing point lies strictly within `cell` of it.
    fn try_insert(&mut self, p: Vec2) -> bool {
        let cx = (p.x / self.cell) as usize;
        let cy = (p.y / self.cell) as usize;
        let min_sq = self.cell * self.cell;

        for gy in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for gx in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                if self.cells[gy * self.cols + gx]
                    .iter()
                    .any(|q| q.distance_squared(p) < min_sq)
                {
                    return false;
                }
            }
        }
        self.cells[cy * self.cols + cx].push(p);
        true
    }
}
