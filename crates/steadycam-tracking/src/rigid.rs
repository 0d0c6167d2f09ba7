//! Robust rotation + translation fit between two point sets.

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use steadycam_core::RigidTransform;
use thiserror::Error;

/// RANSAC and acceptance settings for the rigid fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidFitParams {
    /// Number of minimal-sample hypotheses to try.
    pub ransac_iterations: u32,
    /// Maximum reprojection distance of an inlier, in pixels.
    pub inlier_threshold: f64,
    /// Fraction of correspondences that must agree with the winning model.
    pub min_inlier_ratio: f64,
    /// Fewer surviving correspondences than this is a failure.
    pub min_correspondences: usize,
    /// Seed for hypothesis sampling, so runs are reproducible.
    pub seed: u64,
}

impl Default for RigidFitParams {
    fn default() -> Self {
        Self {
            ransac_iterations: 500,
            inlier_threshold: 3.0,
            min_inlier_ratio: 0.5,
            min_correspondences: 3,
            seed: 0x5eed,
        }
    }
}

/// Why no transform could be fitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("only {found} correspondences, need at least {required}")]
    TooFewPoints { found: usize, required: usize },

    #[error("only {inliers} of {total} correspondences agree on a transform")]
    TooFewInliers { inliers: usize, total: usize },

    #[error("point configuration is degenerate")]
    Degenerate,
}

/// Accepted fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidFit {
    pub transform: RigidTransform,
    pub inliers: usize,
    /// Root-mean-square residual over the inliers, in pixels.
    pub rms_error: f64,
}

/// Closed-form least-squares rigid transform mapping `src` onto `dst`.
///
/// Returns `None` when fewer than two pairs are given or the source points
/// all coincide.
pub fn least_squares_rigid(src: &[DVec2], dst: &[DVec2]) -> Option<RigidTransform> {
    let n = src.len().min(dst.len());
    if n < 2 {
        return None;
    }
    let inv_n = 1.0 / n as f64;
    let cs = src[..n].iter().copied().sum::<DVec2>() * inv_n;
    let cd = dst[..n].iter().copied().sum::<DVec2>() * inv_n;

    let (mut sxx, mut sxy, mut spread) = (0.0f64, 0.0f64, 0.0f64);
    for (s, d) in src[..n].iter().zip(&dst[..n]) {
        let p = *s - cs;
        let q = *d - cd;
        sxx += p.dot(q);
        sxy += p.perp_dot(q);
        spread += p.length_squared();
    }
    if spread < 1e-9 || sxx.hypot(sxy) < 1e-12 {
        return None;
    }

    let angle = sxy.atan2(sxx);
    let rotated = DVec2::from_angle(angle).rotate(cs);
    Some(RigidTransform::from_angle_translation(angle, cd - rotated))
}

/// Fit a rigid transform robustly with RANSAC over 2-point samples, then
/// refine it by least squares over the inlier set.
pub fn fit_rigid(src: &[DVec2], dst: &[DVec2], params: &RigidFitParams) -> Result<RigidFit, FitError> {
    let n = src.len().min(dst.len());
    let required = params.min_correspondences.max(2);
    if n < required {
        return Err(FitError::TooFewPoints { found: n, required });
    }

    let thr_sq = params.inlier_threshold * params.inlier_threshold;
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(usize, f64, RigidTransform)> = None;

    for _ in 0..params.ransac_iterations {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i == j || src[i].distance_squared(src[j]) < 1e-6 {
            continue;
        }
        let Some(model) = least_squares_rigid(&[src[i], src[j]], &[dst[i], dst[j]]) else {
            continue;
        };
        let (count, cost) = score(&model, src, dst, thr_sq);
        let better = match best {
            Some((c, e, _)) => count > c || (count == c && cost < e),
            None => true,
        };
        if better {
            best = Some((count, cost, model));
            if count == n {
                break;
            }
        }
    }

    let Some((_, _, model)) = best else {
        return Err(FitError::Degenerate);
    };

    let (inlier_src, inlier_dst) = inliers_of(&model, src, dst, thr_sq);
    let min_inliers = (params.min_inlier_ratio * n as f64).ceil() as usize;
    if inlier_src.len() < min_inliers.max(2) {
        return Err(FitError::TooFewInliers {
            inliers: inlier_src.len(),
            total: n,
        });
    }

    let refined = least_squares_rigid(&inlier_src, &inlier_dst).ok_or(FitError::Degenerate)?;
    let (inlier_src, inlier_dst) = inliers_of(&refined, src, dst, thr_sq);
    let transform = least_squares_rigid(&inlier_src, &inlier_dst).unwrap_or(refined);

    let sq_sum: f64 = inlier_src
        .iter()
        .zip(&inlier_dst)
        .map(|(s, d)| transform.transform_point(*s).distance_squared(*d))
        .sum();
    let inliers = inlier_src.len();

    Ok(RigidFit {
        transform,
        inliers,
        rms_error: (sq_sum / inliers.max(1) as f64).sqrt(),
    })
}

/// Inlier count and truncated squared-error cost of a model.
fn score(model: &RigidTransform, src: &[DVec2], dst: &[DVec2], thr_sq: f64) -> (usize, f64) {
    src.iter()
        .zip(dst)
        .map(|(s, d)| model.transform_point(*s).distance_squared(*d))
        .fold((0, 0.0), |(count, cost), e| {
            if e < thr_sq {
                (count + 1, cost + e)
            } else {
                (count, cost + thr_sq)
            }
        })
}

fn inliers_of(
    model: &RigidTransform,
    src: &[DVec2],
    dst: &[DVec2],
    thr_sq: f64,
) -> (Vec<DVec2>, Vec<DVec2>) {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| model.transform_point(**s).distance_squared(**d) < thr_sq)
        .map(|(s, d)| (*s, *d))
        .unzip()
}
