//! Frame-to-frame camera motion estimation.

use crate::features::{detect_corners, FeatureParams};
use crate::point_tracker::{FlowParams, PointTracker};
use crate::pyramid::GrayImage;
use crate::rigid::{fit_rigid, FitError, RigidFitParams};
use glam::DVec2;
use steadycam_core::RigidTransform;
use thiserror::Error;
use tracing::trace;

/// Why an estimator produced no transform for a frame pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateFailure {
    #[error("frame sizes differ: {prev:?} vs {curr:?}")]
    SizeMismatch { prev: (u32, u32), curr: (u32, u32) },

    #[error("no trackable features in the previous frame")]
    NoFeatures,

    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Result of estimating motion between two consecutive frames.
///
/// Estimators never substitute a previous result on failure; that policy
/// belongs to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionEstimate {
    Estimate(RigidTransform),
    Unavailable(EstimateFailure),
}

impl MotionEstimate {
    pub fn transform(&self) -> Option<RigidTransform> {
        match self {
            Self::Estimate(t) => Some(*t),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Estimate(_))
    }
}

/// Estimates the rigid motion mapping `prev` onto `curr`.
pub trait MotionEstimator {
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> MotionEstimate;
}

impl<F> MotionEstimator for F
where
    F: FnMut(&GrayImage, &GrayImage) -> MotionEstimate,
{
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> MotionEstimate {
        self(prev, curr)
    }
}

/// Sparse feature based estimator: corners in `prev`, Lucas-Kanade flow
/// into `curr`, robust rigid fit over the surviving correspondences.
#[derive(Debug, Clone, Default)]
pub struct FeatureMotionEstimator {
    pub features: FeatureParams,
    pub tracker: PointTracker,
    pub fit: RigidFitParams,
}

impl FeatureMotionEstimator {
    pub fn new(features: FeatureParams, flow: FlowParams, fit: RigidFitParams) -> Self {
        Self {
            features,
            tracker: PointTracker::new(flow),
            fit,
        }
    }
}

impl MotionEstimator for FeatureMotionEstimator {
    fn estimate(&mut self, prev: &GrayImage, curr: &GrayImage) -> MotionEstimate {
        if prev.dimensions() != curr.dimensions() {
            return MotionEstimate::Unavailable(EstimateFailure::SizeMismatch {
                prev: prev.dimensions(),
                curr: curr.dimensions(),
            });
        }

        let corners = detect_corners(prev, &self.features);
        if corners.is_empty() {
            return MotionEstimate::Unavailable(EstimateFailure::NoFeatures);
        }

        let (src, dst): (Vec<DVec2>, Vec<DVec2>) = self
            .tracker
            .track_frame(prev, curr, &corners)
            .into_iter()
            .filter(|tp| tp.is_tracked())
            .map(|tp| (tp.from.as_dvec2(), tp.to.as_dvec2()))
            .unzip();

        match fit_rigid(&src, &dst, &self.fit) {
            Ok(fit) => {
                trace!(
                    corners = corners.len(),
                    tracked = src.len(),
                    inliers = fit.inliers,
                    rms = fit.rms_error,
                    "Motion estimated"
                );
                MotionEstimate::Estimate(fit.transform)
            }
            Err(e) => MotionEstimate::Unavailable(e.into()),
        }
    }
}
