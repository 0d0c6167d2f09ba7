//! Online video stabilization session.
//!
//! Frames are pushed one at a time, in order. For every frame after the
//! first, the session estimates camera motion against the previous frame,
//! integrates it into a trajectory, smooths that trajectory and replaces the
//! buffer with the previous frame warped onto the smoothed path. The output
//! therefore lags the input by one frame.

use crate::compositor::{BorderCrop, Compositor, CompositorParams};
use crate::correction::synthesize_correction;
use crate::diagnostics::{FrameRecord, TrajectoryLog};
use crate::estimator::{FeatureMotionEstimator, MotionEstimate, MotionEstimator};
use crate::features::FeatureParams;
use crate::point_tracker::FlowParams;
use crate::pyramid::{frame_to_gray, GrayImage};
use crate::rigid::RigidFitParams;
use crate::smoother::{SmoothingParams, TrajectorySmoother};
use crate::trajectory::TrajectoryAccumulator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steadycam_core::{FrameBuffer, Pose, Result, RigidTransform, SteadyError};
use tracing::{debug, info, trace};

/// Complete stabilizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub features: FeatureParams,
    pub flow: FlowParams,
    pub fit: RigidFitParams,
    pub smoothing: SmoothingParams,
    pub compositor: CompositorParams,
    /// Directory for the per-frame trajectory logs. Disabled when `None`.
    pub diagnostics_dir: Option<PathBuf>,
}

impl StabilizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SteadyError::Serialization(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SteadyError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.compositor.validate()?;

        let f = &self.features;
        if f.max_corners == 0 {
            return Err(invalid("max_corners must be at least 1"));
        }
        if !unit_ratio(f.quality_level.into()) {
            return Err(invalid(format!(
                "quality_level must be in (0, 1], got {}",
                f.quality_level
            )));
        }
        if f.min_distance.is_nan() || f.min_distance < 0.0 || f.block_size == 0 {
            return Err(invalid("min_distance must be non-negative and block_size positive"));
        }

        let fl = &self.flow;
        if fl.window_size < 3 || fl.window_size % 2 == 0 {
            return Err(invalid(format!(
                "window_size must be odd and at least 3, got {}",
                fl.window_size
            )));
        }
        if fl.pyramid_levels == 0 || fl.max_iterations == 0 {
            return Err(invalid("pyramid_levels and max_iterations must be at least 1"));
        }
        let eig = fl.min_eigen_threshold;
        if !positive(fl.epsilon.into()) || eig.is_nan() || eig < 0.0 {
            return Err(invalid("epsilon must be positive and min_eigen_threshold non-negative"));
        }

        let fit = &self.fit;
        if fit.ransac_iterations == 0 || !positive(fit.inlier_threshold) {
            return Err(invalid("ransac_iterations and inlier_threshold must be positive"));
        }
        if !unit_ratio(fit.min_inlier_ratio) {
            return Err(invalid(format!(
                "min_inlier_ratio must be in (0, 1], got {}",
                fit.min_inlier_ratio
            )));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn unit_ratio(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

fn invalid(msg: impl Into<String>) -> SteadyError {
    SteadyError::InvalidParameter(msg.into())
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No frame seen yet.
    Uninitialized,
    /// One reference frame stored, nothing processed.
    Seeded,
    /// At least one frame stabilized.
    Steady,
}

/// What `process_frame` did with a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameReport {
    /// First frame of the stream, stored as reference and left unmodified.
    Seeded,
    /// Frame replaced by the stabilized output.
    Stabilized(FrameRecord),
}

impl FrameReport {
    pub fn record(&self) -> Option<&FrameRecord> {
        match self {
            Self::Seeded => None,
            Self::Stabilized(rec) => Some(rec),
        }
    }
}

struct Reference {
    frame: FrameBuffer,
    gray: GrayImage,
}

/// Single-stream stabilization session.
pub struct Stabilizer<E: MotionEstimator = FeatureMotionEstimator> {
    estimator: E,
    compositor: Compositor,
    accumulator: TrajectoryAccumulator,
    smoother: TrajectorySmoother,
    reference: Option<Reference>,
    last_good: Option<RigidTransform>,
    processed: u64,
    log: Option<TrajectoryLog>,
}

impl Stabilizer {
    /// Build a session with the feature based estimator described by `config`.
    pub fn new(config: StabilizerConfig) -> Result<Self> {
        let estimator = FeatureMotionEstimator::new(
            config.features.clone(),
            config.flow.clone(),
            config.fit.clone(),
        );
        Self::with_estimator(config, estimator)
    }
}

impl<E: MotionEstimator> Stabilizer<E> {
    /// Build a session around a custom motion estimator.
    pub fn with_estimator(config: StabilizerConfig, estimator: E) -> Result<Self> {
        config.validate()?;
        let log = match &config.diagnostics_dir {
            Some(dir) => Some(TrajectoryLog::create(dir)?),
            None => None,
        };
        info!(
            process_noise = config.smoothing.process_noise,
            measurement_noise = config.smoothing.measurement_noise,
            crop = config.compositor.horizontal_border_crop,
            "Stabilizer created"
        );
        Ok(Self {
            estimator,
            compositor: Compositor::new(config.compositor),
            accumulator: TrajectoryAccumulator::new(),
            smoother: TrajectorySmoother::new(&config.smoothing),
            reference: None,
            last_good: None,
            processed: 0,
            log,
        })
    }

    /// Stabilize one frame in place.
    ///
    /// The first frame is kept as reference and left untouched. Every later
    /// frame must have the same dimensions as the first.
    pub fn process_frame(&mut self, frame: &mut FrameBuffer) -> Result<FrameReport> {
        frame.validate()?;

        let Some(reference) = self.reference.as_mut() else {
            let (w, h) = frame.dimensions();
            self.compositor.border_crop(w, h).check(w, h)?;
            self.reference = Some(Reference {
                frame: frame.clone(),
                gray: frame_to_gray(frame),
            });
            info!(width = w, height = h, "Stream seeded");
            return Ok(FrameReport::Seeded);
        };

        let expected = reference.frame.dimensions();
        if frame.dimensions() != expected {
            return Err(SteadyError::DimensionMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }

        let index = self.processed + 1;
        let gray = frame_to_gray(frame);
        let (transform, fresh) = match self.estimator.estimate(&reference.gray, &gray) {
            MotionEstimate::Estimate(t) => (t, true),
            MotionEstimate::Unavailable(reason) => {
                debug!(frame = index, %reason, "Motion unavailable, reusing last transform");
                (self.last_good.unwrap_or(RigidTransform::IDENTITY), false)
            }
        };
        self.last_good = Some(transform);

        let raw_delta = transform.to_pose();
        let trajectory = self.accumulator.accumulate(raw_delta);
        let smoothed = self.smoother.update(trajectory);
        let correction = synthesize_correction(raw_delta, trajectory, smoothed);

        let output = self.compositor.composite(&reference.frame, &correction.transform)?;
        let current = std::mem::replace(frame, output);
        reference.frame = current;
        reference.gray = gray;
        self.processed = index;

        trace!(
            frame = index,
            dx = raw_delta.x,
            dy = raw_delta.y,
            da = raw_delta.a,
            smoothed_x = smoothed.x,
            smoothed_y = smoothed.y,
            smoothed_a = smoothed.a,
            fresh,
            "Frame stabilized"
        );

        let record = FrameRecord {
            index,
            raw_delta,
            fresh,
            trajectory,
            smoothed,
            corrected: correction.delta,
        };
        if let Some(log) = self.log.as_mut() {
            log.record(&record)?;
        }
        Ok(FrameReport::Stabilized(record))
    }

    /// Adapter for frame-callback driven pipelines.
    pub fn as_callback(&mut self) -> impl FnMut(&mut FrameBuffer) -> Result<()> + '_ {
        move |frame: &mut FrameBuffer| self.process_frame(frame).map(|_| ())
    }

    /// Flush diagnostics. The session stays usable.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        info!(frames = self.processed, "Stabilizer finished");
        Ok(())
    }

    pub fn phase(&self) -> StreamPhase {
        match (&self.reference, self.processed) {
            (None, _) => StreamPhase::Uninitialized,
            (Some(_), 0) => StreamPhase::Seeded,
            (Some(_), _) => StreamPhase::Steady,
        }
    }

    /// Number of frames stabilized so far (the first frame is not counted).
    pub fn processed_frames(&self) -> u64 {
        self.processed
    }

    /// Accumulated raw trajectory.
    pub fn trajectory(&self) -> Pose {
        self.accumulator.pose()
    }

    pub fn smoother(&self) -> &TrajectorySmoother {
        &self.smoother
    }

    /// Transform used for the most recent frame, estimated or reused.
    pub fn last_transform(&self) -> Option<RigidTransform> {
        self.last_good
    }

    /// Crop applied to frames of the current stream, once known.
    pub fn border_crop(&self) -> Option<BorderCrop> {
        self.reference.as_ref().map(|r| {
            let (w, h) = r.frame.dimensions();
            self.compositor.border_crop(w, h)
        })
    }
}
