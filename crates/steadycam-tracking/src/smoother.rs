//! Causal trajectory smoothing with three independent scalar Kalman filters.
//!
//! Each axis (x, y, angle) follows a constant-value process model:
//!
//! ```text
//! predict:  X⁻ = X           P⁻ = P + Q
//! correct:  K  = P⁻ / (P⁻ + R)
//!           X  = X⁻ + K (z − X⁻)
//!           P  = (1 − K) P⁻
//! ```
//!
//! No covariance between axes is modelled.

use serde::{Deserialize, Serialize};
use steadycam_core::{Pose, Result, SteadyError};

/// Noise settings controlling how aggressively the trajectory is smoothed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Trust in the "value stays constant" model. Lower is smoother and less reactive.
    pub process_noise: f64,
    /// Trust in the raw per-frame measurement. Lower is more responsive and less smooth.
    pub measurement_noise: f64,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            process_noise: 4e-3,
            measurement_noise: 0.25,
        }
    }
}

impl SmoothingParams {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("process_noise", self.process_noise),
            ("measurement_noise", self.measurement_noise),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(SteadyError::InvalidParameter(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Posterior estimate and error variance, one scalar per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    pub x: Pose,
    pub p: Pose,
}

impl FilterState {
    /// Bootstrap state used on the first processed frame.
    pub const SEED: Self = Self {
        x: Pose::ZERO,
        p: Pose::ONE,
    };
}

/// Bank of per-axis recursive smoothers.
#[derive(Debug, Clone)]
pub struct TrajectorySmoother {
    q: Pose,
    r: Pose,
    state: Option<FilterState>,
    gain: Option<Pose>,
}

impl TrajectorySmoother {
    pub fn new(params: &SmoothingParams) -> Self {
        Self {
            q: Pose::splat(params.process_noise),
            r: Pose::splat(params.measurement_noise),
            state: None,
            gain: None,
        }
    }

    /// Feed the raw accumulated pose `z` and return the smoothed pose.
    ///
    /// The first call only seeds the filter to `X = 0, P = 1`, whatever `z` is.
    pub fn update(&mut self, z: Pose) -> Pose {
        let next = match self.state {
            None => FilterState::SEED,
            Some(FilterState { x, p }) => {
                let x_prior = x;
                let p_prior = p + self.q;
                let k = p_prior / (p_prior + self.r);
                self.gain = Some(k);
                FilterState {
                    x: x_prior + k * (z - x_prior),
                    p: (Pose::ONE - k) * p_prior,
                }
            }
        };
        self.state = Some(next);
        next.x
    }

    /// Current filter state, `None` before the first update.
    pub fn state(&self) -> Option<FilterState> {
        self.state
    }

    /// Gain used by the most recent correction step.
    pub fn gain(&self) -> Option<Pose> {
        self.gain
    }

    pub fn process_noise(&self) -> Pose {
        self.q
    }

    pub fn measurement_noise(&self) -> Pose {
        self.r
    }
}

impl Default for TrajectorySmoother {
    fn default() -> Self {
        Self::new(&SmoothingParams::default())
    }
}
