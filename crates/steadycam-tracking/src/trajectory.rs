//! Integration of per-frame motion into an absolute camera trajectory.

use steadycam_core::Pose;

/// Running sum of accepted per-frame deltas.
///
/// The angle is summed as-is, without wrapping into `(-π, π]`, so a persistent
/// rotational bias makes it drift without bound over long streams.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrajectoryAccumulator {
    pose: Pose,
    steps: u64,
}

impl TrajectoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame's `(dx, dy, da)` and return the new absolute pose.
    #[inline]
    pub fn accumulate(&mut self, delta: Pose) -> Pose {
        self.pose = self.pose + delta;
        self.steps += 1;
        self.pose
    }

    /// Current absolute pose.
    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Number of deltas accumulated so far.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_exact_sum() {
        let deltas = [
            Pose::new(1.0, -2.0, 0.01),
            Pose::new(0.5, 0.25, -0.02),
            Pose::new(-3.0, 1.0, 0.005),
        ];
        let mut acc = TrajectoryAccumulator::new();
        let mut expected = Pose::ZERO;
        for d in deltas {
            expected = expected + d;
            assert_eq!(acc.accumulate(d), expected);
        }
        assert_eq!(acc.pose(), expected);
        assert_eq!(acc.steps(), 3);
    }

    #[test]
    fn test_angle_is_not_wrapped() {
        let mut acc = TrajectoryAccumulator::new();
        for _ in 0..10 {
            acc.accumulate(Pose::new(0.0, 0.0, 3.0));
        }
        assert!((acc.pose().a - 30.0).abs() < 1e-12);
    }
}
