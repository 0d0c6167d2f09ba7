//! Corrective transform synthesis.

use steadycam_core::{Pose, RigidTransform};

/// Per-frame transform that moves the raw trajectory onto the smoothed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Corrected `(dx, dy, da)`.
    pub delta: Pose,
    /// Matrix rebuilt from `delta`, applied to pixels by the compositor.
    pub transform: RigidTransform,
}

/// Fold the smoothed-minus-raw trajectory difference into this frame's raw delta.
///
/// The difference is added to `raw_delta`, not to the accumulated trajectory,
/// and the matrix is rebuilt from the corrected angle.
pub fn synthesize_correction(raw_delta: Pose, trajectory: Pose, smoothed: Pose) -> Correction {
    let delta = raw_delta + (smoothed - trajectory);
    Correction {
        delta,
        transform: RigidTransform::from_pose(delta),
    }
}
