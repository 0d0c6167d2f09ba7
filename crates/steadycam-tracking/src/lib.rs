//! SteadyCam Tracking - Motion estimation and online video stabilization.

pub mod compositor;
pub mod correction;
pub mod diagnostics;
pub mod estimator;
pub mod features;
pub mod point_tracker;
pub mod pyramid;
pub mod rigid;
pub mod smoother;
pub mod stabilize;
pub mod trajectory;

pub use compositor::{BorderCrop, Compositor, CompositorParams};
pub use correction::{synthesize_correction, Correction};
pub use diagnostics::{FrameRecord, TrajectoryLog};
pub use estimator::{EstimateFailure, FeatureMotionEstimator, MotionEstimate, MotionEstimator};
pub use features::{detect_corners, FeatureParams};
pub use point_tracker::{FlowParams, PointTracker, TrackStatus, TrackedPoint};
pub use pyramid::{compute_gradients, frame_to_gray, GrayImage, ImagePyramid};
pub use rigid::{fit_rigid, FitError, RigidFit, RigidFitParams};
pub use smoother::{FilterState, SmoothingParams, TrajectorySmoother};
pub use stabilize::{FrameReport, Stabilizer, StabilizerConfig, StreamPhase};
pub use trajectory::TrajectoryAccumulator;
