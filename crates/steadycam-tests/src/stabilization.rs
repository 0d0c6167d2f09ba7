//! Session-level behaviour of the stabilizer with scripted motion.
//!
//! A scripted estimator replaces feature tracking so trajectory, smoothing
//! and fallback arithmetic can be checked exactly.

use steadycam_core::{FrameBuffer, PixelFormat, Pose, RigidTransform, SteadyError};
use steadycam_tracking::{
    EstimateFailure, FitError, FrameRecord, FrameReport, GrayImage, MotionEstimate, Stabilizer,
    StabilizerConfig, StreamPhase,
};

// ── Helpers ────────────────────────────────────────────────────

fn flat_frame(w: u32, h: u32, value: u8) -> FrameBuffer {
    let mut f = FrameBuffer::new(w, h, PixelFormat::Rgb8);
    f.data.fill(value);
    f
}

fn scripted(
    script: Vec<MotionEstimate>,
) -> impl FnMut(&GrayImage, &GrayImage) -> MotionEstimate {
    let mut it = script.into_iter();
    move |_: &GrayImage, _: &GrayImage| {
        it.next()
            .unwrap_or(MotionEstimate::Unavailable(EstimateFailure::NoFeatures))
    }
}

fn estimates(deltas: &[Pose]) -> Vec<MotionEstimate> {
    deltas
        .iter()
        .map(|d| MotionEstimate::Estimate(RigidTransform::from_pose(*d)))
        .collect()
}

fn unavailable() -> MotionEstimate {
    MotionEstimate::Unavailable(EstimateFailure::Fit(FitError::TooFewPoints {
        found: 1,
        required: 3,
    }))
}

/// Feed `n` frames and collect the records of every processed frame.
fn run(script: Vec<MotionEstimate>, n: usize) -> Vec<FrameRecord> {
    let mut stab = Stabilizer::with_estimator(StabilizerConfig::default(), scripted(script)).unwrap();
    (0..n)
        .filter_map(|i| {
            let mut f = flat_frame(64, 48, (i * 10) as u8);
            stab.process_frame(&mut f).unwrap().record().copied()
        })
        .collect()
}

// ── Trajectory accumulation ────────────────────────────────────

#[test]
fn trajectory_is_running_sum_of_accepted_deltas() {
    let deltas = [
        Pose::new(1.0, 0.5, 0.01),
        Pose::new(-2.0, 1.5, -0.02),
        Pose::new(0.25, -3.0, 0.005),
        Pose::new(4.0, 0.0, 0.0),
        Pose::new(-0.5, 2.25, 0.015),
    ];
    let records = run(estimates(&deltas), deltas.len() + 1);
    assert_eq!(records.len(), deltas.len());

    let mut sum = Pose::ZERO;
    for (rec, delta) in records.iter().zip(&deltas) {
        assert!((rec.raw_delta - *delta).max_abs() < 1e-12);
        sum = sum + rec.raw_delta;
        assert_eq!(rec.trajectory, sum);
    }
}

#[test]
fn first_frame_contributes_nothing() {
    let mut stab = Stabilizer::with_estimator(
        StabilizerConfig::default(),
        scripted(estimates(&[Pose::new(3.0, 3.0, 0.0)])),
    )
    .unwrap();
    let report = stab.process_frame(&mut flat_frame(64, 48, 0)).unwrap();
    assert_eq!(report, FrameReport::Seeded);
    assert_eq!(stab.trajectory(), Pose::ZERO);
    assert_eq!(stab.processed_frames(), 0);
    assert!(stab.smoother().state().is_none());
}

#[test]
fn records_are_numbered_from_one() {
    let records = run(vec![], 5);
    let indices: Vec<u64> = records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
}

// ── Smoothing ──────────────────────────────────────────────────

#[test]
fn first_filter_cycle_matches_hand_computation() {
    let d1 = Pose::new(2.0, -1.0, 0.01);
    let d2 = Pose::new(1.0, 3.0, -0.03);
    let mut stab =
        Stabilizer::with_estimator(StabilizerConfig::default(), scripted(estimates(&[d1, d2]))).unwrap();
    for v in 0..3 {
        stab.process_frame(&mut flat_frame(64, 48, v)).unwrap();
    }

    // First processed frame seeds X = 0, P = 1. The second runs one cycle:
    // P⁻ = 1.004, K = 1.004 / 1.254, X = K z, P = (1 - K) P⁻.
    let z = stab.trajectory();
    let k = 1.004 / 1.254;
    let state = stab.smoother().state().unwrap();
    assert!((state.x - Pose::splat(k) * z).max_abs() < 1e-12);
    assert!((state.p - Pose::splat((1.0 - k) * 1.004)).max_abs() < 1e-12);
    assert!((stab.smoother().gain().unwrap() - Pose::splat(k)).max_abs() < 1e-12);
}

#[test]
fn smoothed_trajectory_lags_constant_drift() {
    let drift = Pose::new(1.0, -0.5, 0.002);
    let mut stab =
        Stabilizer::with_estimator(StabilizerConfig::default(), scripted(estimates(&[drift; 80]))).unwrap();

    let mut gains = Vec::new();
    for i in 0..81u8 {
        if let FrameReport::Stabilized(rec) = stab.process_frame(&mut flat_frame(64, 48, i)).unwrap() {
            if rec.index > 1 {
                assert_ne!(rec.smoothed, rec.trajectory);
                assert!(rec.smoothed.x < rec.trajectory.x);
            }
        }
        gains.extend(stab.smoother().gain().map(|g| g.x));
    }

    let last = *gains.last().unwrap();
    assert!(last > 0.0 && last < 1.0);
    assert!((gains[gains.len() - 2] - last).abs() < 1e-6);
}

#[test]
fn corrected_delta_follows_smoothed_difference() {
    let deltas = [Pose::new(5.0, 0.0, 0.0), Pose::new(-5.0, 2.0, 0.01)];
    for rec in run(estimates(&deltas), 3) {
        let expected = rec.raw_delta + (rec.smoothed - rec.trajectory);
        assert!((rec.corrected - expected).max_abs() < 1e-12);
    }
}

// ── Fallback ───────────────────────────────────────────────────

#[test]
fn consecutive_failures_reuse_the_same_transform() {
    let good = RigidTransform::from_pose(Pose::new(2.5, -1.25, 0.02));
    let script = vec![MotionEstimate::Estimate(good), unavailable(), unavailable()];
    let mut stab = Stabilizer::with_estimator(StabilizerConfig::default(), scripted(script)).unwrap();

    let mut records = Vec::new();
    let mut used = Vec::new();
    for v in 0..4 {
        if let FrameReport::Stabilized(rec) = stab.process_frame(&mut flat_frame(64, 48, v)).unwrap() {
            records.push(rec);
            used.push(stab.last_transform().unwrap());
        }
    }

    assert!(records[0].fresh);
    assert!(!records[1].fresh && !records[2].fresh);
    assert_eq!(used[1], good);
    assert_eq!(used[2], used[1]);
    assert_eq!(records[1].raw_delta, records[2].raw_delta);

    let step1 = records[1].trajectory - records[0].trajectory;
    let step2 = records[2].trajectory - records[1].trajectory;
    assert!((step1 - step2).max_abs() < 1e-12);
}

#[test]
fn failure_before_any_estimate_is_identity() {
    let records = run(vec![unavailable(), unavailable()], 3);
    for rec in records {
        assert!(!rec.fresh);
        assert_eq!(rec.raw_delta, Pose::ZERO);
        assert_eq!(rec.trajectory, Pose::ZERO);
    }
}

// ── Stream handling ────────────────────────────────────────────

#[test]
fn first_frame_passes_through_unchanged() {
    let mut stab = Stabilizer::with_estimator(StabilizerConfig::default(), scripted(vec![])).unwrap();
    let original = FrameBuffer::test_pattern(96, 64);
    let mut frame = original.clone();
    stab.process_frame(&mut frame).unwrap();
    assert_eq!(frame, original);
    assert_eq!(stab.phase(), StreamPhase::Seeded);
}

#[test]
fn output_is_previous_frame() {
    // A still camera on an unchanging frame reproduces the previous frame,
    // so the output lags the input by one.
    let mut stab = Stabilizer::with_estimator(
        StabilizerConfig::default(),
        scripted(estimates(&[Pose::ZERO, Pose::ZERO])),
    )
    .unwrap();
    stab.process_frame(&mut flat_frame(80, 60, 100)).unwrap();
    let mut second = flat_frame(80, 60, 180);
    stab.process_frame(&mut second).unwrap();
    assert!(second.data.iter().all(|&v| v == 100));
}

#[test]
fn dimension_change_is_an_error() {
    let mut stab = Stabilizer::with_estimator(StabilizerConfig::default(), scripted(vec![])).unwrap();
    stab.process_frame(&mut flat_frame(64, 48, 0)).unwrap();
    stab.process_frame(&mut flat_frame(64, 48, 0)).unwrap();
    let err = stab.process_frame(&mut flat_frame(65, 48, 0)).unwrap_err();
    assert!(matches!(err, SteadyError::DimensionMismatch { .. }));
    assert_eq!(stab.processed_frames(), 1);
}

#[test]
fn malformed_buffer_is_rejected() {
    let mut stab = Stabilizer::with_estimator(StabilizerConfig::default(), scripted(vec![])).unwrap();
    let mut frame = flat_frame(64, 48, 0);
    frame.data.truncate(100);
    assert!(matches!(
        stab.process_frame(&mut frame),
        Err(SteadyError::InvalidFrame(_))
    ));
}
