//! Benchmarks for per-frame motion estimation.
//!
//! Run with: cargo bench -p steadycam-tracking

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use steadycam_core::{FrameBuffer, Pose, RigidTransform};
use steadycam_tracking::{
    detect_corners, FeatureMotionEstimator, FeatureParams, GrayImage, MotionEstimator, Stabilizer,
    StabilizerConfig,
};

fn scene(w: u32, h: u32, motion: Pose) -> GrayImage {
    let inv = RigidTransform::from_pose(motion).inverse();
    GrayImage::from_fn(w, h, |x, y| {
        let p = inv.transform_point(glam::DVec2::new(x as f64, y as f64));
        (0.5 + 0.25 * (p.x * 0.17).sin() * (p.y * 0.21 + 0.7).sin() + 0.15 * (p.x * 0.05 - p.y * 0.09).cos())
            as f32
    })
}

fn bench_corners(c: &mut Criterion) {
    let img = scene(640, 360, Pose::ZERO);
    let params = FeatureParams::default();

    c.bench_function("detect_corners_640x360", |bencher| {
        bencher.iter(|| detect_corners(black_box(&img), &params));
    });
}

fn bench_estimate(c: &mut Criterion) {
    let prev = scene(640, 360, Pose::ZERO);
    let curr = scene(640, 360, Pose::new(3.0, -2.0, 0.01));
    let mut estimator = FeatureMotionEstimator::default();

    c.bench_function("estimate_motion_640x360", |bencher| {
        bencher.iter(|| estimator.estimate(black_box(&prev), black_box(&curr)));
    });
}

fn bench_process_frame(c: &mut Criterion) {
    let frame = FrameBuffer::test_pattern(640, 360);
    let mut stab = Stabilizer::new(StabilizerConfig::default()).expect("default config is valid");
    let mut seed = frame.clone();
    stab.process_frame(&mut seed).expect("seed frame");

    c.bench_function("process_frame_640x360", |bencher| {
        bencher.iter(|| {
            let mut f = frame.clone();
            stab.process_frame(black_box(&mut f)).expect("process");
            f
        });
    });
}

criterion_group!(benches, bench_corners, bench_estimate, bench_process_frame);
criterion_main!(benches);
