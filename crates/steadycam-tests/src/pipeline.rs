//! End-to-end stabilization with the feature based estimator.
//!
//! Exercises steadycam-core frames through steadycam-tracking's full
//! per-frame pipeline on synthetic, textured scenes.

use glam::DVec2;
use proptest::prelude::*;
use steadycam_core::{FrameBuffer, PixelFormat, Pose, RigidTransform, Result};
use steadycam_media::EncoderSettings;
use steadycam_tracking::{BorderCrop, FrameRecord, Stabilizer, StabilizerConfig, TrajectoryLog};

// ── Helpers ────────────────────────────────────────────────────

fn texture(p: DVec2) -> f64 {
    0.5 + 0.22 * (p.x * 0.19 + 0.4).sin() * (p.y * 0.23 + 1.3).sin()
        + 0.15 * (p.x * 0.07 - p.y * 0.13 + 0.5).sin()
        + 0.1 * (p.x * 0.31 + p.y * 0.04).cos()
}

/// Render the scene as seen after the camera content moved by `motion`.
fn render(w: u32, h: u32, motion: Pose) -> FrameBuffer {
    let inv = RigidTransform::from_pose(motion).inverse();
    let mut frame = FrameBuffer::new(w, h, PixelFormat::Rgb8);
    for y in 0..h {
        for x in 0..w {
            let v = texture(inv.transform_point(DVec2::new(x as f64, y as f64)));
            let v = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            frame.set_pixel(x, y, [v, v, v]);
        }
    }
    frame
}

fn stabilize_all(stab: &mut Stabilizer, frames: Vec<FrameBuffer>) -> Vec<(FrameBuffer, Option<FrameRecord>)> {
    frames
        .into_iter()
        .map(|mut f| {
            let report = stab.process_frame(&mut f).unwrap();
            (f, report.record().copied())
        })
        .collect()
}

// ── Motion recovery ────────────────────────────────────────────

#[test]
fn known_motion_is_recovered() {
    let truth = Pose::new(5.0, 3.0, 0.02);
    let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
    let out = stabilize_all(&mut stab, vec![render(200, 160, Pose::ZERO), render(200, 160, truth)]);

    let rec = out[1].1.expect("second frame is processed");
    assert!(rec.fresh);
    assert!((rec.raw_delta.x - truth.x).abs() < 0.5, "{:?}", rec.raw_delta);
    assert!((rec.raw_delta.y - truth.y).abs() < 0.5, "{:?}", rec.raw_delta);
    assert!((rec.raw_delta.a - truth.a).abs() < 0.01, "{:?}", rec.raw_delta);
}

#[test]
fn identical_frames_give_near_zero_motion() {
    let frame = render(160, 120, Pose::ZERO);
    let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
    let out = stabilize_all(&mut stab, vec![frame; 12]);

    for (_, rec) in &out[1..] {
        let rec = rec.unwrap();
        assert!(rec.fresh);
        assert!(rec.raw_delta.max_abs() < 1e-3, "{:?}", rec.raw_delta);
        assert!(rec.trajectory.max_abs() < 1e-2);
    }
    let gain = stab.smoother().gain().unwrap();
    assert!(gain.x > 0.0 && gain.x < 1.0);
}

#[test]
fn panning_camera_accumulates_trajectory() {
    let step = Pose::new(2.0, -1.0, 0.0);
    let frames: Vec<_> = (0..5)
        .map(|i| render(200, 160, Pose::splat(i as f64) * step))
        .collect();
    let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
    stabilize_all(&mut stab, frames);

    let total = stab.trajectory();
    assert!((total.x - 8.0).abs() < 1.0, "{total:?}");
    assert!((total.y + 4.0).abs() < 1.0, "{total:?}");
    assert!(total.a.abs() < 0.01, "{total:?}");
}

// ── Frame geometry ─────────────────────────────────────────────

#[test]
fn output_size_matches_input_for_every_frame() {
    for (w, h) in [(160, 120), (203, 97)] {
        let frames: Vec<_> = (0..4)
            .map(|i| render(w, h, Pose::new(i as f64, 0.5 * i as f64, 0.003 * i as f64)))
            .collect();
        let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
        for (out, _) in stabilize_all(&mut stab, frames) {
            assert_eq!(out.dimensions(), (w, h));
            assert_eq!(out.data.len(), (w * h * 3) as usize);
        }
    }
}

#[test]
fn stabilizer_reports_crop_for_stream() {
    let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
    stab.process_frame(&mut FrameBuffer::test_pattern(1280, 720)).unwrap();
    assert_eq!(
        stab.border_crop(),
        Some(BorderCrop {
            horizontal: 20,
            vertical: 11
        })
    );
}

proptest! {
    #[test]
    fn crop_amounts_follow_aspect_ratio(w in 1u32..8000, h in 1u32..8000) {
        let crop = BorderCrop::for_frame(20, w, h);
        prop_assert_eq!(crop.horizontal, 20);
        prop_assert_eq!(crop.vertical, 20 * h / w);
    }
}

// ── Diagnostics & media glue ───────────────────────────────────

#[test]
fn diagnostics_log_one_line_per_processed_frame() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let dir = tmp.path().to_path_buf();
    let config = StabilizerConfig {
        diagnostics_dir: Some(dir.clone()),
        ..Default::default()
    };
    let mut stab = Stabilizer::new(config).unwrap();
    let frames: Vec<_> = (0..4).map(|i| render(120, 90, Pose::new(i as f64, 0.0, 0.0))).collect();
    stabilize_all(&mut stab, frames);
    stab.finish().unwrap();

    for name in TrajectoryLog::FILE_NAMES {
        let text = std::fs::read_to_string(dir.join(name)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "{name}");
        assert!(lines[0].starts_with("1 "));
        assert!(lines[2].starts_with("3 "));
        assert_eq!(lines[1].split(' ').count(), 4);
    }
}

#[test]
fn callback_adapter_fits_media_driver() {
    fn drive<F: FnMut(u64, &mut FrameBuffer) -> Result<()>>(frames: &mut [FrameBuffer], mut f: F) -> Result<()> {
        for (i, frame) in frames.iter_mut().enumerate() {
            f(i as u64, frame)?;
        }
        Ok(())
    }

    let mut frames: Vec<_> = (0..3).map(|i| render(120, 90, Pose::new(i as f64, 0.0, 0.0))).collect();
    let mut stab = Stabilizer::new(StabilizerConfig::default()).unwrap();
    {
        let mut stabilize = stab.as_callback();
        drive(&mut frames, |_, frame| stabilize(frame)).unwrap();
    }
    assert_eq!(stab.processed_frames(), 2);
    assert!(EncoderSettings::default().validate().is_ok());
}
