//! Per-frame numeric logs for offline analysis of a stabilization run.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use steadycam_core::{Pose, Result};
use tracing::info;

/// Everything the pipeline computed for one processed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Processed-frame counter, starting at 1 for the second frame of the stream.
    pub index: u64,
    /// Raw `(dx, dy, da)` between the previous and current frame.
    pub raw_delta: Pose,
    /// Whether `raw_delta` was freshly estimated or reused from an earlier frame.
    pub fresh: bool,
    /// Accumulated raw trajectory.
    pub trajectory: Pose,
    /// Smoothed trajectory.
    pub smoothed: Pose,
    /// Corrected `(dx, dy, da)` applied to the pixels.
    pub corrected: Pose,
}

/// Writes the four trajectory logs, one `index v1 v2 v3` line per frame.
pub struct TrajectoryLog<W: Write = BufWriter<File>> {
    transform: W,
    trajectory: W,
    smoothed: W,
    corrected: W,
}

impl TrajectoryLog {
    /// File names, in the order raw transform, trajectory, smoothed trajectory,
    /// corrected transform.
    pub const FILE_NAMES: [&'static str; 4] = [
        "prev_to_cur_transformation.txt",
        "trajectory.txt",
        "smoothed_trajectory.txt",
        "new_prev_to_cur_transformation.txt",
    ];

    /// Create (or truncate) the four log files inside `dir`.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let open = |name: &str| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(dir.join(name))?))
        };
        let [a, b, c, d] = Self::FILE_NAMES;
        info!(dir = %dir.display(), "Writing trajectory logs");
        Ok(Self::from_writers(open(a)?, open(b)?, open(c)?, open(d)?))
    }
}

impl<W: Write> TrajectoryLog<W> {
    pub fn from_writers(transform: W, trajectory: W, smoothed: W, corrected: W) -> Self {
        Self {
            transform,
            trajectory,
            smoothed,
            corrected,
        }
    }

    pub fn record(&mut self, rec: &FrameRecord) -> Result<()> {
        write_line(&mut self.transform, rec.index, rec.raw_delta)?;
        write_line(&mut self.trajectory, rec.index, rec.trajectory)?;
        write_line(&mut self.smoothed, rec.index, rec.smoothed)?;
        write_line(&mut self.corrected, rec.index, rec.corrected)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transform.flush()?;
        self.trajectory.flush()?;
        self.smoothed.flush()?;
        self.corrected.flush()?;
        Ok(())
    }

    /// Return the underlying writers in file order.
    pub fn into_writers(self) -> [W; 4] {
        [self.transform, self.trajectory, self.smoothed, self.corrected]
    }
}

fn write_line(w: &mut impl Write, index: u64, p: Pose) -> Result<()> {
    writeln!(w, "{} {} {} {}", index, p.x, p.y, p.a)?;
    Ok(())
}
