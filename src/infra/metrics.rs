// ============================================================
// Layer 6 — Runtime Stats
// ============================================================
// Collects the wall-clock time of every batch's forward pass
// and writes one summary line at the end of a run.
//
// Output file: <exp_dir>/stats.txt  (overwritten every run)
//
// Example:
//   Runtime 0.0412+-0.0031
//
// The spread is the population standard deviation. A run that
// processed no batch has no mean; it is written as NaN.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const STATS_FILE: &str = "stats.txt";

/// Per-batch forward timings, in seconds.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    batch_seconds: Vec<f64>,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.batch_seconds.push(elapsed.as_secs_f64());
    }

    pub fn batches(&self) -> usize {
        self.batch_seconds.len()
    }

    pub fn mean(&self) -> f64 {
        if self.batch_seconds.is_empty() {
            return f64::NAN;
        }
        self.batch_seconds.iter().sum::<f64>() / self.batch_seconds.len() as f64
    }

    /// Population standard deviation.
    pub fn std(&self) -> f64 {
        if self.batch_seconds.is_empty() {
            return f64::NAN;
        }
        let mean = self.mean();
        let var  = self
            .batch_seconds
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.batch_seconds.len() as f64;
        var.sqrt()
    }

    /// `Runtime <mean>+-<std>` with four decimals.
    pub fn summary_line(&self) -> String {
        format!("Runtime {:.4}+-{:.4}", self.mean(), self.std())
    }
}

/// Writes the summary line to `<exp_dir>/stats.txt`.
pub struct StatsWriter {
    path: PathBuf,
}

impl StatsWriter {
    pub fn new(exp_dir: impl AsRef<Path>) -> Self {
        Self { path: exp_dir.as_ref().join(STATS_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the stats file with one line and return that line.
    pub fn write(&self, stats: &RuntimeStats) -> Result<String> {
        let line = stats.summary_line();
        fs::write(&self.path, &line)
            .with_context(|| format!("Cannot write stats to '{}'", self.path.display()))?;

        tracing::debug!(
            "Wrote stats for {} batches to '{}'",
            stats.batches(),
            self.path.display()
        );
        Ok(line)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn stats(seconds: &[f64]) -> RuntimeStats {
        let mut s = RuntimeStats::new();
        for v in seconds {
            s.record(Duration::from_secs_f64(*v));
        }
        s
    }

    #[test]
    fn test_mean_and_population_std() {
        let s = stats(&[1.0, 3.0]);
        assert!((s.mean() - 2.0).abs() < 1e-9);
        // population std of {1, 3} is 1, not √2
        assert!((s.std() - 1.0).abs() < 1e-9);
        assert_eq!(s.summary_line(), "Runtime 2.0000+-1.0000");
    }

    #[test]
    fn test_single_batch_has_zero_spread() {
        let s = stats(&[0.25]);
        assert_eq!(s.summary_line(), "Runtime 0.2500+-0.0000");
    }

    #[test]
    fn test_empty_run_is_nan() {
        let s = RuntimeStats::new();
        assert!(s.mean().is_nan());
        assert_eq!(s.summary_line(), "Runtime NaN+-NaN");
    }

    #[test]
    fn test_write_overwrites_previous_content() {
        let dir    = tempfile::tempdir().unwrap();
        let writer = StatsWriter::new(dir.path());
        fs::write(writer.path(), "old line\nanother\n").unwrap();

        let line    = writer.write(&stats(&[0.5, 0.5])).unwrap();
        let content = fs::read_to_string(writer.path()).unwrap();
        assert_eq!(content, line);
        assert_eq!(content.lines().count(), 1);
    }
}
