//! RADIATE Sequence Synchronizer
//!
//! Thin file-facing shell around `radiate_core`: reads timestamp logs,
//! annotations, calibration and lidar sweeps, sweeps query timestamps over a
//! sequence and exports the results as JSON.

pub mod exporter;
pub mod loader;

pub use exporter::{ExportFrame, LidarExport, QueryExport};

use anyhow::{bail, Result};
use radiate_core::SequenceSpan;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Upper bound on the number of queries in one sweep.
pub const MAX_SWEEP_QUERIES: usize = 1_000_000;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Keeps stdout clean for machine-readable output
    Stderr,
}

impl LogTarget {
    pub fn for_output(json: bool) -> Self {
        if json {
            LogTarget::Stderr
        } else {
            LogTarget::Stdout
        }
    }
}

/// `RUST_LOG`-style directives when given and valid, else DEBUG/INFO by `verbose`.
pub fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}

/// Query times from `start` to `end` (inclusive) every `step` seconds.
///
/// Missing bounds default to the sequence span.
pub fn sweep_times(span: SequenceSpan, start: Option<f64>, end: Option<f64>, step: f64) -> Result<Vec<f64>> {
    let start = start.unwrap_or(span.start);
    let end = end.unwrap_or(span.end);

    if !(step > 0.0) || !step.is_finite() {
        bail!("step must be a positive number of seconds, got {step}");
    }
    if !start.is_finite() || !end.is_finite() || end < start {
        bail!("invalid sweep window [{start}, {end}]");
    }

    // Tolerance keeps an end that is an exact multiple of step
    let steps = ((end - start) / step + 1e-9).floor();
    if steps >= MAX_SWEEP_QUERIES as f64 {
        bail!("sweep of {steps} steps exceeds {MAX_SWEEP_QUERIES} queries, use a larger step");
    }
    let count = steps as usize;
    Ok((0..=count).map(|i| start + i as f64 * step).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn span() -> SequenceSpan {
        SequenceSpan { start: 100.0, end: 101.0 }
    }

    #[test]
    fn test_defaults_to_span() {
        let times = sweep_times(span(), None, None, 0.25).unwrap();
        assert_eq!(times.len(), 5);
        assert_relative_eq!(times[0], 100.0);
        assert_relative_eq!(times[4], 101.0);
    }

    #[test]
    fn test_explicit_window() {
        let times = sweep_times(span(), Some(100.5), Some(100.9), 0.1).unwrap();
        assert_eq!(times.len(), 5);
        assert_relative_eq!(times[4], 100.9, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_bad_sweeps() {
        assert!(sweep_times(span(), None, None, 0.0).is_err());
        assert!(sweep_times(span(), Some(101.0), Some(100.0), 0.1).is_err());
        assert!(sweep_times(span(), None, None, f64::NAN).is_err());
    }

    #[test]
    fn test_tiny_step_is_capped() {
        let err = sweep_times(span(), None, None, 1e-9).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(sweep_times(span(), None, None, 1e-5).is_ok());
    }

    #[test]
    fn test_json_output_logs_to_stderr() {
        assert_eq!(LogTarget::for_output(true), LogTarget::Stderr);
        assert_eq!(LogTarget::for_output(false), LogTarget::Stdout);
    }

    #[test]
    fn test_log_filter_sources() {
        let quiet = log_filter(false, None).to_string().to_lowercase();
        assert!(quiet.contains("info"), "{quiet}");

        let verbose = log_filter(true, None).to_string().to_lowercase();
        assert!(verbose.contains("debug"), "{verbose}");

        let env = log_filter(false, Some("radiate_core=trace")).to_string();
        assert!(env.contains("radiate_core=trace"), "{env}");
    }
}
