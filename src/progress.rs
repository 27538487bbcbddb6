//! Indexing progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. The pipeline throttles verbose detail (percentages, ETA) to
//! every 50 processed files, always reporting on the final batch.

use std::io::Write;
use std::time::Duration;

/// A single progress event for an index run.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// Counting eligible files; total unknown yet.
    Counting { project: String },
    /// Ingest phase: `processed` files handed to the sink out of `total`.
    /// `detail` carries throttled verbose text (percentage, ETA).
    Ingesting {
        project: String,
        processed: u64,
        total: u64,
        detail: Option<String>,
    },
    /// The run ended, normally or by cancellation.
    Finished {
        project: String,
        processed: u64,
        total: u64,
        failed_batches: usize,
        canceled: bool,
    },
}

/// Reports indexing progress. Implementations write to stderr.
pub trait IndexProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion pipeline.
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress: "index demo  1,200 / 5,000 files  eta 02:41".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Counting { project } => {
                format!("index {}  counting files...\n", project)
            }
            IndexProgressEvent::Ingesting {
                project,
                processed,
                total,
                detail,
            } => match detail {
                Some(detail) => format!("index {}  {}\n", project, detail),
                None => format!(
                    "index {}  {} / {} files\n",
                    project,
                    format_number(*processed),
                    format_number(*total)
                ),
            },
            IndexProgressEvent::Finished {
                project,
                processed,
                total,
                failed_batches,
                canceled,
            } => {
                let status = if *canceled {
                    "canceled"
                } else if *failed_batches > 0 {
                    "done (some files were skipped)"
                } else {
                    "done"
                };
                format!(
                    "index {}  {}  {} / {} files\n",
                    project,
                    status,
                    format_number(*processed),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

/// Estimate time remaining as `elapsed * (total - processed) / processed`,
/// formatted `MM:SS`. Returns `--:--` before any file has been processed.
pub fn format_eta(elapsed: Duration, processed: u64, total: u64) -> String {
    if processed == 0 || total <= processed {
        return if processed == 0 {
            "--:--".to_string()
        } else {
            "00:00".to_string()
        };
    }
    let remaining_ms = elapsed.as_millis() * (total - processed) as u128 / processed as u128;
    format_duration(Duration::from_millis(remaining_ms as u64))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn eta_scales_remaining_work_by_observed_rate() {
        // 100 of 400 files in 60s leaves 300 files at 0.6s each.
        let eta = format_eta(Duration::from_secs(60), 100, 400);
        assert_eq!(eta, "03:00");
    }

    #[test]
    fn eta_edges() {
        assert_eq!(format_eta(Duration::from_secs(10), 0, 400), "--:--");
        assert_eq!(format_eta(Duration::from_secs(10), 400, 400), "00:00");
    }

    #[test]
    fn duration_is_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00");
        assert_eq!(format_duration(Duration::from_secs(61)), "01:01");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60:00");
    }
}
