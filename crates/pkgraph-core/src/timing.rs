//! Opt-in per-stage timing.
//!
//! A [`StageTimings`] is created by the caller and threaded through the
//! pipeline; a disabled one records nothing. [`StageTimings::report`] groups
//! samples by stage name and reports p50/p95/p99.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde_json::json;

/// Timing statistics for a single named stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStats {
    pub name: String,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub count: usize,
}

/// Aggregated timing report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingReport {
    pub stages: Vec<StageStats>,
}

/// Collected samples, keyed by stage name.
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    enabled: bool,
    samples: BTreeMap<String, Vec<Duration>>,
}

impl StageTimings {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            samples: BTreeMap::new(),
        }
    }

    /// Enabled when `PKGRAPH_TIMING` is `1`, `true`, `yes` or `on`.
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("PKGRAPH_TIMING")
            .ok()
            .is_some_and(|value| is_truthy(&value));
        Self::new(enabled)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, recording its duration under `name` when enabled.
    pub fn timed<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }
        let started = Instant::now();
        let result = f();
        self.record(name, started.elapsed());
        result
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        if self.enabled {
            self.samples.entry(name.to_string()).or_default().push(elapsed);
        }
    }

    #[must_use]
    pub fn report(&self) -> TimingReport {
        let stages = self
            .samples
            .iter()
            .map(|(name, values)| {
                let mut sorted = values.clone();
                sorted.sort_unstable();
                StageStats {
                    name: name.clone(),
                    p50: percentile(&sorted, 50),
                    p95: percentile(&sorted, 95),
                    p99: percentile(&sorted, 99),
                    count: sorted.len(),
                }
            })
            .collect();
        TimingReport { stages }
    }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let stages: Vec<_> = self
            .stages
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "count": s.count,
                    "p50_us": s.p50.as_micros(),
                    "p95_us": s.p95.as_micros(),
                    "p99_us": s.p99.as_micros(),
                })
            })
            .collect();
        json!({ "stages": stages })
    }

    /// Plain table for stderr.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.stages.is_empty() {
            return "No timing samples recorded.".to_string();
        }
        let mut out = String::from("stage                        count      p50      p95      p99\n");
        out.push_str(&"-".repeat(62));
        out.push('\n');
        for s in &self.stages {
            let _ = writeln!(
                out,
                "{:<28} {:>6} {:>8} {:>8} {:>8}",
                s.name,
                s.count,
                format_duration(s.p50),
                format_duration(s.p95),
                format_duration(s.p99)
            );
        }
        out
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    match micros {
        m if m >= 1_000_000 => format!("{}.{:03}s", m / 1_000_000, (m % 1_000_000) / 1_000),
        m if m >= 1_000 => format!("{}.{:03}ms", m / 1_000, m % 1_000),
        m => format!("{m}µs"),
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|t| value.trim().eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_records_nothing() {
        let mut t = StageTimings::new(false);
        assert_eq!(t.timed("build", || 7), 7);
        assert!(t.report().is_empty());
    }

    #[test]
    fn groups_by_stage_name() {
        let mut t = StageTimings::new(true);
        t.record("features", Duration::from_micros(3_000));
        t.record("features", Duration::from_micros(1_000));
        t.record("features", Duration::from_micros(2_000));
        t.record("build", Duration::from_micros(500));

        let report = t.report();
        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.stages[0].name, "build");
        let features = &report.stages[1];
        assert_eq!(features.count, 3);
        assert_eq!(features.p50, Duration::from_micros(2_000));
        assert_eq!(features.p99, Duration::from_micros(3_000));
    }

    #[test]
    fn table_and_json_render() {
        let mut t = StageTimings::new(true);
        t.record("load", Duration::from_micros(1_500));
        let report = t.report();
        assert!(report.display_table().contains("1.500ms"));
        assert_eq!(report.to_json()["stages"][0]["p50_us"], 1_500);
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("ON"));
        assert!(is_truthy(" 1 "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
