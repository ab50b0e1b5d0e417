use std::collections::VecDeque;

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::metrics::{BuildMetrics, BuildResult};
use crate::severity::{calculate_severity, DeviationLevel};

/// Which measurement regressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegressionMetric {
    BundleSize,
    BuildTime,
}

impl std::fmt::Display for RegressionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RegressionMetric::BundleSize => "bundle-size",
            RegressionMetric::BuildTime => "build-time",
        };
        write!(f, "{label}")
    }
}

/// Advisory flag raised when a build exceeds its baseline by more than the
/// configured threshold. Only forces failure when alert-on-regression is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionFlag {
    pub platform: String,
    pub environment: String,
    pub metric: RegressionMetric,

    /// Percentage the new value exceeds the baseline mean by
    pub delta_percent: f64,

    /// Baseline mean the comparison ran against
    pub baseline_mean: f64,

    pub level: DeviationLevel,
}

impl RegressionFlag {
    pub fn describe(&self) -> String {
        format!(
            "{}/{}: {} up {:.1}% over baseline mean {:.0} ({})",
            self.platform, self.environment, self.metric, self.delta_percent, self.baseline_mean, self.level
        )
    }
}

/// Rolling window of historical metrics for one platform×environment pair.
///
/// Append-only with FIFO eviction once the window is full; means are
/// recomputed at comparison time rather than maintained incrementally.
#[derive(Debug, Clone)]
pub struct Baseline {
    window: VecDeque<BuildMetrics>,
    capacity: usize,
}

impl Baseline {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, metrics: BuildMetrics) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(metrics);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn mean_bundle_size(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let sum: u64 = self.window.iter().map(|m| m.js_size + m.assets_size).sum();
        Some(sum as f64 / self.window.len() as f64)
    }

    pub fn mean_build_time_ms(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let sum: f64 = self
            .window
            .iter()
            .map(|m| m.build_time.as_secs_f64() * 1000.0)
            .sum();
        Some(sum / self.window.len() as f64)
    }
}

/// Compares each new build against the rolling baseline for its
/// platform×environment pair.
///
/// Baselines are keyed in insertion order; all writes to a given key happen
/// on the orchestrator task, so the windows never see concurrent updates.
#[derive(Debug)]
pub struct RegressionDetector {
    baselines: IndexMap<(String, String), Baseline>,
    thresholds: ThresholdConfig,
}

impl RegressionDetector {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self {
            baselines: IndexMap::new(),
            thresholds,
        }
    }

    /// Compares `result` against its baseline, then folds it into the window.
    ///
    /// Returns one flag per metric whose growth strictly exceeds its
    /// threshold. An empty baseline produces no flags; the first build for a
    /// pair only seeds the window. Failed builds are compared against nothing
    /// and never enter the baseline, so a broken build can't drag the mean
    /// down for later comparisons.
    pub fn check(&mut self, result: &BuildResult) -> Vec<RegressionFlag> {
        let key = (result.platform.clone(), result.environment.clone());
        let capacity = self.thresholds.baseline_samples;
        let baseline = self
            .baselines
            .entry(key)
            .or_insert_with(|| Baseline::new(capacity));

        let mut flags = Vec::new();
        if result.success {
            let current_size = result.metrics.total_size() as f64;
            if let Some(flag) = compare(
                baseline.mean_bundle_size(),
                current_size,
                self.thresholds.bundle_size_percent,
                RegressionMetric::BundleSize,
                result,
            ) {
                flags.push(flag);
            }

            let current_time = result.metrics.build_time.as_secs_f64() * 1000.0;
            if let Some(flag) = compare(
                baseline.mean_build_time_ms(),
                current_time,
                self.thresholds.build_time_percent,
                RegressionMetric::BuildTime,
                result,
            ) {
                flags.push(flag);
            }

            baseline.push(result.metrics.clone());
            debug!(
                "baseline for {} now holds {} samples",
                result.combination(),
                baseline.len()
            );
        }

        for flag in &flags {
            info!("performance regression: {}", flag.describe());
        }
        flags
    }

    /// Current window size for a pair, if any builds have been recorded.
    pub fn baseline_len(&self, platform: &str, environment: &str) -> Option<usize> {
        self.baselines
            .get(&(platform.to_string(), environment.to_string()))
            .map(Baseline::len)
    }
}

fn compare(
    baseline_mean: Option<f64>,
    current: f64,
    threshold_percent: f64,
    metric: RegressionMetric,
    result: &BuildResult,
) -> Option<RegressionFlag> {
    let mean = baseline_mean?;
    if mean <= 0.0 {
        return None;
    }
    let delta_percent = (current - mean) / mean * 100.0;
    if delta_percent > threshold_percent {
        Some(RegressionFlag {
            platform: result.platform.clone(),
            environment: result.environment.clone(),
            metric,
            delta_percent,
            baseline_mean: mean,
            // Twice the configured threshold marks the jump from major to critical
            level: calculate_severity(delta_percent, threshold_percent, threshold_percent * 2.0),
        })
    } else {
        None
    }
}
