use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::error::{ErrorContext, FsOperation, PipelineError, Result, Severity};
use crate::metrics::BuildResult;
use crate::regression::RegressionFlag;

/// Counts by terminal state for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub regressions: usize,
}

/// Aggregated artifact of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Identifier derived from the generation instant; doubles as the
    /// artifact file stem
    pub run_id: String,

    pub generated_at: DateTime<Utc>,

    /// Sum of per-combination wall-clock durations
    pub total_duration: Duration,

    pub results: Vec<BuildResult>,
    pub regressions: Vec<RegressionFlag>,
}

impl BuildReport {
    pub fn summary(&self) -> RunSummary {
        let succeeded = self.results.iter().filter(|r| r.success).count();
        RunSummary {
            total: self.results.len(),
            succeeded,
            failed: self.results.len() - succeeded,
            regressions: self.regressions.len(),
        }
    }
}

/// Persists run reports and enforces the artifact retention policy.
///
/// Each run produces a structured JSON artifact and a human-readable text
/// rendering side by side; pruning then applies the stricter of the age and
/// count limits to everything already on disk.
pub struct ReportGenerator {
    retention: RetentionConfig,
}

impl ReportGenerator {
    pub fn new(retention: RetentionConfig) -> Self {
        Self { retention }
    }

    /// Builds the report, writes both artifact forms and prunes old ones.
    pub fn generate(
        &self,
        results: &[BuildResult],
        regressions: &[RegressionFlag],
    ) -> Result<BuildReport> {
        let generated_at = Utc::now();
        let report = BuildReport {
            run_id: generated_at.format("%Y%m%d%H%M%S%3f").to_string(),
            generated_at,
            total_duration: results.iter().map(|r| r.duration).sum(),
            results: results.to_vec(),
            regressions: regressions.to_vec(),
        };

        self.persist(&report)?;
        self.prune()?;
        let summary = report.summary();
        info!(
            "report {} written: {}/{} builds succeeded, {} regression flags",
            report.run_id, summary.succeeded, summary.total, summary.regressions
        );
        Ok(report)
    }

    fn persist(&self, report: &BuildReport) -> Result<()> {
        let dir = &self.retention.output_dir;
        std::fs::create_dir_all(dir).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("persist-report"),
                dir,
                FsOperation::CreateDir,
            )
        })?;

        let json_path = dir.join(format!("report-{}.json", report.run_id));
        let json = serde_json::to_string_pretty(report).map_err(|e| {
            PipelineError::configuration(
                format!("failed to serialize report: {e}"),
                ErrorContext::new("persist-report"),
            )
        })?;
        std::fs::write(&json_path, json).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("persist-report"),
                &json_path,
                FsOperation::Write,
            )
        })?;

        let text_path = dir.join(format!("report-{}.txt", report.run_id));
        let mut rendered = Vec::new();
        render_text(report, &mut rendered).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("persist-report"),
                &text_path,
                FsOperation::Write,
            )
        })?;
        std::fs::write(&text_path, rendered).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("persist-report"),
                &text_path,
                FsOperation::Write,
            )
        })?;

        debug!("persisted {} and {}", json_path.display(), text_path.display());
        Ok(())
    }

    /// Applies the stricter of the age and count limits.
    fn prune(&self) -> Result<usize> {
        let age_limit = Duration::from_secs(u64::from(self.retention.days) * 86_400);
        let cutoff = SystemTime::now()
            .checked_sub(age_limit)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.prune_with_cutoff(cutoff)
    }

    fn prune_with_cutoff(&self, cutoff: SystemTime) -> Result<usize> {
        let dir = &self.retention.output_dir;
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::Medium,
                ErrorContext::new("prune-artifacts"),
                dir,
                FsOperation::Read,
            )
        })?;

        // One artifact = one report-<runid>.json; the .txt sibling follows
        // its json's fate.
        let mut artifacts: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with("report-") && name.ends_with(".json") {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                artifacts.push((path, modified));
            }
        }

        // Newest first; everything past the count limit or older than the
        // cutoff goes.
        artifacts.sort_by(|a, b| b.1.cmp(&a.1));

        let mut removed = 0;
        for (index, (json_path, modified)) in artifacts.iter().enumerate() {
            if index < self.retention.max_artifacts && *modified >= cutoff {
                continue;
            }
            for path in [json_path.clone(), json_path.with_extension("txt")] {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    // Pruning is housekeeping; a stubborn file shouldn't
                    // fail the run
                    Err(e) => warn!("failed to prune {}: {e}", path.display()),
                }
            }
        }
        if removed > 0 {
            debug!("pruned {removed} report artifacts from {}", dir.display());
        }
        Ok(removed)
    }
}

/// Renders the human-readable form of a report.
fn render_text(report: &BuildReport, output: &mut dyn Write) -> std::io::Result<()> {
    let summary = report.summary();
    writeln!(output, "Build report {}", report.run_id)?;
    writeln!(
        output,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(
        output,
        "Combinations: {} | succeeded: {} | failed: {} | total build time: {:.1}s",
        summary.total,
        summary.succeeded,
        summary.failed,
        report.total_duration.as_secs_f64()
    )?;

    writeln!(output)?;
    writeln!(output, "Results")?;
    for result in &report.results {
        if result.success {
            writeln!(
                output,
                "  [ ok ] {:<24} {:>8.1}s  {:>10} bytes  {} warnings",
                result.combination(),
                result.duration.as_secs_f64(),
                result.bundle_size,
                result.warnings.len()
            )?;
            if let Some(rate) = result.metrics.cache_hit_rate {
                writeln!(output, "         cache hit rate: {:.0}%", rate * 100.0)?;
            }
        } else {
            writeln!(
                output,
                "  [fail] {:<24} {:>8.1}s  {}",
                result.combination(),
                result.duration.as_secs_f64(),
                result.error.as_deref().unwrap_or("unknown failure")
            )?;
        }
    }

    if !report.regressions.is_empty() {
        writeln!(output)?;
        writeln!(output, "Regressions")?;
        for flag in &report.regressions {
            writeln!(output, "  - {}", flag.describe())?;
        }
    }

    // Per-platform rollup, in result (configuration) order
    let mut by_platform: IndexMap<&str, (usize, usize)> = IndexMap::new();
    for result in &report.results {
        let entry = by_platform.entry(result.platform.as_str()).or_insert((0, 0));
        entry.1 += 1;
        if result.success {
            entry.0 += 1;
        }
    }
    if !by_platform.is_empty() {
        writeln!(output)?;
        writeln!(output, "Platforms")?;
        for (platform, (succeeded, total)) in by_platform {
            writeln!(output, "  {platform}: {succeeded}/{total} succeeded")?;
        }
    }

    Ok(())
}
