//! Build-automation pipeline core.
//!
//! Orchestrates multi-platform, multi-environment application builds:
//! sequences the platform×environment cross product, classifies and recovers
//! from failures with severity-driven retry policy, detects performance
//! regressions against rolling baselines, and emits byte-stable CI
//! configuration for GitHub Actions, GitLab CI and Jenkins.
//!
//! The actual bundler/toolchain is an external collaborator behind the
//! [`BuildStep`] trait; this crate decides what to run, how to recover, and
//! what to report.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pipewright::{BuildOrchestrator, PipelineConfig};
//! # use pipewright::{BuildStep, StepOutput};
//! # use futures::future::BoxFuture;
//! # struct Bundler;
//! # impl BuildStep for Bundler {
//! #     fn execute<'a>(
//! #         &'a self,
//! #         _platform: &'a str,
//! #         _environment: &'a str,
//! #         _config: &'a PipelineConfig,
//! #     ) -> BoxFuture<'a, pipewright::Result<StepOutput>> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn run() -> pipewright::Result<()> {
//! let config = PipelineConfig::load(None)?;
//! let mut orchestrator = BuildOrchestrator::new(config, Arc::new(Bundler));
//! orchestrator.initialize()?;
//! let results = orchestrator.execute_build().await?;
//! orchestrator.generate_report(&results)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod regression;
pub mod report;
pub mod retry;
pub mod severity;
pub mod templates;

pub use config::{CiPlatform, PipelineConfig, RetentionConfig, ThresholdConfig};
pub use error::{ErrorContext, FsOperation, PipelineError, Result, Severity};
pub use metrics::{BuildMetrics, BuildResult, StepOutput};
pub use orchestrator::{BuildOrchestrator, BuildState, BuildStep};
pub use regression::{Baseline, RegressionDetector, RegressionFlag, RegressionMetric};
pub use report::{BuildReport, ReportGenerator, RunSummary};
pub use retry::{CancelFlag, Recovery, RecoveryStrategy, RetryExecutor, RetryStrategy};
pub use severity::{calculate_severity, DeviationLevel};
pub use templates::{
    generate_github_workflow, generate_gitlab_workflow, generate_jenkinsfile, TemplateOptions,
};
