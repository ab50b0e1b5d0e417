use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::PipelineConfig;
use crate::error::{ErrorContext, FsOperation, PipelineError, Result, Severity};
use crate::metrics::{process_memory_bytes, BuildMetrics, BuildResult, StepOutput};
use crate::regression::{RegressionDetector, RegressionFlag};
use crate::report::{BuildReport, ReportGenerator};
use crate::retry::{CancelFlag, Recovery, RecoveryStrategy, RetryExecutor, RetryStrategy};

/// Lifecycle of one platform×environment combination.
///
/// `Pending → Building → Success | Failed`; the terminal state is reflected
/// in the combination's `BuildResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Pending,
    Building,
    Success,
    Failed,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BuildState::Pending => "pending",
            BuildState::Building => "building",
            BuildState::Success => "success",
            BuildState::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// The external build step. The actual bundler/toolchain lives behind this
/// seam and is not implemented here.
///
/// One call per platform×environment combination. Implementations report
/// either a `StepOutput` or one of the four pipeline error kinds.
pub trait BuildStep: Send + Sync {
    fn execute<'a>(
        &'a self,
        platform: &'a str,
        environment: &'a str,
        config: &'a PipelineConfig,
    ) -> BoxFuture<'a, Result<StepOutput>>;
}

/// Sequences builds across the platform×environment cross product.
///
/// Explicitly constructed and owned by the caller; there is no process-wide
/// instance. `initialize` must succeed before `execute_build` will run
/// anything. Results always come back in configuration order, whether the
/// run was sequential or concurrent.
pub struct BuildOrchestrator {
    config: Arc<PipelineConfig>,
    step: Arc<dyn BuildStep>,
    executor: RetryExecutor,
    detector: RegressionDetector,
    cancel: CancelFlag,
    initialized: bool,
    last_results: Vec<BuildResult>,
    flags: Vec<RegressionFlag>,
}

impl BuildOrchestrator {
    pub fn new(config: PipelineConfig, step: Arc<dyn BuildStep>) -> Self {
        let cancel = CancelFlag::new();
        let detector = RegressionDetector::new(config.thresholds.clone());
        let executor = RetryExecutor::new(
            RetryStrategy::default(),
            RecoveryStrategy::default(),
            cancel.clone(),
        );
        Self {
            config: Arc::new(config),
            step,
            executor,
            detector,
            cancel,
            initialized: false,
            last_results: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.executor = RetryExecutor::new(
            strategy,
            self.executor.recovery().clone(),
            self.cancel.clone(),
        );
        self
    }

    pub fn with_recovery_strategy(mut self, recovery: RecoveryStrategy) -> Self {
        self.executor = RetryExecutor::new(
            self.executor.strategy().clone(),
            recovery,
            self.cancel.clone(),
        );
        self
    }

    /// Handle the caller can use to cancel the run from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Results of the most recent run, including runs that aborted early.
    pub fn last_run(&self) -> &[BuildResult] {
        &self.last_results
    }

    /// Regression flags raised during the most recent run.
    pub fn regression_flags(&self) -> &[RegressionFlag] {
        &self.flags
    }

    /// Validates configuration and prepares output locations.
    ///
    /// Idempotent. A `Configuration` error here is fatal: it is never
    /// retried and no build starts.
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;

        let output_dir = &self.config.retention.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("prepare-output-dir"),
                output_dir,
                FsOperation::CreateDir,
            )
        })?;

        self.initialized = true;
        info!(
            "pipeline initialized: {} platforms × {} environments, reports in {}",
            self.config.platforms.len(),
            self.config.environments.len(),
            output_dir.display()
        );
        Ok(())
    }

    /// Runs every platform×environment combination and returns the results
    /// in configuration order.
    ///
    /// # Errors
    ///
    /// Propagates the first failure that the recovery policy does not absorb:
    /// critical failures always, non-critical ones unless skip-non-critical
    /// or graceful degradation applies. Results settled before the abort stay
    /// available through `last_run`. Cancellation is not an abort: a
    /// cancelled run returns `Ok` with whatever settled, and a build
    /// interrupted mid-retry settles as a failed result with a cancelled
    /// reason.
    pub async fn execute_build(&mut self) -> Result<Vec<BuildResult>> {
        if !self.initialized {
            return Err(PipelineError::configuration(
                "initialize() must be called before execute_build()",
                ErrorContext::new("execute-build"),
            ));
        }
        if !self.config.enabled {
            info!("pipeline disabled, skipping run");
            return Ok(Vec::new());
        }

        self.last_results.clear();
        self.flags.clear();

        let combinations: Vec<(String, String)> = self
            .config
            .platforms
            .iter()
            .flat_map(|p| {
                self.config
                    .environments
                    .iter()
                    .map(move |e| (p.clone(), e.clone()))
            })
            .collect();

        if self.config.optimization.parallel_builds {
            self.run_parallel(combinations).await?;
        } else {
            self.run_sequential(combinations).await?;
        }

        Ok(self.last_results.clone())
    }

    async fn run_sequential(&mut self, combinations: Vec<(String, String)>) -> Result<()> {
        for (platform, environment) in combinations {
            if self.cancel.is_cancelled() {
                info!("run cancelled before {platform}/{environment}");
                break;
            }
            let (result, error) = Self::run_combination(
                self.step.clone(),
                self.executor.clone(),
                self.config.clone(),
                platform,
                environment,
            )
            .await;
            self.settle(result, error)?;
        }
        Ok(())
    }

    /// Runs independent combinations as bounded parallel tasks, then settles
    /// them in configuration order. Settling on this task keeps every
    /// baseline window single-writer.
    async fn run_parallel(&mut self, combinations: Vec<(String, String)>) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.optimization.max_concurrency));
        // Raised by the first critical failure so queued siblings stand down
        // before they start building.
        let abort = CancelFlag::new();
        let mut tasks = JoinSet::new();

        for (index, (platform, environment)) in combinations.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("run cancelled before {platform}/{environment}");
                break;
            }
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let abort = abort.clone();
            let step = self.step.clone();
            let executor = self.executor.clone();
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                if cancel.is_cancelled() || abort.is_cancelled() {
                    info!("skipping {platform}/{environment}: run stopped");
                    return (index, None);
                }
                let outcome =
                    Self::run_combination(step, executor, config, platform, environment).await;
                if let (_, Some(err)) = &outcome {
                    if err.severity() == Severity::Critical {
                        abort.cancel();
                    }
                }
                (index, Some(outcome))
            });
        }

        let mut collected = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(outcome))) => collected.push((index, outcome)),
                Ok((_, None)) => {}
                Err(e) => warn!("build task failed to join: {e}"),
            }
        }
        // Collect-then-reorder: execution finished in whatever order the
        // scheduler chose, callers see configuration order.
        collected.sort_by_key(|(index, _)| *index);

        let mut fatal = None;
        for (_, (result, error)) in collected {
            if let Err(e) = self.settle(result, error) {
                fatal.get_or_insert(e);
            }
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs one combination end to end: retry-wrapped step call, measurement,
    /// result construction. Returns the raw error alongside the failed result
    /// so the caller can apply recovery policy in configuration order.
    async fn run_combination(
        step: Arc<dyn BuildStep>,
        executor: RetryExecutor,
        config: Arc<PipelineConfig>,
        platform: String,
        environment: String,
    ) -> (BuildResult, Option<PipelineError>) {
        let mut state = BuildState::Pending;
        debug!("{platform}/{environment}: {state}");

        let executor = executor.with_context(
            ErrorContext::new("execute-build-step")
                .with_platform(platform.as_str())
                .with_environment(environment.as_str()),
        );

        state = BuildState::Building;
        debug!("{platform}/{environment}: {state}");

        let timeout = config.optimization.build_timeout_secs.map(Duration::from_secs);
        let started = Instant::now();
        let timestamp = Utc::now();

        let outcome = executor
            .handle_with_retry(|| {
                let step = step.clone();
                let config = config.clone();
                let platform = platform.clone();
                let environment = environment.clone();
                async move {
                    let build = step.execute(&platform, &environment, &config);
                    match timeout {
                        Some(limit) => match tokio::time::timeout(limit, build).await {
                            Ok(result) => result,
                            Err(_) => Err(PipelineError::build_step(
                                format!("build timed out after {}s", limit.as_secs()),
                                Severity::High,
                                ErrorContext::new("execute-build-step")
                                    .with_platform(platform.as_str())
                                    .with_environment(environment.as_str()),
                            )),
                        },
                        None => build.await,
                    }
                }
            })
            .await;

        let duration = started.elapsed();
        match outcome {
            Ok(output) => {
                state = BuildState::Success;
                debug!("{platform}/{environment}: {state} in {}ms", duration.as_millis());
                let metrics = BuildMetrics {
                    js_size: output.js_size,
                    assets_size: output.assets_size,
                    build_time: duration,
                    memory_usage: process_memory_bytes(),
                    bundle_count: output.bundle_count,
                    warning_count: Some(output.warnings.len() as u32),
                    cache_hit_rate: output.cache_hit_rate,
                };
                (
                    BuildResult {
                        success: true,
                        platform,
                        environment,
                        duration,
                        output_path: Some(output.output_path),
                        bundle_size: output.bundle_size,
                        metrics,
                        warnings: output.warnings,
                        error: None,
                        timestamp,
                    },
                    None,
                )
            }
            Err(err) => {
                state = BuildState::Failed;
                warn!("{platform}/{environment}: {state}: {err}");
                let metrics = BuildMetrics {
                    js_size: 0,
                    assets_size: 0,
                    build_time: duration,
                    memory_usage: process_memory_bytes(),
                    bundle_count: None,
                    warning_count: None,
                    cache_hit_rate: None,
                };
                (
                    BuildResult {
                        success: false,
                        platform,
                        environment,
                        duration,
                        output_path: None,
                        bundle_size: 0,
                        metrics,
                        warnings: Vec::new(),
                        error: Some(err.to_string()),
                        timestamp,
                    },
                    Some(err),
                )
            }
        }
    }

    /// Applies regression detection and recovery policy to one settled
    /// combination, in configuration order. Returns the error the run must
    /// abort with, if the policy doesn't absorb the failure.
    fn settle(&mut self, mut result: BuildResult, error: Option<PipelineError>) -> Result<()> {
        let flags = self.detector.check(&result);
        if !flags.is_empty() && self.config.thresholds.alert_on_regression {
            let described: Vec<String> = flags.iter().map(RegressionFlag::describe).collect();
            result.success = false;
            result.error = Some(format!("performance regression: {}", described.join("; ")));
        }
        self.flags.extend(flags);

        let fatal = match error {
            None => None,
            // A cancelled run stops on its own; the in-flight failure settles
            // as a failed result instead of aborting with an error.
            Some(err) if self.cancel.is_cancelled() => {
                info!("{}: failed during cancellation: {err}", result.combination());
                None
            }
            Some(err) => match self.executor.handle_error(err) {
                Recovery::Recovered { .. } => {
                    info!("{}: failure downgraded to recovered", result.combination());
                    None
                }
                Recovery::Failed(err) => {
                    if err.severity() == Severity::Critical
                        || !self.executor.recovery().skip_non_critical
                    {
                        Some(err)
                    } else {
                        debug!("{}: skipping non-critical failure", result.combination());
                        None
                    }
                }
            },
        };

        self.last_results.push(result);
        match fatal {
            Some(err) => {
                warn!("aborting run: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Aggregates results into a persisted report and prunes old artifacts.
    pub fn generate_report(&self, results: &[BuildResult]) -> Result<BuildReport> {
        let generator = ReportGenerator::new(self.config.retention.clone());
        generator.generate(results, &self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    /// Configurable stand-in for the external bundler.
    struct FakeStep {
        bundle_size: AtomicU64,
        build_delay: Duration,
        calls: AtomicU32,
        fail: Option<(String, String, Severity)>,
        // When set, the step raises this flag during its first invocation,
        // simulating a caller cancelling mid-build
        cancel_on_call: std::sync::OnceLock<CancelFlag>,
    }

    impl FakeStep {
        fn succeeding(bundle_size: u64) -> Self {
            Self {
                bundle_size: AtomicU64::new(bundle_size),
                build_delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                fail: None,
                cancel_on_call: std::sync::OnceLock::new(),
            }
        }

        fn failing_on(platform: &str, environment: &str, severity: Severity) -> Self {
            Self {
                fail: Some((platform.to_string(), environment.to_string(), severity)),
                ..Self::succeeding(1000)
            }
        }

        fn failing_everywhere(severity: Severity) -> Self {
            Self::failing_on("*", "*", severity)
        }
    }

    impl BuildStep for FakeStep {
        fn execute<'a>(
            &'a self,
            platform: &'a str,
            environment: &'a str,
            _config: &'a PipelineConfig,
        ) -> BoxFuture<'a, Result<StepOutput>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(flag) = self.cancel_on_call.get() {
                    flag.cancel();
                }
                if !self.build_delay.is_zero() {
                    tokio::time::sleep(self.build_delay).await;
                }
                if let Some((p, e, severity)) = &self.fail {
                    if p == "*" || (p == platform && e == environment) {
                        return Err(PipelineError::build_step(
                            "bundler exited 1",
                            *severity,
                            ErrorContext::new("execute-build-step")
                                .with_platform(platform)
                                .with_environment(environment),
                        ));
                    }
                }
                let size = self.bundle_size.load(Ordering::SeqCst);
                Ok(StepOutput {
                    duration: Duration::from_millis(5),
                    output_path: PathBuf::from(format!("dist/{platform}/{environment}")),
                    bundle_size: size,
                    js_size: size,
                    assets_size: 0,
                    warnings: vec![],
                    bundle_count: Some(1),
                    cache_hit_rate: None,
                })
            })
        }
    }

    fn test_config(dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.retention.output_dir = dir.join("reports");
        config
    }

    fn orchestrator_with(
        config: PipelineConfig,
        step: Arc<FakeStep>,
    ) -> BuildOrchestrator {
        BuildOrchestrator::new(config, step).with_retry_strategy(RetryStrategy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        })
    }

    #[tokio::test]
    async fn test_cross_product_in_configuration_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step);

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();

        let combos: Vec<String> = results.iter().map(BuildResult::combination).collect();
        assert_eq!(
            combos,
            vec![
                "android/development",
                "android/production",
                "ios/development",
                "ios/production"
            ]
        );
        assert!(results.iter().all(|r| r.success));
        assert!(results.iter().all(|r| r.bundle_size == 1000));
    }

    #[tokio::test]
    async fn test_configuration_error_prevents_any_build() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.platforms = vec![];
        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(config, step.clone());

        let err = orchestrator.initialize().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));

        // Without a successful initialize, execute_build refuses to run
        let err = orchestrator.execute_build().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(orchestrator.last_run().is_empty());
        assert_eq!(step.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step);
        orchestrator.initialize().unwrap();
        orchestrator.initialize().unwrap();
    }

    #[tokio::test]
    async fn test_skip_non_critical_continues_past_failure() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::failing_on("android", "production", Severity::Medium));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step)
            .with_recovery_strategy(RecoveryStrategy {
                skip_non_critical: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("bundler exited 1"));
        assert!(results[0].success && results[2].success && results[3].success);
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_remaining_combinations() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::failing_on(
            "android",
            "development",
            Severity::Critical,
        ));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step.clone())
            .with_recovery_strategy(RecoveryStrategy {
                skip_non_critical: true,
                enable_retry: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        let err = orchestrator.execute_build().await.unwrap_err();
        assert!(matches!(err, PipelineError::BuildStep { .. }));

        // The failed combination is recorded; nothing after it ran
        assert_eq!(orchestrator.last_run().len(), 1);
        assert!(!orchestrator.last_run()[0].success);
        // Critical errors are never retried
        assert_eq!(step.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_critical_failure_without_skip_aborts() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::failing_on("android", "development", Severity::Medium));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step);

        orchestrator.initialize().unwrap();
        assert!(orchestrator.execute_build().await.is_err());
        assert_eq!(orchestrator.last_run().len(), 1);
    }

    #[tokio::test]
    async fn test_graceful_degradation_absorbs_failure() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::failing_on("android", "development", Severity::Medium));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step)
            .with_recovery_strategy(RecoveryStrategy {
                graceful_degradation: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();
        assert_eq!(results.len(), 4);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn test_parallel_mode_preserves_configuration_order() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.optimization.parallel_builds = true;
        config.optimization.max_concurrency = 4;
        let step = Arc::new(FakeStep {
            build_delay: Duration::from_millis(5),
            ..FakeStep::succeeding(1000)
        });
        let mut orchestrator = orchestrator_with(config, step);

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();
        let combos: Vec<String> = results.iter().map(BuildResult::combination).collect();
        assert_eq!(
            combos,
            vec![
                "android/development",
                "android/production",
                "ios/development",
                "ios/production"
            ]
        );
    }

    #[tokio::test]
    async fn test_cancellation_before_first_combination() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step.clone());

        orchestrator.initialize().unwrap();
        orchestrator.cancel_flag().cancel();
        let results = orchestrator.execute_build().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(step.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_retry_settles_as_failed_result() {
        let temp = tempfile::tempdir().unwrap();
        let step = Arc::new(FakeStep::failing_on("android", "development", Severity::Medium));
        let mut orchestrator = orchestrator_with(test_config(temp.path()), step.clone())
            .with_recovery_strategy(RecoveryStrategy {
                enable_retry: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        // The first build raises the cancel flag while running; the retry
        // loop observes it before the second attempt
        step.cancel_on_call
            .set(orchestrator.cancel_flag())
            .unwrap();
        let results = orchestrator.execute_build().await.unwrap();

        // The interrupted combination settles as a failed result, the run
        // itself ends cleanly with nothing after it
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("cancelled"));
        assert_eq!(step.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parallel_critical_failure_stops_queued_siblings() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.optimization.parallel_builds = true;
        config.optimization.max_concurrency = 1;
        let step = Arc::new(FakeStep::failing_everywhere(Severity::Critical));
        let mut orchestrator = orchestrator_with(config, step.clone());

        orchestrator.initialize().unwrap();
        let err = orchestrator.execute_build().await.unwrap_err();
        assert!(matches!(err, PipelineError::BuildStep { .. }));

        // Whichever combination ran first failed critically; the rest never
        // invoked the step
        assert_eq!(step.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.last_run().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_pipeline_runs_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.enabled = false;
        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(config, step.clone());

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(step.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_build() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.platforms = vec!["android".to_string()];
        config.environments = vec!["development".to_string(), "production".to_string()];
        config.optimization.build_timeout_secs = Some(1);
        let step = Arc::new(FakeStep {
            build_delay: Duration::from_millis(1500),
            ..FakeStep::succeeding(1000)
        });
        let mut orchestrator = orchestrator_with(config, step)
            .with_recovery_strategy(RecoveryStrategy {
                skip_non_critical: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        let results = orchestrator.execute_build().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_alert_on_regression_fails_the_combination() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = test_config(temp.path());
        config.platforms = vec!["android".to_string()];
        config.environments = vec!["production".to_string()];
        config.thresholds.alert_on_regression = true;
        config.thresholds.bundle_size_percent = 10.0;

        let step = Arc::new(FakeStep::succeeding(1000));
        let mut orchestrator = orchestrator_with(config, step.clone())
            .with_recovery_strategy(RecoveryStrategy {
                skip_non_critical: true,
                ..Default::default()
            });

        orchestrator.initialize().unwrap();
        // First run seeds the baseline
        let results = orchestrator.execute_build().await.unwrap();
        assert!(results[0].success);

        // Second run is 50% larger: regression flagged and, with
        // alert-on-regression, the combination fails
        step.bundle_size.store(1500, Ordering::SeqCst);
        let results = orchestrator.execute_build().await.unwrap();
        assert!(!results[0].success);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("performance regression"));
        assert!(!orchestrator.regression_flags().is_empty());
    }
}
