use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, FsOperation, PipelineError, Result, Severity};

/// Pipeline configuration.
///
/// Normally produced by an external configuration loader; `load` supports the
/// usual on-disk formats for callers that want file-based configuration.
/// `validate` must pass before the orchestrator will run any build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Whether the pipeline is enabled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// CI provider the generated configuration targets
    #[serde(default)]
    pub ci_platform: CiPlatform,

    /// When builds are triggered
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Platforms to build, in build order (e.g. "android", "ios")
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,

    /// Environments to build each platform for, in build order
    #[serde(default = "default_environments")]
    pub environments: Vec<String>,

    /// Performance regression thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Build optimization toggles
    #[serde(default)]
    pub optimization: OptimizationConfig,

    /// Report artifact retention policy
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CiPlatform {
    #[default]
    GithubActions,
    GitlabCi,
    Jenkins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    /// Branches that trigger a build
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,

    /// Build on push
    #[serde(default = "default_enabled")]
    pub on_push: bool,

    /// Build on pull/merge request
    #[serde(default = "default_enabled")]
    pub on_pull_request: bool,

    /// Allow manually triggered builds
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThresholdConfig {
    /// Bundle size growth (percent over baseline mean) that counts as a regression
    #[serde(default = "default_bundle_size_percent")]
    pub bundle_size_percent: f64,

    /// Build time growth (percent over baseline mean) that counts as a regression
    #[serde(default = "default_build_time_percent")]
    pub build_time_percent: f64,

    /// Rolling baseline window size, in samples
    #[serde(default = "default_baseline_samples")]
    pub baseline_samples: usize,

    /// Whether a detected regression fails the affected build instead of
    /// being reported as advisory
    #[serde(default)]
    pub alert_on_regression: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptimizationConfig {
    /// Minify bundles
    #[serde(default = "default_enabled")]
    pub minify: bool,

    /// Enable tree shaking
    #[serde(default = "default_enabled")]
    pub tree_shaking: bool,

    /// Run independent platform×environment builds concurrently
    #[serde(default)]
    pub parallel_builds: bool,

    /// Maximum concurrent builds when parallel-builds is enabled
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-build timeout in seconds; a timed-out build fails alone, the run
    /// continues
    #[serde(default)]
    pub build_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetentionConfig {
    /// Maximum age of kept report artifacts, in days
    #[serde(default = "default_retention_days")]
    pub days: u32,

    /// Maximum number of kept report artifacts
    #[serde(default = "default_max_artifacts")]
    pub max_artifacts: usize,

    /// Directory report artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationConfig {
    #[serde(default = "default_enabled")]
    pub notify_on_failure: bool,

    #[serde(default = "default_enabled")]
    pub notify_on_regression: bool,

    /// Delivery channel identifier, interpreted by the caller
    pub channel: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ci_platform: CiPlatform::default(),
            triggers: TriggerConfig::default(),
            platforms: default_platforms(),
            environments: default_environments(),
            thresholds: ThresholdConfig::default(),
            optimization: OptimizationConfig::default(),
            retention: RetentionConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            branches: default_branches(),
            on_push: true,
            on_pull_request: true,
            manual: false,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            bundle_size_percent: default_bundle_size_percent(),
            build_time_percent: default_build_time_percent(),
            baseline_samples: default_baseline_samples(),
            alert_on_regression: false,
        }
    }
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            minify: true,
            tree_shaking: true,
            parallel_builds: false,
            max_concurrency: default_max_concurrency(),
            build_timeout_secs: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
            max_artifacts: default_max_artifacts(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notify_on_failure: true,
            notify_on_regression: true,
            channel: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_branches() -> Vec<String> {
    vec!["main".to_string()]
}

fn default_platforms() -> Vec<String> {
    vec!["android".to_string(), "ios".to_string()]
}

fn default_environments() -> Vec<String> {
    vec!["development".to_string(), "production".to_string()]
}

fn default_bundle_size_percent() -> f64 {
    10.0
}

fn default_build_time_percent() -> f64 {
    25.0
}

fn default_baseline_samples() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    2
}

fn default_retention_days() -> u32 {
    30
}

fn default_max_artifacts() -> usize {
    20
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./build-reports")
}

impl PipelineConfig {
    /// Checks the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error naming the first violated invariant.
    /// Configuration errors are fatal: the orchestrator refuses to start and
    /// never retries them.
    pub fn validate(&self) -> Result<()> {
        let ctx = || ErrorContext::new("validate-config");

        if self.platforms.is_empty() {
            return Err(PipelineError::configuration(
                "at least one platform is required",
                ctx(),
            ));
        }
        if self.environments.is_empty() {
            return Err(PipelineError::configuration(
                "at least one environment is required",
                ctx(),
            ));
        }
        if !self.thresholds.bundle_size_percent.is_finite()
            || self.thresholds.bundle_size_percent < 0.0
        {
            return Err(PipelineError::configuration(
                format!(
                    "bundle-size-percent must be a non-negative finite number, got {}",
                    self.thresholds.bundle_size_percent
                ),
                ctx(),
            ));
        }
        if !self.thresholds.build_time_percent.is_finite()
            || self.thresholds.build_time_percent < 0.0
        {
            return Err(PipelineError::configuration(
                format!(
                    "build-time-percent must be a non-negative finite number, got {}",
                    self.thresholds.build_time_percent
                ),
                ctx(),
            ));
        }
        if self.thresholds.baseline_samples < 1 {
            return Err(PipelineError::configuration(
                "baseline-samples must be at least 1",
                ctx(),
            ));
        }
        if self.optimization.max_concurrency < 1 {
            return Err(PipelineError::configuration(
                "max-concurrency must be at least 1",
                ctx(),
            ));
        }
        if self.retention.days < 1 {
            return Err(PipelineError::configuration(
                "retention days must be at least 1",
                ctx(),
            ));
        }
        if self.retention.max_artifacts < 1 {
            return Err(PipelineError::configuration(
                "max-artifacts must be at least 1",
                ctx(),
            ));
        }

        Ok(())
    }

    /// Loads configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipewright.toml
    /// 3. ./pipewright.json
    /// 4. ./pipewright.yaml
    /// 5. ./pipewright.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "pipewright.toml",
            "pipewright.json",
            "pipewright.yaml",
            "pipewright.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("load-config"),
                path,
                FsOperation::Read,
            )
        })?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let parsed = match extension {
            "toml" => toml::from_str(&contents).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
            _ => {
                // Unknown extension: try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .map_err(|e| e.to_string())
                    .or_else(|_| serde_json::from_str(&contents).map_err(|e| e.to_string()))
                    .or_else(|_| serde_yaml::from_str(&contents).map_err(|e| e.to_string()))
            }
        };

        parsed.map_err(|e| {
            PipelineError::configuration(
                format!("failed to parse config file {}: {e}", path.display()),
                ErrorContext::new("load-config"),
            )
        })
    }

    /// Saves configuration to a file, picking the format from the extension
    /// (TOML by default).
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            Some("yaml") | Some("yml") => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            _ => toml::to_string_pretty(self).map_err(|e| e.to_string()),
        }
        .map_err(|e| {
            PipelineError::configuration(
                format!("failed to serialize config: {e}"),
                ErrorContext::new("save-config"),
            )
        })?;

        std::fs::write(path, serialized).map_err(|e| {
            PipelineError::filesystem(
                e.to_string(),
                Severity::High,
                ErrorContext::new("save-config"),
                path,
                FsOperation::Write,
            )
        })
    }
}
