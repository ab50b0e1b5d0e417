use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordinal severity attached to every pipeline error.
///
/// Severity drives retry and recovery policy: anything below `Critical` is a
/// candidate for retry or graceful degradation, `Critical` always fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Context captured at the failure site.
///
/// Attached when the error is constructed and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Name of the operation that failed (e.g. "execute-build-step")
    pub operation: String,

    /// Platform being built when the failure occurred
    pub platform: Option<String>,

    /// Environment being built when the failure occurred
    pub environment: Option<String>,

    /// Identifier of the build, when one was assigned
    pub build_id: Option<String>,

    /// When the failure occurred
    pub timestamp: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            platform: None,
            environment: None,
            build_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }
}

/// Filesystem operation that was attempted when a `FileSystem` error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FsOperation {
    Read,
    Write,
    Delete,
    CreateDir,
}

impl FsOperation {
    /// Whether a failure of this operation is worth retrying.
    ///
    /// Delete failures are not retried: a file that refuses deletion usually
    /// indicates corruption or a permission problem that repetition won't fix.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, FsOperation::Delete)
    }
}

impl std::fmt::Display for FsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FsOperation::Read => "read",
            FsOperation::Write => "write",
            FsOperation::Delete => "delete",
            FsOperation::CreateDir => "create-dir",
        };
        write!(f, "{label}")
    }
}

/// The closed set of pipeline failure kinds.
///
/// Four kinds model four distinct failure domains; handlers match
/// exhaustively rather than downcasting. No further subdivision: new failure
/// modes pick the closest existing kind and express the difference through
/// severity, context and message.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// A build phase failed for one platform×environment combination.
    #[error("build step failed: {message}")]
    BuildStep {
        message: String,
        severity: Severity,
        context: ErrorContext,
        recovery_hint: Option<String>,
    },

    /// Invalid or missing configuration, detected before any build starts.
    /// Always fatal and never retried.
    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
        severity: Severity,
        context: ErrorContext,
        recovery_hint: Option<String>,
    },

    /// Transient remote-call failure.
    #[error("network error: {message}")]
    Network {
        message: String,
        severity: Severity,
        context: ErrorContext,
        recovery_hint: Option<String>,
    },

    /// A filesystem read/write/delete/create failed; carries the path and
    /// the attempted operation.
    #[error("filesystem {operation} failed for {}: {message}", path.display())]
    FileSystem {
        message: String,
        severity: Severity,
        context: ErrorContext,
        recovery_hint: Option<String>,
        path: PathBuf,
        operation: FsOperation,
    },
}

impl PipelineError {
    pub fn build_step(message: impl Into<String>, severity: Severity, context: ErrorContext) -> Self {
        Self::BuildStep {
            message: message.into(),
            severity,
            context,
            recovery_hint: None,
        }
    }

    pub fn configuration(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Configuration {
            message: message.into(),
            severity: Severity::Critical,
            context,
            recovery_hint: None,
        }
    }

    pub fn network(message: impl Into<String>, severity: Severity, context: ErrorContext) -> Self {
        Self::Network {
            message: message.into(),
            severity,
            context,
            recovery_hint: None,
        }
    }

    pub fn filesystem(
        message: impl Into<String>,
        severity: Severity,
        context: ErrorContext,
        path: impl Into<PathBuf>,
        operation: FsOperation,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            severity,
            context,
            recovery_hint: None,
            path: path.into(),
            operation,
        }
    }

    /// Attaches a human-readable recovery hint, replacing any existing one.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        match &mut self {
            Self::BuildStep { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. }
            | Self::Network { recovery_hint, .. }
            | Self::FileSystem { recovery_hint, .. } => *recovery_hint = Some(hint.into()),
        }
        self
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::BuildStep { severity, .. }
            | Self::Configuration { severity, .. }
            | Self::Network { severity, .. }
            | Self::FileSystem { severity, .. } => *severity,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::BuildStep { context, .. }
            | Self::Configuration { context, .. }
            | Self::Network { context, .. }
            | Self::FileSystem { context, .. } => context,
        }
    }

    pub fn recovery_hint(&self) -> Option<&str> {
        match self {
            Self::BuildStep { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. }
            | Self::Network { recovery_hint, .. }
            | Self::FileSystem { recovery_hint, .. } => recovery_hint.as_deref(),
        }
    }

    /// Whether this error may be retried at all.
    ///
    /// Configuration errors are never retried. Filesystem errors retry only
    /// for recoverable operations. Everything else retries as long as
    /// severity stays below `Critical`.
    pub fn is_retryable(&self) -> bool {
        if self.severity() >= Severity::Critical {
            return false;
        }
        match self {
            Self::Configuration { .. } => false,
            Self::FileSystem { operation, .. } => operation.is_recoverable(),
            Self::BuildStep { .. } | Self::Network { .. } => true,
        }
    }

    /// Returns a copy of this error with the message annotated with how many
    /// attempts were made before giving up.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        match &mut self {
            Self::BuildStep { message, .. }
            | Self::Configuration { message, .. }
            | Self::Network { message, .. }
            | Self::FileSystem { message, .. } => {
                *message = format!("{message} (after {attempts} attempts)");
            }
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
