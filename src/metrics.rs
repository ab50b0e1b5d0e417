use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurements of one completed build.
///
/// Immutable snapshot taken when the build finishes; baseline windows store
/// these for regression comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetrics {
    /// Size of the emitted JS bundle, in bytes
    pub js_size: u64,

    /// Size of the emitted assets, in bytes
    pub assets_size: u64,

    /// Wall-clock build duration
    pub build_time: Duration,

    /// Process memory snapshot taken when the build completed, in bytes
    pub memory_usage: u64,

    /// Number of emitted bundles, when the toolchain reports it
    pub bundle_count: Option<u32>,

    /// Number of warnings the toolchain emitted
    pub warning_count: Option<u32>,

    /// Bundler cache hit rate in [0, 1], when the toolchain reports it
    pub cache_hit_rate: Option<f64>,
}

impl BuildMetrics {
    /// Total artifact size (bundle plus assets).
    pub fn total_size(&self) -> u64 {
        self.js_size + self.assets_size
    }
}

/// What the external build step reports back on success.
///
/// The actual bundler/toolchain is an external collaborator; this is the
/// shape of its answer.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Duration the toolchain itself reports
    pub duration: Duration,

    /// Where the build artifacts landed
    pub output_path: PathBuf,

    /// Size of the primary bundle, in bytes
    pub bundle_size: u64,

    /// Size of the JS portion, in bytes (defaults to bundle size when the
    /// toolchain doesn't split it out)
    pub js_size: u64,

    /// Size of bundled assets, in bytes
    pub assets_size: u64,

    /// Warnings the toolchain emitted
    pub warnings: Vec<String>,

    /// Number of emitted bundles, when the toolchain reports it
    pub bundle_count: Option<u32>,

    /// Bundler cache hit rate in [0, 1], when the toolchain reports it
    pub cache_hit_rate: Option<f64>,
}

/// Outcome of one platform×environment build.
///
/// Created exactly once per combination and retained both for reporting and
/// as regression baseline input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub platform: String,
    pub environment: String,

    /// Wall-clock duration of the whole combination, retries included
    pub duration: Duration,

    pub output_path: Option<PathBuf>,
    pub bundle_size: u64,
    pub metrics: BuildMetrics,
    pub warnings: Vec<String>,

    /// Human-readable failure description, present iff `success` is false
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl BuildResult {
    /// Label used in logs and reports, e.g. "android/production".
    pub fn combination(&self) -> String {
        format!("{}/{}", self.platform, self.environment)
    }
}

/// Best-effort resident-set snapshot of the current process, in bytes.
///
/// Reads procfs on Linux; other platforms report 0 rather than guessing.
pub fn process_memory_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(resident_pages) = statm.split_whitespace().nth(1) {
                if let Ok(pages) = resident_pages.parse::<u64>() {
                    return pages * 4096;
                }
            }
        }
    }
    0
}
