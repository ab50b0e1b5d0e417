//! CI configuration generators.
//!
//! Pure, data-driven template rendering for GitHub Actions, GitLab CI and
//! Jenkins. For identical options the output is byte-for-byte identical
//! across calls and process runs: no timestamps, no randomness, iteration
//! strictly in input order. Golden-master reproducibility is a correctness
//! requirement here, not a nicety.

mod github;
mod gitlab;
mod jenkins;

pub use github::generate_github_workflow;
pub use gitlab::generate_gitlab_workflow;
pub use jenkins::generate_jenkinsfile;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, PipelineError, Result};

/// Canonical commands every generated template references.
///
/// All three providers run exactly these, so a pipeline behaves the same no
/// matter which CI system hosts it.
pub const INSTALL_COMMAND: &str = "npm ci";
pub const BUILD_COMMAND: &str = "npm run build";
pub const TEST_COMMAND: &str = "npm test -- --coverage";
pub const BENCHMARK_COMMAND: &str = "npm run benchmark";
pub const MUTATION_COMMAND: &str = "npx stryker run";
pub const DEPLOY_COMMAND: &str = "npm run deploy";

/// Options shared by all three generators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateOptions {
    /// Platforms to build, in emission order
    pub platforms: Vec<String>,

    /// Node versions for the build matrix, in emission order
    pub node_versions: Vec<String>,

    /// Emit a performance benchmark step
    pub performance_benchmarks: bool,

    /// Emit a mutation testing job
    pub mutation_testing: bool,

    /// Allow platform builds to run in parallel
    pub parallel_builds: bool,

    /// Emit a deployment job gated on the main branch
    pub deployment: bool,

    /// Container image builds run in, when set
    pub container_image: Option<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            platforms: vec!["android".to_string(), "ios".to_string()],
            node_versions: vec!["18".to_string(), "20".to_string()],
            performance_benchmarks: false,
            mutation_testing: false,
            parallel_builds: false,
            deployment: false,
            container_image: None,
        }
    }
}

impl TemplateOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(PipelineError::configuration(
                "template options need at least one platform",
                ErrorContext::new("generate-ci-template"),
            ));
        }
        if self.node_versions.is_empty() {
            return Err(PipelineError::configuration(
                "template options need at least one node version",
                ErrorContext::new("generate-ci-template"),
            ));
        }
        Ok(())
    }

    /// Image the jobs run in; defaults to node with the first matrix version.
    pub(crate) fn image(&self) -> String {
        self.container_image
            .clone()
            .unwrap_or_else(|| format!("node:{}", self.node_versions[0]))
    }
}

/// Substrings that must never appear in rendered output outside declared
/// variable-name placeholders. Matched case-insensitively.
const FORBIDDEN_LITERALS: [&str; 3] = ["password", "secret", "token"];

/// Rejects rendered output containing credential-looking literals.
///
/// Declared placeholders (e.g. `${{ secrets.DEPLOY_KEY }}`) are masked out
/// before scanning, so referencing a CI secret store is fine while an inline
/// credential is not. Enforced at generation time rather than left to
/// convention.
pub(crate) fn ensure_no_credential_literals(
    rendered: &str,
    declared_placeholders: &[&str],
) -> Result<()> {
    let mut masked = rendered.to_string();
    for placeholder in declared_placeholders {
        masked = masked.replace(placeholder, &"#".repeat(placeholder.len()));
    }

    let lowered = masked.to_lowercase();
    for literal in FORBIDDEN_LITERALS {
        if lowered.contains(literal) {
            return Err(PipelineError::configuration(
                format!("rendered template contains forbidden literal {literal:?}"),
                ErrorContext::new("generate-ci-template"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_platforms() {
        let options = TemplateOptions {
            platforms: vec![],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_scan_rejects_bare_literals() {
        for text in [
            "env:\n  API_PASSWORD: hunter2",
            "run: echo my-Secret-value",
            "curl -H 'X-Auth-ToKeN: abc'",
        ] {
            assert!(
                ensure_no_credential_literals(text, &[]).is_err(),
                "not rejected: {text}"
            );
        }
    }

    #[test]
    fn test_scan_allows_declared_placeholders() {
        let text = "run: deploy --key \"${{ secrets.DEPLOY_KEY }}\"";
        assert!(ensure_no_credential_literals(text, &["${{ secrets.DEPLOY_KEY }}"]).is_ok());
        // Same text without the declaration is rejected
        assert!(ensure_no_credential_literals(text, &[]).is_err());
    }

    #[test]
    fn test_all_generators_are_reproducible() {
        let options = TemplateOptions {
            performance_benchmarks: true,
            mutation_testing: true,
            parallel_builds: true,
            deployment: true,
            container_image: Some("node:20-bullseye".to_string()),
            ..Default::default()
        };

        for (name, generate) in [
            (
                "github",
                generate_github_workflow as fn(&TemplateOptions) -> Result<String>,
            ),
            ("gitlab", generate_gitlab_workflow),
            ("jenkins", generate_jenkinsfile),
        ] {
            let first = generate(&options).unwrap();
            let second = generate(&options).unwrap();
            assert_eq!(first, second, "{name} output not byte-stable");
            assert!(!first.is_empty());
        }
    }

    #[test]
    fn test_all_generators_share_canonical_commands() {
        let options = TemplateOptions::default();
        for generate in [
            generate_github_workflow as fn(&TemplateOptions) -> Result<String>,
            generate_gitlab_workflow,
            generate_jenkinsfile,
        ] {
            let rendered = generate(&options).unwrap();
            assert!(rendered.contains(INSTALL_COMMAND));
            assert!(rendered.contains(BUILD_COMMAND));
            assert!(rendered.contains(TEST_COMMAND));
        }
    }
}
