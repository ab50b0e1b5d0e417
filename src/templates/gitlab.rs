use crate::error::Result;

use super::{
    ensure_no_credential_literals, TemplateOptions, BENCHMARK_COMMAND, BUILD_COMMAND,
    DEPLOY_COMMAND, INSTALL_COMMAND, MUTATION_COMMAND, TEST_COMMAND,
};

/// Placeholder the deploy job references; masked during the credential scan.
const JOB_AUTH_PLACEHOLDER: &str = "$CI_JOB_TOKEN";

/// Renders a `.gitlab-ci.yml` for the given options.
///
/// One build job per platform, emitted in option order; byte-stable for
/// identical input.
pub fn generate_gitlab_workflow(options: &TemplateOptions) -> Result<String> {
    options.validate()?;

    let mut out = String::new();

    out.push_str("stages:\n");
    out.push_str("  - build\n");
    out.push_str("  - test\n");
    if options.performance_benchmarks {
        out.push_str("  - benchmark\n");
    }
    if options.deployment {
        out.push_str("  - deploy\n");
    }
    out.push('\n');

    out.push_str("default:\n");
    out.push_str(&format!("  image: {}\n", options.image()));
    out.push_str("  before_script:\n");
    out.push_str(&format!("    - {INSTALL_COMMAND}\n"));
    out.push('\n');

    for platform in &options.platforms {
        out.push_str(&format!("build:{platform}:\n"));
        out.push_str("  stage: build\n");
        if options.node_versions.len() > 1 {
            out.push_str("  parallel:\n");
            out.push_str("    matrix:\n");
            out.push_str(&format!(
                "      - NODE_VERSION: [{}]\n",
                options.node_versions.join(", ")
            ));
        }
        if !options.parallel_builds {
            out.push_str("  resource_group: build\n");
        }
        out.push_str("  script:\n");
        out.push_str(&format!("    - {BUILD_COMMAND} -- --platform {platform}\n"));
        out.push_str("  artifacts:\n");
        out.push_str("    paths:\n");
        out.push_str(&format!("      - dist/{platform}\n"));
        out.push('\n');
    }

    out.push_str("test:\n");
    out.push_str("  stage: test\n");
    out.push_str("  script:\n");
    out.push_str(&format!("    - {TEST_COMMAND}\n"));
    out.push('\n');

    if options.mutation_testing {
        out.push_str("mutation:\n");
        out.push_str("  stage: test\n");
        out.push_str("  script:\n");
        out.push_str(&format!("    - {MUTATION_COMMAND}\n"));
        out.push('\n');
    }

    if options.performance_benchmarks {
        out.push_str("benchmark:\n");
        out.push_str("  stage: benchmark\n");
        out.push_str("  script:\n");
        out.push_str(&format!("    - {BENCHMARK_COMMAND}\n"));
        out.push('\n');
    }

    if options.deployment {
        out.push_str("deploy:\n");
        out.push_str("  stage: deploy\n");
        out.push_str("  script:\n");
        out.push_str(&format!(
            "    - {DEPLOY_COMMAND} -- --auth \"{JOB_AUTH_PLACEHOLDER}\"\n"
        ));
        out.push_str("  rules:\n");
        out.push_str("    - if: $CI_COMMIT_BRANCH == \"main\"\n");
    }

    ensure_no_credential_literals(&out, &[JOB_AUTH_PLACEHOLDER])?;
    Ok(out)
}
