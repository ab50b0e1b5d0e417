use crate::error::Result;

use super::{
    ensure_no_credential_literals, TemplateOptions, BENCHMARK_COMMAND, BUILD_COMMAND,
    DEPLOY_COMMAND, INSTALL_COMMAND, MUTATION_COMMAND, TEST_COMMAND,
};

/// Placeholder the deploy job references; masked during the credential scan.
const DEPLOY_KEY_PLACEHOLDER: &str = "${{ secrets.DEPLOY_KEY }}";

/// Renders a GitHub Actions workflow for the given options.
///
/// Byte-stable for identical input. Matrix axes are emitted in the order the
/// options list them.
pub fn generate_github_workflow(options: &TemplateOptions) -> Result<String> {
    options.validate()?;

    let mut out = String::new();
    out.push_str("name: Build Pipeline\n\n");

    out.push_str("on:\n");
    out.push_str("  push:\n");
    out.push_str("    branches: [main]\n");
    out.push_str("  pull_request:\n");
    out.push_str("    branches: [main]\n\n");

    out.push_str("jobs:\n");
    out.push_str("  build:\n");
    out.push_str("    runs-on: ubuntu-latest\n");
    if let Some(image) = &options.container_image {
        out.push_str(&format!("    container: {image}\n"));
    }
    out.push_str("    strategy:\n");
    out.push_str("      fail-fast: false\n");
    let max_parallel = if options.parallel_builds {
        options.platforms.len() * options.node_versions.len()
    } else {
        1
    };
    out.push_str(&format!("      max-parallel: {max_parallel}\n"));
    out.push_str("      matrix:\n");
    out.push_str(&format!(
        "        platform: [{}]\n",
        options.platforms.join(", ")
    ));
    out.push_str(&format!(
        "        node-version: [{}]\n",
        options.node_versions.join(", ")
    ));
    out.push_str("    steps:\n");
    out.push_str("      - uses: actions/checkout@v4\n");
    out.push_str("      - uses: actions/setup-node@v4\n");
    out.push_str("        with:\n");
    out.push_str("          node-version: ${{ matrix.node-version }}\n");
    out.push_str("          cache: npm\n");
    out.push_str("      - name: Install dependencies\n");
    out.push_str(&format!("        run: {INSTALL_COMMAND}\n"));
    out.push_str("      - name: Build\n");
    out.push_str(&format!(
        "        run: {BUILD_COMMAND} -- --platform ${{{{ matrix.platform }}}}\n"
    ));
    out.push_str("      - name: Test\n");
    out.push_str(&format!("        run: {TEST_COMMAND}\n"));
    if options.performance_benchmarks {
        out.push_str("      - name: Performance benchmarks\n");
        out.push_str(&format!("        run: {BENCHMARK_COMMAND}\n"));
    }

    if options.mutation_testing {
        out.push_str("\n  mutation:\n");
        out.push_str("    runs-on: ubuntu-latest\n");
        out.push_str("    steps:\n");
        out.push_str("      - uses: actions/checkout@v4\n");
        out.push_str("      - uses: actions/setup-node@v4\n");
        out.push_str("        with:\n");
        out.push_str(&format!(
            "          node-version: {}\n",
            options.node_versions[0]
        ));
        out.push_str(&format!("      - run: {INSTALL_COMMAND}\n"));
        out.push_str("      - name: Mutation testing\n");
        out.push_str(&format!("        run: {MUTATION_COMMAND}\n"));
    }

    if options.deployment {
        out.push_str("\n  deploy:\n");
        out.push_str("    needs: build\n");
        out.push_str("    if: github.ref == 'refs/heads/main'\n");
        out.push_str("    runs-on: ubuntu-latest\n");
        out.push_str("    steps:\n");
        out.push_str("      - uses: actions/checkout@v4\n");
        out.push_str("      - uses: actions/setup-node@v4\n");
        out.push_str("        with:\n");
        out.push_str(&format!(
            "          node-version: {}\n",
            options.node_versions[0]
        ));
        out.push_str(&format!("      - run: {INSTALL_COMMAND}\n"));
        out.push_str("      - name: Deploy\n");
        out.push_str(&format!(
            "        run: {DEPLOY_COMMAND} -- --key \"{DEPLOY_KEY_PLACEHOLDER}\"\n"
        ));
    }

    ensure_no_credential_literals(&out, &[DEPLOY_KEY_PLACEHOLDER])?;
    Ok(out)
}
