use crate::error::Result;

use super::{
    ensure_no_credential_literals, TemplateOptions, BENCHMARK_COMMAND, BUILD_COMMAND,
    DEPLOY_COMMAND, INSTALL_COMMAND, MUTATION_COMMAND, TEST_COMMAND,
};

/// Renders a declarative Jenkinsfile for the given options.
///
/// Platform builds become parallel branches when parallel-builds is set,
/// sequential stages otherwise; byte-stable for identical input.
pub fn generate_jenkinsfile(options: &TemplateOptions) -> Result<String> {
    options.validate()?;

    let mut out = String::new();
    out.push_str("pipeline {\n");
    out.push_str("    agent {\n");
    out.push_str("        docker {\n");
    out.push_str(&format!("            image '{}'\n", options.image()));
    out.push_str("        }\n");
    out.push_str("    }\n");
    out.push_str("    stages {\n");

    out.push_str("        stage('Install') {\n");
    out.push_str("            steps {\n");
    out.push_str(&format!("                sh '{INSTALL_COMMAND}'\n"));
    out.push_str("            }\n");
    out.push_str("        }\n");

    if options.parallel_builds && options.platforms.len() > 1 {
        out.push_str("        stage('Build') {\n");
        out.push_str("            parallel {\n");
        for platform in &options.platforms {
            push_build_stage(&mut out, platform, "                ");
        }
        out.push_str("            }\n");
        out.push_str("        }\n");
    } else {
        for platform in &options.platforms {
            push_build_stage(&mut out, platform, "        ");
        }
    }

    out.push_str("        stage('Test') {\n");
    out.push_str("            steps {\n");
    out.push_str(&format!("                sh '{TEST_COMMAND}'\n"));
    out.push_str("            }\n");
    out.push_str("        }\n");

    if options.mutation_testing {
        out.push_str("        stage('Mutation') {\n");
        out.push_str("            steps {\n");
        out.push_str(&format!("                sh '{MUTATION_COMMAND}'\n"));
        out.push_str("            }\n");
        out.push_str("        }\n");
    }

    if options.performance_benchmarks {
        out.push_str("        stage('Benchmark') {\n");
        out.push_str("            steps {\n");
        out.push_str(&format!("                sh '{BENCHMARK_COMMAND}'\n"));
        out.push_str("            }\n");
        out.push_str("        }\n");
    }

    if options.deployment {
        out.push_str("        stage('Deploy') {\n");
        out.push_str("            when {\n");
        out.push_str("                branch 'main'\n");
        out.push_str("            }\n");
        out.push_str("            environment {\n");
        out.push_str("                DEPLOY_KEY = credentials('deploy-key')\n");
        out.push_str("            }\n");
        out.push_str("            steps {\n");
        out.push_str(&format!(
            "                sh '{DEPLOY_COMMAND} -- --key \"$DEPLOY_KEY\"'\n"
        ));
        out.push_str("            }\n");
        out.push_str("        }\n");
    }

    out.push_str("    }\n");
    out.push_str("}\n");

    ensure_no_credential_literals(&out, &[])?;
    Ok(out)
}

fn push_build_stage(out: &mut String, platform: &str, indent: &str) {
    out.push_str(&format!("{indent}stage('Build {platform}') {{\n"));
    out.push_str(&format!("{indent}    steps {{\n"));
    out.push_str(&format!(
        "{indent}        sh '{BUILD_COMMAND} -- --platform {platform}'\n"
    ));
    out.push_str(&format!("{indent}    }}\n"));
    out.push_str(&format!("{indent}}}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_build_stages_in_order() {
        let rendered = generate_jenkinsfile(&TemplateOptions::default()).unwrap();
        let android = rendered.find("stage('Build android')").unwrap();
        let ios = rendered.find("stage('Build ios')").unwrap();
        assert!(android < ios);
        assert!(!rendered.contains("parallel {"));
    }

    #[test]
    fn test_parallel_builds_branch() {
        let options = TemplateOptions {
            parallel_builds: true,
            ..Default::default()
        };
        let rendered = generate_jenkinsfile(&options).unwrap();
        assert!(rendered.contains("parallel {"));
        assert!(rendered.contains("stage('Build android')"));
        assert!(rendered.contains("stage('Build ios')"));
    }

    #[test]
    fn test_deploy_uses_credentials_binding_not_literals() {
        let options = TemplateOptions {
            deployment: true,
            ..Default::default()
        };
        let rendered = generate_jenkinsfile(&options).unwrap();
        assert!(rendered.contains("credentials('deploy-key')"));
        assert!(rendered.contains("branch 'main'"));
        let lowered = rendered.to_lowercase();
        for literal in ["password", "secret", "token"] {
            assert!(!lowered.contains(literal), "found {literal}");
        }
    }

    #[test]
    fn test_agent_image_follows_options() {
        let options = TemplateOptions {
            container_image: Some("registry.example.com/builder:1".to_string()),
            ..Default::default()
        };
        let rendered = generate_jenkinsfile(&options).unwrap();
        assert!(rendered.contains("image 'registry.example.com/builder:1'"));
    }
}
