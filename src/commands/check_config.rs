use anyhow::Result;

use crate::commands::CommandReport;
use crate::digest::config::{Credentials, DigestConfig, load_config};
use crate::digest::llm::LlmProvider;

fn presence(value: &Option<String>) -> &'static str {
    if value.is_some() { "configured" } else { "missing" }
}

/// Reports what is configured without ever echoing a secret.
pub fn inspect(cfg: &DigestConfig, credentials: &Credentials) -> CommandReport {
    let mut report = CommandReport::new("check-config");

    report.detail(format!("github_token={}", presence(&credentials.github_token)));
    if credentials.github_token.is_none() {
        report.issue("GITHUB_TOKEN not set (required for fetching issues)");
    }

    report.detail(format!("llm_provider={}", cfg.llm.provider));
    match LlmProvider::parse(&cfg.llm.provider) {
        Ok(provider) => {
            let key = match provider {
                LlmProvider::OpenAi => &credentials.openai_api_key,
                LlmProvider::Anthropic => &credentials.anthropic_api_key,
            };
            report.detail(format!("{}={}", provider.credential_var(), presence(key)));
            if key.is_none() {
                report.issue(format!(
                    "{} not set (required for provider {provider})",
                    provider.credential_var()
                ));
            }
            report.detail(format!(
                "llm_model={}",
                cfg.llm.model.as_deref().unwrap_or(provider.default_model())
            ));
        }
        Err(err) => report.issue(err.to_string()),
    }

    report.detail(format!("token_budget={}", cfg.llm.token_budget));
    report.detail(format!("max_issues_per_file={}", cfg.fetch.max_issues_per_file));
    if let Some(max) = cfg.fetch.max_issues {
        report.detail(format!("max_issues={max}"));
    }
    report.detail(format!("include_comments={}", cfg.fetch.include_comments));
    report.detail(format!("github_api_url={}", cfg.fetch.api_base_url));
    report.detail(format!("issues_dir={}", cfg.output.issues_dir.display()));
    report.detail(format!("summaries_dir={}", cfg.output.summaries_dir.display()));
    report
}

pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    Ok(inspect(&cfg, &Credentials::from_env()))
}
