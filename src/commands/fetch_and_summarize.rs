use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::commands::CommandReport;
use crate::commands::fetch_issues::{fetch_into_documents, report_outcome, resolve_github_token};
use crate::commands::summarize::{
    SummaryJob, build_client, report_summary, summarize_saved_documents,
};
use crate::digest::config::{Credentials, DigestConfig, load_config_with};
use crate::digest::github::IssueFetcher;
use crate::digest::repo_url::parse_repo_url;

#[derive(Debug, Clone, Default)]
pub struct FetchAndSummarizeOptions {
    pub repo_url: String,
    pub issues_dir: Option<PathBuf>,
    pub summaries_dir: Option<PathBuf>,
    pub max_issues: Option<usize>,
    pub max_per_file: Option<usize>,
    pub no_comments: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub token_budget: Option<usize>,
    pub token: Option<String>,
}

impl FetchAndSummarizeOptions {
    pub fn apply(&self, cfg: &mut DigestConfig) {
        if let Some(dir) = &self.issues_dir {
            cfg.output.issues_dir = dir.clone();
        }
        if let Some(dir) = &self.summaries_dir {
            cfg.output.summaries_dir = dir.clone();
        }
        if let Some(max) = self.max_issues {
            cfg.fetch.max_issues = Some(max);
        }
        if let Some(per_file) = self.max_per_file {
            cfg.fetch.max_issues_per_file = per_file;
        }
        if self.no_comments {
            cfg.fetch.include_comments = false;
        }
        if let Some(provider) = &self.provider {
            cfg.llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            cfg.llm.model = Some(model.clone());
        }
        if let Some(budget) = self.token_budget {
            cfg.llm.token_budget = budget;
        }
    }
}

pub fn run(opts: &FetchAndSummarizeOptions) -> Result<CommandReport> {
    let repo = parse_repo_url(&opts.repo_url)?;
    let cfg = load_config_with(|cfg| opts.apply(cfg))?;
    let token = resolve_github_token(opts.token.as_deref(), &Credentials::from_env())?;
    let client = build_client(&cfg)?;

    let mut report = CommandReport::new("fetch-and-summarize");

    info!(repo = %repo, "step 1: fetching issues");
    let fetcher = IssueFetcher::connect(&token, &cfg.fetch.api_base_url)?;
    let outcome = fetch_into_documents(&fetcher, &repo, &cfg)?;
    let mut fetched = CommandReport::new("fetch-issues");
    report_outcome(&mut fetched, &outcome);
    report.merge(fetched);
    if outcome.files.is_empty() {
        warn!(repo = %repo, "no issues found, skipping summary");
        report.detail("summary skipped");
        return Ok(report);
    }

    info!(repo = %repo, "step 2: generating summary");
    let repo_name = repo.file_stem();
    let summary = summarize_saved_documents(
        &client,
        &SummaryJob {
            repo_name: &repo_name,
            issues_dir: &cfg.output.issues_dir,
            summaries_dir: &cfg.output.summaries_dir,
            token_budget: cfg.llm.token_budget,
            provider: client.provider().label(),
            model: client.model(),
        },
    )?;
    report_summary(&mut report, &client, &summary);
    Ok(report)
}
