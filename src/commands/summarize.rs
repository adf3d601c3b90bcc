use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands::CommandReport;
use crate::digest::chunk::estimate_tokens;
use crate::digest::config::{Credentials, DigestConfig, load_config_with};
use crate::digest::llm::{ChatBackend, LlmClient};
use crate::digest::store::{context_label, load_issue_documents, write_summary};
use crate::digest::summarize::Summarizer;

#[derive(Debug, Clone, Default)]
pub struct SummarizeOptions {
    pub repo_name: String,
    pub issues_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub token_budget: Option<usize>,
}

impl SummarizeOptions {
    pub fn apply(&self, cfg: &mut DigestConfig) {
        if let Some(dir) = &self.issues_dir {
            cfg.output.issues_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            cfg.output.summaries_dir = dir.clone();
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

#[derive(Debug, Clone)]
pub struct SummaryJob<'a> {
    pub repo_name: &'a str,
    pub issues_dir: &'a Path,
    pub summaries_dir: &'a Path,
    pub token_budget: usize,
    pub provider: &'a str,
    pub model: &'a str,
}

#[derive(Debug, Clone)]
pub struct SummaryFile {
    pub path: PathBuf,
    pub document_count: usize,
    pub chunk_count: usize,
}

/// Loads the saved documents, summarizes them, and writes the summary file.
pub fn summarize_saved_documents<C: ChatBackend>(
    chat: &C,
    job: &SummaryJob<'_>,
) -> Result<SummaryFile> {
    let documents = load_issue_documents(job.repo_name, job.issues_dir)?;
    info!(repo = job.repo_name, files = documents.len(), "loaded issue documents");

    let combined = documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let label = context_label(job.repo_name);

    let outcome =
        Summarizer::new(chat, job.token_budget, estimate_tokens).summarize(&combined, &label)?;
    let path = write_summary(
        job.summaries_dir,
        job.repo_name,
        &label,
        job.provider,
        job.model,
        &outcome.summary,
    )?;
    info!(path = %path.display(), chunks = outcome.chunk_count, "saved summary");

    Ok(SummaryFile {
        path,
        document_count: documents.len(),
        chunk_count: outcome.chunk_count,
    })
}

pub fn report_summary(report: &mut CommandReport, client: &LlmClient, summary: &SummaryFile) {
    report.detail(format!("provider={}", client.provider()));
    report.detail(format!("model={}", client.model()));
    report.detail(format!("documents={}", summary.document_count));
    report.detail(format!("chunks={}", summary.chunk_count));
    report.detail(format!("summary={}", summary.path.display()));
}

/// Builds the client from fully layered settings; fails before any file or network access.
pub fn build_client(cfg: &DigestConfig) -> Result<LlmClient> {
    let client = LlmClient::new(
        &cfg.llm.provider,
        cfg.llm.model.as_deref(),
        &Credentials::from_env(),
    )?;
    info!(provider = %client.provider(), model = client.model(), "using LLM provider");
    Ok(client)
}

pub fn run(opts: &SummarizeOptions) -> Result<CommandReport> {
    let cfg = load_config_with(|cfg| opts.apply(cfg))?;
    let client = build_client(&cfg)?;

    let summary = summarize_saved_documents(
        &client,
        &SummaryJob {
            repo_name: &opts.repo_name,
            issues_dir: &cfg.output.issues_dir,
            summaries_dir: &cfg.output.summaries_dir,
            token_budget: cfg.llm.token_budget,
            provider: client.provider().label(),
            model: client.model(),
        },
    )?;

    let mut report = CommandReport::new("summarize");
    report_summary(&mut report, &client, &summary);
    Ok(report)
}
