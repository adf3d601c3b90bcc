use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::commands::fetch_and_summarize::FetchAndSummarizeOptions;
use crate::commands::fetch_issues::FetchIssuesOptions;
use crate::commands::summarize::SummarizeOptions;
use crate::logging;

/// Fetch open GitHub issues to markdown and summarize them with an LLM.
#[derive(Debug, Parser)]
#[command(name = "issue-digest", version, about)]
pub struct Cli {
    /// Debug-level logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the command report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch open issues and save them as markdown documents
    FetchIssues(FetchIssuesArgs),
    /// Summarize previously saved issue documents
    Summarize(SummarizeArgs),
    /// Fetch issues, then summarize them
    FetchAndSummarize(FetchAndSummarizeArgs),
    /// Show effective configuration and credential presence
    CheckConfig,
}

#[derive(Debug, Args)]
pub struct FetchIssuesArgs {
    /// Repository URL, e.g. https://github.com/owner/repo or owner/repo
    pub repo_url: String,
    /// Directory for issue documents
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Stop after this many issues (0 means no cap)
    #[arg(short, long)]
    pub max_issues: Option<usize>,
    /// Issues per document
    #[arg(long)]
    pub max_per_file: Option<usize>,
    /// Skip fetching comments
    #[arg(long)]
    pub no_comments: bool,
    /// GitHub token (overrides GITHUB_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Saved repository name, e.g. owner_repo
    pub repo_name: String,
    /// Directory holding issue documents
    #[arg(short, long)]
    pub issues_dir: Option<PathBuf>,
    /// Directory for the summary file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// LLM provider: openai or anthropic
    #[arg(long)]
    pub provider: Option<String>,
    /// Model identifier (defaults per provider)
    #[arg(long)]
    pub model: Option<String>,
    /// Estimated tokens per LLM call before splitting
    #[arg(long)]
    pub token_budget: Option<usize>,
}

#[derive(Debug, Args)]
pub struct FetchAndSummarizeArgs {
    /// Repository URL, e.g. https://github.com/owner/repo or owner/repo
    pub repo_url: String,
    /// Directory for issue documents
    #[arg(long)]
    pub issues_dir: Option<PathBuf>,
    /// Directory for the summary file
    #[arg(long)]
    pub summaries_dir: Option<PathBuf>,
    /// Stop after this many issues (0 means no cap)
    #[arg(short, long)]
    pub max_issues: Option<usize>,
    /// Issues per document
    #[arg(long)]
    pub max_per_file: Option<usize>,
    /// Skip fetching comments
    #[arg(long)]
    pub no_comments: bool,
    /// LLM provider: openai or anthropic
    #[arg(long)]
    pub provider: Option<String>,
    /// Model identifier (defaults per provider)
    #[arg(long)]
    pub model: Option<String>,
    /// Estimated tokens per LLM call before splitting
    #[arg(long)]
    pub token_budget: Option<usize>,
    /// GitHub token (overrides GITHUB_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
}

fn render_text(report: &CommandReport) -> String {
    let status = if report.ok { "ok" } else { "failed" };
    let mut out = format!("{}: {status}\n", report.command);
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    if !report.issues.is_empty() {
        out.push_str("issues:\n");
        for issue in &report.issues {
            out.push_str(&format!("  - {issue}\n"));
        }
    }
    out
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

fn dispatch(command: Command) -> Result<CommandReport> {
    match command {
        Command::FetchIssues(args) => commands::fetch_issues::run(&FetchIssuesOptions {
            repo_url: args.repo_url,
            output_dir: args.output_dir,
            max_issues: args.max_issues,
            max_per_file: args.max_per_file,
            no_comments: args.no_comments,
            token: args.token,
        }),
        Command::Summarize(args) => commands::summarize::run(&SummarizeOptions {
            repo_name: args.repo_name,
            issues_dir: args.issues_dir,
            output_dir: args.output_dir,
            provider: args.provider,
            model: args.model,
            token_budget: args.token_budget,
        }),
        Command::FetchAndSummarize(args) => {
            commands::fetch_and_summarize::run(&FetchAndSummarizeOptions {
                repo_url: args.repo_url,
                issues_dir: args.issues_dir,
                summaries_dir: args.summaries_dir,
                max_issues: args.max_issues,
                max_per_file: args.max_per_file,
                no_comments: args.no_comments,
                provider: args.provider,
                model: args.model,
                token_budget: args.token_budget,
                token: args.token,
            })
        }
        Command::CheckConfig => commands::check_config::run(),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let report = dispatch(cli.command)?;
    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_flags_and_global_options() {
        let cli = Cli::try_parse_from([
            "issue-digest",
            "fetch-issues",
            "https://github.com/octo/widgets",
            "-m",
            "30",
            "--max-per-file",
            "10",
            "--no-comments",
            "--json",
            "-v",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert!(cli.json);
        match cli.command {
            Command::FetchIssues(args) => {
                assert_eq!(args.repo_url, "https://github.com/octo/widgets");
                assert_eq!(args.max_issues, Some(30));
                assert_eq!(args.max_per_file, Some(10));
                assert!(args.no_comments);
                assert_eq!(args.token, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_summarize_overrides() {
        let cli = Cli::try_parse_from([
            "issue-digest",
            "summarize",
            "octo_widgets",
            "-i",
            "in",
            "--provider",
            "anthropic",
            "--token-budget",
            "5000",
        ])
        .expect("parse");
        match cli.command {
            Command::Summarize(args) => {
                assert_eq!(args.repo_name, "octo_widgets");
                assert_eq!(args.issues_dir, Some(PathBuf::from("in")));
                assert_eq!(args.provider.as_deref(), Some("anthropic"));
                assert_eq!(args.token_budget, Some(5000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn text_report_lists_details_and_issues() {
        let mut report = CommandReport::new("check-config");
        report.detail("llm_provider=openai");
        report.issue("GITHUB_TOKEN not set");
        assert_eq!(
            render_text(&report),
            "check-config: failed\n  llm_provider=openai\nissues:\n  - GITHUB_TOKEN not set\n"
        );
    }
}
