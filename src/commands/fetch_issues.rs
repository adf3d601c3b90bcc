use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::commands::CommandReport;
use crate::digest::config::{Credentials, DigestConfig, load_config_with};
use crate::digest::github::{HttpTransport, IssueFetcher};
use crate::digest::render::{partition, render_document};
use crate::digest::repo_url::{RepoRef, parse_repo_url};
use crate::digest::store::write_documents;
use crate::error::DigestError;

#[derive(Debug, Clone, Default)]
pub struct FetchIssuesOptions {
    pub repo_url: String,
    pub output_dir: Option<PathBuf>,
    pub max_issues: Option<usize>,
    pub max_per_file: Option<usize>,
    pub no_comments: bool,
    pub token: Option<String>,
}

impl FetchIssuesOptions {
    pub fn apply(&self, cfg: &mut DigestConfig) {
        if let Some(dir) = &self.output_dir {
            cfg.output.issues_dir = dir.clone();
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
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub repo: RepoRef,
    pub issue_count: usize,
    pub files: Vec<PathBuf>,
}

/// `--token` wins over `GITHUB_TOKEN`; either way one is required.
pub fn resolve_github_token(
    flag: Option<&str>,
    credentials: &Credentials,
) -> Result<String, DigestError> {
    flag.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| credentials.github_token.clone())
        .ok_or_else(|| {
            DigestError::config(
                "GitHub token is required; pass --token or set GITHUB_TOKEN",
            )
        })
}

/// Fetches, partitions, renders, and writes every document for `repo`.
pub fn fetch_into_documents<T: HttpTransport>(
    fetcher: &IssueFetcher<T>,
    repo: &RepoRef,
    cfg: &DigestConfig,
) -> Result<FetchOutcome> {
    info!(repo = %repo, "fetching open issues");
    let issues = fetcher.fetch_open_issues(repo, cfg.fetch.max_issues);
    if issues.is_empty() {
        warn!(repo = %repo, "no open issues found");
        return Ok(FetchOutcome {
            repo: repo.clone(),
            issue_count: 0,
            files: Vec::new(),
        });
    }

    let generated_at = Utc::now();
    let documents: Vec<String> = partition(&issues, cfg.fetch.max_issues_per_file)
        .into_iter()
        .map(|group| {
            render_document(
                group,
                repo,
                cfg.fetch.include_comments,
                generated_at,
                |issue| fetcher.fetch_comments(repo, issue.number),
            )
        })
        .collect();

    let files = write_documents(&cfg.output.issues_dir, &repo.file_stem(), &documents)?;
    for (path, group) in files.iter().zip(partition(&issues, cfg.fetch.max_issues_per_file)) {
        info!(path = %path.display(), issues = group.len(), "saved issue document");
    }

    Ok(FetchOutcome {
        repo: repo.clone(),
        issue_count: issues.len(),
        files,
    })
}

pub fn report_outcome(report: &mut CommandReport, outcome: &FetchOutcome) {
    report.detail(format!("repo={}", outcome.repo));
    report.detail(format!("issues={}", outcome.issue_count));
    if outcome.files.is_empty() {
        report.detail("no open issues found; nothing saved");
    }
    for path in &outcome.files {
        report.detail(format!("saved={}", path.display()));
    }
}

pub fn run(opts: &FetchIssuesOptions) -> Result<CommandReport> {
    let repo = parse_repo_url(&opts.repo_url)?;
    let cfg = load_config_with(|cfg| opts.apply(cfg))?;
    let token = resolve_github_token(opts.token.as_deref(), &Credentials::from_env())?;

    let fetcher = IssueFetcher::connect(&token, &cfg.fetch.api_base_url)?;
    let outcome = fetch_into_documents(&fetcher, &repo, &cfg)?;

    let mut report = CommandReport::new("fetch-issues");
    report_outcome(&mut report, &outcome);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::github::HttpResponse;
    use crate::digest::retry::Sleeper;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    /// Serves `total` issues newest-first in pages of 100; issue 1 has comments.
    struct FakeGithub {
        total: u64,
        comment_requests: RefCell<Vec<String>>,
    }

    impl FakeGithub {
        fn new(total: u64) -> Self {
            Self {
                total,
                comment_requests: RefCell::new(Vec::new()),
            }
        }

        fn issue(number: u64) -> Value {
            json!({
                "number": number,
                "title": format!("Issue {number}"),
                "user": {"login": "alice"},
                "created_at": "2024-03-01T12:30:00Z",
                "labels": [],
                "assignees": [],
                "body": "body",
                "comments": if number == 1 { 1 } else { 0 }
            })
        }
    }

    impl HttpTransport for &FakeGithub {
        fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, DigestError> {
            if url.ends_with("/comments") {
                self.comment_requests.borrow_mut().push(url.to_string());
                let body = json!([
                    {"user": {"login": "bob"}, "created_at": "2024-03-02T10:00:00Z", "body": "me too"}
                ]);
                return Ok(HttpResponse {
                    status: 200,
                    headers: BTreeMap::new(),
                    body: body.to_string(),
                });
            }

            let page: u64 = query
                .iter()
                .find(|(k, _)| *k == "page")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(1);
            let newest = self.total.saturating_sub((page - 1) * 100);
            let oldest = newest.saturating_sub(99).max(1);
            let items: Vec<Value> = if newest == 0 {
                Vec::new()
            } else {
                (oldest..=newest).rev().map(FakeGithub::issue).collect()
            };
            Ok(HttpResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: Value::Array(items).to_string(),
            })
        }
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "octo".to_string(),
            repo: "widgets".to_string(),
        }
    }

    fn config(dir: PathBuf) -> DigestConfig {
        let mut cfg = DigestConfig::default();
        cfg.output.issues_dir = dir;
        cfg
    }

    #[test]
    fn hundred_twenty_issues_become_three_numbered_documents() {
        let tmp = tempdir().expect("tempdir");
        let github = FakeGithub::new(120);
        let fetcher = IssueFetcher::new(&github, "https://api.github.com")
            .with_sleeper(Arc::new(NoSleep));

        let outcome = fetch_into_documents(&fetcher, &repo(), &config(tmp.path().to_path_buf()))
            .expect("fetch");

        assert_eq!(outcome.issue_count, 120);
        let names: Vec<String> = outcome
            .files
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "octo_widgets_issues_1.md",
                "octo_widgets_issues_2.md",
                "octo_widgets_issues_3.md"
            ]
        );

        let counts: Vec<usize> = outcome
            .files
            .iter()
            .map(|p| {
                std::fs::read_to_string(p)
                    .expect("read")
                    .matches("## Issue #")
                    .count()
            })
            .collect();
        assert_eq!(counts, vec![50, 50, 20]);

        let last = std::fs::read_to_string(&outcome.files[2]).expect("read last");
        assert!(last.contains("**Total Open Issues:** 20"));
        assert!(last.contains("#### Comment by bob"));
        assert_eq!(github.comment_requests.borrow().len(), 1);
    }

    #[test]
    fn comments_are_not_fetched_when_disabled() {
        let tmp = tempdir().expect("tempdir");
        let github = FakeGithub::new(3);
        let fetcher = IssueFetcher::new(&github, "https://api.github.com")
            .with_sleeper(Arc::new(NoSleep));
        let mut cfg = config(tmp.path().to_path_buf());
        cfg.fetch.include_comments = false;

        let outcome = fetch_into_documents(&fetcher, &repo(), &cfg).expect("fetch");
        assert_eq!(outcome.files, vec![tmp.path().join("octo_widgets_issues.md")]);
        assert!(github.comment_requests.borrow().is_empty());
    }

    #[test]
    fn empty_repository_writes_nothing() {
        let tmp = tempdir().expect("tempdir");
        let github = FakeGithub::new(0);
        let fetcher = IssueFetcher::new(&github, "https://api.github.com")
            .with_sleeper(Arc::new(NoSleep));

        let outcome = fetch_into_documents(&fetcher, &repo(), &config(tmp.path().join("issues")))
            .expect("fetch");
        assert_eq!(outcome.issue_count, 0);
        assert!(outcome.files.is_empty());
        assert!(!tmp.path().join("issues").exists());

        let mut report = CommandReport::new("fetch-issues");
        report_outcome(&mut report, &outcome);
        assert!(report.ok);
        assert!(report.details.iter().any(|d| d.contains("nothing saved")));
    }

    #[test]
    fn token_flag_overrides_environment_and_is_required() {
        let creds = Credentials {
            github_token: Some("from-env".to_string()),
            ..Credentials::default()
        };
        assert_eq!(
            resolve_github_token(Some("from-flag"), &creds).expect("flag"),
            "from-flag"
        );
        assert_eq!(resolve_github_token(None, &creds).expect("env"), "from-env");
        assert!(matches!(
            resolve_github_token(Some("  "), &Credentials::default()),
            Err(DigestError::Config(_))
        ));
    }

    #[test]
    fn cli_flags_override_config_layers() {
        let mut cfg = DigestConfig::default();
        FetchIssuesOptions {
            repo_url: "octo/widgets".to_string(),
            output_dir: Some(PathBuf::from("out")),
            max_issues: Some(7),
            max_per_file: Some(3),
            no_comments: true,
            token: None,
        }
        .apply(&mut cfg);
        assert_eq!(cfg.output.issues_dir, PathBuf::from("out"));
        assert_eq!(cfg.fetch.max_issues, Some(7));
        assert_eq!(cfg.fetch.max_issues_per_file, 3);
        assert!(!cfg.fetch.include_comments);
    }
}
