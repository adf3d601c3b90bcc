use crate::digest::model::{CommentRecord, IssueRecord};
use crate::digest::repo_url::RepoRef;
use crate::digest::retry::{
    MAX_RATE_LIMIT_WAITS, RateLimitState, Sleeper, ThreadSleeper, retry_backoff,
};
use crate::digest::util::now_epoch_secs;
use crate::error::DigestError;
use backon::BlockingRetryable;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("issue-digest/", env!("CARGO_PKG_VERSION"));
const GHOST_LOGIN: &str = "ghost";

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, DigestError>;
}

/// Authenticated session against the GitHub REST API.
pub struct GithubTransport {
    client: Client,
}

impl GithubTransport {
    pub fn new(token: &str) -> Result<Self, DigestError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| DigestError::config("GitHub token contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| DigestError::config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for GithubTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, DigestError> {
        let transport_err = |err: reqwest::Error| DigestError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        };
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(transport_err)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().map_err(transport_err)?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    #[serde(default)]
    user: Option<ApiUser>,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    labels: Option<Vec<ApiLabel>>,
    #[serde(default)]
    assignees: Option<Vec<ApiUser>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    comments: u64,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    #[serde(default)]
    user: Option<ApiUser>,
    created_at: String,
    #[serde(default)]
    body: Option<String>,
}

fn login_or_ghost(user: Option<ApiUser>) -> String {
    user.map(|u| u.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

impl From<ApiIssue> for IssueRecord {
    fn from(api: ApiIssue) -> Self {
        Self {
            number: api.number,
            title: api.title,
            author: login_or_ghost(api.user),
            created_at: api.created_at,
            updated_at: api.updated_at.filter(|v| !v.trim().is_empty()),
            labels: api
                .labels
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.name)
                .collect(),
            assignees: api
                .assignees
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.login)
                .collect(),
            body: api.body.unwrap_or_default(),
            comment_count: api.comments,
        }
    }
}

impl From<ApiComment> for CommentRecord {
    fn from(api: ApiComment) -> Self {
        Self {
            author: login_or_ghost(api.user),
            created_at: api.created_at,
            body: api.body.unwrap_or_default(),
        }
    }
}

/// `None` when the response carried no `Link` header at all.
pub fn has_next_page(link_header: Option<&str>) -> Option<bool> {
    link_header.map(|link| link.contains("rel=\"next\""))
}

pub struct IssueFetcher<T: HttpTransport> {
    transport: T,
    base_url: String,
    sleeper: Arc<dyn Sleeper>,
}

impl IssueFetcher<GithubTransport> {
    pub fn connect(token: &str, base_url: &str) -> Result<Self, DigestError> {
        Ok(Self::new(GithubTransport::new(token)?, base_url))
    }
}

impl<T: HttpTransport> IssueFetcher<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// One logical request: waits out exhausted quota, never retries other failures.
    fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, DigestError> {
        let mut waits = 0usize;
        loop {
            let response = self.transport.get(url, query)?;
            if response.is_success() {
                return Ok(response);
            }

            if response.status == 403 {
                let now = now_epoch_secs().unwrap_or_default();
                let state = RateLimitState::from_headers(&response.headers);
                if let Some(wait) = state.exhausted_wait(now) {
                    if waits >= MAX_RATE_LIMIT_WAITS {
                        return Err(DigestError::RateLimitExhausted {
                            url: url.to_string(),
                            waits,
                        });
                    }
                    waits += 1;
                    warn!(
                        url,
                        wait_secs = wait.as_secs(),
                        attempt = waits,
                        "GitHub rate limit exhausted, waiting for reset"
                    );
                    self.sleeper.sleep(wait);
                    continue;
                }
            }

            return Err(DigestError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
    }

    fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, DigestError> {
        let sleeper = Arc::clone(&self.sleeper);
        (|| self.get_once(url, query))
            .retry(retry_backoff())
            .sleep(move |delay: Duration| sleeper.sleep(delay))
            .when(DigestError::is_transient)
            .notify(|err: &DigestError, delay: Duration| {
                warn!(error = %err, retry_in = ?delay, "retrying GitHub request");
            })
            .call()
    }

    /// Newest-first open issues, pull requests excluded. Stops early and keeps
    /// what was gathered when a page cannot be fetched.
    pub fn fetch_open_issues(&self, repo: &RepoRef, max_issues: Option<usize>) -> Vec<IssueRecord> {
        let url = format!("{}/repos/{}/{}/issues", self.base_url, repo.owner, repo.repo);
        let mut issues: Vec<IssueRecord> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut page = 1usize;
        // a zero cap means no cap
        let max_issues = max_issues.filter(|&max| max > 0);

        loop {
            let query = [
                ("state", "open".to_string()),
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
            ];
            let response = match self.get_with_retry(&url, &query) {
                Ok(response) => response,
                Err(err) => {
                    error!(
                        repo = %repo,
                        page,
                        fetched = issues.len(),
                        error = %err,
                        "error fetching issues, keeping partial results"
                    );
                    break;
                }
            };

            let items: Vec<Value> = match serde_json::from_str(&response.body) {
                Ok(items) => items,
                Err(err) => {
                    error!(
                        repo = %repo,
                        page,
                        fetched = issues.len(),
                        error = %err,
                        "issue page was not a JSON array, keeping partial results"
                    );
                    break;
                }
            };
            if items.is_empty() {
                break;
            }

            let raw_count = items.len();
            for item in items {
                // the issues endpoint also lists pull requests
                if item.get("pull_request").is_some() {
                    continue;
                }
                match serde_json::from_value::<ApiIssue>(item) {
                    Ok(api) => {
                        if seen.insert(api.number) {
                            issues.push(api.into());
                        }
                    }
                    Err(err) => warn!(page, error = %err, "skipping malformed issue entry"),
                }
            }
            debug!(repo = %repo, page, fetched = issues.len(), "fetched issue page");

            if let Some(max) = max_issues {
                if issues.len() >= max {
                    issues.truncate(max);
                    break;
                }
            }

            match has_next_page(response.header("link")) {
                Some(false) => break,
                None if raw_count < PER_PAGE => break,
                _ => {}
            }
            page += 1;
        }

        info!(repo = %repo, count = issues.len(), "fetched open issues");
        issues
    }

    /// First page of comments for one issue; failures yield an empty list.
    pub fn fetch_comments(&self, repo: &RepoRef, issue_number: u64) -> Vec<CommentRecord> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, repo.owner, repo.repo, issue_number
        );
        let query = [("per_page", PER_PAGE.to_string())];

        let parsed = self.get_with_retry(&url, &query).and_then(|response| {
            serde_json::from_str::<Vec<ApiComment>>(&response.body)
                .map_err(|err| DigestError::InvalidResponse(err.to_string()))
        });
        match parsed {
            Ok(comments) => comments.into_iter().map(CommentRecord::from).collect(),
            Err(err) => {
                warn!(
                    repo = %repo,
                    issue = issue_number,
                    error = %err,
                    "error fetching comments, continuing without them"
                );
                Vec::new()
            }
        }
    }
}
