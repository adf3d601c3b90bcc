use crate::error::DigestError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// `owner_repo`, the stem shared by every file written for this repository.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn hosted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s]+)").expect("hosted repo pattern is valid")
    })
}

fn shorthand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([^/\s:]+)/([^/\s:]+)$").expect("shorthand repo pattern is valid")
    })
}

fn clean_repo_name(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches('/');
    trimmed.strip_suffix(".git").unwrap_or(trimmed)
}

/// Accepts `https://github.com/o/r[.git][/...]`, `git@github.com:o/r.git` and `o/r`.
pub fn parse_repo_url(input: &str) -> Result<RepoRef, DigestError> {
    let trimmed = input.trim().trim_end_matches('/');
    let captures = hosted_pattern()
        .captures(trimmed)
        .or_else(|| shorthand_pattern().captures(trimmed));

    let Some(captures) = captures else {
        return Err(DigestError::config(format!("invalid GitHub URL: {input}")));
    };

    let owner = captures.get(1).map_or("", |m| m.as_str());
    let repo = clean_repo_name(captures.get(2).map_or("", |m| m.as_str()));
    if owner.is_empty() || repo.is_empty() || repo.starts_with('.') {
        return Err(DigestError::config(format!("invalid GitHub URL: {input}")));
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}
