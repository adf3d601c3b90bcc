use crate::digest::chunk::issue_header_pattern;
use crate::digest::model::{CommentRecord, IssueRecord};
use crate::digest::repo_url::RepoRef;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

pub const EMPTY_BODY_PLACEHOLDER: &str = "No description provided.";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `YYYY-MM-DD HH:MM`, or the input unchanged when it does not parse.
pub fn format_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.format(DISPLAY_FORMAT).to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return parsed.format(DISPLAY_FORMAT).to_string();
    }
    raw.to_string()
}

fn blank_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"))
}

fn canonical_fence(line: &str) -> Option<String> {
    let indent_len = line.len() - line.trim_start().len();
    let rest = line[indent_len..].strip_prefix("```")?;
    if rest.contains('`') {
        return None;
    }
    Some(format!("{}```{}", &line[..indent_len], rest.trim()))
}

/// A body line that reads like an issue header is escaped so it cannot be
/// taken for the start of another issue block.
fn escape_issue_header(line: &str) -> Option<String> {
    issue_header_pattern()
        .is_match(line)
        .then(|| format!("\\{line}"))
}

/// Normalizes user-authored markdown: LF line endings, at most one blank
/// line in a row, fence openers without stray spaces, and escaped
/// issue-header lookalikes.
pub fn clean_markdown(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    let unified = content.replace("\r\n", "\n");
    let fenced = unified
        .split('\n')
        .map(|line| {
            canonical_fence(line)
                .or_else(|| escape_issue_header(line))
                .unwrap_or_else(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n");
    blank_run_pattern()
        .replace_all(&fenced, "\n\n")
        .trim()
        .to_string()
}

fn render_comments(out: &mut String, comments: &[CommentRecord]) {
    if comments.is_empty() {
        return;
    }
    out.push_str("### Comments\n\n");
    for comment in comments {
        out.push_str(&format!(
            "#### Comment by {} ({})\n\n",
            comment.author,
            format_timestamp(&comment.created_at)
        ));
        out.push_str(&clean_markdown(&comment.body));
        out.push_str("\n\n");
    }
}

fn render_issue(out: &mut String, issue: &IssueRecord, comments: &[CommentRecord]) {
    out.push_str(&format!("## Issue #{}: {}\n\n", issue.number, issue.title));
    out.push_str(&format!("**Author:** {}\n", issue.author));
    out.push_str(&format!("**Created:** {}\n", format_timestamp(&issue.created_at)));
    if let Some(updated) = &issue.updated_at {
        out.push_str(&format!("**Updated:** {}\n", format_timestamp(updated)));
    }
    if !issue.labels.is_empty() {
        out.push_str(&format!("**Labels:** {}\n", issue.labels.join(", ")));
    }
    if !issue.assignees.is_empty() {
        out.push_str(&format!("**Assignees:** {}\n", issue.assignees.join(", ")));
    }
    out.push('\n');

    out.push_str("### Description\n\n");
    let body = clean_markdown(&issue.body);
    if body.is_empty() {
        out.push_str(EMPTY_BODY_PLACEHOLDER);
    } else {
        out.push_str(&body);
    }
    out.push_str("\n\n");

    render_comments(out, comments);
    out.push_str("---\n\n");
}

/// Renders one document. `comments_for` is only consulted for issues that
/// report comments, and only when comments are included.
pub fn render_document<F>(
    issues: &[IssueRecord],
    repo: &RepoRef,
    include_comments: bool,
    generated_at: DateTime<Utc>,
    mut comments_for: F,
) -> String
where
    F: FnMut(&IssueRecord) -> Vec<CommentRecord>,
{
    let mut out = String::new();
    out.push_str(&format!("# GitHub Issues for {repo}\n\n"));
    out.push_str(&format!(
        "*Generated on {}*\n\n",
        generated_at.format(DISPLAY_FORMAT)
    ));
    out.push_str(&format!("**Total Open Issues:** {}\n\n", issues.len()));
    out.push_str("---\n\n");

    for issue in issues {
        let comments = if include_comments && issue.comment_count > 0 {
            comments_for(issue)
        } else {
            Vec::new()
        };
        render_issue(&mut out, issue, &comments);
    }
    out
}

/// Consecutive groups of at most `max_per_document` issues, in order.
pub fn partition(issues: &[IssueRecord], max_per_document: usize) -> Vec<&[IssueRecord]> {
    issues.chunks(max_per_document.max(1)).collect()
}
