use crate::error::DigestError;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub path: PathBuf,
    pub content: String,
}

/// `{stem}_issues.md` for a lone document, `{stem}_issues_{index}.md` otherwise.
pub fn document_file_name(stem: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => format!("{stem}_issues_{index}.md"),
        None => format!("{stem}_issues.md"),
    }
}

pub fn summary_file_name(repo_name: &str) -> String {
    format!("{repo_name}_summary.md")
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// True for `{stem}_issues.md` and `{stem}_issues_{n}.md`.
fn is_document_of(name: &str, stem: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(stem)
        .and_then(|r| r.strip_prefix("_issues"))
        .and_then(|r| r.strip_suffix(".md"))
    else {
        return false;
    };
    match rest.strip_prefix('_') {
        Some(index) => !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()),
        None => rest.is_empty(),
    }
}

/// Removes documents for `stem` left over from an earlier fetch.
fn remove_stale_documents(dir: &Path, stem: &str, keep: &[PathBuf]) -> Result<()> {
    for path in matching_files(dir, stem)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_document_of(name, stem) && !keep.contains(&path) {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove stale {}", path.display()))?;
            debug!(path = %path.display(), "removed stale issue document");
        }
    }
    Ok(())
}

/// Writes rendered documents in order and returns their paths. Older parts
/// for the same stem are removed so the directory holds exactly this set.
pub fn write_documents(dir: &Path, stem: &str, documents: &[String]) -> Result<Vec<PathBuf>> {
    let numbered = documents.len() > 1;
    let mut written = Vec::with_capacity(documents.len());
    for (i, document) in documents.iter().enumerate() {
        let name = document_file_name(stem, numbered.then_some(i + 1));
        let path = dir.join(name);
        write_atomic(&path, document)?;
        written.push(path);
    }
    if !written.is_empty() {
        remove_stale_documents(dir, stem, &written)?;
    }
    Ok(written)
}

fn matching_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in read_dir {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(".md") {
            files.push(path);
        }
    }
    Ok(files)
}

fn part_index(path: &Path) -> Option<u64> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('_').next())
        .and_then(|s| s.parse().ok())
}

/// Loads every saved document for `repo_name` (the `owner_repo` stem) in part order.
pub fn load_issue_documents(repo_name: &str, dir: &Path) -> Result<Vec<StoredDocument>> {
    if !dir.is_dir() {
        return Err(DigestError::NotFound(format!(
            "issues directory not found: {}",
            dir.display()
        ))
        .into());
    }

    let mut files = matching_files(dir, &format!("{repo_name}_issues_"))?;
    if files.is_empty() {
        files = matching_files(dir, &format!("{repo_name}_"))?;
    }
    if files.is_empty() {
        return Err(DigestError::NotFound(format!(
            "no issue files found for repository: {repo_name}"
        ))
        .into());
    }

    files.sort_by(|a, b| (part_index(a), a).cmp(&(part_index(b), b)));

    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(StoredDocument { path, content })
        })
        .collect()
}

/// `for owner/repo` when the name splits at its first underscore.
pub fn context_label(repo_name: &str) -> String {
    match repo_name.split_once('_') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
            format!("for {owner}/{repo}")
        }
        _ => format!("for {repo_name}"),
    }
}

pub fn render_summary_file(label: &str, provider: &str, model: &str, summary: &str) -> String {
    format!(
        "# Summary of GitHub Issues {label}\n\n*Generated using {provider} ({model})*\n\n---\n\n{summary}"
    )
}

pub fn write_summary(
    dir: &Path,
    repo_name: &str,
    label: &str,
    provider: &str,
    model: &str,
    summary: &str,
) -> Result<PathBuf> {
    let path = dir.join(summary_file_name(repo_name));
    write_atomic(&path, &render_summary_file(label, provider, model, summary))?;
    Ok(path)
}
