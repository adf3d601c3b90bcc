//! Token-budget chunk planning over rendered issue documents.
//!
//! A chunk is always a contiguous slice of the source document made of whole
//! issue blocks, so concatenating every chunk reproduces the document.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Maps text to an estimated token count.
pub type TokenEstimator = fn(&str) -> usize;

/// Roughly four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub text: &'a str,
    pub issue_count: usize,
    pub estimated_tokens: usize,
}

/// Start of an issue block as written by the renderer.
pub(crate) fn issue_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^## Issue #\d+:").expect("issue header pattern is valid")
    })
}

/// Byte ranges of issue blocks, split at issue headers. Text ahead of the
/// first header stays attached to the first block unless it is blank.
fn issue_block_ranges(document: &str) -> Vec<Range<usize>> {
    let mut starts: Vec<usize> = issue_header_pattern()
        .find_iter(document)
        .map(|m| m.start())
        .collect();
    let Some(&first) = starts.first() else {
        return vec![0..document.len()];
    };
    if !document[..first].trim().is_empty() {
        starts[0] = 0;
    }

    let mut ends: Vec<usize> = starts.iter().skip(1).copied().collect();
    ends.push(document.len());
    starts.into_iter().zip(ends).map(|(s, e)| s..e).collect()
}

fn chunk_at(document: &str, range: Range<usize>, estimated_tokens: usize) -> Chunk<'_> {
    let text = &document[range];
    Chunk {
        text,
        issue_count: issue_header_pattern().find_iter(text).count(),
        estimated_tokens,
    }
}

/// Greedy packing of whole issue blocks under `token_budget`.
pub fn plan_chunks(
    document: &str,
    token_budget: usize,
    estimate: TokenEstimator,
) -> Vec<Chunk<'_>> {
    if document.is_empty() {
        return Vec::new();
    }
    let whole = estimate(document);
    if whole <= token_budget {
        return vec![chunk_at(document, 0..document.len(), whole)];
    }

    let mut chunks = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut running = 0usize;

    for block in issue_block_ranges(document) {
        let cost = estimate(&document[block.clone()]);
        current = match current.take() {
            Some(open) if running + cost > token_budget => {
                chunks.push(chunk_at(document, open, running));
                running = 0;
                Some(block)
            }
            Some(open) => Some(open.start..block.end),
            None => Some(block),
        };
        running += cost;
    }
    if let Some(open) = current {
        chunks.push(chunk_at(document, open, running));
    }
    chunks
}
