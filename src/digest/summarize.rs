use crate::digest::chunk::{Chunk, TokenEstimator, plan_chunks};
use crate::digest::llm::ChatBackend;
use anyhow::{Context, Result};
use tracing::{error, info};

const DELIMITER_WIDTH: usize = 50;
const PARTIAL_SEPARATOR: &str = "\n\n---\n\n";

pub const SYSTEM_PROMPT: &str = "You are an expert at analyzing GitHub issues and providing actionable summaries.

Your task is to analyze the provided GitHub issues and create a comprehensive summary that includes:

1. **Overview**: Brief summary of the repository's issue landscape
2. **Priority Analysis**: Identify high-priority issues based on:
   - Number of comments/engagement
   - Labels (critical, bug, security, etc.)
   - Age of issues
   - User impact
3. **Common Themes**: Identify recurring problems or requests
4. **Recommendations**: Suggest actions for maintainers

Format your response in clear markdown with appropriate headers and bullet points.
Be concise but comprehensive. Focus on actionable insights.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub summary: String,
    pub chunk_count: usize,
}

fn label_suffix(label: &str) -> String {
    if label.trim().is_empty() {
        String::new()
    } else {
        format!(" {}", label.trim())
    }
}

pub fn user_prompt(content: &str, annotation: &str) -> String {
    let rule = "=".repeat(DELIMITER_WIDTH);
    format!(
        "Please analyze these GitHub issues{annotation}:\n\n{rule}\n{content}\n{rule}\n\nProvide a comprehensive summary following the guidelines in your instructions."
    )
}

pub fn reduction_prompt(partials: &[String], label: &str) -> String {
    format!(
        "Please create a final, consolidated summary from these partial summaries of GitHub issues{}.\n\n\
Combine the insights from all parts into a single, coherent summary following the same structure as before.\n\
Eliminate any redundancy and provide the most important insights.\n\n\
Partial Summaries:\n{}",
        label_suffix(label),
        partials.join(PARTIAL_SEPARATOR)
    )
}

/// Single-pass or map-then-reduce summarization over a rendered document.
pub struct Summarizer<'a, C: ChatBackend> {
    chat: &'a C,
    token_budget: usize,
    estimate: TokenEstimator,
}

impl<'a, C: ChatBackend> Summarizer<'a, C> {
    pub fn new(chat: &'a C, token_budget: usize, estimate: TokenEstimator) -> Self {
        Self {
            chat,
            token_budget,
            estimate,
        }
    }

    fn call(&self, prompt: &str, stage: &str) -> Result<String> {
        self.chat.complete(SYSTEM_PROMPT, prompt).map_err(|err| {
            error!(stage, error = %err, "LLM call failed");
            err.context(format!("LLM call failed during {stage}"))
        })
    }

    pub fn summarize(&self, document: &str, label: &str) -> Result<SummaryOutcome> {
        let chunks: Vec<Chunk<'_>> = plan_chunks(document, self.token_budget, self.estimate);

        if chunks.len() <= 1 {
            let content = chunks.first().map_or(document, |c| c.text);
            let summary = self.call(&user_prompt(content, &label_suffix(label)), "summary")?;
            return Ok(SummaryOutcome {
                summary,
                chunk_count: 1,
            });
        }

        let total = chunks.len();
        info!(
            chunks = total,
            budget = self.token_budget,
            "document split for hierarchical summary"
        );

        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let part = i + 1;
            info!(
                chunk = part,
                of = total,
                issues = chunk.issue_count,
                estimated_tokens = chunk.estimated_tokens,
                "summarizing chunk"
            );
            let annotation = format!(" (Part {part}/{total}{})", label_suffix(label));
            let partial = self
                .call(&user_prompt(chunk.text, &annotation), "chunk summary")
                .with_context(|| format!("chunk {part}/{total}"))?;
            partials.push(partial);
        }

        info!(partials = partials.len(), "consolidating partial summaries");
        let summary = self.call(&reduction_prompt(&partials, label), "final reduction")?;
        Ok(SummaryOutcome {
            summary,
            chunk_count: total,
        })
    }
}
