pub mod check_config;
pub mod fetch_and_summarize;
pub mod fetch_issues;
pub mod summarize;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

#[cfg(test)]
mod tests {
    use super::CommandReport;

    #[test]
    fn issues_flip_ok_and_merge_keeps_failures() {
        let mut first = CommandReport::new("fetch-issues");
        first.detail("issues=3");
        assert!(first.ok);

        let mut second = CommandReport::new("summarize");
        second.issue("summary failed");

        first.merge(second);
        assert!(!first.ok);
        assert_eq!(first.details, vec!["issues=3".to_string()]);
        assert_eq!(first.issues, vec!["summary failed".to_string()]);
    }
}
