use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const ISOLATED_VARS: [&str; 14] = [
    "GITHUB_TOKEN",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OPENAI_BASE_URL",
    "ANTHROPIC_BASE_URL",
    "LLM_PROVIDER",
    "LLM_MODEL",
    "MAX_ISSUES_PER_FILE",
    "GITHUB_API_URL",
    "ISSUE_DIGEST_ISSUES_DIR",
    "ISSUE_DIGEST_SUMMARIES_DIR",
    "ISSUE_DIGEST_MAX_ISSUES",
    "ISSUE_DIGEST_INCLUDE_COMMENTS",
    "ISSUE_DIGEST_TOKEN_BUDGET",
];

/// A command with no ambient credentials, config file, or `.env`.
fn isolated(home: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("issue-digest");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("ISSUE_DIGEST_CONFIG_PATH", home.join("absent.toml"))
        .env_remove("RUST_LOG");
    for var in ISOLATED_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn check_config_fails_without_github_token() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .arg("check-config")
        .assert()
        .failure()
        .stdout(predicate::str::contains("github_token=missing"))
        .stdout(predicate::str::contains("GITHUB_TOKEN not set"));
}

#[test]
fn check_config_reports_presence_without_secret_values() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .env("GITHUB_TOKEN", "ghp_do_not_print")
        .env("OPENAI_API_KEY", "sk-do-not-print")
        .args(["--json", "check-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"))
        .stdout(predicate::str::contains("github_token=configured"))
        .stdout(predicate::str::contains("do_not_print").not())
        .stdout(predicate::str::contains("do-not-print").not());
}

#[test]
fn check_config_reads_toml_file() {
    let tmp = tempdir().expect("tempdir");
    let config = tmp.path().join("digest.toml");
    fs::write(
        &config,
        "[fetch]\nmax_issues_per_file = 12\n\n[llm]\nprovider = \"anthropic\"\n",
    )
    .expect("write config");

    isolated(tmp.path())
        .env("ISSUE_DIGEST_CONFIG_PATH", &config)
        .env("GITHUB_TOKEN", "ghp_test")
        .env("ANTHROPIC_API_KEY", "ak_test")
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_issues_per_file=12"))
        .stdout(predicate::str::contains("llm_model=claude-3-haiku-20240307"));
}

#[test]
fn fetch_issues_requires_a_token() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .args(["fetch-issues", "https://github.com/octo/widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GitHub token is required"));
    assert!(!tmp.path().join("results").exists());
}

#[test]
fn fetch_issues_rejects_malformed_url() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .env("GITHUB_TOKEN", "ghp_test")
        .args(["fetch-issues", "not a repository"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid GitHub URL"));
}

#[test]
fn fetch_issues_rejects_zero_per_file_limit() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .env("GITHUB_TOKEN", "ghp_test")
        .args(["fetch-issues", "octo/widgets", "--max-per-file", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max issues per file"));
}

#[test]
fn summarize_requires_provider_credential() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .args(["summarize", "octo_widgets", "--provider", "anthropic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn summarize_rejects_unknown_provider() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["summarize", "octo_widgets", "--provider", "gemini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported LLM provider"));
}

#[test]
fn summarize_reports_missing_issue_documents() {
    let tmp = tempdir().expect("tempdir");
    let issues_dir = tmp.path().join("issues");

    isolated(tmp.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["summarize", "octo_widgets", "-i"])
        .arg(&issues_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("issues directory not found"));

    fs::create_dir_all(&issues_dir).expect("mkdir");
    fs::write(issues_dir.join("other_repo_issues.md"), "# other").expect("write");

    isolated(tmp.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["summarize", "octo_widgets", "-i"])
        .arg(&issues_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "no issue files found for repository: octo_widgets",
        ));
}

#[test]
fn fetch_and_summarize_checks_llm_credentials_before_fetching() {
    let tmp = tempdir().expect("tempdir");

    isolated(tmp.path())
        .env("GITHUB_TOKEN", "ghp_test")
        .env("GITHUB_API_URL", "http://127.0.0.1:9")
        .args(["fetch-and-summarize", "octo/widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
    assert!(!tmp.path().join("results").exists());
}
