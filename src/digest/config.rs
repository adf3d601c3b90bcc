use crate::digest::util::env_non_empty;
use crate::error::DigestError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_MAX_ISSUES_PER_FILE: usize = 50;
pub const DEFAULT_TOKEN_BUDGET: usize = 100_000;

/// Source of configuration values keyed by variable name.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub issues_dir: PathBuf,
    pub summaries_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            issues_dir: PathBuf::from("results/issues"),
            summaries_dir: PathBuf::from("results/summaries"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub api_base_url: String,
    pub max_issues: Option<usize>,
    pub max_issues_per_file: usize,
    pub include_comments: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
            max_issues: None,
            max_issues_per_file: DEFAULT_MAX_ISSUES_PER_FILE,
            include_comments: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: Option<String>,
    pub token_budget: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DigestConfig {
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDigestConfig {
    output: Option<OutputConfig>,
    fetch: Option<FetchConfig>,
    llm: Option<LlmConfig>,
}

/// Secrets and endpoint overrides. Only ever read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_non_empty)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        Self {
            github_token: lookup("GITHUB_TOKEN"),
            openai_api_key: lookup("OPENAI_API_KEY"),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY"),
            openai_base_url: lookup("OPENAI_BASE_URL"),
            anthropic_base_url: lookup("ANTHROPIC_BASE_URL"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(value: &Option<String>) -> &'static str {
            if value.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("github_token", &mask(&self.github_token))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .finish()
    }
}

fn env_or_usize(lookup: EnvLookup<'_>, var: &str, fallback: usize) -> usize {
    lookup(var)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn env_or_bool(lookup: EnvLookup<'_>, var: &str, fallback: bool) -> bool {
    match lookup(var).as_deref().map(str::trim) {
        Some("1" | "true" | "TRUE" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "no" | "off") => false,
        _ => fallback,
    }
}

fn env_or_string(lookup: EnvLookup<'_>, var: &str, fallback: &str) -> String {
    lookup(var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_path(lookup: EnvLookup<'_>, var: &str, fallback: &Path) -> PathBuf {
    lookup(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.to_path_buf())
}

pub fn validate(cfg: &DigestConfig) -> Result<(), DigestError> {
    if cfg.fetch.max_issues_per_file == 0 {
        return Err(DigestError::config(
            "invalid max issues per file: must be >= 1",
        ));
    }
    if cfg.fetch.api_base_url.trim().is_empty() {
        return Err(DigestError::config("invalid GitHub API URL: cannot be empty"));
    }
    if cfg.llm.token_budget == 0 {
        return Err(DigestError::config("invalid token budget: must be >= 1"));
    }
    if cfg.llm.provider.trim().is_empty() {
        return Err(DigestError::config("invalid LLM provider: cannot be empty"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(custom) = env_non_empty("ISSUE_DIGEST_CONFIG_PATH") {
        return Some(PathBuf::from(custom));
    }
    let base = dirs::config_dir()?;
    Some(base.join("issue-digest").join("config.toml"))
}

fn merge_toml(base: &mut DigestConfig, raw: &str) -> Result<()> {
    let parsed: PartialDigestConfig = toml::from_str(raw)?;
    if let Some(output) = parsed.output {
        base.output = output;
    }
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    if let Some(llm) = parsed.llm {
        base.llm = llm;
    }
    Ok(())
}

fn merge_file_config(base: &mut DigestConfig, path: Option<PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| anyhow!("failed to read config {}: {err}", path.display()))?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))
}

pub fn apply_env_overrides(cfg: &mut DigestConfig, lookup: EnvLookup<'_>) {
    cfg.output.issues_dir = env_or_path(lookup, "ISSUE_DIGEST_ISSUES_DIR", &cfg.output.issues_dir);
    cfg.output.summaries_dir = env_or_path(
        lookup,
        "ISSUE_DIGEST_SUMMARIES_DIR",
        &cfg.output.summaries_dir,
    );
    cfg.fetch.api_base_url = env_or_string(lookup, "GITHUB_API_URL", &cfg.fetch.api_base_url);
    cfg.fetch.max_issues_per_file =
        env_or_usize(lookup, "MAX_ISSUES_PER_FILE", cfg.fetch.max_issues_per_file);
    if let Some(max) = lookup("ISSUE_DIGEST_MAX_ISSUES").and_then(|v| v.trim().parse().ok()) {
        cfg.fetch.max_issues = Some(max);
    }
    cfg.fetch.include_comments = env_or_bool(
        lookup,
        "ISSUE_DIGEST_INCLUDE_COMMENTS",
        cfg.fetch.include_comments,
    );
    cfg.llm.provider = env_or_string(lookup, "LLM_PROVIDER", &cfg.llm.provider);
    if let Some(model) = lookup("LLM_MODEL") {
        cfg.llm.model = Some(model);
    }
    cfg.llm.token_budget = env_or_usize(lookup, "ISSUE_DIGEST_TOKEN_BUDGET", cfg.llm.token_budget);
}

pub fn load_config() -> Result<DigestConfig> {
    load_config_with(|_| {})
}

/// Defaults, then the TOML file, then the environment, then `overrides`
/// (command-line flags); validated once every layer is applied.
pub fn load_config_with(overrides: impl FnOnce(&mut DigestConfig)) -> Result<DigestConfig> {
    let mut cfg = DigestConfig::default();
    merge_file_config(&mut cfg, resolve_config_path())?;
    apply_env_overrides(&mut cfg, &env_non_empty);
    overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
