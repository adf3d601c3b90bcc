pub mod chunk;
pub mod config;
pub mod github;
pub mod llm;
pub mod model;
pub mod render;
pub mod repo_url;
pub mod retry;
pub mod store;
pub mod summarize;
pub mod util;
