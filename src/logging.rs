//! Tracing subscriber setup. `RUST_LOG` always wins over the built-in filter.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "issue_digest=info,reqwest=warn";
const VERBOSE_FILTER: &str = "issue_digest=debug,reqwest=warn";

fn default_filter(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// Logs go to stderr so report output on stdout stays machine-readable.
pub fn init_logging(verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::default_filter;

    #[test]
    fn verbose_raises_crate_level_only() {
        assert_eq!(default_filter(false), "issue_digest=info,reqwest=warn");
        assert_eq!(default_filter(true), "issue_digest=debug,reqwest=warn");
    }
}
