use anyhow::Result;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Read an environment variable, treating blank values as unset.
pub fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Truncate `input` to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    if input.chars().count() > max_chars {
        let mut s: String = input.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_with_ellipsis;

    #[test]
    fn truncate_keeps_short_input() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_with_ellipsis("ééééé", 2), "éé…");
    }
}
