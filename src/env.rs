//! Environment-variable helpers shared by the config structs.

use std::str::FromStr;

/// Parse `name`, falling back to `default` when unset or unparseable.
pub(crate) fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Boolean flag: `1`, `true`, `yes`, `on` (any case) are true; `0`, `false`,
/// `no`, `off` are false; anything else yields `default`.
pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Non-empty string variable.
pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_or_default_when_unset() {
        assert_eq!(env_or("THREAD_FORENSICS_TEST_UNSET_VAR", 7u32), 7);
        assert!(env_flag("THREAD_FORENSICS_TEST_UNSET_VAR", true));
        assert!(env_string("THREAD_FORENSICS_TEST_UNSET_VAR").is_none());
    }
}
