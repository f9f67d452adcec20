//! Environment variable utilities
//!
//! Typed parsing with defaults, used by `LoopConfig` and the poller
//! backend selection.

use std::str::FromStr;

/// Get an environment variable parsed as `T`, or the default.
///
/// Unset or unparseable values fall back silently; configuration must
/// never be able to crash the reactor.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get an environment variable as a boolean.
///
/// "1", "true", "yes", "on" (case-insensitive) are true; anything else
/// set is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let v: usize = env_get("REVENT_TEST_UNSET_VAR_XYZ", 42);
        assert_eq!(v, 42);
    }

    #[test]
    fn test_env_get_parses() {
        std::env::set_var("REVENT_TEST_PARSE_VAR", "17");
        let v: u64 = env_get("REVENT_TEST_PARSE_VAR", 0);
        assert_eq!(v, 17);
        std::env::remove_var("REVENT_TEST_PARSE_VAR");
    }

    #[test]
    fn test_env_get_bool() {
        std::env::set_var("REVENT_TEST_BOOL_VAR", "yes");
        assert!(env_get_bool("REVENT_TEST_BOOL_VAR", false));
        std::env::set_var("REVENT_TEST_BOOL_VAR", "off");
        assert!(!env_get_bool("REVENT_TEST_BOOL_VAR", true));
        std::env::remove_var("REVENT_TEST_BOOL_VAR");
        assert!(env_get_bool("REVENT_TEST_BOOL_VAR", true));
    }
}
