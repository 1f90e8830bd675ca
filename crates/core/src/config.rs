//! Environment-variable helpers shared by the service configs.

use std::str::FromStr;

/// Read `key` from the environment and parse it, falling back to `default`
/// when the variable is unset. Unparseable values also fall back, with a
/// warning naming the offending variable.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid value in environment, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an optional, non-empty string from the environment.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
