//! Build environment variable handling.

use std::env;

// Helper for boolean environment variables that accept "1", "true", "yes"
fn is_enabled(var: &str) -> bool {
    env::var(var).ok().is_some_and(|s| is_truthy(&s))
}

fn is_truthy(value: &str) -> bool {
    let s = value.to_lowercase();
    s == "1" || s == "true" || s == "yes"
}

// Cross-compilation
// ARCHFLAGS is set by cibuildwheel before macOS wheel builds (e.g. "-arch arm64").

/// Get compiler architecture flags (`ARCHFLAGS`).
pub fn archflags() -> Option<String> {
    env::var("ARCHFLAGS").ok()
}

// Tool locations

/// Get Bazel executable override (`BAZEL`).
pub fn bazel() -> Option<String> {
    env::var("BAZEL").ok().filter(|s| !s.is_empty())
}

/// Get Python interpreter override (`PYTHON`).
pub fn python() -> Option<String> {
    env::var("PYTHON").ok().filter(|s| !s.is_empty())
}

// ccpd-build settings

/// Get config file path (`CCPD_BUILD_CONFIG`).
pub fn build_config() -> Option<String> {
    env::var("CCPD_BUILD_CONFIG").ok().filter(|s| !s.is_empty())
}

/// Check if debug logging is requested (`CCPD_BUILD_DEBUG`).
pub fn build_debug() -> bool {
    is_enabled("CCPD_BUILD_DEBUG")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("YES"));
        assert!(is_truthy("True"));
    }

    #[test]
    fn falsy_variants() {
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("no"));
        assert!(!is_truthy(""));
    }
}
