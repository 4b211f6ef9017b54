//! Runtime policy configuration.
//!
//! The close-on-exec policy is set via the `MINISTDIO_CLOEXEC` environment
//! variable:
//! - `lenient` (default): the attach path issues the F_SETFD call and
//!   discards its result. A caller asking for close-on-exec can therefore
//!   end up without it, silently, on exotic descriptors.
//! - `strict`: a refused F_SETFD call fails the attachment instead.

use std::sync::OnceLock;

/// How attachment treats a refused close-on-exec request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloexecPolicy {
    /// Discard the F_SETFD result.
    #[default]
    Lenient,
    /// Surface the F_SETFD failure as an attach error.
    Strict,
}

impl CloexecPolicy {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "report" | "fail" => Self::Strict,
            _ => Self::Lenient,
        }
    }

    /// The policy selected by `MINISTDIO_CLOEXEC` (read once, cached).
    #[must_use]
    pub fn from_env() -> Self {
        static CACHED: OnceLock<CloexecPolicy> = OnceLock::new();
        *CACHED.get_or_init(|| {
            std::env::var("MINISTDIO_CLOEXEC")
                .map(|v| Self::from_str_loose(&v))
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!(CloexecPolicy::from_str_loose("strict"), CloexecPolicy::Strict);
        assert_eq!(CloexecPolicy::from_str_loose("STRICT"), CloexecPolicy::Strict);
        assert_eq!(CloexecPolicy::from_str_loose("report"), CloexecPolicy::Strict);
        assert_eq!(CloexecPolicy::from_str_loose("fail"), CloexecPolicy::Strict);
        assert_eq!(CloexecPolicy::from_str_loose("lenient"), CloexecPolicy::Lenient);
        assert_eq!(CloexecPolicy::from_str_loose("bogus"), CloexecPolicy::Lenient);
        assert_eq!(CloexecPolicy::from_str_loose(""), CloexecPolicy::Lenient);
    }

    #[test]
    fn test_default_is_lenient() {
        assert_eq!(CloexecPolicy::default(), CloexecPolicy::Lenient);
    }
}
