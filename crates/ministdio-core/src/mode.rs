//! Mode-string interpretation for descriptor attachment.
//!
//! Reference: POSIX.1-2024 fdopen.
//!
//! The attach-time grammar is smaller than the open-time one: the first
//! character picks the base direction, `+` anywhere lifts the
//! single-direction restriction, `e` anywhere requests close-on-exec, and
//! every other character is ignored. Attachment never creates or truncates
//! anything, so `w` and `a` carry none of their open-time side effects.

/// Direction and descriptor-flag requests derived from a mode string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamMode {
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
    pub close_on_exec: bool,
}

impl StreamMode {
    /// Parse an attach-time mode string.
    ///
    /// Returns `None` when the string is empty or its first character is
    /// not `r`, `w` or `a`. Later characters are scanned only for `+` and
    /// `e`; `"rb"` means the same as `"r"` here.
    #[must_use]
    pub fn parse(mode: &str) -> Option<Self> {
        let bytes = mode.as_bytes();
        let first = *bytes.first()?;
        if !matches!(first, b'r' | b'w' | b'a') {
            return None;
        }
        let plus = bytes.contains(&b'+');
        Some(Self {
            readable: first == b'r' || plus,
            writable: first != b'r' || plus,
            append: first == b'a',
            close_on_exec: bytes.contains(&b'e'),
        })
    }
}
