//! Configuration options for decoding BR Codes.
//!
//! [`DecodeOptions`] controls how the TLV decoder treats tags that are not
//! part of the BR Code key mapping.
//!
//! | Preset | Unknown tags | Use case |
//! |--------|--------------|----------|
//! | [`DecodeOptions::default()`] | rejected with `unknown_key` | canonical payloads |
//! | [`DecodeOptions::strict()`] | silently dropped | payloads carrying PSP extensions |

/// Options for decoding BR Codes.
///
/// # Example
///
/// ```rust
/// use pix_brcode::DecodeOptions;
///
/// // Reject tags outside the BR Code mapping (default)
/// let options = DecodeOptions::default();
///
/// // Skip unknown tags instead of failing
/// let options = DecodeOptions::strict();
/// assert!(options.strict_validation);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Silently skip tags that have no entry in the key mapping.
    ///
    /// When `false` (the default) an unknown tag fails the decode with
    /// `{validation, unknown_key}`.
    pub strict_validation: bool,
}

impl DecodeOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether unknown tags are skipped.
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Create options that silently skip unknown tags.
    pub fn strict() -> Self {
        Self {
            strict_validation: true,
        }
    }
}
