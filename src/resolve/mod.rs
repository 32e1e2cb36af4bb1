//! Station identity resolution.
//!
//! The turnstile feed only names stations by an abbreviated label and a
//! remote unit. Connected stations ("complexes") and coordinates come from
//! the MTA station table, which is keyed by complex id. The unit to complex
//! link is a hand-curated table: it is derived from the feed once, written out
//! for editing, and read back on later runs.

pub mod join;
pub mod mapping;

pub use join::IdentityResolver;
pub use mapping::{CsvMappingFile, MappingOutcome, MappingSource, derive_mapping, load_or_derive};

/// Canonical form of a line-name string: its characters sorted, so that
/// `"LMF123"` and `"123FLM"` compare equal.
pub fn canonical_line_name(line_name: &str) -> String {
    let mut chars: Vec<char> = line_name.trim().chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_line_name_sorts_characters() {
        assert_eq!(canonical_line_name("LMF123"), "123FLM");
        assert_eq!(canonical_line_name("123FLM"), "123FLM");
        assert_eq!(canonical_line_name(" NQR456W "), "456NQRW");
        assert_eq!(canonical_line_name(""), "");
    }
}
