//! Title to identifier normalization
//!
//! Identifiers are the addressing key of a published document (the `d` tag)
//! and the key redirect targets point at, so the mapping must be pure and
//! stable across runs and releases.

use unicode_normalization::UnicodeNormalization;

/// Identifier produced for titles that contain no letters or digits.
///
/// `_` can never be produced from a non-empty normalization (those contain
/// only lowercase letters, digits and interior dashes), so it cannot collide
/// with a real page.
pub const EMPTY_IDENTIFIER: &str = "_";

/// Normalize a title into a stable slug identifier.
///
/// - NFKC compatibility folding, then lowercasing
/// - every run of characters that are not letters or digits becomes one `-`
/// - leading and trailing dashes are dropped
///
/// `"  Beta (album) "` and `"beta album"` both normalize to `beta-album`.
pub fn normalize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.nfkc() {
        for lower in c.to_lowercase() {
            if lower.is_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(lower);
            } else {
                pending_dash = true;
            }
        }
    }

    if out.is_empty() {
        EMPTY_IDENTIFIER.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic_slugs() {
        assert_eq!(normalize("Alpha"), "alpha");
        assert_eq!(normalize("Source Page"), "source-page");
        assert_eq!(normalize("Target Page"), "target-page");
        assert_eq!(normalize("Beta (album)"), "beta-album");
    }

    #[test]
    fn test_whitespace_and_case_are_folded() {
        assert_eq!(normalize("  Target   Page\t"), normalize("target page"));
        assert_eq!(normalize("TARGET-PAGE"), "target-page");
    }

    #[test]
    fn test_compatibility_forms_fold() {
        // Full-width letters and ligatures
        assert_eq!(normalize("ＡＢＣ"), "abc");
        assert_eq!(normalize("ﬁle"), "file");
    }

    #[test]
    fn test_non_latin_letters_survive() {
        assert_eq!(normalize("Ελληνικά Γράμματα"), "ελληνικά-γράμματα");
        assert_eq!(normalize("東京 タワー"), "東京-タワー");
    }

    #[test]
    fn test_meaningful_differences_do_not_collide() {
        assert_ne!(normalize("Beta (album)"), normalize("Beta (song)"));
        assert_ne!(normalize("Apollo 11"), normalize("Apollo 12"));
    }

    #[test]
    fn test_empty_and_punctuation_only_titles() {
        assert_eq!(normalize(""), EMPTY_IDENTIFIER);
        assert_eq!(normalize("   "), EMPTY_IDENTIFIER);
        assert_eq!(normalize("?!--()"), EMPTY_IDENTIFIER);
        assert_eq!(normalize(EMPTY_IDENTIFIER), EMPTY_IDENTIFIER);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(title in "[A-Za-z0-9 àéîõüçÆßΩж()\\[\\],.:;'_/-]{0,48}") {
            let once = normalize(&title);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_deterministic(title in "\\PC{0,32}") {
            prop_assert_eq!(normalize(&title), normalize(&title));
        }

        #[test]
        fn surrounding_whitespace_is_irrelevant(
            title in "[A-Za-z0-9()]{1,24}",
            left in "[ \t\n]{0,4}",
            right in "[ \t\n]{0,4}",
        ) {
            let padded = format!("{left}{title}{right}");
            prop_assert_eq!(normalize(&padded), normalize(&title));
        }
    }
}
