//! URL slug generation.

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// Turn free text into a URL slug.
///
/// Lowercases, drops every character outside `[a-z0-9]`, whitespace and `-`,
/// then joins words with single dashes. Accented letters are removed rather than
/// transliterated, so `"Pão"` becomes `"po"`. May return an empty string.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    let spaced = WHITESPACE.replace_all(&kept, " ");
    let dashed = spaced.trim().replace(' ', "-");
    DASH_RUNS
        .replace_all(&dashed, "-")
        .trim_matches('-')
        .to_string()
}

/// `base` for the first candidate, `base-n` from the second on.
pub fn with_suffix(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

/// Validate slug format (lowercase alphanumeric words joined by single dashes)
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug cannot be empty".to_string());
    }
    if !SLUG_REGEX.is_match(slug) {
        return Err(format!("Invalid slug format: {slug}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accents_are_dropped() {
        assert_eq!(slugify("Pão de Açúcar!!"), "po-de-acar");
    }

    #[test]
    fn test_plain_title() {
        assert_eq!(slugify("Bolo de Chocolate"), "bolo-de-chocolate");
    }

    #[test]
    fn test_dash_and_space_runs_collapse() {
        assert_eq!(slugify("  Arroz -- com \t Feijão - "), "arroz-com-feijo");
        assert_eq!(slugify("a - b"), "a-b");
    }

    #[test]
    fn test_nothing_usable_gives_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("ção"), "o");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(with_suffix("bolo", 1), "bolo");
        assert_eq!(with_suffix("bolo", 3), "bolo-3");
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("bolo-de-chocolate-2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Bolo").is_err());
        assert!(validate_slug("-bolo").is_err());
    }

    proptest! {
        #[test]
        fn test_slugify_output_is_empty_or_valid(text in "\\PC{0,40}") {
            let slug = slugify(&text);
            prop_assert!(slug.is_empty() || validate_slug(&slug).is_ok(), "bad slug {:?}", slug);
        }

        #[test]
        fn test_slugify_is_idempotent(text in "\\PC{0,40}") {
            let once = slugify(&text);
            prop_assert_eq!(slugify(&once), once.clone());
        }
    }
}
