//! URL slug derivation for published catalogues.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase the name and collapse every non-alphanumeric run into a dash.
fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Derive a unique slug: slugified name plus a short random suffix.
pub fn new_slug(name: &str) -> String {
    let base = slugify(name);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    if base.is_empty() {
        suffix[..8].to_string()
    } else {
        format!("{}-{}", base, &suffix[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Café Aurora & Co."), "caf-aurora-co");
        assert_eq!(slugify("  The   Grill  "), "the-grill");
    }

    #[test]
    fn slugs_are_unique_per_call() {
        let a = new_slug("Cafe Aurora");
        let b = new_slug("Cafe Aurora");
        assert!(a.starts_with("cafe-aurora-"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_name_still_yields_a_slug() {
        let slug = new_slug("!!!");
        assert_eq!(slug.len(), 8);
    }
}
