//! Storage key derivation: slugs and collision-free allocation.

use std::collections::HashSet;

/// Maximum slug length.
const MAX_SLUG_LEN: usize = 40;
/// Slug used when a title yields nothing usable.
const FALLBACK_SLUG: &str = "tab";

/// Derives a storage slug from a tab title.
///
/// Lowercases, collapses every run of non-alphanumeric characters to a
/// single `-`, strips edge dashes, and caps the length at 40. An empty
/// result (blank title, all punctuation) falls back to `"tab"`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for c in title.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str(FALLBACK_SLUG);
    }
    slug
}

/// Picks the first free key among `base`, `base-2`, `base-3`, ...
///
/// `taken` is the set of keys already in use across all students.
#[must_use]
pub fn unique_storage_key<I, S>(base: &str, taken: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: HashSet<String> = taken.into_iter().map(|s| s.as_ref().to_string()).collect();

    if !taken.contains(base) {
        return base.to_string();
    }
    let mut i = 2;
    loop {
        let candidate = format!("{base}-{i}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Ada Lovelace"), "ada-lovelace");
        assert_eq!(slugify("  Year 3 / Week 7!  "), "year-3-week-7");
        assert_eq!(slugify("___"), "tab");
        assert_eq!(slugify(""), "tab");
    }

    #[test]
    fn slugify_caps_length() {
        let long = "x".repeat(100);
        assert_eq!(slugify(&long).len(), 40);
    }

    #[test]
    fn unique_key_walks_the_suffix_ladder() {
        let taken = ["ada", "ada-2", "ada-3"];
        assert_eq!(unique_storage_key("ada", taken), "ada-4");
        assert_eq!(unique_storage_key("ben", ["ada"]), "ben");
        assert_eq!(unique_storage_key("ada", ["ada", "ada-3"]), "ada-2");
    }

    #[test]
    fn colliding_bases_stay_pairwise_distinct() {
        let mut keys: Vec<String> = Vec::new();
        for _ in 0..5 {
            let next = unique_storage_key("ada", keys.iter().map(String::as_str));
            keys.push(next);
        }
        assert_eq!(keys, vec!["ada", "ada-2", "ada-3", "ada-4", "ada-5"]);
    }

    proptest! {
        #[test]
        fn slug_charset_and_length(title in ".{0,120}") {
            let slug = slugify(&title);
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.len() <= 40);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
        }

        #[test]
        fn slugify_is_idempotent(title in "[a-zA-Z0-9 _.!-]{0,60}") {
            let once = slugify(&title);
            prop_assert_eq!(slugify(&once), once);
        }
    }
}
