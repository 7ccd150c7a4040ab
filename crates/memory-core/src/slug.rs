//! Slug generator (C2)

use std::collections::HashSet;

use crate::model::MemoryType;

const MAX_LEN: usize = 80;

/// Derive a stable identifier from a title and optional type, satisfying
/// `^[a-z0-9]+(-[a-z0-9]+)*$` with length <= 80 (§4.2).
pub fn generate(title: &str, memory_type: Option<MemoryType>) -> String {
    let mut slug: String = title
        .chars()
        .map(|c| {
            let lower = c.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() {
                lower
            } else {
                '-'
            }
        })
        .collect();

    slug = collapse_and_trim(&slug);

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    if slug.len() > MAX_LEN {
        slug.truncate(MAX_LEN);
        slug = collapse_and_trim(&slug);
    }

    if let Some(ty) = memory_type {
        let prefix = format!("{}-", ty.prefix());
        if !slug.starts_with(&prefix) {
            slug = format!("{prefix}{slug}");
            if slug.len() > MAX_LEN {
                slug.truncate(MAX_LEN);
                slug = collapse_and_trim(&slug);
            }
        }
    }

    slug
}

fn collapse_and_trim(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    out.trim_matches('-').to_string()
}

/// Resolve a collision against an existing-slugs set by appending the
/// smallest free numeric suffix, deterministically filling gaps.
pub fn resolve_collision(candidate: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }
    let mut n: u32 = 1;
    loop {
        let attempt = format!("{candidate}-{n}");
        if !existing.contains(&attempt) {
            return attempt;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_non_alphanumeric() {
        assert_eq!(generate("Use OAuth2 with PKCE!", None), "use-oauth2-with-pkce");
    }

    #[test]
    fn collapses_runs_and_trims_dashes() {
        assert_eq!(generate("  --Hello   World--  ", None), "hello-world");
    }

    #[test]
    fn empty_title_becomes_untitled() {
        assert_eq!(generate("!!!", None), "untitled");
    }

    #[test]
    fn truncates_to_max_len() {
        let title = "a".repeat(200);
        let slug = generate(&title, None);
        assert!(slug.len() <= MAX_LEN);
    }

    #[test]
    fn prepends_type_prefix_when_missing() {
        let slug = generate("OAuth2", Some(MemoryType::Decision));
        assert_eq!(slug, "decision-oauth2");
    }

    #[test]
    fn does_not_double_prefix() {
        let slug = generate("decision to use oauth2", Some(MemoryType::Decision));
        assert_eq!(slug, "decision-to-use-oauth2");
    }

    #[test]
    fn matches_invariant_pattern() {
        for title in ["Hello, World!", "???", "A B C", "x".repeat(120).as_str()] {
            let slug = generate(title, None);
            assert!(slug.len() <= MAX_LEN && !slug.is_empty());
            assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
        }
    }

    #[test]
    fn collision_resolution_fills_gaps_deterministically() {
        let mut existing: HashSet<String> = HashSet::new();
        existing.insert("decision-oauth2".to_string());
        let first = resolve_collision("decision-oauth2", &existing);
        assert_eq!(first, "decision-oauth2-1");

        existing.insert(first.clone());
        let second = resolve_collision("decision-oauth2", &existing);
        assert_ne!(second, first);
        assert_eq!(second, "decision-oauth2-2");
    }

    #[test]
    fn collision_idempotence_under_growth() {
        let mut existing: HashSet<String> = HashSet::new();
        existing.insert("x".to_string());
        let first = resolve_collision("x", &existing);
        existing.insert(first.clone());
        let second = resolve_collision("x", &existing);
        assert_ne!(first, second);
    }
}
