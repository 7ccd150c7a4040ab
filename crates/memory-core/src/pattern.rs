//! Pattern matcher (C9)
//!
//! Matches a file path against a set of patterns declared via `file:`,
//! `pattern:`, and `dir:` tags.

use std::collections::BTreeSet;

/// The strength of a match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchType {
    None,
    Glob,
    Directory,
    Exact,
}

/// Pull the `file:`/`pattern:`/`dir:` prefixed tags out of a tag set,
/// returning the pattern remainder for each.
pub fn extract_file_patterns(tags: &BTreeSet<String>) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| {
            for prefix in ["file:", "pattern:", "dir:"] {
                if let Some(rest) = tag.strip_prefix(prefix) {
                    return Some(rest.to_string());
                }
            }
            None
        })
        .collect()
}

/// Normalise a path: forward slashes, no leading `./`.
fn normalize(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    slashed.strip_prefix("./").unwrap_or(&slashed).to_string()
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Strongest match class between `path` and any of `patterns` (§4.9).
pub fn match_type(path: &str, patterns: &[String]) -> MatchType {
    let path = normalize(path);
    let mut best = MatchType::None;
    for raw_pattern in patterns {
        let pattern = normalize(raw_pattern);
        if pattern == path {
            return MatchType::Exact;
        }
        let is_dir_pattern = pattern.ends_with('/') || !pattern.contains('.');
        if is_dir_pattern {
            let prefix = pattern.trim_end_matches('/');
            if path.starts_with(&format!("{prefix}/")) {
                best = best.max(MatchType::Directory);
                continue;
            }
        }
        if has_glob_meta(&pattern) && glob_match(&pattern, &path) {
            best = best.max(MatchType::Glob);
        }
    }
    best
}

/// Case-insensitive glob match supporting `*`, `?`, `[...]`, and `**`
/// (spanning directory separators). A bare pattern with no `/` matches on
/// the path's basename only.
fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern_lower = pattern.to_ascii_lowercase();
    let path_lower = path.to_ascii_lowercase();

    if !pattern_lower.contains('/') {
        let basename = path_lower.rsplit('/').next().unwrap_or(&path_lower);
        return glob_match_segments(&pattern_lower, basename);
    }
    glob_match_segments(&pattern_lower, &path_lower)
}

fn glob_match_segments(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_rec(&p, &t)
}

fn glob_match_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => {
            // Check for "**" (spans directory separators identically to a
            // single '*' in this recursive formulation, since '*' already
            // matches '/').
            let mut rest = &p[1..];
            while rest.first() == Some(&'*') {
                rest = &rest[1..];
            }
            if glob_match_rec(rest, t) {
                return true;
            }
            for i in 0..t.len() {
                if glob_match_rec(rest, &t[i + 1..]) {
                    return true;
                }
            }
            false
        }
        Some('?') => !t.is_empty() && glob_match_rec(&p[1..], &t[1..]),
        Some('[') => {
            let Some(close) = p.iter().position(|&c| c == ']') else {
                return !t.is_empty() && p[0] == t[0] && glob_match_rec(&p[1..], &t[1..]);
            };
            if t.is_empty() {
                return false;
            }
            let class = &p[1..close];
            let (negate, class) = if class.first() == Some(&'!') {
                (true, &class[1..])
            } else {
                (false, class)
            };
            let matched = char_in_class(class, t[0]);
            if matched != negate {
                glob_match_rec(&p[close + 1..], &t[1..])
            } else {
                false
            }
        }
        Some(c) => !t.is_empty() && *c == t[0] && glob_match_rec(&p[1..], &t[1..]),
    }
}

fn char_in_class(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if c >= class[i] && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pats(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_prefixed_tags() {
        let tags: BTreeSet<String> = ["file:src/a.rs", "other", "dir:src/auth", "pattern:*.rs"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut patterns = extract_file_patterns(&tags);
        patterns.sort();
        assert_eq!(patterns, vec!["*.rs".to_string(), "src/a.rs".to_string(), "src/auth".to_string()]);
    }

    #[test]
    fn exact_match() {
        assert_eq!(match_type("src/a.rs", &pats(&["src/a.rs"])), MatchType::Exact);
    }

    #[test]
    fn directory_match_with_trailing_slash() {
        assert_eq!(match_type("src/auth/login.ts", &pats(&["src/auth/"])), MatchType::Directory);
    }

    #[test]
    fn directory_match_without_dot() {
        assert_eq!(match_type("src/auth/login.ts", &pats(&["src/auth"])), MatchType::Directory);
    }

    #[test]
    fn glob_match_star() {
        assert_eq!(match_type("src/auth/login.ts", &pats(&["src/auth/**"])), MatchType::Glob);
    }

    #[test]
    fn glob_match_basename_only_pattern() {
        assert_eq!(match_type("src/auth/login.test.ts", &pats(&["*.test.ts"])), MatchType::Glob);
    }

    #[test]
    fn glob_case_insensitive() {
        assert_eq!(match_type("SRC/Auth/Login.TS", &pats(&["src/auth/*.ts"])), MatchType::Glob);
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(match_type("other/file.rs", &pats(&["src/auth/**"])), MatchType::None);
    }

    #[test]
    fn normalizes_leading_dot_slash() {
        assert_eq!(match_type("./src/a.rs", &pats(&["src/a.rs"])), MatchType::Exact);
    }

    #[test]
    fn strongest_match_wins_among_several_patterns() {
        let patterns = pats(&["src/**", "src/auth/login.ts"]);
        assert_eq!(match_type("src/auth/login.ts", &patterns), MatchType::Exact);
    }
}
