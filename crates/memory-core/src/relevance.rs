//! Relevance scorer (C10)
//!
//! Combines tag, file-path, recency, and severity scores into a single
//! weighted ranking (§4.10).

use chrono::{DateTime, Utc};

use crate::model::Severity;
use crate::pattern::{self, MatchType};

/// Per-factor weights. Defaults match §4.10.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub tag: f32,
    pub file: f32,
    pub recency: f32,
    pub severity: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            tag: 0.3,
            file: 0.4,
            recency: 0.2,
            severity: 0.1,
        }
    }
}

/// The memory-side inputs to scoring.
pub struct ScoreInput<'a> {
    pub tags: &'a std::collections::BTreeSet<String>,
    pub file_patterns: &'a [String],
    pub updated: DateTime<Utc>,
    pub severity: Option<Severity>,
}

/// The context-side inputs to scoring.
pub struct ScoreContext<'a> {
    pub file_path: Option<&'a str>,
    pub context_tags: &'a [String],
    pub now: DateTime<Utc>,
}

/// A scored breakdown, useful for debugging/explaining a ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub tag_score: f32,
    pub file_score: f32,
    pub recency: f32,
    pub severity: f32,
    pub overall: f32,
}

/// Tag overlap score: `matches/|context_tags| + min(0.1, 0.02*matches)`,
/// clamped to 1; zero if either side is empty.
pub fn tag_score(tags: &std::collections::BTreeSet<String>, context_tags: &[String]) -> f32 {
    if tags.is_empty() || context_tags.is_empty() {
        return 0.0;
    }
    let matches = context_tags.iter().filter(|t| tags.contains(*t)).count() as f32;
    if matches == 0.0 {
        return 0.0;
    }
    let base = matches / context_tags.len() as f32;
    (base + (0.02 * matches).min(0.1)).min(1.0)
}

/// File-path score from the strongest [`MatchType`].
pub fn file_score(file_path: Option<&str>, patterns: &[String]) -> f32 {
    let Some(path) = file_path else { return 0.0 };
    if patterns.is_empty() {
        return 0.0;
    }
    match pattern::match_type(path, patterns) {
        MatchType::Exact => 1.0,
        MatchType::Directory => 0.8,
        MatchType::Glob => 0.6,
        MatchType::None => 0.0,
    }
}

/// Recency score: `max(0.1, 0.5^(age_days/30))`.
pub fn recency_score(updated: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_days = (now - updated).num_seconds() as f32 / 86_400.0;
    let age_days = age_days.max(0.0);
    (0.5_f32.powf(age_days / 30.0)).max(0.1)
}

/// Severity score, `None` maps to 0.5.
pub fn severity_score(severity: Option<Severity>) -> f32 {
    severity.map(Severity::weight).unwrap_or(0.5)
}

/// Compute the weighted overall relevance score (§4.10).
pub fn score(input: &ScoreInput, context: &ScoreContext, weights: Weights) -> Score {
    let tag = tag_score(input.tags, context.context_tags);
    let file = file_score(context.file_path, input.file_patterns);
    let recency = recency_score(input.updated, context.now);
    let severity = severity_score(input.severity);

    let weight_sum = weights.tag + weights.file + weights.recency + weights.severity;
    let overall = if weight_sum > 0.0 {
        (tag * weights.tag + file * weights.file + recency * weights.recency + severity * weights.severity)
            / weight_sum
    } else {
        0.0
    };

    Score {
        tag_score: tag,
        file_score: file,
        recency,
        severity,
        overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    #[test]
    fn tag_score_zero_when_either_side_empty() {
        let tags: BTreeSet<String> = BTreeSet::new();
        assert_eq!(tag_score(&tags, &["auth".to_string()]), 0.0);
        let tags: BTreeSet<String> = ["auth".to_string()].into();
        assert_eq!(tag_score(&tags, &[]), 0.0);
    }

    #[test]
    fn scenario_4_gotcha_overall_score() {
        // spec.md §8 scenario 4: file score 0.6, tag score 0 (no context
        // tags), recency ~1 (updated=now), severity 0.8 -> overall ~0.52.
        let tags: BTreeSet<String> = ["auth".to_string(), "oauth2".to_string(), "concurrency".to_string()].into();
        let patterns = vec!["src/auth/**".to_string()];
        let now = Utc::now();
        let input = ScoreInput {
            tags: &tags,
            file_patterns: &patterns,
            updated: now,
            severity: Some(Severity::High),
        };
        let context = ScoreContext {
            file_path: Some("src/auth/login.ts"),
            context_tags: &[],
            now,
        };
        let s = score(&input, &context, Weights::default());
        assert_eq!(s.file_score, 0.6);
        assert_eq!(s.tag_score, 0.0);
        assert!((s.recency - 1.0).abs() < 0.01);
        assert_eq!(s.severity, 0.8);
        assert!((s.overall - 0.52).abs() < 0.01);
    }

    #[test]
    fn recency_decays_with_age() {
        let now = Utc::now();
        let old = now - Duration::days(30);
        let fresh = recency_score(now, now);
        let aged = recency_score(old, now);
        assert!((fresh - 1.0).abs() < 0.01);
        assert!((aged - 0.5).abs() < 0.01);
    }

    #[test]
    fn recency_floors_at_point_one() {
        let now = Utc::now();
        let ancient = now - Duration::days(3650);
        assert!((recency_score(ancient, now) - 0.1).abs() < 0.001);
    }

    #[test]
    fn severity_none_maps_to_half() {
        assert_eq!(severity_score(None), 0.5);
    }
}
