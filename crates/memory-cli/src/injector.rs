//! Relevance / gotcha injector (C11)
//!
//! Combines the per-memory relevance score (tags, file patterns, recency,
//! severity — `memory_core::relevance`) with per-type/per-tool policy from
//! configuration and per-session deduplication to produce the bullets
//! injected into a hook's `additionalContext`.

use memory_core::config::{Config, InjectionConfig};
use memory_core::model::MemoryType;
use memory_core::relevance::{self, ScoreContext, ScoreInput, Weights};
use memory_core::session::SessionState;
use memory_core::Memory;

/// The tool event that triggered injection.
#[derive(Debug, Clone)]
pub struct ToolEvent<'a> {
    pub tool_name: &'a str,
    pub file_path: Option<&'a str>,
    pub context_tags: Vec<String>,
}

/// One scored, not-yet-filtered candidate.
struct Candidate<'a> {
    memory: &'a Memory,
    score: f32,
}

/// A bullet ready to be rendered, grouped by type.
#[derive(Debug, Clone)]
pub struct InjectedMemory {
    pub id: String,
    pub memory_type: MemoryType,
    pub title: String,
    pub score: f32,
}

const GLOBAL_CAP: usize = 10;

/// Priority used for sorting: lower sorts first (gotcha < decision <
/// learning, per §4.11), anything else sorts last.
fn type_priority(memory_type: MemoryType) -> usize {
    MemoryType::INJECTION_PRIORITY
        .iter()
        .position(|t| *t == memory_type)
        .unwrap_or(MemoryType::INJECTION_PRIORITY.len())
}

/// Select and rank the memories to inject for one tool event, recording
/// surfaced ids in `session` as a side effect.
pub fn select<'a>(
    memories: &'a [Memory],
    event: &ToolEvent,
    config: &Config,
    session: &mut SessionState,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<InjectedMemory> {
    if !config.injection.enabled {
        return Vec::new();
    }

    let injection = &config.injection;
    let multiplier = hook_multiplier(injection, event.tool_name);

    let mut candidates: Vec<Candidate> = Vec::new();

    for memory in memories {
        let Some(type_config) = injection.types.get(memory.memory_type.to_string().as_str()) else {
            continue;
        };
        if !type_config.enabled {
            continue;
        }
        if session.has(&memory.id, memory.memory_type) {
            continue;
        }

        let effective_threshold = (type_config.threshold * multiplier).min(1.0);

        let patterns = memory.file_patterns();
        let input = ScoreInput {
            tags: &memory.tags,
            file_patterns: &patterns,
            updated: memory.updated,
            severity: memory.severity,
        };
        let context = ScoreContext {
            file_path: event.file_path,
            context_tags: &event.context_tags,
            now,
        };
        let score = relevance::score(&input, &context, Weights::default()).overall;

        if score < effective_threshold {
            continue;
        }

        candidates.push(Candidate { memory, score });
    }

    candidates.sort_by(|a, b| {
        type_priority(a.memory.memory_type)
            .cmp(&type_priority(b.memory.memory_type))
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut per_type_counts: std::collections::HashMap<MemoryType, u32> = std::collections::HashMap::new();
    let mut selected = Vec::new();

    for candidate in candidates {
        if selected.len() >= GLOBAL_CAP {
            break;
        }
        let Some(type_config) = injection.types.get(candidate.memory.memory_type.to_string().as_str()) else {
            continue;
        };
        let count = per_type_counts.entry(candidate.memory.memory_type).or_insert(0);
        if *count >= type_config.limit {
            continue;
        }
        *count += 1;

        session.record(&candidate.memory.id, candidate.memory.memory_type);
        selected.push(InjectedMemory {
            id: candidate.memory.id.clone(),
            memory_type: candidate.memory.memory_type,
            title: candidate.memory.title.clone(),
            score: candidate.score,
        });
    }

    selected
}

fn hook_multiplier(injection: &InjectionConfig, tool_name: &str) -> f32 {
    injection.hook_multipliers.get(tool_name).copied().unwrap_or(1.0)
}

/// Render selected memories as grouped Markdown bullets, one group per
/// type, types in §4.11 priority order.
pub fn format_bullets(selected: &[InjectedMemory]) -> String {
    let mut by_type: std::collections::BTreeMap<usize, (MemoryType, Vec<&InjectedMemory>)> =
        std::collections::BTreeMap::new();
    for item in selected {
        by_type
            .entry(type_priority(item.memory_type))
            .or_insert_with(|| (item.memory_type, Vec::new()))
            .1
            .push(item);
    }

    let mut out = String::new();
    for (_, (memory_type, items)) in by_type {
        out.push_str(&format!("**{memory_type}s**\n"));
        for item in items {
            out.push_str(&format!("- {} ({})\n", item.title, item.id));
        }
    }
    out
}
