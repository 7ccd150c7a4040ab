//! Frontmatter codec (C1)
//!
//! Parses and emits the `---\n<yaml>\n---\n<body>` document format used for
//! every memory file on disk.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::model::{Memory, MemoryType, Scope, Severity};

const DELIMITER: &str = "---";

/// The raw YAML header of a memory file, deserialized independently of the
/// body so required-key validation can produce a precise error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub links: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Parse a full frontmatter document into its header and body.
///
/// Fails with [`MemoryError::MalformedHeader`] if the `---` delimiters are
/// missing, and [`MemoryError::InvalidSchema`] if the YAML between them
/// parses but is missing a required key or has the wrong type for one.
pub fn parse(content: &str, path: &Path) -> Result<(Header, String)> {
    let normalized = content.replace("\r\n", "\n");
    let mut lines = normalized.splitn(2, '\n');
    let first = lines.next().unwrap_or("");
    if first.trim_end() != DELIMITER {
        return Err(MemoryError::MalformedHeader {
            path: path.to_path_buf(),
        });
    }
    let rest = lines.next().unwrap_or("");

    let Some(close_idx) = find_closing_delimiter(rest) else {
        return Err(MemoryError::MalformedHeader {
            path: path.to_path_buf(),
        });
    };

    let (yaml_part, after) = rest.split_at(close_idx);
    // after starts with "---", optionally followed by "\n" then the body.
    let body = after
        .splitn(2, '\n')
        .nth(1)
        .unwrap_or("")
        .to_string();

    let header: Header = serde_yaml::from_str(yaml_part)
        .map_err(|e| MemoryError::InvalidSchema(e.to_string()))?;

    if header.title.trim().is_empty() {
        return Err(MemoryError::InvalidSchema("title must not be empty".into()));
    }

    Ok((header, canonicalise_body(&body)))
}

/// Find the byte offset (within `rest`) of a line that is exactly `---`,
/// i.e. the closing delimiter. Returns `None` if absent.
fn find_closing_delimiter(rest: &str) -> Option<usize> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        if trimmed == DELIMITER {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Canonical whitespace: trim trailing blank lines, ensure a single
/// trailing newline if the body is non-empty.
fn canonicalise_body(body: &str) -> String {
    let trimmed = body.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// Emit a frontmatter document from a header and body. Round-trips with
/// [`parse`] modulo canonical body whitespace. Optional fields absent from
/// `header` are omitted from the YAML block.
pub fn emit(header: &Header, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(header)?;
    let body = canonicalise_body(body);
    if body.is_empty() {
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n"))
    } else {
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{body}"))
    }
}

impl Header {
    /// Build a [`Memory`] from this header plus the remaining fields that
    /// only exist once a file is placed in a scope.
    pub fn into_memory(self, id: String, body: String, scope: Scope) -> Memory {
        Memory {
            id,
            memory_type: self.memory_type,
            title: self.title,
            tags: self.tags,
            severity: self.severity,
            created: self.created,
            updated: self.updated,
            links: self.links,
            source: self.source,
            body,
            scope: Some(scope),
        }
    }
}

impl From<&Memory> for Header {
    fn from(m: &Memory) -> Self {
        Header {
            memory_type: m.memory_type,
            title: m.title.clone(),
            created: m.created,
            updated: m.updated,
            tags: m.tags.clone(),
            severity: m.severity,
            links: m.links.clone(),
            source: m.source.clone(),
        }
    }
}
