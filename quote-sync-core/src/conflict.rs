//! Conflict detection between the local and remote replicas.
//!
//! Detection is a pure function of the two replicas. It reports only things
//! that need a decision: a local record whose remote counterpart has
//! different text, and a local record the remote does not know about at all.
//! Remote-only records are new data, never conflicts.

use serde::Serialize;
use std::fmt;

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides hold the record but the text differs.
    ContentMismatch,
    /// Only the local replica holds the record.
    LocalOnly,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ContentMismatch => write!(f, "content_mismatch"),
            ConflictKind::LocalOnly => write!(f, "local_only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub local: Record,
    pub remote: Option<Record>,
    pub detail: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.detail)
    }
}

/// Finds the first record in `candidates` that is the same logical record as
/// `record`.
pub fn find_match<'a>(record: &Record, candidates: &'a [Record]) -> Option<&'a Record> {
    candidates.iter().find(|c| record.same_logical(c))
}

/// Compares the replicas. Output follows the order of `local`.
pub fn detect(local: &[Record], remote: &[Record]) -> Vec<Conflict> {
    local
        .iter()
        .filter_map(|local_record| match find_match(local_record, remote) {
            Some(remote_record) if remote_record.text != local_record.text => Some(Conflict {
                kind: ConflictKind::ContentMismatch,
                local: local_record.clone(),
                remote: Some(remote_record.clone()),
                detail: format!(
                    "Local \"{}\" differs from remote \"{}\"",
                    local_record.text, remote_record.text
                ),
            }),
            Some(_) => None,
            None => Some(Conflict {
                kind: ConflictKind::LocalOnly,
                local: local_record.clone(),
                remote: None,
                detail: format!("\"{}\" exists only locally", local_record.text),
            }),
        })
        .collect()
}
