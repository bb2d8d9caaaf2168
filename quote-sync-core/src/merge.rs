//! Replica reconciliation.
//!
//! [`merge`] folds a remote replica into the local one when detection found
//! nothing to decide. [`auto_resolve`] applies the fixed automatic policy when
//! it did: remote text wins a content mismatch, and local-only records are
//! kept (and later uploaded).

use std::fmt;
use std::str::FromStr;

use crate::conflict::{Conflict, ConflictKind};
use crate::models::{Record, RecordSource};

/// Per-conflict choice for manual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    UseRemote,
    Remove,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::KeepLocal => write!(f, "keep-local"),
            Resolution::UseRemote => write!(f, "use-remote"),
            Resolution::Remove => write!(f, "remove"),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "keep-local" | "local" => Ok(Resolution::KeepLocal),
            "use-remote" | "remote" => Ok(Resolution::UseRemote),
            "remove" | "delete" => Ok(Resolution::Remove),
            other => Err(format!(
                "Unknown resolution '{}'. Valid: keep-local, use-remote, remove",
                other
            )),
        }
    }
}

/// Index of the unclaimed entry in `entries` that `remote` pairs with, which
/// is then marked claimed. An id match wins over a text match, and each entry
/// pairs with at most one remote record, so remote duplicates of one text
/// stay distinct.
fn claim(entries: &[Record], claimed: &mut [bool], remote: &Record) -> Option<usize> {
    let unclaimed = |i: &usize| !claimed[*i];
    let found = (0..entries.len())
        .filter(unclaimed)
        .find(|&i| !remote.id.is_empty() && entries[i].id == remote.id)
        .or_else(|| {
            (0..entries.len())
                .filter(unclaimed)
                .find(|&i| entries[i].text == remote.text)
        })?;
    claimed[found] = true;
    Some(found)
}

/// Merges `remote` into a copy of `local`.
///
/// Remote records without a local counterpart are appended tagged `server`.
/// Matched entries take the remote fields and are tagged `merged`, except
/// entries that already mirror the remote record as `server`, which keep that
/// tag. Only the original local entries are searched for matches, so running
/// the merge again with the same remote changes nothing.
pub fn merge(local: &[Record], remote: &[Record]) -> Vec<Record> {
    let mut merged = local.to_vec();
    let mut claimed = vec![false; local.len()];

    for remote_record in remote {
        match claim(local, &mut claimed, remote_record) {
            Some(i) => {
                let existing = &merged[i];
                let mirrored = existing.source == Some(RecordSource::Server)
                    && existing.id == remote_record.id
                    && existing.text == remote_record.text
                    && existing.category == remote_record.category;
                let tag = if mirrored {
                    RecordSource::Server
                } else {
                    RecordSource::Merged
                };
                merged[i] = existing.overlay(remote_record).with_source(tag);
            }
            None => merged.push(remote_record.clone().with_source(RecordSource::Server)),
        }
    }

    merged
}

/// Outcome of the automatic policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoResolution {
    /// The reconciled replica.
    pub records: Vec<Record>,
    /// Local-only records that were kept and still need uploading.
    pub kept_local: Vec<Record>,
    /// Number of content mismatches settled in favour of the remote.
    pub remote_wins: usize,
}

/// Applies the automatic policy to the conflicts `detect` reported for
/// `local` and `remote`, then appends remote-only records tagged `server`.
pub fn auto_resolve(local: &[Record], remote: &[Record], conflicts: &[Conflict]) -> AutoResolution {
    let mut records = local.to_vec();
    let mut kept_local = Vec::new();
    let mut remote_wins = 0;

    for conflict in conflicts {
        let Some(i) = records.iter().position(|r| r.id == conflict.local.id) else {
            continue;
        };

        match (conflict.kind, conflict.remote.as_ref()) {
            (ConflictKind::ContentMismatch, Some(remote_record)) => {
                records[i] = records[i]
                    .overlay(remote_record)
                    .with_source(RecordSource::ServerResolved);
                remote_wins += 1;
            }
            (ConflictKind::LocalOnly, _) => {
                records[i].source = Some(RecordSource::LocalKept);
                kept_local.push(records[i].clone());
            }
            (ConflictKind::ContentMismatch, None) => {}
        }
    }

    let resolved_len = records.len();
    let mut claimed = vec![false; resolved_len];
    for remote_record in remote {
        if claim(&records[..resolved_len], &mut claimed, remote_record).is_none() {
            records.push(remote_record.clone().with_source(RecordSource::Server));
        }
    }

    AutoResolution {
        records,
        kept_local,
        remote_wins,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::detect;

    fn rec(id: &str, text: &str, category: &str) -> Record {
        Record::new(id, text, category)
    }

    #[test]
    fn test_merge_into_empty_local() {
        let remote = vec![rec("s1", "X", "C")];
        let merged = merge(&[], &remote);
        assert_eq!(
            merged,
            vec![rec("s1", "X", "C").with_source(RecordSource::Server)]
        );
    }

    #[test]
    fn test_merge_overlays_matches() {
        let local = vec![rec("local_1", "Keep going", "Life").with_source(RecordSource::Local)];
        let remote = vec![rec("42", "Keep going", "Server")];

        let merged = merge(&local, &remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "42");
        assert_eq!(merged[0].category, "Server");
        assert_eq!(merged[0].source, Some(RecordSource::Merged));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = vec![
            rec("a", "Alpha", "L").with_source(RecordSource::Local),
            rec("b", "Beta", "L").with_source(RecordSource::Local),
        ];
        let remote = vec![
            rec("a", "Alpha", "Server"),
            rec("c", "Gamma", "Server"),
            rec("d", "Delta", "Server"),
        ];

        let once = merge(&local, &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn test_merge_keeps_remote_duplicates_distinct() {
        let remote = vec![rec("1", "Same", "S"), rec("2", "Same", "S")];

        let once = merge(&[], &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);

        let ids: Vec<&str> = twice.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(twice.iter().all(|r| r.source == Some(RecordSource::Server)));
    }

    #[test]
    fn test_merge_prefers_id_over_text() {
        let local = vec![
            rec("1", "Same", "S").with_source(RecordSource::Server),
            rec("2", "Same", "S").with_source(RecordSource::Server),
        ];
        let remote = vec![rec("2", "Same", "S")];

        let merged = merge(&local, &remote);
        assert_eq!(merged, local);
    }

    #[test]
    fn test_auto_resolve_appends_remote_duplicates() {
        let local = vec![rec("local_1", "Mine", "L")];
        let remote = vec![rec("1", "Same", "S"), rec("2", "Same", "S")];
        let conflicts = detect(&local, &remote);

        let resolved = auto_resolve(&local, &remote, &conflicts);
        let ids: Vec<&str> = resolved.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["local_1", "1", "2"]);
    }

    #[test]
    fn test_merge_keeps_local_order_and_appends() {
        let local = vec![rec("a", "A", "L"), rec("b", "B", "L")];
        let remote = vec![rec("z", "Z", "S"), rec("b", "B", "S")];

        let ids: Vec<String> = merge(&local, &remote).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "z"]);
    }

    #[test]
    fn test_auto_resolve_remote_wins_mismatch() {
        let local = vec![rec("a", "Hello", "Greeting")];
        let remote = vec![rec("a", "Hello World", "Greeting")];
        let conflicts = detect(&local, &remote);

        let resolved = auto_resolve(&local, &remote, &conflicts);
        assert_eq!(resolved.remote_wins, 1);
        assert_eq!(resolved.records.len(), 1);
        assert_eq!(resolved.records[0].text, "Hello World");
        assert_eq!(resolved.records[0].source, Some(RecordSource::ServerResolved));

        // Resolved pairs are no longer conflicts
        assert!(detect(&resolved.records, &remote).is_empty());
    }

    #[test]
    fn test_auto_resolve_keeps_local_only_and_appends_remote_only() {
        let local = vec![rec("local_1", "Mine", "L")];
        let remote = vec![rec("9", "Theirs", "S")];
        let conflicts = detect(&local, &remote);

        let resolved = auto_resolve(&local, &remote, &conflicts);
        assert_eq!(resolved.records.len(), 2);
        assert_eq!(resolved.records[0].source, Some(RecordSource::LocalKept));
        assert_eq!(resolved.records[1].source, Some(RecordSource::Server));
        assert_eq!(resolved.kept_local.len(), 1);
        assert_eq!(resolved.kept_local[0].id, "local_1");
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("keep-local".parse::<Resolution>(), Ok(Resolution::KeepLocal));
        assert_eq!("USE_REMOTE".parse::<Resolution>(), Ok(Resolution::UseRemote));
        assert_eq!("remove".parse::<Resolution>(), Ok(Resolution::Remove));
        assert!("maybe".parse::<Resolution>().is_err());
    }
}
