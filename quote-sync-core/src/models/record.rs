use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::ids::IdGenerator;

/// Where the current contents of a record came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Local,
    Server,
    Merged,
    ServerResolved,
    LocalKept,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Local => write!(f, "local"),
            RecordSource::Server => write!(f, "server"),
            RecordSource::Merged => write!(f, "merged"),
            RecordSource::ServerResolved => write!(f, "server_resolved"),
            RecordSource::LocalKept => write!(f, "local_kept"),
        }
    }
}

/// A single quote held by a replica.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub text: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: category.into(),
            source: None,
            last_modified: None,
        }
    }

    /// Creates a locally authored record with a freshly generated id.
    pub fn local(
        ids: &dyn IdGenerator,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self::new(ids.next_id(), text, category)
            .with_source(RecordSource::Local)
            .with_last_modified(Utc::now())
    }

    pub fn with_source(mut self, source: RecordSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    /// Checks the strict record shape: non-blank text and category.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        Ok(())
    }

    /// Same logical record: ids match, or texts match exactly.
    ///
    /// The text fallback covers records stored before ids existed. It can
    /// pair two unrelated records that happen to share text.
    pub fn same_logical(&self, other: &Record) -> bool {
        (!self.id.is_empty() && self.id == other.id) || self.text == other.text
    }

    /// Returns this record with `remote`'s fields laid over it.
    ///
    /// Remote values win; optional fields the remote lacks keep the local
    /// value.
    pub fn overlay(&self, remote: &Record) -> Record {
        Record {
            id: remote.id.clone(),
            text: remote.text.clone(),
            category: remote.category.clone(),
            source: remote.source.or(self.source),
            last_modified: remote.last_modified.or(self.last_modified),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" - {}", self.text, self.category)
    }
}

/// Record-like value as it arrives from persistence or other loose sources.
///
/// Everything is optional here; [`RawRecord::into_record`] decides whether it
/// becomes a real [`Record`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: Option<String>,
    pub text: Option<String>,
    pub category: Option<String>,
    pub source: Option<RecordSource>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RawRecord {
    /// Parses a JSON value without validating it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::MalformedRecord(e.to_string()))
    }

    /// Validates into the strict shape. Records without an id get one from
    /// `ids`; anything with blank text or category is rejected.
    pub fn into_record(self, ids: &dyn IdGenerator) -> Result<Record, ValidationError> {
        let text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::EmptyText)?;
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ValidationError::EmptyCategory)?;
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| ids.next_id());

        Ok(Record {
            id,
            text,
            category,
            source: self.source,
            last_modified: self.last_modified,
        })
    }
}
