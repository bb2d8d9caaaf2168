//! HTTP adapter for a JSON collection endpoint.
//!
//! `GET <base>/<collection>` returns `{id, title, body}` items and
//! `POST <base>/<collection>` accepts `{title, body, userId}`, answering with
//! the stored item including its server-assigned id. The category travels in
//! `body`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::RemoteGateway;
use crate::error::NetworkError;
use crate::models::{Record, RecordSource};

/// Category given to remote items whose `body` is missing or blank.
pub const REMOTE_CATEGORY: &str = "Server";

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RemoteItem {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRemoteItem<'a> {
    title: &'a str,
    body: &'a str,
    user_id: &'a str,
}

/// Gateway speaking the collection wire contract over reqwest.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    collection: String,
    owner_ref: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        owner_ref: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            collection: collection.into(),
            owner_ref: owner_ref.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Returns the server URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the collection URL, adding a scheme to bare hosts.
    fn collection_url(&self) -> String {
        let base_url = if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.collection.trim_matches('/')
        )
    }

    fn to_record(item: RemoteItem) -> Option<Record> {
        let id = match item.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => return None,
            other => other.to_string(),
        };
        let text = item.title.filter(|t| !t.trim().is_empty())?;
        let category = item
            .body
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| REMOTE_CATEGORY.to_string());

        Some(Record::new(id, text, category).with_source(RecordSource::Server))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_all(&self) -> Result<Vec<Record>, NetworkError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if !response.status().is_success() {
            return Err(NetworkError::Status(response.status().as_u16()));
        }

        let items: Vec<RemoteItem> = response.json().await?;
        let total = items.len();
        let records: Vec<Record> = items.into_iter().filter_map(Self::to_record).collect();

        if records.len() < total {
            tracing::warn!(
                "Dropped {} malformed remote item(s)",
                total - records.len()
            );
        }

        Ok(records)
    }

    async fn post_one(&self, record: &Record) -> Result<Record, NetworkError> {
        let body = NewRemoteItem {
            title: &record.text,
            body: &record.category,
            user_id: &self.owner_ref,
        };

        let response = self
            .client
            .post(self.collection_url())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NetworkError::Status(response.status().as_u16()));
        }

        let item: RemoteItem = response.json().await?;
        let id = match item.id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => {
                return Err(NetworkError::Decode("response has no id".to_string()))
            }
            other => other.to_string(),
        };

        Ok(Record {
            id,
            text: record.text.clone(),
            category: record.category.clone(),
            source: Some(RecordSource::Server),
            last_modified: Some(Utc::now()),
        })
    }
}

/// Returns true when the server answers at all within a short deadline.
pub async fn check_server(url: &str) -> bool {
    let client = reqwest::Client::new();
    match client.get(url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) => !response.status().is_server_error(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_url() {
        let gateway = HttpGateway::new("http://localhost:8080", "posts", "1");
        assert_eq!(gateway.collection_url(), "http://localhost:8080/posts");

        let gateway = HttpGateway::new("https://example.com/", "/posts/", "1");
        assert_eq!(gateway.collection_url(), "https://example.com/posts");

        let gateway = HttpGateway::new("localhost:8080", "posts", "1");
        assert_eq!(gateway.collection_url(), "http://localhost:8080/posts");
    }

    #[test]
    fn test_to_record_maps_numeric_id_title_and_body() {
        let item: RemoteItem =
            serde_json::from_value(json!({"id": 7, "title": "X", "body": "Life"})).unwrap();
        let record = HttpGateway::to_record(item).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.text, "X");
        assert_eq!(record.category, "Life");
        assert_eq!(record.source, Some(RecordSource::Server));
    }

    #[test]
    fn test_to_record_without_body_uses_remote_category() {
        let item: RemoteItem = serde_json::from_value(json!({"id": 1, "title": "X"})).unwrap();
        assert_eq!(HttpGateway::to_record(item).unwrap().category, REMOTE_CATEGORY);

        let item: RemoteItem =
            serde_json::from_value(json!({"id": 2, "title": "Y", "body": "  "})).unwrap();
        assert_eq!(HttpGateway::to_record(item).unwrap().category, REMOTE_CATEGORY);
    }

    #[test]
    fn test_to_record_rejects_blank_title() {
        let item: RemoteItem = serde_json::from_value(json!({"id": "a", "title": " "})).unwrap();
        assert!(HttpGateway::to_record(item).is_none());

        let item: RemoteItem = serde_json::from_value(json!({"id": null, "title": "T"})).unwrap();
        assert!(HttpGateway::to_record(item).is_none());
    }

    #[test]
    fn test_new_item_wire_shape() {
        let body = NewRemoteItem {
            title: "T",
            body: "C",
            user_id: "42",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"title": "T", "body": "C", "userId": "42"}));
    }

    #[tokio::test]
    async fn test_check_server_unreachable() {
        assert!(!check_server("http://127.0.0.1:1").await);
    }
}
