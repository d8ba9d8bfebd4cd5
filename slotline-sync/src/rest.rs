use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotline_protocol::prelude::SyncSnapshot;
use tracing::debug;
use url::Url;

use crate::backend::RemoteBackend;
use crate::error::{Result, SyncError};

/// Table holding the mirrored row.
pub const DEFAULT_TABLE: &str = "mission_bridge";

/// Typed HTTP client for a PostgREST-style table endpoint.
#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: Url,
    key: String,
    table: String,
}

impl RestBackend {
    /// Creates a client bound to the project URL, e.g. `https://project.example.co`.
    pub fn new(base_url: &str, key: &str) -> Result<Self> {
        let mut url = Url::parse(base_url).map_err(|err| SyncError::InvalidUrl {
            url: base_url.to_string(),
            source: err,
        })?;

        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_string();
            path.push('/');
            url.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: url,
            key: key.to_string(),
            table: DEFAULT_TABLE.to_string(),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_url(&self) -> Result<Url> {
        let relative = format!("rest/v1/{}", self.table);
        self.base_url
            .join(&relative)
            .map_err(|err| SyncError::InvalidUrl {
                url: format!("{}{}", self.base_url, relative),
                source: err,
            })
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let invalid = |err: reqwest::header::InvalidHeaderValue| SyncError::Http(err.to_string());
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.key)).map_err(invalid)?,
        );
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    id: &'a str,
    payload: &'a BTreeMap<String, Value>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FetchedRow {
    #[serde(default)]
    payload: BTreeMap<String, Value>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn upsert(&self, row_id: &str, snapshot: &SyncSnapshot) -> Result<()> {
        let row = UpsertRow {
            id: row_id,
            payload: &snapshot.payload,
            updated_at: snapshot.updated_at,
        };

        let response = self
            .http
            .post(self.table_url()?)
            .headers(self.auth_headers()?)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row)
            .send()
            .await
            .map_err(|err| SyncError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::UnexpectedStatus {
                status: response.status(),
            });
        }
        debug!(row = row_id, keys = snapshot.payload.len(), "row upserted");
        Ok(())
    }

    async fn fetch(&self, row_id: &str) -> Result<Option<SyncSnapshot>> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{row_id}"))
            .append_pair("select", "payload,updated_at");

        let response = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|err| SyncError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::UnexpectedStatus {
                status: response.status(),
            });
        }

        let rows: Vec<FetchedRow> = response
            .json()
            .await
            .map_err(|err| SyncError::Decode(err.to_string()))?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| SyncSnapshot::new(row.payload, row.updated_at)))
    }
}
