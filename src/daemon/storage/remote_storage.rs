use std::time::Duration;

use async_trait::async_trait;
use reqwest::{ClientBuilder, Response};
use tracing::debug;

use crate::{
    error::{SinkError, StoreFailure},
    utils::time::date_to_record_name,
};

use super::{
    entities::SessionRecord,
    session_storage::{SessionFilter, SessionSink},
};

pub const DEFAULT_TABLE: &str = "app_usage";

/// Every request fails once it runs longer than `timeout`.
pub fn client_builder(timeout: Duration) -> ClientBuilder {
    reqwest::Client::builder().timeout(timeout)
}

/// Stores sessions in a Supabase table through its PostgREST interface.
pub struct RemoteSessionStore {
    client: reqwest::Client,
    endpoint: String,
    key: String,
}

impl RemoteSessionStore {
    pub fn new(url: &str, key: &str, table: &str, timeout: Duration) -> Result<Self, StoreFailure> {
        let client = client_builder(timeout).build()?;
        Ok(Self::with_client(client, url, key, table))
    }

    pub fn with_client(client: reqwest::Client, url: &str, key: &str, table: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/rest/v1/{table}", url.trim_end_matches('/')),
            key: key.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn append_inner(&self, record: &SessionRecord) -> Result<(), StoreFailure> {
        let response = self
            .request(self.client.post(&self.endpoint))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn query_inner(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreFailure> {
        let response = self
            .request(self.client.get(&self.endpoint))
            .query(&filter_params(filter))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await?;
        let records = serde_json::from_slice::<Vec<SessionRecord>>(&body)?;
        debug!("Fetched {} sessions", records.len());
        Ok(records)
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreFailure::Status {
        status: status.as_u16(),
        body,
    })
}

/// PostgREST query parameters for a filter.
fn filter_params(filter: &SessionFilter) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    if let Some(name) = &filter.application_name {
        params.push(("application_name", format!("eq.{name}")));
    }
    if let Some(date) = filter.session_date {
        params.push(("session_date", format!("eq.{}", date_to_record_name(date))));
    }
    params
}

#[async_trait]
impl SessionSink for RemoteSessionStore {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        self.append_inner(record).await.map_err(SinkError::Write)
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError> {
        self.query_inner(filter).await.map_err(SinkError::Query)
    }
}
