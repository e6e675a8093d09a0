//! REST binding of the record collection.
//!
//! Speaks the `/api/members` endpoints exposed by another roster service instance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::RecordStore;
use crate::errors::{AppError, ErrorDetails};
use crate::models::{Member, NewMember};

/// Response envelope as produced by the collection endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorDetails>,
}

/// Collection client over HTTP.
///
/// Every request is bounded by `timeout`, so a hung peer fails as a store error.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, AppError> {
        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            AppError::Store(format!(
                "Unreadable collection response ({}): {}",
                status, e
            ))
        })?;

        if envelope.success {
            return Ok(envelope.data);
        }

        let message = envelope
            .error
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_else(|| format!("Collection request failed with status {}", status));
        Err(AppError::Store(message))
    }
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn list(&self) -> Result<Vec<Member>, AppError> {
        let members = self
            .send::<Vec<Member>>(self.client.get(self.url("/members")))
            .await?;
        Ok(members.unwrap_or_default())
    }

    async fn insert(&self, member: &NewMember) -> Result<Member, AppError> {
        self.send::<Member>(self.client.post(self.url("/members")).json(member))
            .await?
            .ok_or_else(|| AppError::Store("Collection returned no created record".to_string()))
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.send::<serde_json::Value>(self.client.delete(self.url(&format!("/members/{}", id))))
            .await?;
        Ok(())
    }
}
