use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::{DnsRecord, RecordInput, Zone};

/// Human-readable failure shown in the panel's error banner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PanelError(pub String);

impl PanelError {
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Operations the record editor needs from the relay service.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<Zone>, PanelError>;
    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, PanelError>;
    async fn create_record(&self, zone_id: &str, input: &RecordInput)
        -> Result<DnsRecord, PanelError>;
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        input: &RecordInput,
    ) -> Result<DnsRecord, PanelError>;
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), PanelError>;
}

pub struct HttpRelayClient {
    client: Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<T, PanelError> {
        let response = request.send().await.map_err(|e| {
            debug!("Relay request failed: {}", e);
            PanelError(fallback.to_string())
        })?;

        let body = response.bytes().await.map_err(|e| {
            debug!("Failed to read relay response: {}", e);
            PanelError(fallback.to_string())
        })?;

        parse_envelope(&body, fallback)
    }
}

/// Reads `{ success, result }` or `{ success: false, error: { message } }` without trusting
/// the shape: anything unexpected becomes the fallback message.
fn parse_envelope<T: DeserializeOwned>(body: &[u8], fallback: &str) -> Result<T, PanelError> {
    let envelope: Value =
        serde_json::from_slice(body).map_err(|_| PanelError(fallback.to_string()))?;

    if envelope.get("success").and_then(Value::as_bool) == Some(true) {
        let result = envelope.get("result").cloned().unwrap_or(Value::Null);
        return serde_json::from_value(result).map_err(|e| {
            debug!("Unexpected result shape: {}", e);
            PanelError(fallback.to_string())
        });
    }

    let message = envelope
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback);
    Err(PanelError(message.to_string()))
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    async fn list_zones(&self) -> Result<Vec<Zone>, PanelError> {
        let request = self.client.get(self.url("/zones"));
        self.call(request, "Failed to fetch zones").await
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, PanelError> {
        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)));
        self.call(request, "Failed to fetch DNS records").await
    }

    async fn create_record(
        &self,
        zone_id: &str,
        input: &RecordInput,
    ) -> Result<DnsRecord, PanelError> {
        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(input);
        self.call(request, "Failed to add record").await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        input: &RecordInput,
    ) -> Result<DnsRecord, PanelError> {
        let request = self
            .client
            .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)))
            .json(input);
        self.call(request, "Failed to update record").await
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), PanelError> {
        let request = self
            .client
            .delete(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)));
        let _: Value = self.call(request, "Failed to delete record").await?;
        Ok(())
    }
}
