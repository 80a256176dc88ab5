use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use log::{debug, error};
use reqwest::{header, Client, Method};

use super::{check_identifier, RelayError};
use crate::config::CloudflareConfig;

/// Forwards DNS management calls to the Cloudflare REST API with the bearer token attached.
#[derive(Debug, Clone)]
pub struct CloudflareRelay {
    client: Client,
    api_base: String,
    api_token: String,
}

impl CloudflareRelay {
    pub fn new(config: &CloudflareConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Cloudflare HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub async fn list_zones(&self) -> Result<Bytes, RelayError> {
        self.forward(Method::GET, "/zones".to_string(), None).await
    }

    pub async fn list_records(&self, zone_id: &str) -> Result<Bytes, RelayError> {
        let zone_id = check_identifier(zone_id)?;
        self.forward(Method::GET, format!("/zones/{}/dns_records", zone_id), None)
            .await
    }

    pub async fn create_record(&self, zone_id: &str, body: Bytes) -> Result<Bytes, RelayError> {
        let zone_id = check_identifier(zone_id)?;
        self.forward(
            Method::POST,
            format!("/zones/{}/dns_records", zone_id),
            Some(body),
        )
        .await
    }

    pub async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        body: Bytes,
    ) -> Result<Bytes, RelayError> {
        let zone_id = check_identifier(zone_id)?;
        let record_id = check_identifier(record_id)?;
        self.forward(
            Method::PUT,
            format!("/zones/{}/dns_records/{}", zone_id, record_id),
            Some(body),
        )
        .await
    }

    pub async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<Bytes, RelayError> {
        let zone_id = check_identifier(zone_id)?;
        let record_id = check_identifier(record_id)?;
        self.forward(
            Method::DELETE,
            format!("/zones/{}/dns_records/{}", zone_id, record_id),
            None,
        )
        .await
    }

    /// One upstream call, no retries. Success bodies come back untouched.
    async fn forward(
        &self,
        method: Method,
        path: String,
        body: Option<Bytes>,
    ) -> Result<Bytes, RelayError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("Forwarding {} {}", method, path);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("Cloudflare request {} failed: {}", path, e);
            RelayError::Transport(e)
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read Cloudflare response for {}: {}", path, e);
            RelayError::Transport(e)
        })?;

        if !status.is_success() {
            error!(
                "Cloudflare returned {} for {}: {}",
                status,
                path,
                String::from_utf8_lossy(&body)
            );
            return Err(RelayError::Upstream { status, body });
        }

        Ok(body)
    }
}
