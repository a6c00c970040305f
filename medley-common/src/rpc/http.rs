//! HTTP implementation of the RPC transport boundary
//!
//! Posts each action (or batch of actions) as JSON to the configured service
//! endpoint. Timeouts come from [`ConsoleConfig`]; the remote envelope is
//! `{ "result": ... }` on success and `{ "error": { code, message } }` on
//! failure, with batched responses carrying one envelope per submitted action.

use super::{Action, ActionResult, RemoteClient, RemoteError};
use crate::{ConsoleConfig, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Response envelope for a single action
#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RemoteError>,
}

/// HTTP transport against the media service RPC endpoint
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Build an HTTP client with the configured timeouts
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Issuing RPC request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {} from {}", status, url)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn request(&self, action: Action) -> Result<Value> {
        let path = format!("service/{}/action/{}", action.service, action.name);
        let raw = self.post(&path, action.params).await?;

        let envelope: ResponseEnvelope =
            serde_json::from_value(raw).map_err(|e| Error::Decode(e.to_string()))?;
        if let Some(error) = envelope.error {
            return Err(error.into());
        }
        Ok(envelope.result)
    }

    async fn multi_request(&self, actions: Vec<Action>) -> Result<Vec<ActionResult>> {
        let expected = actions.len();
        let body = json!({
            "operations": actions
                .into_iter()
                .map(|a| json!({
                    "service": a.service,
                    "action": a.name,
                    "params": a.params,
                }))
                .collect::<Vec<_>>(),
        });

        let raw = self.post("service/multirequest", body).await?;
        let envelopes: Vec<ResponseEnvelope> =
            serde_json::from_value(raw).map_err(|e| Error::Decode(e.to_string()))?;

        if envelopes.len() != expected {
            return Err(Error::Decode(format!(
                "Multi-request returned {} results for {} operations",
                envelopes.len(),
                expected
            )));
        }

        Ok(envelopes
            .into_iter()
            .map(|e| ActionResult {
                data: e.result,
                error: e.error,
            })
            .collect())
    }
}
