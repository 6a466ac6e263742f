//! HTTP gateway client for the platform's metadata registry.
//!
//! The platform exposes its enumeration and descriptor commands through a
//! SQL-over-HTTP gateway; each call POSTs one statement and decodes the
//! result set as an array of JSON objects keyed by lower-case column name.
//! The role and warehouse from the [`PlatformContext`] ride along with
//! every statement, so privilege level is bound per call.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::PlatformContext;
use crate::error::{Error, Result};
use crate::registry::{DescriptorRow, MetadataRegistry, StageListing, VolumeSummary};

/// Default per-request timeout for gateway calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP-backed [`MetadataRegistry`] implementation.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl HttpRegistry {
    /// Creates a gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a gateway client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Executes one statement and decodes each result row as `T`.
    async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &PlatformContext,
        entity: &str,
        statement: &str,
    ) -> Result<Vec<T>> {
        let url = format!("{}/api/v2/statements", self.base_url);
        let request = StatementRequest {
            statement,
            role: ctx.role(),
            warehouse: ctx.warehouse(),
        };

        let mut req = self.client.post(&url).json(&request);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::upstream(entity, format!("gateway request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                entity,
                format!("gateway error ({status}): {body}"),
            ));
        }

        let decoded: StatementResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(entity, format!("gateway response unreadable: {e}")))?;

        decoded
            .data
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| Error::malformed(entity, format!("unexpected row shape: {e}")))
            })
            .collect()
    }
}

/// Quotes an identifier for interpolation into a statement.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl MetadataRegistry for HttpRegistry {
    async fn list_volumes(&self, ctx: &PlatformContext) -> Result<Vec<VolumeSummary>> {
        self.execute(ctx, "account", "SHOW EXTERNAL VOLUMES").await
    }

    async fn describe_volume(
        &self,
        ctx: &PlatformContext,
        volume: &str,
    ) -> Result<Vec<DescriptorRow>> {
        let statement = format!("DESCRIBE EXTERNAL VOLUME {}", quote_identifier(volume));
        self.execute(ctx, volume, &statement).await
    }

    async fn list_stages(&self, ctx: &PlatformContext) -> Result<Vec<StageListing>> {
        self.execute(ctx, "account", "SHOW STAGES IN ACCOUNT").await
    }
}
