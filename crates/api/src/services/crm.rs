//! CRM gateway client.
//!
//! Narrow read-only interface to the CRM: contact profiles and their loan
//! opportunities. The identity subsystem never writes to the CRM; invitation
//! issuance happens on the CRM side and only the token lands here.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::CrmConfig;

/// CRM client error.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("CRM integration is disabled")]
    Disabled,

    #[error("Contact not found in CRM")]
    NotFound,

    #[error("CRM request failed: {0}")]
    Http(String),

    #[error("Unexpected CRM response: {0}")]
    Unexpected(String),
}

/// Contact profile as returned by the CRM gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContactProfile {
    pub id: String,
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Loan opportunity attached to a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Opportunity {
    pub id: String,
    pub name: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// HTTP client for the CRM gateway.
#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    enabled: bool,
}

impl CrmClient {
    /// Build a client from configuration.
    pub fn from_config(config: &CrmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build CRM HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            enabled: config.enabled,
        }
    }

    /// Whether CRM calls are configured and enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fetch a contact profile by CRM contact id.
    pub async fn get_contact(&self, contact_id: &str) -> Result<ContactProfile, CrmError> {
        let url = format!("{}/contacts/{}", self.base_url, contact_id);
        let response = self.get(&url).await?;

        response
            .json::<ContactProfile>()
            .await
            .map_err(|e| CrmError::Unexpected(e.to_string()))
    }

    /// List loan opportunities for a contact.
    pub async fn list_opportunities(&self, contact_id: &str) -> Result<Vec<Opportunity>, CrmError> {
        let url = format!("{}/contacts/{}/opportunities", self.base_url, contact_id);
        let response = self.get(&url).await?;

        response
            .json::<Vec<Opportunity>>()
            .await
            .map_err(|e| CrmError::Unexpected(e.to_string()))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, CrmError> {
        if !self.enabled {
            return Err(CrmError::Disabled);
        }

        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| CrmError::Http(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::NOT_FOUND => Err(CrmError::NotFound),
            status => Err(CrmError::Http(format!("CRM returned {}", status))),
        }
    }
}

impl From<CrmError> for crate::error::ApiError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Disabled => {
                crate::error::ApiError::ServiceUnavailable("CRM integration is disabled".into())
            }
            CrmError::NotFound => {
                crate::error::ApiError::NotFound("Contact not found in CRM".into())
            }
            CrmError::Http(msg) => crate::error::ApiError::ServiceUnavailable(msg),
            CrmError::Unexpected(msg) => crate::error::ApiError::Internal(msg),
        }
    }
}
