//! HTTP client for the feature queue API.
//!
//! Used by the CLI and the [`crate::observer::Observer`]. Each call is one
//! request; nothing is retried here, so a failed mutation leaves the caller
//! to re-poll and see what actually happened.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;
use crate::queue::{OperatorAction, QueueSnapshot};

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The action is not valid for the feature's current status.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// HTTP client for the feature queue API.
#[derive(Debug, Clone)]
pub struct QueueClient {
    base_url: String,
    client: Client,
}

impl QueueClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    async fn error_for(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
            StatusCode::CONFLICT => ClientError::Conflict(body),
            _ => ClientError::Server(format!("{}: {}", status, body)),
        }
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_for(response).await)
        }
    }

    /// Handle response that may return empty body (204 No Content).
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }

    // ============================================================
    // Queue view
    // ============================================================

    pub async fn snapshot(&self, log_limit: Option<usize>) -> Result<QueueSnapshot, ClientError> {
        let path = match log_limit {
            Some(limit) => format!("/snapshot?log_limit={}", limit),
            None => "/snapshot".to_string(),
        };
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        self.handle_response(response).await
    }

    pub async fn compact(&self) -> Result<usize, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/queue/compact")
            .send()
            .await?;
        let body: serde_json::Value = self.handle_response(response).await?;
        Ok(body["rewritten"].as_u64().unwrap_or_default() as usize)
    }

    // ============================================================
    // Feature Operations
    // ============================================================

    pub async fn list_features(
        &self,
        status: Option<FeatureStatus>,
    ) -> Result<Vec<Feature>, ClientError> {
        let path = match status {
            Some(status) => format!("/features?status={}", status.as_str()),
            None => "/features".to_string(),
        };
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        self.handle_response(response).await
    }

    pub async fn get_feature(&self, id: Uuid) -> Result<Feature, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/features/{}", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn create_feature(&self, input: &CreateFeatureInput) -> Result<Feature, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/features")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Submit a document in the `NAME:` / `---` text format.
    pub async fn import_features(
        &self,
        text: &str,
        placement: Placement,
    ) -> Result<Vec<Feature>, ClientError> {
        let placement = match placement {
            Placement::Back => "back",
            Placement::Front => "front",
        };
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/features/bulk?placement={}", placement),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(text.to_string())
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn delete_feature(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/features/{}", id))
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    /// Apply a non-delete operator action.
    pub async fn transition(
        &self,
        id: Uuid,
        action: OperatorAction,
    ) -> Result<Feature, ClientError> {
        if action == OperatorAction::Delete {
            return Err(ClientError::BadRequest(
                "use delete_feature to remove a feature".to_string(),
            ));
        }
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/features/{}/{}", id, action.as_str()),
            )
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn move_to_top(&self, id: Uuid) -> Result<Feature, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/features/{}/top", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn move_up(&self, id: Uuid) -> Result<Feature, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/features/{}/up", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Engine Operations
    // ============================================================

    pub async fn get_config(&self) -> Result<EngineConfig, ClientError> {
        let response = self.request(reqwest::Method::GET, "/config").send().await?;
        self.handle_response(response).await
    }

    pub async fn update_config(
        &self,
        input: &UpdateConfigInput,
    ) -> Result<EngineConfig, ClientError> {
        let response = self
            .request(reqwest::Method::PUT, "/config")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<EngineConfig, ClientError> {
        let path = if paused {
            "/engine/pause"
        } else {
            "/engine/resume"
        };
        let response = self.request(reqwest::Method::POST, path).send().await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Log Operations
    // ============================================================

    pub async fn list_logs(&self, limit: usize) -> Result<Vec<LogEntry>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/logs?limit={}", limit))
            .send()
            .await?;
        self.handle_response(response).await
    }
}
