use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// API error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Deserialization(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// API client for making HTTP requests
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request and deserialize the response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send_get(path).await?;
        Self::handle_response(response).await
    }

    /// GET that maps the server's own 404 to `None`. A 404 without the
    /// `{"error": ...}` body (wrong base path, proxy) stays an error.
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let response = self.send_get(path).await?;
        let status = response.status();
        if status != StatusCode::NOT_FOUND {
            return Self::handle_response(response).await.map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        if server_error_field(&body).is_some() {
            return Ok(None);
        }
        Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(&body, status),
        })
    }

    /// Make a PUT request without a body
    pub async fn put<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.put(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    async fn send_get(&self, path: &str) -> Result<Response, ApiError> {
        Ok(self.http.get(self.url(path)).send().await?)
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// The `error` string of a `{"error": "..."}` body.
fn server_error_field(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
}

/// The server wraps failures as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str, status: StatusCode) -> String {
    server_error_field(body)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string())
}
