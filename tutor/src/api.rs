//! Thin JSON-over-HTTP client for the Lisan backend.
//!
//! Every call carries the bearer session token when one is set. Status codes
//! are mapped once, in [`check_status`], so the ask gateway, the subscription
//! client and the CLI all classify failures identically.

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::gateway::GatewayError;

pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), token })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.request(Method::GET, path, None).await?;
        decode(value)
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_value(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
        let value = self.request(Method::POST, path, Some(&body)).await?;
        decode(value)
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.request(Method::DELETE, path, None).await?;
        decode(value)
    }

    /// Issue a request and return the JSON body. An empty success body is
    /// returned as `Value::Null`.
    ///
    /// # Errors
    ///
    /// `Network` for transport failures, `Parse` for an undecodable success
    /// body, and the [`check_status`] mapping for non-2xx responses.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, GatewayError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        check_status(status, &text)?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

/// Map an HTTP status to the gateway error taxonomy.
///
/// # Errors
///
/// 401 is `Unauthorized`, 403 is `QuotaExceeded`, any other non-2xx is
/// `Status` carrying the response body.
pub fn check_status(status: u16, body: &str) -> Result<(), GatewayError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(GatewayError::Unauthorized),
        403 => Err(GatewayError::QuotaExceeded),
        _ => Err(GatewayError::Status { status, body: body.to_owned() }),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
