//! HTTP helpers for API tests
//!
//! [`ApiClient::request`] sends one JSON request and hands back the
//! status plus whatever body the server produced, so tests assert on
//! status codes and contracts instead of transport errors.

pub mod endpoints;
pub mod schemas;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use storefront_common::config::join_url;
use storefront_common::{ConfigError, TestConfig, UserResponse};

use crate::error::{E2eError, E2eResult};

pub use schemas::{Car, CarsResponse, Contract, CurrencyConvertResponse, ErrorResponse, TimeResponse};

/// Authorization scheme placed in front of the token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    #[default]
    Bearer,
    Token,
    Basic,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Bearer => f.write_str("Bearer"),
            AuthType::Token => f.write_str("Token"),
            AuthType::Basic => f.write_str("Basic"),
        }
    }
}

/// One API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path, or a full URL when `base_url` is unset
    pub url: String,
    pub base_url: Option<String>,
    pub body: Option<Value>,
    pub token: Option<String>,
    pub auth_type: AuthType,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            base_url: None,
            body: None,
            token: None,
            auth_type: AuthType::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub fn full_url(&self) -> String {
        match &self.base_url {
            Some(base) => join_url(base, &self.url),
            None => self.url.clone(),
        }
    }
}

/// Response body, decoded by content type
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Decode the JSON body as `T` and check its contract
    pub fn parse<T: Contract>(&self) -> E2eResult<T> {
        let value = self.json().ok_or_else(|| E2eError::Schema {
            contract: T::NAME,
            reason: format!("expected a JSON body, got {:?}", self.body),
        })?;

        let parsed: T = serde_json::from_value(value.clone()).map_err(|e| E2eError::Schema {
            contract: T::NAME,
            reason: e.to_string(),
        })?;

        parsed.validate().map_err(|reason| E2eError::Schema {
            contract: T::NAME,
            reason,
        })?;
        Ok(parsed)
    }

    /// Fail unless the status is `expected`
    pub fn expect_status(&self, expected: u16) -> E2eResult<&Self> {
        if self.status != expected {
            return Err(E2eError::AssertionFailed(format!(
                "expected HTTP {expected}, got {} (body: {:?})",
                self.status, self.body
            )));
        }
        Ok(self)
    }
}

/// JSON HTTP client shared by the API tests of a run
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn request(&self, request: ApiRequest) -> E2eResult<ApiResponse> {
        let url = request.full_url();
        debug!(method = %request.method, url = %url, "API request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &request.token {
            builder = builder.header(AUTHORIZATION, format!("{} {}", request.auth_type, token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = if content_type.contains("application/json") {
            match response.json::<Value>().await {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    warn!("Failed to parse response body for status {}: {}", status, e);
                    ResponseBody::Empty
                }
            }
        } else if content_type.contains("text/") {
            match response.text().await {
                Ok(text) => ResponseBody::Text(text),
                Err(e) => {
                    warn!("Failed to read response body for status {}: {}", status, e);
                    ResponseBody::Empty
                }
            }
        } else {
            ResponseBody::Empty
        };

        debug!(status, url = %url, "API response");
        Ok(ApiResponse { status, body })
    }
}

/// Log in through the API and return the access token.
///
/// The token is returned to the caller, never exported to the process
/// environment.
pub async fn access_token(client: &ApiClient, config: &TestConfig) -> E2eResult<String> {
    let credentials = config
        .credentials
        .as_ref()
        .ok_or(ConfigError::Missing("APP_EMAIL/APP_PASSWORD"))?;
    let api_url = config.site.api_url()?;

    let response = client
        .request(
            ApiRequest::post(
                endpoints::LOGIN,
                json!({ "email": credentials.email, "password": credentials.password }),
            )
            .with_base_url(api_url),
        )
        .await?;

    response.expect_status(200)?;
    let user: UserResponse = response.parse()?;
    Ok(user.token)
}
