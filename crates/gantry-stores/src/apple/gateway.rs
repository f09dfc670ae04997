//! App Store Connect API gateway
//!
//! Every remote call in the pipeline goes through [`ApiGateway`], so the
//! asset, build and review components can be exercised against a fake.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::auth::TokenProvider;
use crate::error::{ApiError, PublishError, Result};
use crate::types::{Credentials, DEFAULT_API_BASE_URL};

/// A single JSON:API request
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: Method,

    /// Path relative to the API base URL, starting with `/`
    pub path: String,

    pub query: Vec<(String, String)>,

    pub body: Option<Value>,
}

impl Endpoint {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path, Some(body))
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path, None)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Executes requests against the remote API
///
/// Non-2xx responses fail with [`PublishError::Api`]. No-content responses
/// yield `None`.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn execute(&self, endpoint: Endpoint) -> Result<Option<Value>>;
}

/// Typed helpers on top of [`ApiGateway`]
#[async_trait]
pub trait ApiGatewayExt: ApiGateway {
    /// Execute a request and decode its body
    async fn request<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T> {
        let path = endpoint.path.clone();
        let value = self
            .execute(endpoint)
            .await?
            .ok_or_else(|| PublishError::Other(format!("Empty response from {}", path)))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Execute a request whose body, if any, is ignored
    async fn request_no_content(&self, endpoint: Endpoint) -> Result<()> {
        self.execute(endpoint).await.map(|_| ())
    }
}

#[async_trait]
impl<G: ApiGateway + ?Sized> ApiGatewayExt for G {}

/// JSON:API error document
#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    title: Option<String>,
    detail: Option<String>,
    code: Option<String>,
}

/// Map a non-2xx response body to an [`ApiError`]
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> ApiError {
    let reason = status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string();

    match serde_json::from_str::<ErrorDocument>(body) {
        Ok(doc) if !doc.errors.is_empty() => {
            let title = doc.errors[0]
                .title
                .clone()
                .or_else(|| doc.errors[0].code.clone())
                .unwrap_or(reason);
            let details = doc
                .errors
                .into_iter()
                .filter_map(|e| e.detail.or(e.code))
                .collect();
            ApiError::new(title, status.as_u16(), details)
        }
        _ => {
            let details = if body.trim().is_empty() {
                Vec::new()
            } else {
                vec![body.trim().to_string()]
            };
            ApiError::new(reason, status.as_u16(), details)
        }
    }
}

/// [`ApiGateway`] backed by the App Store Connect REST API
pub struct AppStoreConnectGateway {
    client: Client,
    base_url: String,
    tokens: TokenProvider,
}

impl AppStoreConnectGateway {
    /// Create a gateway for the public App Store Connect API
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE_URL)
    }

    /// Create a gateway for a specific API base URL
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: TokenProvider::new(credentials),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ApiGateway for AppStoreConnectGateway {
    async fn execute(&self, endpoint: Endpoint) -> Result<Option<Value>> {
        let token = self.tokens.token().await?;
        let url = format!("{}{}", self.base_url, endpoint.path);

        debug!(method = %endpoint.method, url = %url, "API request");

        let mut request = self
            .client
            .request(endpoint.method.clone(), &url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");

        if !endpoint.query.is_empty() {
            request = request.query(&endpoint.query);
        }

        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = parse_api_error(status, &text);
            debug!(status = status.as_u16(), error = %error, "API request failed");
            return Err(error.into());
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&text)?))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedGateway;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_builders() {
        let ep = Endpoint::get("/builds")
            .query("filter[app]", "123")
            .query("limit", "5");
        assert_eq!(ep.method, Method::GET);
        assert_eq!(ep.query_value("filter[app]"), Some("123"));
        assert_eq!(ep.query_value("sort"), None);
        assert!(ep.body.is_none());

        let ep = Endpoint::patch("/appScreenshots/1", json!({"data": {}}));
        assert_eq!(ep.method, Method::PATCH);
        assert!(ep.body.is_some());
    }

    #[test]
    fn test_parse_json_api_error() {
        let body = r#"{"errors":[{"status":"409","code":"ENTITY_ERROR","title":"The request entity conflicts","detail":"Item already exists"},{"code":"ENTITY_ERROR.RELATIONSHIP","detail":"appStoreVersion is taken"}]}"#;
        let err = parse_api_error(StatusCode::CONFLICT, body);
        assert_eq!(err.status, 409);
        assert_eq!(err.title, "The request entity conflicts");
        assert_eq!(
            err.details,
            vec!["Item already exists".to_string(), "appStoreVersion is taken".to_string()]
        );
        assert!(err.is_conflict());
    }

    #[test]
    fn test_parse_non_json_error() {
        let err = parse_api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.title, "Bad Gateway");
        assert_eq!(err.status, 502);
        assert_eq!(err.details, vec!["upstream down".to_string()]);

        let err = parse_api_error(StatusCode::UNAUTHORIZED, "");
        assert!(err.details.is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[tokio::test]
    async fn test_typed_request_helpers() {
        let gateway = ScriptedGateway::new(|ep| match ep.method {
            Method::GET => Ok(Some(json!({"name": "gantry"}))),
            _ => Ok(None),
        });

        let named: Named = gateway.request(Endpoint::get("/apps/1")).await.unwrap();
        assert_eq!(named.name, "gantry");

        gateway
            .request_no_content(Endpoint::delete("/appScreenshots/1"))
            .await
            .unwrap();

        let err = gateway
            .request::<Named>(Endpoint::delete("/appScreenshots/2"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Other(_)));
        assert_eq!(gateway.calls().len(), 3);
    }

    #[test]
    fn test_gateway_trims_base_url() {
        let gateway = AppStoreConnectGateway::with_base_url(
            Credentials::new("KEY", "issuer", "key"),
            "https://example.com/v1/",
        )
        .unwrap();
        assert_eq!(gateway.base_url(), "https://example.com/v1");
    }
}
