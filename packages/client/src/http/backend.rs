//! HTTP backend abstraction and its reqwest implementation.

use async_trait::async_trait;
use reqwest::Method;

use crate::error::ApiError;

/// One outbound API call, relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path starting with `/`, optionally followed by a query string
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Bearer token placed in the `Authorization` header
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path without query string or fragment
    pub fn route(&self) -> &str {
        self.path
            .split(['?', '#'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

/// Raw HTTP response: status plus body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 Unauthorized or 403 Forbidden
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// `Ok` for 2xx, [`ApiError::Status`] otherwise
    pub fn into_result(self) -> Result<ApiResponse, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Executes a single HTTP exchange, without any retry or token handling
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// [`HttpBackend`] over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestBackend {
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `http://127.0.0.1:3000/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        tracing::debug!("{} {} -> {}", request.method, url, status);
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_strips_query_string() {
        // テスト項目: route がクエリ文字列を除いたパスを返す
        // given (前提条件):
        let request = ApiRequest::get("/streams?date=2024-05-01#top");

        // when (操作):
        let route = request.route();

        // then (期待する結果):
        assert_eq!(route, "/streams");
    }

    #[test]
    fn test_into_result_maps_non_success_to_status_error() {
        // テスト項目: 2xx 以外のレスポンスは Status エラーに変換される
        // given (前提条件):
        let ok = ApiResponse::new(204, "");
        let forbidden = ApiResponse::new(403, "forbidden");

        // when (操作):
        let ok_result = ok.into_result();
        let forbidden_result = forbidden.into_result();

        // then (期待する結果):
        assert!(ok_result.is_ok());
        assert_eq!(
            forbidden_result,
            Err(ApiError::Status {
                status: 403,
                body: "forbidden".to_string()
            })
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        // テスト項目: ベース URL の末尾スラッシュが取り除かれる
        // given (前提条件):
        let backend = ReqwestBackend::new("http://localhost:3000/api/");

        // when (操作) / then (期待する結果):
        assert_eq!(backend.base_url(), "http://localhost:3000/api");
    }
}
