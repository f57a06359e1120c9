//! Typed service layer over the request pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::ApiError;
use crate::session::TokenPair;

use super::backend::ApiRequest;
use super::pipeline::RequestPipeline;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub nickname: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
    #[serde(default)]
    pub status: Option<String>,
}

impl StreamInfo {
    pub fn is_owned_by(&self, profile: &Profile) -> bool {
        self.user_id == profile.id
    }
}

pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
}

impl ApiClient {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// `POST /login`; stores the issued token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let tokens: TokenPair = self.post_json("/login", &body).await?;
        self.pipeline.session().tokens().set_tokens(Some(tokens));
        tracing::info!("Logged in as '{}'", email);
        Ok(())
    }

    /// `POST /registration`
    pub async fn register(&self, request: &RegistrationRequest) -> Result<(), ApiError> {
        self.send_json(ApiRequest::post("/registration"), request)
            .await
            .map(|_| ())
    }

    /// `POST /recovery`: ask the server to send a password recovery mail
    pub async fn recover(&self, email: &str) -> Result<(), ApiError> {
        self.send_json(
            ApiRequest::post("/recovery"),
            &serde_json::json!({ "email": email }),
        )
        .await
        .map(|_| ())
    }

    /// Local logout: clears the session for every subscriber
    pub fn logout(&self) {
        self.pipeline.session().tokens().set_tokens(None);
    }

    /// `GET /profiles/current`
    pub async fn current_profile(&self) -> Result<Profile, ApiError> {
        self.get_json("/profiles/current").await
    }

    /// `GET /streams/{id}`
    pub async fn get_stream(&self, id: i64) -> Result<StreamInfo, ApiError> {
        self.get_json(&format!("/streams/{}", id)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.pipeline.execute(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(ApiRequest::post(path), body).await?.json()
    }

    async fn send_json<B: Serialize>(
        &self,
        request: ApiRequest,
        body: &B,
    ) -> Result<super::ApiResponse, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.pipeline.execute(request.with_json(body)).await
    }
}
