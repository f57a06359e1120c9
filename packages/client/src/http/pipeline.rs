//! Authenticated request pipeline.
//!
//! Every call of the service layer goes through [`RequestPipeline::execute`]:
//! attach the bearer token, dispatch, and on 401/403 wait for the shared
//! refresh and re-issue the request exactly once.

use std::sync::Arc;

use reqwest::Method;

use crate::error::ApiError;
use crate::session::{AuthSession, RefreshOutcome};

use super::backend::{ApiRequest, ApiResponse, HttpBackend};

/// Endpoints that never carry an `Authorization` header
#[derive(Debug, Clone)]
pub struct PublicRoutes {
    routes: Vec<(Method, String)>,
}

impl PublicRoutes {
    pub fn new(routes: Vec<(Method, String)>) -> Self {
        Self { routes }
    }

    /// `POST /login`, `POST /registration` and `POST /recovery`
    pub fn defaults() -> Self {
        Self::new(vec![
            (Method::POST, "/login".to_string()),
            (Method::POST, "/registration".to_string()),
            (Method::POST, "/recovery".to_string()),
        ])
    }

    pub fn with_route(mut self, method: Method, path: impl Into<String>) -> Self {
        self.routes.push((method, path.into()));
        self
    }

    pub fn matches(&self, request: &ApiRequest) -> bool {
        let route = request.route();
        self.routes
            .iter()
            .any(|(method, path)| *method == request.method && path == route)
    }
}

impl Default for PublicRoutes {
    fn default() -> Self {
        Self::defaults()
    }
}

pub struct RequestPipeline {
    session: Arc<AuthSession>,
    backend: Arc<dyn HttpBackend>,
    public_routes: PublicRoutes,
}

impl RequestPipeline {
    pub fn new(session: Arc<AuthSession>, backend: Arc<dyn HttpBackend>) -> Self {
        Self::with_public_routes(session, backend, PublicRoutes::defaults())
    }

    pub fn with_public_routes(
        session: Arc<AuthSession>,
        backend: Arc<dyn HttpBackend>,
        public_routes: PublicRoutes,
    ) -> Self {
        Self {
            session,
            backend,
            public_routes,
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Run `request` through the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(ApiResponse)` - a 2xx response, from the first attempt or the retry
    /// * `Err(ApiError::Status)` - a non-2xx response; for authorization
    ///   failures whose refresh failed this is the original response
    /// * `Err(ApiError::Transport)` - the request could not be sent
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let is_refresh = self.session.is_refresh_request(&request);
        let attach = !is_refresh && !self.public_routes.matches(&request);

        let (response, sent_token) = self.dispatch(request.clone(), attach).await?;
        if !response.is_authorization_failure() {
            return response.into_result();
        }

        if is_refresh {
            tracing::debug!("Refresh endpoint rejected the refresh token");
            return response.into_result();
        }
        if !self.session.tokens().has_refresh_token() {
            return response.into_result();
        }

        tracing::debug!(
            "{} {} answered {}, refreshing session",
            request.method,
            request.route(),
            response.status
        );

        // Another request may have rotated the token since this one was sent.
        let rotated = sent_token.is_some() && self.session.tokens().access_token() != sent_token;
        let outcome = if rotated {
            RefreshOutcome::Succeeded
        } else {
            self.session.refresh_if_needed().await
        };

        match outcome {
            RefreshOutcome::Succeeded => {
                let (retried, _) = self.dispatch(request, attach).await?;
                retried.into_result()
            }
            RefreshOutcome::Failed => response.into_result(),
        }
    }

    async fn dispatch(
        &self,
        mut request: ApiRequest,
        attach: bool,
    ) -> Result<(ApiResponse, Option<String>), ApiError> {
        request.bearer = if attach {
            self.session.tokens().access_token()
        } else {
            None
        };
        let sent_token = request.bearer.clone();
        let response = self.backend.execute(request).await?;
        Ok((response, sent_token))
    }
}
