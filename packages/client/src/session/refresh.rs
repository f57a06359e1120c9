//! Refresh coordinator: guarantees that concurrent authorization failures
//! produce a single `POST /token` call.
//!
//! ## 設計ノート
//!
//! 実行中のリフレッシュは `Shared` future として slot に保持されます。
//! 後から来た呼び出し元はその future を clone して同じ結果を待ちます。
//! リフレッシュ本体は `tokio::spawn` されるため、待機側がキャンセルされても
//! 交換処理は最後まで進み、完了時に slot を空に戻します。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;

use crate::http::{ApiRequest, ApiResponse, HttpBackend};

use super::{TokenPair, TokenStore};

/// Default path of the refresh-token exchange endpoint
pub const REFRESH_PATH: &str = "/token";

/// Whether a refresh is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Completion signal delivered to every waiter of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Succeeded,
    Failed,
}

type InflightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Client session: the shared token store plus the refresh single-flight gate
pub struct AuthSession {
    tokens: Arc<TokenStore>,
    backend: Arc<dyn HttpBackend>,
    refresh_path: String,
    inflight: Arc<Mutex<Option<InflightRefresh>>>,
}

fn lock(slot: &Mutex<Option<InflightRefresh>>) -> MutexGuard<'_, Option<InflightRefresh>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthSession {
    pub fn new(tokens: Arc<TokenStore>, backend: Arc<dyn HttpBackend>) -> Self {
        Self::with_refresh_path(tokens, backend, REFRESH_PATH)
    }

    pub fn with_refresh_path(
        tokens: Arc<TokenStore>,
        backend: Arc<dyn HttpBackend>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            backend,
            refresh_path: refresh_path.into(),
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    pub fn state(&self) -> RefreshState {
        if lock(&self.inflight).is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// `true` when `request` targets the refresh-token endpoint
    pub fn is_refresh_request(&self, request: &ApiRequest) -> bool {
        request.method == Method::POST && request.route() == self.refresh_path
    }

    /// Exchange the refresh token for a new pair, sharing an in-flight exchange
    /// if there is one.
    ///
    /// Every caller that joins the same cycle observes the same outcome. A
    /// failed exchange leaves the stored tokens untouched; deciding on a forced
    /// logout is up to the caller.
    pub async fn refresh_if_needed(&self) -> RefreshOutcome {
        let refresh = {
            let mut slot = lock(&self.inflight);
            match slot.as_ref() {
                Some(refresh) => {
                    tracing::debug!("Joining in-flight token refresh");
                    refresh.clone()
                }
                None => {
                    if !self.tokens.has_refresh_token() {
                        tracing::debug!("No refresh token available, refresh skipped");
                        return RefreshOutcome::Failed;
                    }
                    let refresh = self.start_refresh();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn start_refresh(&self) -> InflightRefresh {
        let tokens = Arc::clone(&self.tokens);
        let backend = Arc::clone(&self.backend);
        let path = self.refresh_path.clone();
        let slot = Arc::clone(&self.inflight);

        tracing::info!("Starting token refresh");
        let task = tokio::spawn(async move {
            let outcome = exchange(&tokens, backend.as_ref(), &path).await;
            // back to idle before any waiter resumes
            lock(&slot).take();
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!("Token refresh task failed: {}", e);
                RefreshOutcome::Failed
            })
        }
        .boxed()
        .shared()
    }
}

async fn exchange(tokens: &TokenStore, backend: &dyn HttpBackend, path: &str) -> RefreshOutcome {
    let Some(refresh_token) = tokens.refresh_token() else {
        return RefreshOutcome::Failed;
    };

    let request =
        ApiRequest::post(path).with_json(serde_json::json!({ "token": refresh_token }));
    let result = backend
        .execute(request)
        .await
        .and_then(ApiResponse::into_result)
        .and_then(|response| response.json::<TokenPair>());

    match result {
        Ok(pair) => {
            tokens.set_tokens(Some(pair));
            tracing::info!("Token refresh succeeded");
            RefreshOutcome::Succeeded
        }
        Err(e) => {
            tracing::warn!("Token refresh failed: {}", e);
            RefreshOutcome::Failed
        }
    }
}
