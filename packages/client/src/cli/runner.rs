//! Client execution logic with reconnection support.

use std::sync::Arc;

use crate::chat::{Connection, RoomOptions, RoomSession, WsConnector};
use crate::config::ClientConfig;
use crate::error::{ApiError, ClientError};
use crate::http::{ApiClient, HttpBackend, Profile, ReqwestBackend, RequestPipeline, StreamInfo};
use crate::session::{AuthSession, TokenStore};

use super::reconnect::should_exit_immediately;
use super::session::{run_room_session, spawn_input_thread};

/// Login used when no stored session exists (or to replace it)
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Services of one running client, all sharing a single token store
pub struct ClientContext {
    pub tokens: Arc<TokenStore>,
    pub api: ApiClient,
}

impl ClientContext {
    /// Wire the token store, refresh gate, pipeline and API service
    pub fn new(tokens: Arc<TokenStore>, backend: Arc<dyn HttpBackend>) -> Self {
        let session = Arc::new(AuthSession::new(Arc::clone(&tokens), Arc::clone(&backend)));
        let pipeline = Arc::new(RequestPipeline::new(session, backend));
        Self {
            tokens,
            api: ApiClient::new(pipeline),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let tokens = Arc::new(config.token_store());
        let backend: Arc<dyn HttpBackend> = Arc::new(ReqwestBackend::new(&config.api_base_url));
        Self::new(tokens, backend)
    }

    /// Log in (when credentials are given) and resolve the current profile.
    ///
    /// An authorization failure after the pipeline gave up on refreshing
    /// clears the stored session.
    pub async fn authenticate(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Profile, ClientError> {
        if let Some(credentials) = credentials {
            self.api
                .login(&credentials.email, &credentials.password)
                .await
                .map_err(|e| self.session_error(e))?;
        } else if self.tokens.tokens().is_none() {
            return Err(ClientError::NotAuthenticated(
                "no stored session, pass --email and --password".to_string(),
            ));
        }

        self.api
            .current_profile()
            .await
            .map_err(|e| self.session_error(e))
    }

    pub async fn stream(&self, stream_id: i64) -> Result<StreamInfo, ClientError> {
        self.api
            .get_stream(stream_id)
            .await
            .map_err(|e| self.session_error(e))
    }

    /// Map an API error, forcing a logout on authorization failures
    fn session_error(&self, error: ApiError) -> ClientError {
        if error.is_authorization() {
            tracing::warn!("Session rejected ({}), logging out", error);
            self.api.logout();
            return ClientError::NotAuthenticated(error.to_string());
        }
        ClientError::Api(error)
    }
}

/// Run the terminal client for stream `stream_id` with reconnection logic
pub async fn run_client(
    config: ClientConfig,
    stream_id: i64,
    credentials: Option<Credentials>,
) -> Result<(), ClientError> {
    let context = ClientContext::from_config(&config);
    let profile = context.authenticate(credentials.as_ref()).await?;
    let stream = context.stream(stream_id).await?;
    let is_owner = stream.is_owned_by(&profile);

    tracing::info!(
        "Stream {} '{}' ({}), owner: {}",
        stream.id,
        stream.title,
        stream.status.as_deref().unwrap_or("unknown"),
        is_owner
    );
    println!(
        "\nYou are '{}'. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
        profile.nickname
    );

    let options = RoomOptions::new(stream_id.to_string(), profile.nickname.clone())
        .owner(is_owner)
        .with_path(config.ws_path.clone());
    let connection = Connection::new(Arc::new(WsConnector), config.secure, config.ws_host.clone());
    let mut room = RoomSession::new(connection, options).with_tokens(Arc::clone(&context.tokens));

    tracing::info!("Chat endpoint: {}", config.chat_url());

    let mut input = spawn_input_thread(&profile.nickname);
    let mut session_changes = context.tokens.subscribe();
    let policy = config.reconnect;
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Joining room {} as '{}' (reconnects used: {}/{})",
            stream_id,
            profile.nickname,
            reconnect_count,
            policy.max_attempts
        );

        let result = run_room_session(
            &mut room,
            &mut input,
            &context.tokens,
            &mut session_changes,
            || reconnect_count = 0,
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                break;
            }
            Err(e) => {
                if should_exit_immediately(&e) {
                    tracing::error!("{}", e);
                    return Err(e);
                }

                tracing::warn!("Connection lost: {}", e);
                if !policy.should_attempt_reconnect(&e, reconnect_count) {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        reconnect_count
                    );
                    return Err(e);
                }

                let delay = policy.delay_for(reconnect_count);
                reconnect_count += 1;
                tracing::info!(
                    "Reconnecting in {:?}... (attempt {}/{})",
                    delay,
                    reconnect_count,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ApiResponse, MockHttpBackend};
    use crate::session::TokenPair;

    fn context_with(backend: MockHttpBackend, tokens: Option<TokenPair>) -> ClientContext {
        let store = Arc::new(TokenStore::in_memory());
        store.set_tokens(tokens);
        ClientContext::new(store, Arc::new(backend))
    }

    #[tokio::test]
    async fn test_authenticate_without_session_or_credentials() {
        // テスト項目: 保存済みセッションも認証情報もない場合、API を呼ばずに NotAuthenticated になる
        // given (前提条件):
        let mut backend = MockHttpBackend::new();
        backend.expect_execute().never();
        let context = context_with(backend, None);

        // when (操作):
        let result = context.authenticate(None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_authenticate_with_credentials_logs_in() {
        // テスト項目: 認証情報でログインし、トークン保存後にプロフィールを取得する
        // given (前提条件):
        let mut backend = MockHttpBackend::new();
        backend
            .expect_execute()
            .withf(|request| request.route() == "/login")
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"accessToken":"T1","refreshToken":"R1"}"#)));
        backend
            .expect_execute()
            .withf(|request| {
                request.route() == "/profiles/current" && request.bearer.as_deref() == Some("T1")
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"id":1,"nickname":"alice"}"#)));
        let context = context_with(backend, None);
        let credentials = Credentials {
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        };

        // when (操作):
        let profile = context.authenticate(Some(&credentials)).await.unwrap();

        // then (期待する結果):
        assert_eq!(profile.nickname, "alice");
        assert_eq!(context.tokens.tokens(), Some(TokenPair::new("T1", "R1")));
    }

    #[tokio::test]
    async fn test_rejected_session_forces_logout() {
        // テスト項目: リフレッシュにも失敗した認可エラーでセッションが破棄される
        // given (前提条件):
        let mut backend = MockHttpBackend::new();
        backend
            .expect_execute()
            .withf(|request| request.route() == "/profiles/current")
            .returning(|_| Ok(ApiResponse::new(401, "expired")));
        backend
            .expect_execute()
            .withf(|request| request.route() == "/token")
            .times(1)
            .returning(|_| Ok(ApiResponse::new(401, "refresh expired")));
        let context = context_with(backend, Some(TokenPair::new("T1", "R1")));

        // when (操作):
        let result = context.authenticate(None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotAuthenticated(_))));
        assert_eq!(context.tokens.tokens(), None);
    }

    #[tokio::test]
    async fn test_non_authorization_error_keeps_session() {
        // テスト項目: 認可以外のエラーではセッションを保持したまま Api エラーを返す
        // given (前提条件):
        let mut backend = MockHttpBackend::new();
        backend
            .expect_execute()
            .returning(|_| Ok(ApiResponse::new(404, "no such stream")));
        let context = context_with(backend, Some(TokenPair::new("T1", "R1")));

        // when (操作):
        let result = context.stream(9).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::Api(ApiError::Status { status: 404, .. }))
        ));
        assert!(context.tokens.tokens().is_some());
    }
}
