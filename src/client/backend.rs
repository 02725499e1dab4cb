//! 客户端会话与认证接口之间的传输层

use super::ClientError;
use crate::{
    auth::{jwt::JwtService, middleware::REFRESH_COOKIE},
    middleware::AppState,
    models::{
        auth::{LoginRequest, SessionResponse, SwitchCompanyRequest},
        session::SessionContext,
    },
    services::AuthService,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, req: LoginRequest) -> Result<SessionResponse, ClientError>;

    async fn refresh(&self, refresh_token: &str) -> Result<SessionResponse, ClientError>;

    async fn switch_company(
        &self,
        access_token: &str,
        refresh_token: &str,
        company_id: Uuid,
    ) -> Result<SessionResponse, ClientError>;

    async fn me(&self, access_token: &str) -> Result<SessionContext, ClientError>;

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError>;
}

/// 进程内直接调用服务
pub struct LocalBackend {
    jwt_service: Arc<JwtService>,
    auth_service: Arc<AuthService>,
}

impl LocalBackend {
    pub fn new(jwt_service: Arc<JwtService>, auth_service: Arc<AuthService>) -> Self {
        Self {
            jwt_service,
            auth_service,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.jwt_service.clone(), state.auth_service.clone())
    }

    fn session_of(&self, access_token: &str) -> Result<(Uuid, Uuid), ClientError> {
        let claims = self.jwt_service.validate_access_token(access_token)?;
        Ok((claims.user_id()?, claims.company_id))
    }
}

#[async_trait]
impl AuthBackend for LocalBackend {
    async fn login(&self, req: LoginRequest) -> Result<SessionResponse, ClientError> {
        Ok(self.auth_service.login(req).await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionResponse, ClientError> {
        Ok(self.auth_service.refresh_token(refresh_token).await?)
    }

    async fn switch_company(
        &self,
        access_token: &str,
        refresh_token: &str,
        company_id: Uuid,
    ) -> Result<SessionResponse, ClientError> {
        let (user_id, from_company_id) = self.session_of(access_token)?;
        Ok(self
            .auth_service
            .switch_company(
                user_id,
                from_company_id,
                SwitchCompanyRequest { company_id },
                Some(refresh_token),
            )
            .await?)
    }

    async fn me(&self, access_token: &str) -> Result<SessionContext, ClientError> {
        let (user_id, company_id) = self.session_of(access_token)?;
        Ok(self.auth_service.me(user_id, company_id).await?)
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        let (user_id, _) = self.session_of(access_token)?;
        Ok(self.auth_service.logout(Some(refresh_token), user_id).await?)
    }
}

/// 通过 HTTP 访问运行中的服务端
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send_raw(request).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| format!("request failed with status {}", status));
        tracing::debug!(status = status.as_u16(), %message, "Auth request rejected");

        Err(ClientError::Rejected(message))
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, req: LoginRequest) -> Result<SessionResponse, ClientError> {
        self.send(self.client.post(self.url("/api/auth/login")).json(&req))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionResponse, ClientError> {
        self.send(
            self.client
                .post(self.url("/api/auth/refresh"))
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await
    }

    async fn switch_company(
        &self,
        access_token: &str,
        refresh_token: &str,
        company_id: Uuid,
    ) -> Result<SessionResponse, ClientError> {
        self.send(
            self.client
                .post(self.url("/api/auth/switch-company"))
                .bearer_auth(access_token)
                .header(
                    reqwest::header::COOKIE,
                    format!("{}={}", REFRESH_COOKIE, refresh_token),
                )
                .json(&SwitchCompanyRequest { company_id }),
        )
        .await
    }

    async fn me(&self, access_token: &str) -> Result<SessionContext, ClientError> {
        self.send(
            self.client
                .get(self.url("/api/auth/me"))
                .bearer_auth(access_token),
        )
        .await
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        self.send_raw(
            self.client
                .post(self.url("/api/auth/logout"))
                .bearer_auth(access_token)
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await
        .map(|_| ())
    }
}
