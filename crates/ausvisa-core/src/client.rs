//! Typed client for the AusVisa backend REST API

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{detail_message, ApiError, ApiResult};
use crate::models::{
    AdminUser, ChatAnswer, ChatRequest, ChatbotStats, GraphStats, Health, LoginRequest,
    LoginResponse, RegisterRequest, UpdateRoleRequest, UpdateStatusRequest, User, UserStats,
};
use crate::token_store::TokenStore;

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, tokens: Arc<TokenStore>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            request_timeout: Config::new().request_timeout(),
        }
    }

    pub fn from_config(config: &Config, tokens: Arc<TokenStore>) -> ApiResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url(),
            tokens,
            request_timeout: config.request_timeout(),
        })
    }

    /// Limit for a whole non-streaming request, body included
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    // Chatbot

    pub async fn query(&self, question: &str) -> ApiResult<ChatAnswer> {
        let request = self
            .request(Method::POST, "/api/chatbot/query")
            .json(&ChatRequest { question });
        self.fetch(request, "Failed to send message").await
    }

    /// Start a streaming answer. The returned response has a success status;
    /// its body is consumed by [`crate::stream`].
    pub async fn open_stream(&self, question: &str) -> ApiResult<Response> {
        let request = self
            .request(Method::POST, "/api/chatbot/query-stream")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatRequest { question });
        self.send(request, "Failed to start answer stream").await
    }

    pub async fn chatbot_stats(&self) -> ApiResult<ChatbotStats> {
        let request = self.request(Method::GET, "/api/chatbot/stats");
        self.fetch(request, "Failed to get stats").await
    }

    pub async fn health(&self) -> ApiResult<Health> {
        let request = self.request(Method::GET, "/api/chatbot/health");
        self.fetch(request, "Health check failed").await
    }

    // Admin

    pub async fn graph_stats(&self) -> ApiResult<GraphStats> {
        let request = self.authorized(Method::GET, "/api/admin/neo4j/stats")?;
        self.fetch(request, "Failed to load knowledge graph stats").await
    }

    pub async fn admin_users(&self) -> ApiResult<Vec<AdminUser>> {
        let request = self.authorized(Method::GET, "/api/admin/users")?;
        self.fetch(request, "Failed to load users").await
    }

    pub async fn admin_stats(&self) -> ApiResult<UserStats> {
        let request = self.authorized(Method::GET, "/api/admin/stats")?;
        self.fetch(request, "Failed to load user stats").await
    }

    pub async fn update_user_status(&self, user_id: i64, is_active: bool) -> ApiResult<User> {
        let request = self
            .authorized(Method::PUT, &format!("/api/admin/users/{}/status", user_id))?
            .json(&UpdateStatusRequest { is_active });
        self.fetch(request, "Failed to update user status").await
    }

    pub async fn update_user_role(&self, user_id: i64, role: &str) -> ApiResult<User> {
        let request = self
            .authorized(Method::PUT, &format!("/api/admin/users/{}/role", user_id))?
            .json(&UpdateRoleRequest { role });
        self.fetch(request, "Failed to update user role").await
    }

    pub async fn delete_user(&self, user_id: i64) -> ApiResult<()> {
        let request = self.authorized(Method::DELETE, &format!("/api/users/{}", user_id))?;
        self.send(request.timeout(self.request_timeout), "Failed to delete user")
            .await?;
        Ok(())
    }

    // Users

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let request = self
            .request(Method::POST, "/api/users/login")
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            });
        self.fetch(request, "Login failed").await
    }

    pub async fn register(&self, registration: &RegisterRequest) -> ApiResult<User> {
        let request = self
            .request(Method::POST, "/api/users/register")
            .json(registration);
        self.fetch(request, "Registration failed").await
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        let request = self.authorized(Method::GET, "/api/users/me")?;
        self.fetch(request, "Failed to load current user").await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "backend request");
        self.client.request(method, url)
    }

    /// Build a request carrying the stored bearer token, or fail without
    /// touching the network when there is none.
    fn authorized(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let token = self.tokens.get().ok_or(ApiError::Unauthenticated)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, failure: &str) -> ApiResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = detail_message(&body, failure);
        tracing::debug!(%status, %message, "backend request failed");
        Err(ApiError::Backend { status, message })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, failure: &str) -> ApiResult<T> {
        let response = self.send(request.timeout(self.request_timeout), failure).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}
