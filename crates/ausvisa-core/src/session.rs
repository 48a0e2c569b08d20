//! Auth session manager
//!
//! Owns the signed-in identity. The bearer token itself lives in the shared
//! [`TokenStore`] so that every [`BackendClient`] clone sees the same single
//! credential; this type is the only one that writes it.

use std::sync::Arc;

use crate::client::BackendClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{LoginResponse, RegisterRequest, User};
use crate::token_store::TokenStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    SignedIn,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    LoginRequired,
    Forbidden,
}

/// Where a freshly signed-in user should land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Chat,
    AdminDashboard,
}

pub struct AuthSession {
    client: BackendClient,
    session: Option<Session>,
    error: Option<String>,
}

impl AuthSession {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            session: None,
            error: None,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    fn tokens(&self) -> &Arc<TokenStore> {
        self.client.tokens()
    }

    /// Validate a persisted token against the backend. Any failure leaves the
    /// session empty and removes the stored token; nothing is reported to the
    /// caller.
    pub async fn restore(&mut self) {
        self.session = None;
        let Some(token) = self.tokens().get() else {
            return;
        };

        let verified = self.client.current_user().await;
        match verified {
            Ok(user) => {
                tracing::info!(user = %user.username, "session restored");
                self.session = Some(Session { user, token });
            }
            Err(e) => {
                tracing::info!(error = %e, "stored token rejected, signing out");
                self.forget_token();
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ApiResult<&User> {
        self.error = None;
        let result = self.client.login(email, password).await;
        self.complete_login(result)
    }

    /// Apply the backend's answer to a login request made elsewhere, e.g. on
    /// a background task. Success stores the token and opens the session;
    /// failure clears both and keeps the message for the login form.
    pub fn complete_login(&mut self, result: ApiResult<LoginResponse>) -> ApiResult<&User> {
        self.error = None;
        match result {
            Ok(response) => {
                if let Err(e) = self.tokens().set(&response.access_token) {
                    tracing::warn!(error = %e, "could not persist session token");
                }
                tracing::info!(user = %response.user.username, role = %response.user.role, "logged in");
                let session = self.session.insert(Session {
                    user: response.user,
                    token: response.access_token,
                });
                Ok(&session.user)
            }
            Err(e) => {
                self.session = None;
                self.forget_token();
                self.error = Some(match &e {
                    ApiError::Backend { message, .. } => message.clone(),
                    other => other.user_message(),
                });
                Err(e)
            }
        }
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &RegisterRequest) -> ApiResult<User> {
        let user = self.client.register(registration).await?;
        tracing::info!(user = %user.username, "account registered");
        Ok(user)
    }

    pub fn logout(&mut self) {
        self.forget_token();
        if let Some(session) = self.session.take() {
            tracing::info!(user = %session.user.username, "logged out");
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(User::is_admin)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn access(&self, requirement: Requirement) -> Access {
        match (self.user(), requirement) {
            (None, _) => Access::LoginRequired,
            (Some(user), Requirement::Admin) if !user.is_admin() => Access::Forbidden,
            _ => Access::Granted,
        }
    }

    pub fn landing(&self) -> Landing {
        if self.is_admin() {
            Landing::AdminDashboard
        } else {
            Landing::Chat
        }
    }

    fn forget_token(&self) {
        if let Err(e) = self.tokens().clear() {
            tracing::warn!(error = %e, "could not remove stored session token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: 1,
            email: "lan@example.com".into(),
            username: "lan".into(),
            full_name: None,
            role: role.into(),
            is_active: true,
            created_at: String::new(),
            updated_at: None,
        }
    }

    fn session_with(role: Option<&str>) -> AuthSession {
        let client = BackendClient::new("http://127.0.0.1:9", Arc::new(TokenStore::in_memory()));
        let mut auth = AuthSession::new(client);
        auth.session = role.map(|r| Session {
            user: user(r),
            token: "t".into(),
        });
        auth
    }

    #[test]
    fn test_access_gating() {
        let anonymous = session_with(None);
        assert_eq!(anonymous.access(Requirement::SignedIn), Access::LoginRequired);
        assert_eq!(anonymous.access(Requirement::Admin), Access::LoginRequired);

        let member = session_with(Some("user"));
        assert_eq!(member.access(Requirement::SignedIn), Access::Granted);
        assert_eq!(member.access(Requirement::Admin), Access::Forbidden);
        assert_eq!(member.landing(), Landing::Chat);

        let admin = session_with(Some("admin"));
        assert_eq!(admin.access(Requirement::Admin), Access::Granted);
        assert_eq!(admin.landing(), Landing::AdminDashboard);
    }

    #[test]
    fn test_logout_always_clears() {
        let mut auth = session_with(Some("user"));
        auth.client().tokens().set("t").unwrap();
        auth.logout();
        assert!(!auth.is_authenticated());
        assert!(auth.client().tokens().get().is_none());
        // logging out twice is harmless
        auth.logout();
    }

    #[test]
    fn test_complete_login_applies_response() {
        let mut auth = session_with(None);
        let response = LoginResponse {
            access_token: "tok-9".into(),
            token_type: "bearer".into(),
            user: user("admin"),
        };
        let signed_in = auth.complete_login(Ok(response)).map(|u| u.username.clone());
        assert_eq!(signed_in.unwrap(), "lan");
        assert_eq!(auth.token(), Some("tok-9"));
        assert_eq!(auth.client().tokens().get().as_deref(), Some("tok-9"));
        assert!(auth.error().is_none());

        let rejected = auth.complete_login(Err(ApiError::Backend {
            status: reqwest::StatusCode::UNAUTHORIZED,
            message: "Incorrect email or password".into(),
        }));
        assert!(rejected.is_err());
        assert!(!auth.is_authenticated());
        assert!(auth.client().tokens().get().is_none());
        assert_eq!(auth.error(), Some("Incorrect email or password"));
    }

    #[tokio::test]
    async fn test_restore_without_token_makes_no_request() {
        // port 9 (discard) is never contacted because no token is stored
        let mut auth = session_with(None);
        auth.restore().await;
        assert!(!auth.is_authenticated());
    }
}
