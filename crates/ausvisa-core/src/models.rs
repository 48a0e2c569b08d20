//! UI-agnostic data types
//!
//! Wire shapes of the AusVisa backend plus the chat message type shared by
//! the terminal UI and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity returned by `/api/users/me` and the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

pub const ADMIN_ROLE: &str = "admin";

/// Roles the backend accepts for `PUT /api/admin/users/{id}/role`
pub const VALID_ROLES: [&str; 5] = ["admin", "editor", "reviewer", "support", "user"];

fn default_role() -> String {
    "user".to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub question: &'a str,
}

/// Non-streaming answer from `/api/chatbot/query`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
    #[serde(default)]
    pub intent: Option<String>,
}

/// Counts shown on the landing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChatbotStats {
    pub universities: u64,
    pub programs: u64,
    pub visas: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub neo4j: String,
}

/// A user as listed on the admin dashboard, with session statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub session_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: u64,
    pub active_users: u64,
    pub pending_users: u64,
    pub suspended_users: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateRoleRequest<'a> {
    pub role: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipCount {
    #[serde(rename = "type", alias = "label")]
    pub kind: String,
    pub count: u64,
}

/// Knowledge graph snapshot from `/api/admin/neo4j/stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GraphStats {
    #[serde(default)]
    pub node_counts: Vec<LabelCount>,
    #[serde(default)]
    pub rel_counts: Vec<RelationshipCount>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> u64 {
        self.node_counts.iter().map(|c| c.count).sum()
    }

    pub fn total_relationships(&self) -> u64 {
        self.rel_counts.iter().map(|c| c.count).sum()
    }
}

/// A message in the advisory conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}
