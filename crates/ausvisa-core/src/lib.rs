pub mod admin;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod stream;
pub mod token_store;

// Re-export main types for convenience
pub use admin::{LabelSelection, StatusFilter, UserFilter, UserStatus};
pub use chat::{ask, Answer, AnswerSource, Conversation};
pub use client::BackendClient;
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use models::{AdminUser, ChatMessage, ChatRole, GraphStats, User, UserStats};
pub use session::{Access, AuthSession, Landing, Requirement};
pub use stream::{stream_query, FnHandler, StreamHandler};
pub use token_store::TokenStore;
