//! In-process stand-in for the AusVisa backend

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ausvisa_core::models::AdminUser;

pub const ADMIN_EMAIL: &str = "admin@ausvisa.au";
pub const ADMIN_PASSWORD: &str = "correct-horse";
pub const GOOD_TOKEN: &str = "good-token";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    /// `data:` lines for each fragment, then `[DONE]`
    Normal,
    /// 500 before any byte of the stream
    Unavailable,
    /// 200 and a keep-alive comment, then the connection breaks before any
    /// `data:` line
    BreaksBeforeFirst,
    /// one fragment, then the connection breaks
    BreaksAfterFirst,
}

pub struct FakeState {
    pub users: Vec<AdminUser>,
    pub fragments: Vec<String>,
    pub stream_mode: StreamMode,
    pub requests: Vec<String>,
}

pub type Shared = Arc<Mutex<FakeState>>;

fn admin_user(id: i64, username: &str, email: &str, role: &str, is_active: bool) -> AdminUser {
    AdminUser {
        id,
        email: email.to_string(),
        username: username.to_string(),
        full_name: None,
        role: role.to_string(),
        is_active,
        created_at: "2025-03-01T09:00:00".to_string(),
        updated_at: None,
        last_login: None,
        session_count: id as u64,
    }
}

pub fn state() -> Shared {
    Arc::new(Mutex::new(FakeState {
        users: vec![
            admin_user(1, "admin", ADMIN_EMAIL, "admin", true),
            admin_user(7, "lan", "lan@example.com", "user", true),
            admin_user(9, "quang", "quang@example.com", "editor", false),
        ],
        fragments: vec!["Visa ".to_string(), "482".to_string()],
        stream_mode: StreamMode::Normal,
        requests: Vec::new(),
    }))
}

/// Serve `state` on an ephemeral port and return the base URL
pub async fn spawn(state: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing listens on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// A base URL that accepts connections and never answers
pub async fn silent_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/users/login", post(login))
        .route("/api/users/register", post(register))
        .route("/api/users/me", get(me))
        .route("/api/users/{id}", delete(delete_user))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/stats", get(user_stats))
        .route("/api/admin/users/{id}/status", put(update_status))
        .route("/api/admin/users/{id}/role", put(update_role))
        .route("/api/admin/neo4j/stats", get(graph_stats))
        .route("/api/chatbot/query", post(query))
        .route("/api/chatbot/query-stream", post(query_stream))
        .route("/api/chatbot/health", get(health))
        .route("/api/chatbot/stats", get(chatbot_stats))
        .with_state(state)
}

fn record(state: &Shared, what: &str) {
    state.lock().unwrap().requests.push(what.to_string());
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", GOOD_TOKEN))
}

fn user_json(user: &AdminUser) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "username": user.username,
        "full_name": user.full_name,
        "role": user.role,
        "is_active": user.is_active,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
    })
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    record(&state, "login");
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email != ADMIN_EMAIL || password != ADMIN_PASSWORD {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }
    let user = state.lock().unwrap().users[0].clone();
    Json(json!({
        "access_token": GOOD_TOKEN,
        "token_type": "bearer",
        "user": user_json(&user),
    }))
    .into_response()
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    record(&state, "register");
    let mut st = state.lock().unwrap();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if st.users.iter().any(|u| u.email == email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let id = st.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
    let username = body["username"].as_str().unwrap_or_default();
    let user = admin_user(id, username, &email, "user", true);
    st.users.push(user.clone());
    (StatusCode::CREATED, Json(user_json(&user))).into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "me");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Invalid or expired token");
    }
    let user = state.lock().unwrap().users[0].clone();
    Json(user_json(&user)).into_response()
}

async fn delete_user(State(state): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    record(&state, "delete_user");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let mut st = state.lock().unwrap();
    let before = st.users.len();
    st.users.retain(|u| u.id != id);
    if st.users.len() == before {
        return detail(StatusCode::NOT_FOUND, "User not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "list_users");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let users = state.lock().unwrap().users.clone();
    Json(users).into_response()
}

async fn user_stats(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "user_stats");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let st = state.lock().unwrap();
    let active = st.users.iter().filter(|u| u.is_active).count();
    Json(json!({
        "total_users": st.users.len(),
        "active_users": active,
        "pending_users": 0,
        "suspended_users": st.users.len() - active,
    }))
    .into_response()
}

async fn update_status(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "update_status");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let mut st = state.lock().unwrap();
    let Some(user) = st.users.iter_mut().find(|u| u.id == id) else {
        return detail(StatusCode::NOT_FOUND, "User not found");
    };
    user.is_active = body["is_active"].as_bool().unwrap_or(user.is_active);
    Json(user_json(user)).into_response()
}

async fn update_role(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "update_role");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let role = body["role"].as_str().unwrap_or_default().to_string();
    if !["admin", "editor", "reviewer", "support", "user"].contains(&role.as_str()) {
        return detail(
            StatusCode::BAD_REQUEST,
            "Invalid role. Must be one of: admin, editor, reviewer, support, user",
        );
    }
    let mut st = state.lock().unwrap();
    let Some(user) = st.users.iter_mut().find(|u| u.id == id) else {
        return detail(StatusCode::NOT_FOUND, "User not found");
    };
    user.role = role;
    Json(user_json(user)).into_response()
}

async fn graph_stats(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "graph_stats");
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    Json(json!({
        "node_counts": [
            {"label": "Visa", "count": 120},
            {"label": "University", "count": 43},
            {"label": "Program", "count": 870},
        ],
        "rel_counts": [
            {"type": "OFFERS", "count": 870},
            {"type": "REQUIRES", "count": 240},
        ],
    }))
    .into_response()
}

async fn query(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    record(&state, "query");
    let question = body["question"].as_str().unwrap_or_default();
    Json(json!({
        "response": format!("Full answer about {}", question),
        "intent": "visa",
    }))
    .into_response()
}

async fn query_stream(State(state): State<Shared>, Json(_body): Json<Value>) -> Response {
    record(&state, "query_stream");
    let (mode, fragments) = {
        let st = state.lock().unwrap();
        (st.stream_mode, st.fragments.clone())
    };

    let mut lines: Vec<String> = fragments
        .iter()
        .map(|f| format!("data: {}\n\n", json!({ "text": f })))
        .collect();

    match mode {
        StreamMode::Unavailable => detail(StatusCode::INTERNAL_SERVER_ERROR, "Stream unavailable"),
        StreamMode::Normal => {
            lines.push("data: [DONE]\n\n".to_string());
            let body = stream::iter(lines).then(|line| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, std::io::Error>(line)
            });
            axum::http::Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(body))
                .unwrap()
        }
        StreamMode::BreaksBeforeFirst => broken_stream(": keep-alive\n\n".to_string()),
        StreamMode::BreaksAfterFirst => broken_stream(lines.into_iter().next().unwrap_or_default()),
    }
}

/// An event stream that sends `first` and then fails
fn broken_stream(first: String) -> Response {
    let items = vec![
        Ok(first),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "backend crashed")),
    ];
    let body = stream::iter(items).then(|item| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        item
    });
    axum::http::Response::builder()
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(body))
        .unwrap()
}

async fn health(State(state): State<Shared>) -> Response {
    record(&state, "health");
    Json(json!({ "status": "ok", "neo4j": "connected" })).into_response()
}

async fn chatbot_stats(State(state): State<Shared>) -> Response {
    record(&state, "chatbot_stats");
    Json(json!({ "universities": 43, "programs": 870, "visas": 120 })).into_response()
}
