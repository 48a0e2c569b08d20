use std::future::Future;

use anyhow::Result;
use ausvisa_core::admin::next_role;
use ausvisa_core::chat::ask;
use ausvisa_core::error::StatusCode;
use ausvisa_core::models::LoginResponse;
use ausvisa_core::{ApiError, ApiResult, Conversation};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, InputMode, LoginField, Screen};
use crate::tui::{AppEvent, BackendEvent};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Backend(event) => handle_backend(app, event),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.confirm_delete.is_some() {
        handle_confirm_delete(app, key);
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Login, _) => handle_login(app, key),
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, key),
        (Screen::Users, InputMode::Normal) => handle_users_normal(app, key),
        (Screen::Users, InputMode::Editing) => handle_users_search(app, key),
        (Screen::Graph, _) => handle_graph(app, key),
    }
}

/// Keys shared by every signed-in screen. Returns true if the key was used.
fn handle_navigation(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') => {
            app.go_to(Screen::Chat);
        }
        KeyCode::Char('u') => {
            if app.go_to(Screen::Users) && app.users.is_empty() {
                reload_users(app);
            }
        }
        KeyCode::Char('g') => {
            if app.go_to(Screen::Graph) && app.graph.is_none() {
                reload_graph(app);
            }
        }
        KeyCode::Char('o') => {
            app.leave_session();
            app.notify_success("Logged out");
        }
        _ => return false,
    }
    true
}

/// Start whatever loading the current screen needs
pub fn load_current_screen(app: &mut App) {
    match app.screen {
        Screen::Users => reload_users(app),
        Screen::Graph => reload_graph(app),
        Screen::Login | Screen::Chat => {}
    }
}

fn handle_login(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.should_quit = true;
        return;
    }
    // The form is frozen while a sign-in request is out
    if app.login_pending {
        return;
    }
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.login_field = match app.login_field {
                LoginField::Email => LoginField::Password,
                LoginField::Password => LoginField::Email,
            };
        }
        KeyCode::Enter if app.login_field == LoginField::Email => {
            app.login_field = LoginField::Password;
        }
        KeyCode::Enter => submit_login(app),
        KeyCode::Backspace => {
            app.auth.clear_error();
            match app.login_field {
                LoginField::Email => app.login_email.pop(),
                LoginField::Password => app.login_password.pop(),
            };
        }
        KeyCode::Char(c) => {
            app.auth.clear_error();
            match app.login_field {
                LoginField::Email => app.login_email.push(c),
                LoginField::Password => app.login_password.push(c),
            }
        }
        _ => {}
    }
}

/// Send the login form on a background task; the answer comes back as
/// [`BackendEvent::LoginFinished`].
fn submit_login(app: &mut App) {
    let email = app.login_email.trim().to_string();
    if email.is_empty() || app.login_password.is_empty() {
        app.notify_error("Email and password are required");
        return;
    }
    let password = std::mem::take(&mut app.login_password);

    app.auth.clear_error();
    app.login_pending = true;
    let client = app.client();
    let tx = app.events();
    tokio::spawn(async move {
        let result = client.login(&email, &password).await;
        let _ = tx.send(AppEvent::Backend(BackendEvent::LoginFinished(result)));
    });
}

fn finish_login(app: &mut App, result: ApiResult<LoginResponse>) {
    if !app.login_pending {
        return;
    }
    app.login_pending = false;
    // The session manager keeps the error text for the form
    if app.auth.complete_login(result).is_err() {
        return;
    }
    app.enter_session();
    if let Some(user) = app.auth.user() {
        let welcome = format!("Welcome, {}", user.username);
        app.notify_success(welcome);
    }
    load_current_screen(app);
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if handle_navigation(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_chat = false;
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_chat = false;
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.follow_chat = true;
            app.scroll_chat_to_bottom();
        }
        KeyCode::Char('n') => {
            if app.conversation.is_streaming() {
                app.notify_error("Wait for the current answer to finish");
            } else {
                let username = app.auth.user().map(|u| u.username.clone()).unwrap_or_default();
                app.conversation = Conversation::greeting(&username);
                app.chat_scroll = 0;
                app.follow_chat = true;
            }
        }
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => send_question(app),
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

/// Start answering the typed question on a background task. Fragments and
/// the final result come back as [`BackendEvent`]s.
fn send_question(app: &mut App) {
    let question = app.chat_input.trim().to_string();
    let Some(message_id) = app.conversation.begin(&question) else {
        return;
    };

    app.chat_input.clear();
    app.chat_cursor = 0;
    app.follow_chat = true;
    app.scroll_chat_to_bottom();

    let client = app.client();
    let tx = app.events();
    let epoch = app.session_epoch;
    tokio::spawn(async move {
        let result = ask(&client, &question, |text| {
            let _ = tx.send(AppEvent::Backend(BackendEvent::AnswerChunk {
                epoch,
                message_id,
                text: text.to_string(),
            }));
        })
        .await;
        let _ = tx.send(AppEvent::Backend(BackendEvent::AnswerFinished {
            epoch,
            message_id,
            result,
        }));
    });
}

fn handle_users_normal(app: &mut App, key: KeyEvent) {
    if handle_navigation(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.users_down(),
        KeyCode::Char('k') | KeyCode::Up => app.users_up(),
        KeyCode::Char('/') => app.input_mode = InputMode::Editing,
        KeyCode::Esc => {
            app.user_filter.keyword.clear();
            app.clamp_user_selection();
        }
        KeyCode::Char('f') => {
            app.user_filter.status = app.user_filter.status.next();
            app.clamp_user_selection();
        }
        KeyCode::Char('R') => reload_users(app),
        KeyCode::Char('t') => {
            if let Some(user) = app.selected_user().cloned() {
                let client = app.client();
                let is_active = !user.is_active;
                let done = format!(
                    "{} {}",
                    user.username,
                    if is_active { "activated" } else { "suspended" }
                );
                spawn_user_update(app, done, async move {
                    client.update_user_status(user.id, is_active).await.map(|_| ())
                });
            }
        }
        KeyCode::Char('r') => {
            if let Some(user) = app.selected_user().cloned() {
                let client = app.client();
                let role = next_role(&user.role);
                let done = format!("{} is now {}", user.username, role);
                spawn_user_update(app, done, async move {
                    client.update_user_role(user.id, role).await.map(|_| ())
                });
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => {
            app.confirm_delete = app.selected_user().cloned();
        }
        _ => {}
    }
}

fn handle_users_search(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => app.input_mode = InputMode::Normal,
        KeyCode::Backspace => {
            app.user_filter.keyword.pop();
            app.clamp_user_selection();
        }
        KeyCode::Char(c) => {
            app.user_filter.keyword.push(c);
            app.clamp_user_selection();
        }
        _ => {}
    }
}

fn handle_confirm_delete(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            if let Some(user) = app.confirm_delete.take() {
                let client = app.client();
                let done = format!("{} deleted", user.username);
                spawn_user_update(app, done, async move { client.delete_user(user.id).await });
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => app.confirm_delete = None,
        _ => {}
    }
}

fn handle_graph(app: &mut App, key: KeyEvent) {
    if handle_navigation(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.labels_down(),
        KeyCode::Char('k') | KeyCode::Up => app.labels_up(),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected_label(),
        KeyCode::Char('a') => {
            if let Some(graph) = &app.graph {
                app.labels.select_all(graph);
            }
        }
        KeyCode::Char('x') => app.labels.clear(),
        KeyCode::Char('R') => reload_graph(app),
        _ => {}
    }
}

/// Fetch the user list and stats together
pub fn reload_users(app: &mut App) {
    app.users_loading = true;
    let client = app.client();
    let tx = app.events();
    let epoch = app.session_epoch;
    tokio::spawn(async move {
        let (users, stats) = tokio::join!(client.admin_users(), client.admin_stats());
        let result = users.and_then(|users| stats.map(|stats| (users, stats)));
        let _ = tx.send(AppEvent::Backend(BackendEvent::UsersLoaded { epoch, result }));
    });
}

pub fn reload_graph(app: &mut App) {
    app.graph_loading = true;
    let client = app.client();
    let tx = app.events();
    let epoch = app.session_epoch;
    tokio::spawn(async move {
        let result = client.graph_stats().await;
        let _ = tx.send(AppEvent::Backend(BackendEvent::GraphLoaded { epoch, result }));
    });
}

fn spawn_user_update<F>(app: &mut App, done: String, update: F)
where
    F: Future<Output = ApiResult<()>> + Send + 'static,
{
    let tx = app.events();
    let epoch = app.session_epoch;
    tokio::spawn(async move {
        let result = update.await;
        let _ = tx.send(AppEvent::Backend(BackendEvent::UserUpdated { epoch, done, result }));
    });
}

fn handle_backend(app: &mut App, event: BackendEvent) {
    if let Some(epoch) = event.epoch() {
        if epoch != app.session_epoch {
            tracing::debug!(epoch, current = app.session_epoch, "dropping result from an ended session");
            return;
        }
    }

    match event {
        BackendEvent::LoginFinished(result) => finish_login(app, result),
        BackendEvent::AnswerChunk { message_id, text, .. } => {
            if app.conversation.streaming_id() == Some(message_id) {
                app.conversation.append(&text);
                if app.follow_chat {
                    app.scroll_chat_to_bottom();
                }
            }
        }
        BackendEvent::AnswerFinished { message_id, result, .. } => {
            if app.conversation.streaming_id() != Some(message_id) {
                return;
            }
            app.conversation.finish(&result);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "answer failed");
                app.notify_error(e.user_message());
            }
            if app.follow_chat {
                app.scroll_chat_to_bottom();
            }
        }
        BackendEvent::UsersLoaded { result, .. } => {
            app.users_loading = false;
            match result {
                Ok((users, stats)) => {
                    app.users = users;
                    app.user_stats = Some(stats);
                    app.clamp_user_selection();
                }
                Err(e) => report_failure(app, e),
            }
        }
        BackendEvent::GraphLoaded { result, .. } => {
            app.graph_loading = false;
            match result {
                Ok(graph) => {
                    let has_labels = !graph.node_counts.is_empty();
                    app.graph = Some(graph);
                    if has_labels && app.label_state.selected().is_none() {
                        app.label_state.select(Some(0));
                    }
                }
                Err(e) => report_failure(app, e),
            }
        }
        BackendEvent::UserUpdated { done, result, .. } => {
            match result {
                Ok(()) => app.notify_success(done),
                Err(e) => report_failure(app, e),
            }
            if app.auth.is_authenticated() {
                reload_users(app);
            }
        }
    }
}

/// Show a failed admin call. A missing or rejected token ends the session.
fn report_failure(app: &mut App, error: ApiError) {
    tracing::warn!(error = %error, "backend call failed");
    let expired = matches!(error, ApiError::Unauthenticated)
        || error.status() == Some(StatusCode::UNAUTHORIZED);
    if expired {
        app.leave_session();
        app.notify_error("Your session has ended. Please log in again");
    } else {
        app.notify_error(error.user_message());
    }
}
