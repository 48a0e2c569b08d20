use ausvisa_core::{
    AdminUser, Access, AuthSession, BackendClient, Conversation, GraphStats, LabelSelection,
    Landing, Requirement, UserFilter, UserStats,
};
use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Chat,
    Users,
    Graph,
}

impl Screen {
    fn requirement(self) -> Option<Requirement> {
        match self {
            Screen::Login => None,
            Screen::Chat => Some(Requirement::SignedIn),
            Screen::Users | Screen::Graph => Some(Requirement::Admin),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A transient notification shown over the current screen
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    ticks_left: u8,
}

// ~3 seconds at the 300ms tick
const NOTICE_TICKS: u8 = 10;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub auth: AuthSession,
    pub notice: Option<Notice>,

    // Login form
    pub login_email: String,
    pub login_password: String,
    pub login_field: LoginField,
    pub login_pending: bool,

    // Chat state
    pub conversation: Conversation,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input (chars)
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_chat: bool,

    // Admin: users
    pub users: Vec<AdminUser>,
    pub user_stats: Option<UserStats>,
    pub user_filter: UserFilter,
    pub users_state: TableState,
    pub users_loading: bool,
    pub confirm_delete: Option<AdminUser>,

    // Admin: knowledge graph
    pub graph: Option<GraphStats>,
    pub labels: LabelSelection,
    pub label_state: ListState,
    pub graph_loading: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    /// Bumped whenever a session starts or ends
    pub session_epoch: u64,

    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(auth: AuthSession, events: UnboundedSender<AppEvent>) -> Self {
        let mut app = Self {
            should_quit: false,
            screen: Screen::Login,
            input_mode: InputMode::Editing,
            auth,
            notice: None,

            login_email: String::new(),
            login_password: String::new(),
            login_field: LoginField::default(),
            login_pending: false,

            conversation: Conversation::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_chat: true,

            users: Vec::new(),
            user_stats: None,
            user_filter: UserFilter::default(),
            users_state: TableState::default(),
            users_loading: false,
            confirm_delete: None,

            graph: None,
            labels: LabelSelection::default(),
            label_state: ListState::default(),
            graph_loading: false,

            animation_frame: 0,

            session_epoch: 0,

            events,
        };
        if app.auth.is_authenticated() {
            app.enter_session();
        }
        app
    }

    pub fn client(&self) -> BackendClient {
        self.auth.client().clone()
    }

    pub fn events(&self) -> UnboundedSender<AppEvent> {
        self.events.clone()
    }

    /// Set up the signed-in screens for the current user and land on the
    /// screen that fits their role.
    pub fn enter_session(&mut self) {
        let username = self
            .auth
            .user()
            .map(|u| u.username.clone())
            .unwrap_or_default();
        self.session_epoch += 1;
        self.conversation = Conversation::greeting(&username);
        self.login_password.clear();
        self.login_pending = false;
        self.screen = match self.auth.landing() {
            Landing::AdminDashboard => Screen::Users,
            Landing::Chat => Screen::Chat,
        };
        self.input_mode = InputMode::Normal;
    }

    /// Drop everything tied to the signed-in user and show the login form
    pub fn leave_session(&mut self) {
        self.auth.logout();
        self.session_epoch += 1;
        self.login_pending = false;
        self.users.clear();
        self.users_loading = false;
        self.user_stats = None;
        self.graph = None;
        self.graph_loading = false;
        self.confirm_delete = None;
        self.conversation = Conversation::new();
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.screen = Screen::Login;
        self.login_field = LoginField::Email;
        self.input_mode = InputMode::Editing;
    }

    /// Switch screens if the session allows it. Returns true when the switch
    /// happened.
    pub fn go_to(&mut self, screen: Screen) -> bool {
        let access = screen
            .requirement()
            .map(|r| self.auth.access(r))
            .unwrap_or(Access::Granted);
        match access {
            Access::Granted => {
                self.screen = screen;
                self.input_mode = if screen == Screen::Login {
                    InputMode::Editing
                } else {
                    InputMode::Normal
                };
                true
            }
            Access::LoginRequired => {
                self.screen = Screen::Login;
                self.input_mode = InputMode::Editing;
                false
            }
            Access::Forbidden => {
                self.notify_error("Admin access required");
                false
            }
        }
    }

    pub fn notify_success(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind: NoticeKind::Success,
            ticks_left: NOTICE_TICKS,
        });
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind: NoticeKind::Error,
            ticks_left: NOTICE_TICKS,
        });
    }

    pub fn tick(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(notice) = &mut self.notice {
            notice.ticks_left = notice.ticks_left.saturating_sub(1);
            if notice.ticks_left == 0 {
                self.notice = None;
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.login_pending
            || self.conversation.is_streaming()
            || self.users_loading
            || self.graph_loading
    }

    // Users table

    pub fn visible_users(&self) -> Vec<&AdminUser> {
        self.user_filter.apply(&self.users)
    }

    pub fn selected_user(&self) -> Option<&AdminUser> {
        let i = self.users_state.selected()?;
        self.visible_users().get(i).copied()
    }

    pub fn users_down(&mut self) {
        let len = self.visible_users().len();
        if len > 0 {
            let i = self.users_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.users_state.select(Some(i));
        }
    }

    pub fn users_up(&mut self) {
        let i = self.users_state.selected().unwrap_or(0);
        self.users_state.select(Some(i.saturating_sub(1)));
    }

    /// Keep the table selection inside the filtered rows
    pub fn clamp_user_selection(&mut self) {
        let len = self.visible_users().len();
        if len == 0 {
            self.users_state.select(None);
        } else {
            let i = self.users_state.selected().unwrap_or(0).min(len - 1);
            self.users_state.select(Some(i));
        }
    }

    // Graph labels

    /// All labels the backend reported, in its order
    pub fn graph_labels(&self) -> Vec<String> {
        self.graph
            .as_ref()
            .map(|g| g.node_counts.iter().map(|c| c.label.clone()).collect())
            .unwrap_or_default()
    }

    pub fn labels_down(&mut self) {
        let len = self.graph_labels().len();
        if len > 0 {
            let i = self.label_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.label_state.select(Some(i));
        }
    }

    pub fn labels_up(&mut self) {
        let i = self.label_state.selected().unwrap_or(0);
        self.label_state.select(Some(i.saturating_sub(1)));
    }

    pub fn toggle_selected_label(&mut self) {
        let labels = self.graph_labels();
        if let Some(label) = self.label_state.selected().and_then(|i| labels.get(i)) {
            self.labels.toggle(label);
        }
    }

    // Chat

    /// Scroll chat to bottom so the newest text is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversation.messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            let content_lines = if msg.content.is_empty() {
                1 // "Thinking..."
            } else {
                msg.content
                    .lines()
                    .map(|line| line.chars().count() / wrap_width + 1)
                    .sum::<usize>()
            };
            total_lines = total_lines.saturating_add(content_lines as u16);
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
