use std::io::{self, Stderr};
use anyhow::Result;
use ausvisa_core::chat::Answer;
use ausvisa_core::models::LoginResponse;
use ausvisa_core::{AdminUser, ApiResult, GraphStats, UserStats};
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Tick,
    Backend(BackendEvent),
}

/// Results of background network tasks, delivered back into the UI loop
#[derive(Debug)]
pub enum BackendEvent {
    LoginFinished(ApiResult<LoginResponse>),
    /// Everything below carries the session epoch it was requested in;
    /// results from an earlier session are dropped
    AnswerChunk {
        epoch: u64,
        message_id: u64,
        text: String,
    },
    AnswerFinished {
        epoch: u64,
        message_id: u64,
        result: ApiResult<Answer>,
    },
    UsersLoaded {
        epoch: u64,
        result: ApiResult<(Vec<AdminUser>, UserStats)>,
    },
    GraphLoaded {
        epoch: u64,
        result: ApiResult<GraphStats>,
    },
    /// An admin action finished; `done` describes it for the notification
    UserUpdated {
        epoch: u64,
        done: String,
        result: ApiResult<()>,
    },
}

impl BackendEvent {
    /// Session epoch the work was started in, if it belongs to a session
    pub fn epoch(&self) -> Option<u64> {
        match self {
            BackendEvent::LoginFinished(_) => None,
            BackendEvent::AnswerChunk { epoch, .. }
            | BackendEvent::AnswerFinished { epoch, .. }
            | BackendEvent::UsersLoaded { epoch, .. }
            | BackendEvent::GraphLoaded { epoch, .. }
            | BackendEvent::UserUpdated { epoch, .. } => Some(*epoch),
        }
    }
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let Ok(evt) = evt else { continue };
                let app_event = match evt {
                    // Only handle key press events, not release
                    Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Tick drives the thinking animation and notification expiry
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Sender for background tasks to report back on
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
