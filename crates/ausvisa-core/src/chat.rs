//! Asking the advisor: streaming with a non-streaming fallback, and the
//! conversation state a chat view renders.

use chrono::Utc;

use crate::client::BackendClient;
use crate::error::ApiResult;
use crate::models::{ChatMessage, ChatRole};
use crate::stream::{self, StreamFailure};

pub const APOLOGY: &str =
    "Sorry, I ran into a problem while answering your question. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Streamed,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

/// Ask `question`, delivering streamed fragments to `on_chunk`.
///
/// If the stream fails before any fragment was delivered, the answer is
/// fetched once from the non-streaming endpoint instead and returned whole
/// (nothing is passed to `on_chunk` in that case). A failure after the first
/// fragment is returned as an error.
pub async fn ask(
    client: &BackendClient,
    question: &str,
    mut on_chunk: impl FnMut(&str),
) -> ApiResult<Answer> {
    let mut text = String::new();
    let streamed = stream::open_and_read(client, question, |chunk| {
        text.push_str(chunk);
        on_chunk(chunk);
    })
    .await;

    match streamed {
        Ok(_) => Ok(Answer {
            text,
            source: AnswerSource::Streamed,
        }),
        Err(StreamFailure {
            error,
            chunks_delivered: 0,
        }) => {
            tracing::info!(%error, "answer stream unavailable, falling back to single query");
            let answer = client.query(question).await?;
            Ok(Answer {
                text: answer.response,
                source: AnswerSource::Fallback,
            })
        }
        Err(failure) => Err(failure.error),
    }
}

/// Chat history with at most one assistant message being streamed into
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    streaming: Option<u64>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
            streaming: None,
        }
    }

    /// A conversation opened by the assistant greeting `username`
    pub fn greeting(username: &str) -> Self {
        let mut conversation = Self::new();
        conversation.push(
            ChatRole::Assistant,
            format!(
                "Hello {}! I'm your AusVisa assistant. I can help with Australian visas, \
                 study pathways, settlement and more. Ask me anything!",
                username
            ),
        );
        conversation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    /// Id of the assistant message currently being streamed into
    pub fn streaming_id(&self) -> Option<u64> {
        self.streaming
    }

    /// Record the user's question and open an empty assistant message for the
    /// answer. Returns `None` when the question is blank or an answer is
    /// still in progress.
    pub fn begin(&mut self, question: &str) -> Option<u64> {
        if question.trim().is_empty() || self.is_streaming() {
            return None;
        }
        self.push(ChatRole::User, question.to_string());
        let id = self.push(ChatRole::Assistant, String::new());
        self.streaming = Some(id);
        Some(id)
    }

    /// Append a fragment to the answer in progress
    pub fn append(&mut self, chunk: &str) {
        if let Some(message) = self.active_mut() {
            message.content.push_str(chunk);
        }
    }

    /// Close the answer in progress. A fallback answer replaces whatever was
    /// streamed; an error replaces it with an apology.
    pub fn finish(&mut self, result: &ApiResult<Answer>) {
        if let Some(message) = self.active_mut() {
            match result {
                Ok(Answer {
                    text,
                    source: AnswerSource::Fallback,
                }) => message.content = text.clone(),
                Ok(_) => {}
                Err(_) => message.content = APOLOGY.to_string(),
            }
        }
        self.streaming = None;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming = None;
    }

    fn active_mut(&mut self) -> Option<&mut ChatMessage> {
        let id = self.streaming?;
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn push(&mut self, role: ChatRole, content: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            timestamp: Utc::now(),
        });
        id
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
