//! Consumer for the chunked answer stream of `/api/chatbot/query-stream`
//!
//! The body is a byte stream carrying text lines. Lines of the form
//! `data: <payload>` are events: `[DONE]` ends the answer, a JSON object with
//! a `text` field is a fragment, and a payload that is not JSON is itself the
//! fragment. Everything else is ignored.
//!
//! Two shapes are offered over the same parser: [`text_stream`] turns a body
//! into an async stream of fragments, and [`consume`] / [`stream_query`] drive
//! a [`StreamHandler`] with exactly one terminal callback.

use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

use crate::client::BackendClient;
use crate::error::{ApiError, ApiResult};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Done,
}

/// Incremental UTF-8 decoder and line splitter.
///
/// Bytes of a character cut at a chunk boundary are carried over to the next
/// [`push`](EventDecoder::push); only an unterminated line is buffered as text.
#[derive(Debug, Default)]
pub struct EventDecoder {
    pending_bytes: Vec<u8>,
    line: String,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk and collect the events of every line it
    /// completes, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.pending_bytes.extend_from_slice(bytes);
        let text = decode_prefix(&mut self.pending_bytes);
        self.line.push_str(&text);

        let mut events = Vec::new();
        while let Some(pos) = self.line.find('\n') {
            let line: String = self.line.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// End of input: flush undecodable trailing bytes and the last
    /// unterminated line.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending_bytes.is_empty() {
            let rest = std::mem::take(&mut self.pending_bytes);
            self.line.push_str(&String::from_utf8_lossy(&rest));
        }
        let line = std::mem::take(&mut self.line);
        parse_line(&line).into_iter().collect()
    }
}

/// Decode as much of `buf` as forms complete characters, leaving an
/// incomplete trailing sequence in place. Invalid sequences become U+FFFD.
fn decode_prefix(buf: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(buf) {
            Ok(text) => {
                out.push_str(text);
                buf.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[..valid]));
                match e.error_len() {
                    None => {
                        buf.drain(..valid);
                        return out;
                    }
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        buf.drain(..valid + bad);
                    }
                }
            }
        }
    }
}

/// Interpret one line (with or without its terminator)
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value
            .get("text")
            .and_then(|t| t.as_str())
            .map(|t| StreamEvent::Chunk(t.to_string())),
        Err(_) => Some(StreamEvent::Chunk(payload.to_string())),
    }
}

struct TextState<S> {
    body: S,
    decoder: EventDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> TextState<S> {
    fn enqueue(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            match event {
                StreamEvent::Chunk(text) => self.ready.push_back(text),
                StreamEvent::Done => {
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a response body into a stream of text fragments.
///
/// The stream ends after `[DONE]` (ignoring any later bytes) or at end of
/// input. A transport error is yielded once as [`ApiError::Stream`] and ends
/// the stream.
pub fn text_stream<S, B, E>(body: S) -> impl Stream<Item = ApiResult<String>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = TextState {
        body,
        decoder: EventDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.ready.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let events = st.decoder.push(bytes.as_ref());
                    st.enqueue(events);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(ApiError::Stream(e.to_string())), st));
                }
                None => {
                    let events = st.decoder.finish();
                    st.enqueue(events);
                    st.finished = true;
                }
            }
        }
    })
}

/// Callbacks receiving an answer stream
pub trait StreamHandler {
    fn on_chunk(&mut self, text: &str);
    fn on_complete(&mut self);
    fn on_error(&mut self, error: ApiError);
}

/// [`StreamHandler`] built from three closures
pub struct FnHandler<C, D, E> {
    on_chunk: C,
    on_complete: D,
    on_error: E,
}

impl<C, D, E> FnHandler<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(ApiError),
{
    pub fn new(on_chunk: C, on_complete: D, on_error: E) -> Self {
        Self {
            on_chunk,
            on_complete,
            on_error,
        }
    }
}

impl<C, D, E> StreamHandler for FnHandler<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(ApiError),
{
    fn on_chunk(&mut self, text: &str) {
        (self.on_chunk)(text)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }

    fn on_error(&mut self, error: ApiError) {
        (self.on_error)(error)
    }
}

/// Why a stream stopped short, and how much of it the caller already saw
#[derive(Debug)]
pub struct StreamFailure {
    pub error: ApiError,
    pub chunks_delivered: usize,
}

/// Read fragments from `body` into `on_chunk` until completion.
/// Returns the number of fragments delivered.
pub async fn read_fragments<S, B, E>(
    body: S,
    mut on_chunk: impl FnMut(&str),
) -> Result<usize, StreamFailure>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let fragments = text_stream(body);
    futures_util::pin_mut!(fragments);

    let mut delivered = 0;
    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => {
                on_chunk(&text);
                delivered += 1;
            }
            Err(error) => {
                return Err(StreamFailure {
                    error,
                    chunks_delivered: delivered,
                })
            }
        }
    }
    Ok(delivered)
}

/// Open the answer stream for `question` and read it into `on_chunk`
pub async fn open_and_read(
    client: &BackendClient,
    question: &str,
    on_chunk: impl FnMut(&str),
) -> Result<usize, StreamFailure> {
    let response = client
        .open_stream(question)
        .await
        .map_err(|error| StreamFailure {
            error,
            chunks_delivered: 0,
        })?;
    read_fragments(Box::pin(response.bytes_stream()), on_chunk).await
}

/// Drive `handler` from an already established body. Exactly one of
/// `on_complete` / `on_error` is called.
pub async fn consume<S, B, E, H>(body: S, handler: &mut H)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    H: StreamHandler,
{
    let result = read_fragments(body, |text| handler.on_chunk(text)).await;
    finish(result, handler);
}

/// Stream the answer to `question` into `handler`. Exactly one of
/// `on_complete` / `on_error` is called, including when the request cannot be
/// established.
pub async fn stream_query<H: StreamHandler>(client: &BackendClient, question: &str, handler: &mut H) {
    let result = open_and_read(client, question, |text| handler.on_chunk(text)).await;
    finish(result, handler);
}

fn finish<H: StreamHandler>(result: Result<usize, StreamFailure>, handler: &mut H) {
    match result {
        Ok(chunks) => {
            tracing::debug!(chunks, "answer stream complete");
            handler.on_complete();
        }
        Err(failure) => {
            tracing::warn!(
                error = %failure.error,
                chunks = failure.chunks_delivered,
                "answer stream failed"
            );
            handler.on_error(failure.error);
        }
    }
}
