//! Decoder for the `/translate-stream` body.
//!
//! The backend writes server-sent-event style lines:
//!
//! ```text
//! data: {"type": "start"}
//! data: {"type": "chunk", "accumulated": "Hi"}
//! data: {"type": "complete", "content": "Hi there."}
//! ```
//!
//! `chunk` events carry the cumulative text so far, not a delta. Lines are
//! reassembled across read boundaries before decoding, so a multibyte
//! character split between two reads is never mangled. Malformed payloads are
//! logged and skipped; the stream keeps going.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::api::ApiError;

const DATA_PREFIX: &str = "data: ";

/// One decoded event from the translation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationEvent {
    Start,
    /// Full text translated so far.
    Chunk { accumulated: String },
    /// Final text. No further events are expected.
    Complete { content: String },
    Error { message: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    accumulated: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Longest line kept in memory. Anything longer is logged and dropped.
const MAX_LINE_BYTES: usize = 1 << 20;

/// Push decoder: feed raw body bytes, get back complete events.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already searched for a newline.
    scanned: usize,
    /// Inside an oversized line; skip up to the next newline.
    overflow: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<TranslationEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            if self.overflow {
                self.overflow = false;
            } else if let Some(event) = decode_line(&self.buf[start..end]) {
                events.push(event);
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > MAX_LINE_BYTES {
            tracing::warn!(bytes = self.buf.len(), "dropping oversized stream line");
            self.buf.clear();
            self.scanned = 0;
            self.overflow = true;
        }
        events
    }

    /// Decode whatever is left once the body has ended without a final newline.
    pub fn finish(&mut self) -> Option<TranslationEvent> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if std::mem::take(&mut self.overflow) || rest.is_empty() {
            None
        } else {
            decode_line(&rest)
        }
    }
}

fn decode_line(raw: &[u8]) -> Option<TranslationEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let raw: RawEvent = match serde_json::from_str(payload) {
        Ok(r) => r,
        Err(e) => {
            let preview: String = payload.chars().take(120).collect();
            tracing::warn!(error = %e, payload = %preview, "skipping malformed stream line");
            return None;
        }
    };

    match raw.kind.as_str() {
        "start" => Some(TranslationEvent::Start),
        "chunk" => Some(TranslationEvent::Chunk {
            accumulated: raw.accumulated.unwrap_or_default(),
        }),
        "complete" => Some(TranslationEvent::Complete {
            content: raw.content.unwrap_or_default(),
        }),
        "error" => Some(TranslationEvent::Error {
            message: raw
                .content
                .unwrap_or_else(|| "unknown translation error".to_string()),
        }),
        other => {
            tracing::debug!(kind = other, "ignoring unknown stream event");
            None
        }
    }
}

struct DecodeState<S> {
    body: S,
    decoder: EventDecoder,
    pending: VecDeque<TranslationEvent>,
    done: bool,
}

/// Lazily decode a byte stream into translation events.
///
/// Transport errors from `body` are yielded once and end the stream. The
/// returned stream is single-pass.
pub fn decode_events<S, B>(body: S) -> impl Stream<Item = Result<TranslationEvent, ApiError>>
where
    S: Stream<Item = Result<B, ApiError>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = DecodeState {
        body,
        decoder: EventDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.pending.extend(st.decoder.push(chunk.as_ref()));
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
}

/// Visible state of an in-progress translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationAccumulator {
    text: String,
    streaming: bool,
    complete: bool,
}

impl TranslationAccumulator {
    /// A fresh accumulator, already in streaming mode.
    pub fn new() -> Self {
        Self {
            text: String::new(),
            streaming: true,
            complete: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Apply one event. Returns `Ok(true)` when the visible text changed.
    pub fn apply(&mut self, event: TranslationEvent) -> Result<bool, ApiError> {
        match event {
            TranslationEvent::Start => {
                let changed = !self.text.is_empty();
                self.text.clear();
                Ok(changed)
            }
            TranslationEvent::Chunk { accumulated } => {
                let changed = self.text != accumulated;
                self.text = accumulated;
                Ok(changed)
            }
            TranslationEvent::Complete { content } => {
                let changed = self.text != content;
                self.text = content;
                self.streaming = false;
                self.complete = true;
                Ok(changed)
            }
            TranslationEvent::Error { message } => {
                self.streaming = false;
                Err(ApiError::Stream(message))
            }
        }
    }

    /// Leave streaming mode without completing, e.g. after a transport error.
    pub fn stop(&mut self) {
        self.streaming = false;
    }

    /// Called when the body ends. A stream that never completed is an error.
    pub fn finish(&mut self) -> Result<String, ApiError> {
        self.streaming = false;
        if self.complete {
            Ok(self.text.clone())
        } else {
            Err(ApiError::StreamIncomplete)
        }
    }
}
