//! SSE relay for streaming chat replies.
//!
//! The AI service streams `data: <token>` lines with a `data: [DONE]`
//! sentinel. Tokens can split anywhere across transport chunks, so bytes are
//! line-buffered before parsing. Each token is forwarded to the client as an
//! SSE event carrying `{"chunk", "chatId", "messageId"}`; when the upstream
//! stream ends the accumulated text becomes the assistant message's content.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::MaybeAuthUser;
use crate::chat::messages::{
    bump_chat_metadata, insert_message, load_history, normalize_role, parse_chat_id,
    resolve_or_create_chat, CreateMessageRequest,
};
use crate::errors::AppError;
use crate::models::chat::{MESSAGE_TYPE_TEXT, ROLE_ASSISTANT};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Upstream SSE parsing
// ────────────────────────────────────────────────────────────────────────────

/// Accumulates raw bytes and yields complete lines (trailing `\r` stripped).
/// A partial line stays buffered until the next chunk completes it, which
/// also keeps multi-byte UTF-8 sequences intact across chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseChunk {
    Token(String),
    Done,
}

/// Parses one upstream line. Blank separators and non-data lines yield None.
pub(crate) fn parse_sse_line(line: &str) -> Option<SseChunk> {
    let payload = line.strip_prefix("data: ")?;
    if payload == "[DONE]" {
        return Some(SseChunk::Done);
    }
    Some(SseChunk::Token(payload.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Relay
// ────────────────────────────────────────────────────────────────────────────

struct StreamRelay {
    upstream: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send + Sync + 'static>>,
    lines: SseLineBuffer,
    pending: VecDeque<String>,
    content: String,
    upstream_done: bool,
    db: PgPool,
    chat_id: Uuid,
    assistant_message_id: Uuid,
}

async fn next_relay_event(
    mut relay: StreamRelay,
) -> Option<(Result<Event, Infallible>, StreamRelay)> {
    loop {
        if let Some(token) = relay.pending.pop_front() {
            let payload = json!({
                "chunk": token,
                "chatId": relay.chat_id,
                "messageId": relay.assistant_message_id,
            });
            let event = Event::default().data(payload.to_string());
            return Some((Ok(event), relay));
        }

        if relay.upstream_done {
            finalize_assistant_message(&relay).await;
            return None;
        }

        match relay.upstream.next().await {
            Some(Ok(bytes)) => {
                for line in relay.lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        Some(SseChunk::Done) => {
                            relay.upstream_done = true;
                            break;
                        }
                        Some(SseChunk::Token(token)) => {
                            relay.content.push_str(&token);
                            relay.pending.push_back(token);
                        }
                        None => {}
                    }
                }
            }
            Some(Err(e)) => {
                tracing::error!("AI stream transport error: {e}");
                relay.upstream_done = true;
            }
            None => relay.upstream_done = true,
        }
    }
}

/// Writes the accumulated reply into the placeholder assistant message. Runs
/// whenever the upstream stream ends, including after transport errors, so a
/// partial reply is kept rather than lost.
async fn finalize_assistant_message(relay: &StreamRelay) {
    let updated = sqlx::query("UPDATE messages SET content = $1 WHERE id = $2")
        .bind(&relay.content)
        .bind(relay.assistant_message_id)
        .execute(&relay.db)
        .await;
    if let Err(e) = updated {
        tracing::error!(
            message_id = %relay.assistant_message_id,
            "failed to store streamed reply: {e}"
        );
        return;
    }
    if let Err(e) = bump_chat_metadata(&relay.db, relay.chat_id).await {
        tracing::error!(chat_id = %relay.chat_id, "failed to update chat metadata: {e}");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handler
// ────────────────────────────────────────────────────────────────────────────

/// POST /chats/:id/messages/stream
///
/// Persists the incoming message, creates an empty assistant message, then
/// relays the AI token stream. The assistant message id is in every event so
/// clients can reconcile after the stream closes.
pub async fn handle_stream_message(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(raw_chat_id): Path<String>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let requested_chat_id = parse_chat_id(&raw_chat_id)?;
    let role = normalize_role(body.role)?;

    let chat_id = resolve_or_create_chat(&state.db, requested_chat_id, user_id).await?;
    insert_message(
        &state.db,
        chat_id,
        &role,
        MESSAGE_TYPE_TEXT,
        &body.content,
        body.pdf_url.as_deref(),
    )
    .await?;
    let assistant = insert_message(&state.db, chat_id, ROLE_ASSISTANT, MESSAGE_TYPE_TEXT, "", None).await?;
    bump_chat_metadata(&state.db, chat_id).await?;

    // History already contains the empty assistant placeholder; the AI
    // service tolerates a trailing empty turn.
    let history = load_history(&state.db, chat_id).await?;
    let upstream = state
        .ai
        .chat_completion_stream(&history, user_id)
        .await
        .map_err(|e| AppError::Ai(format!("Failed to open completion stream: {e}")))?;

    tracing::debug!(chat_id = %chat_id, message_id = %assistant.id, "relaying completion stream");

    let relay = StreamRelay {
        upstream: Box::pin(upstream.bytes_stream()),
        lines: SseLineBuffer::default(),
        pending: VecDeque::new(),
        content: String::new(),
        upstream_done: false,
        db: state.db.clone(),
        chat_id,
        assistant_message_id: assistant.id,
    };

    Ok(Sse::new(futures::stream::unfold(relay, next_relay_event)))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_yields_complete_lines() {
        let mut buf = SseLineBuffer::default();
        let lines = buf.push(b"data: hello\n\ndata: world\n");
        assert_eq!(lines, vec!["data: hello", "", "data: world"]);
    }

    #[test]
    fn test_buffer_holds_partial_lines_across_pushes() {
        let mut buf = SseLineBuffer::default();
        assert!(buf.push(b"data: hel").is_empty());
        assert_eq!(buf.push(b"lo\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_buffer_strips_carriage_returns() {
        let mut buf = SseLineBuffer::default();
        assert_eq!(buf.push(b"data: x\r\n"), vec!["data: x"]);
    }

    #[test]
    fn test_buffer_reassembles_split_utf8() {
        let mut buf = SseLineBuffer::default();
        let bytes = "data: é\n".as_bytes();
        // split in the middle of the two-byte 'é'
        assert!(buf.push(&bytes[..7]).is_empty());
        assert_eq!(buf.push(&bytes[7..]), vec!["data: é"]);
    }

    #[test]
    fn test_parse_recognizes_tokens_and_sentinel() {
        assert_eq!(
            parse_sse_line("data: hello"),
            Some(SseChunk::Token("hello".into()))
        );
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseChunk::Done));
    }

    #[test]
    fn test_parse_ignores_blank_and_foreign_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: message"), None);
    }

    #[test]
    fn test_parse_keeps_empty_tokens() {
        // "data: " with nothing after it is an empty token, not a separator
        assert_eq!(parse_sse_line("data: "), Some(SseChunk::Token("".into())));
    }

    #[test]
    fn test_tokens_preserve_leading_whitespace() {
        assert_eq!(
            parse_sse_line("data:  indented"),
            Some(SseChunk::Token(" indented".into()))
        );
    }
}
