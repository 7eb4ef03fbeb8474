//! # Server-sent events decoding.
//!
//! [`SseDecoder`] turns an arbitrary chunking of a `text/event-stream` body
//! into complete [`SseFrame`]s. [`decode_stream`] lifts it over a byte stream
//! and yields [`ServerMessage`]s.
//!
//! ## Rules
//! - Lines end with `\n` or `\r\n`; a blank line dispatches the frame
//! - `:` lines are comments (the server's keep-alives)
//! - Multiple `data:` lines are joined with `\n`
//! - A frame without `data:` is discarded
//! - A partial trailing line is kept until the next chunk completes it

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};

use crate::error::ClientError;
use crate::transport::MessageStream;
use crate::transport::message::ServerMessage;

/// One dispatched event-stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, if any.
    pub event: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
    /// Last seen `id:` field.
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" => self.last_id = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
        })
    }
}

/// Decodes a streamed event-stream body into server messages.
///
/// Body errors are surfaced as [`ClientError::Http`]; frames that fail to
/// decode surface as [`ClientError::Decode`] and the stream continues.
pub fn decode_stream<S, E>(body: S) -> MessageStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + 'static,
{
    let state = (body.boxed(), SseDecoder::default(), VecDeque::<SseFrame>::new());
    stream::unfold(state, |(mut body, mut decoder, mut pending)| async move {
        loop {
            if let Some(frame) = pending.pop_front() {
                let msg = ServerMessage::from_frame(&frame);
                return Some((msg, (body, decoder, pending)));
            }
            match body.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                Some(Err(err)) => {
                    let err = ClientError::Http {
                        reason: format!("push channel read failed: {err}"),
                    };
                    return Some((Err(err), (body, decoder, pending)));
                }
                None => return None,
            }
        }
    })
    .boxed()
}
