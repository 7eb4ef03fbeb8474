//! # Push channel messages.
//!
//! Maps event-stream frames onto [`ServerMessage`]:
//!
//! ```text
//! event: connected    data: {"clientId": ...}           → Connected
//! (unnamed)           data: {"type":"connected", ...}   → Connected
//! event: task_update  data: {"taskId", "status", ...}   → TaskUpdate(TaskEvent)
//! event: heartbeat    data: {"timestamp": ...}          → Heartbeat
//! anything else                                         → Other
//! ```
//!
//! Task update fields are tolerant: `error` may be a string or an object with a
//! `message`, `progress` a number or numeric string, `output` a string or a
//! list of strings (the first is used). Unknown fields land in the event payload.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::events::TaskEvent;
use crate::transport::sse::SseFrame;

/// Decoded push channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Handshake carrying the server-assigned client id.
    Connected {
        /// Id to send as `X-Client-ID`.
        client_id: String,
    },
    /// Task status update.
    TaskUpdate(TaskEvent),
    /// Keep-alive.
    Heartbeat,
    /// A frame this client does not act on.
    Other {
        /// Event name (or `type` of an unnamed frame).
        event: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskUpdateWire {
    task_id: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    progress: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TaskUpdateWire {
    fn into_event(self) -> TaskEvent {
        let mut ev = TaskEvent::new(self.task_id, self.status);
        ev.message = self.message;
        ev.error = self.error.as_ref().and_then(error_text);
        ev.progress = self.progress.as_ref().and_then(progress_value);
        ev.output = self.output.as_ref().and_then(output_url);
        if ev.output.is_none() {
            if let Some(raw) = self.output {
                ev.payload.insert("output".to_owned(), raw);
            }
        }
        ev.payload.extend(self.rest);
        ev
    }
}

impl ServerMessage {
    /// Decodes one event-stream frame.
    pub fn from_frame(frame: &SseFrame) -> Result<Self, ClientError> {
        match frame.event.as_deref() {
            Some("connected") => decode_connected(&parse(&frame.data)?),
            Some("task_update") => decode_task_update(&frame.data),
            Some("heartbeat") => Ok(ServerMessage::Heartbeat),
            None | Some("message") => Self::from_unnamed(&frame.data),
            Some(other) => Ok(ServerMessage::Other {
                event: other.to_owned(),
            }),
        }
    }

    fn from_unnamed(data: &str) -> Result<Self, ClientError> {
        let value = parse(data)?;
        match value.get("type").and_then(Value::as_str) {
            Some("connected") => decode_connected(&value),
            Some("task_update") => decode_task_update(data),
            Some("heartbeat") => Ok(ServerMessage::Heartbeat),
            Some(other) => Ok(ServerMessage::Other {
                event: other.to_owned(),
            }),
            None => Ok(ServerMessage::Other {
                event: "message".to_owned(),
            }),
        }
    }
}

fn parse(data: &str) -> Result<Value, ClientError> {
    Ok(serde_json::from_str(data)?)
}

fn decode_connected(value: &Value) -> Result<ServerMessage, ClientError> {
    value
        .get("clientId")
        .and_then(Value::as_str)
        .map(|id| ServerMessage::Connected {
            client_id: id.to_owned(),
        })
        .ok_or_else(|| ClientError::Decode {
            reason: "connected frame without clientId".to_owned(),
        })
}

fn decode_task_update(data: &str) -> Result<ServerMessage, ClientError> {
    let wire: TaskUpdateWire = serde_json::from_str(data)?;
    Ok(ServerMessage::TaskUpdate(wire.into_event()))
}

fn error_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(v.to_string())),
        other => Some(other.to_string()),
    }
}

fn progress_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn output_url(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskStatus;

    fn frame(event: Option<&str>, data: &str) -> SseFrame {
        SseFrame {
            event: event.map(str::to_owned),
            data: data.to_owned(),
            id: None,
        }
    }

    #[test]
    fn named_and_unnamed_handshakes() {
        let named = ServerMessage::from_frame(&frame(Some("connected"), r#"{"clientId":"c1"}"#));
        assert_eq!(
            named.unwrap(),
            ServerMessage::Connected {
                client_id: "c1".into()
            }
        );

        let unnamed =
            ServerMessage::from_frame(&frame(None, r#"{"type":"connected","clientId":"c2"}"#));
        assert_eq!(
            unnamed.unwrap(),
            ServerMessage::Connected {
                client_id: "c2".into()
            }
        );
    }

    #[test]
    fn handshake_without_client_id_is_a_decode_error() {
        let err = ServerMessage::from_frame(&frame(Some("connected"), "{}")).unwrap_err();
        assert_eq!(err.as_label(), "decode_error");
    }

    #[test]
    fn task_update_fields() {
        let data = r#"{
            "taskId": "t1",
            "status": "succeeded",
            "output": ["https://cdn/t1.wav"],
            "progress": "100%",
            "retryCount": 1,
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let Ok(ServerMessage::TaskUpdate(ev)) =
            ServerMessage::from_frame(&frame(Some("task_update"), data))
        else {
            panic!("expected task update");
        };
        assert_eq!(ev.task_id, "t1");
        assert_eq!(ev.status, TaskStatus::Succeeded);
        assert_eq!(ev.audio_url(), Some("https://cdn/t1.wav"));
        assert_eq!(ev.progress, Some(100.0));
        assert_eq!(ev.payload.get("retryCount"), Some(&Value::from(1)));
        assert!(ev.payload.contains_key("timestamp"));
    }

    #[test]
    fn error_object_is_flattened_to_message() {
        let data = r#"{"taskId":"t1","status":"failed","error":{"message":"voice missing","code":4}}"#;
        let Ok(ServerMessage::TaskUpdate(ev)) =
            ServerMessage::from_frame(&frame(Some("task_update"), data))
        else {
            panic!("expected task update");
        };
        assert_eq!(ev.failure_reason(), "voice missing");
    }

    #[test]
    fn malformed_task_update_is_a_decode_error() {
        let err = ServerMessage::from_frame(&frame(Some("task_update"), r#"{"status":"queued"}"#))
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn unknown_events_are_other() {
        let msg = ServerMessage::from_frame(&frame(Some("announcement"), "{}")).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Other {
                event: "announcement".into()
            }
        );
    }
}
