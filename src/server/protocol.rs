//! Wire protocol for the download WebSocket.

use serde::Serialize;
use serde_json::Value;

use crate::session::ProgressUpdate;

/// Parsed inbound control message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Start a download.
    Download {
        url: String,
        format_id: Option<String>,
    },
    /// Cancel a session.
    Cancel { session_id: String },
    /// Understood structurally but rejected; the message explains why.
    /// The connection stays open.
    Invalid { message: String },
}

/// Parse one raw text frame.
///
/// A JSON object is interpreted as a structured control message; anything
/// that does not parse as one is treated as a bare URL (download shorthand).
pub fn parse_inbound(raw: &str) -> InboundMessage {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return InboundMessage::Download {
                url: raw.trim().to_string(),
                format_id: None,
            }
        }
    };

    let obj = match value {
        Value::Object(obj) => obj,
        // A JSON string is shorthand for its content as a URL
        Value::String(s) => {
            return InboundMessage::Download {
                url: s.trim().to_string(),
                format_id: None,
            }
        }
        _ => {
            return InboundMessage::Download {
                url: raw.trim().to_string(),
                format_id: None,
            }
        }
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("download") => match obj.get("url").and_then(Value::as_str) {
            Some(url) if !url.trim().is_empty() => InboundMessage::Download {
                url: url.trim().to_string(),
                format_id: obj
                    .get("format_id")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
            },
            _ => InboundMessage::Invalid {
                message: "download request is missing a url".to_string(),
            },
        },
        Some("cancel") => match obj.get("session_id").and_then(Value::as_str) {
            Some(session_id) if !session_id.is_empty() => InboundMessage::Cancel {
                session_id: session_id.to_string(),
            },
            _ => InboundMessage::Invalid {
                message: "cancel request is missing a session_id".to_string(),
            },
        },
        Some(other) => InboundMessage::Invalid {
            message: format!("unsupported message type '{}'", other),
        },
        None => InboundMessage::Invalid {
            message: "message has no type field".to_string(),
        },
    }
}

/// Event sent to a client over its WebSocket.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutboundEvent {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: u64,
        speed: f64,
        eta: u64,
    },
    Processing,
    Complete {
        file_path: String,
    },
    Error {
        message: String,
    },
    Cancelled,
}

impl From<&ProgressUpdate> for OutboundEvent {
    fn from(update: &ProgressUpdate) -> Self {
        match update {
            ProgressUpdate::Downloading {
                downloaded_bytes,
                total_bytes,
                speed,
                eta,
            } => OutboundEvent::Downloading {
                downloaded_bytes: *downloaded_bytes,
                total_bytes: *total_bytes,
                speed: *speed,
                eta: *eta,
            },
            ProgressUpdate::Processing => OutboundEvent::Processing,
            ProgressUpdate::Complete { file_path } => OutboundEvent::Complete {
                file_path: file_path.display().to_string(),
            },
            ProgressUpdate::Error { message } => OutboundEvent::Error {
                message: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_message() {
        let msg = parse_inbound(r#"{"type":"download","url":"https://youtu.be/x","format_id":"22"}"#);
        assert_eq!(
            msg,
            InboundMessage::Download {
                url: "https://youtu.be/x".to_string(),
                format_id: Some("22".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_download_without_format() {
        let msg = parse_inbound(r#"{"type":"download","url":"https://youtu.be/x"}"#);
        assert_eq!(
            msg,
            InboundMessage::Download {
                url: "https://youtu.be/x".to_string(),
                format_id: None,
            }
        );
    }

    #[test]
    fn test_parse_download_missing_url_is_invalid_not_fatal() {
        let msg = parse_inbound(r#"{"type":"download"}"#);
        assert!(matches!(msg, InboundMessage::Invalid { .. }));
    }

    #[test]
    fn test_parse_cancel_message() {
        let msg = parse_inbound(r#"{"type":"cancel","session_id":"abc"}"#);
        assert_eq!(
            msg,
            InboundMessage::Cancel {
                session_id: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = parse_inbound(r#"{"type":"reboot"}"#);
        match msg {
            InboundMessage::Invalid { message } => assert!(message.contains("reboot")),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_url_shorthand() {
        let msg = parse_inbound("https://www.youtube.com/watch?v=abc");
        assert_eq!(
            msg,
            InboundMessage::Download {
                url: "https://www.youtube.com/watch?v=abc".to_string(),
                format_id: None,
            }
        );
    }

    #[test]
    fn test_parse_json_string_shorthand() {
        let msg = parse_inbound(r#""https://youtu.be/x""#);
        assert_eq!(
            msg,
            InboundMessage::Download {
                url: "https://youtu.be/x".to_string(),
                format_id: None,
            }
        );
    }

    #[test]
    fn test_outbound_event_wire_shapes() {
        let downloading = OutboundEvent::Downloading {
            downloaded_bytes: 512,
            total_bytes: 1024,
            speed: 100.0,
            eta: 5,
        };
        let json: Value = serde_json::from_str(&serde_json::to_string(&downloading).unwrap()).unwrap();
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["downloaded_bytes"], 512);
        assert_eq!(json["total_bytes"], 1024);

        let cancelled = serde_json::to_string(&OutboundEvent::Cancelled).unwrap();
        assert_eq!(cancelled, r#"{"status":"cancelled"}"#);

        let complete = OutboundEvent::Complete {
            file_path: "/tmp/a.mp4".to_string(),
        };
        let json: Value = serde_json::from_str(&serde_json::to_string(&complete).unwrap()).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["file_path"], "/tmp/a.mp4");
    }

    #[test]
    fn test_outbound_from_progress_update() {
        let update = ProgressUpdate::Complete {
            file_path: std::path::PathBuf::from("/tmp/out.mp4"),
        };
        assert_eq!(
            OutboundEvent::from(&update),
            OutboundEvent::Complete {
                file_path: "/tmp/out.mp4".to_string(),
            }
        );
    }
}
