use super::messages::{ClientEvent, ServerEvent};

/// Default cap on one inbound text frame in bytes. Outbound frames are not capped.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024; // 1 MiB

/// Maximum chat message length in bytes.
pub const MAX_CHAT_LEN: usize = 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge { size: usize, max: usize },
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload too large: {size} bytes (max {max})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn encode<T: serde::Serialize>(event: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

fn decode<T: for<'de> serde::Deserialize<'de>>(
    text: &str,
    max_bytes: Option<usize>,
) -> Result<T, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if let Some(max) = max_bytes
        && text.len() > max
    {
        return Err(ProtocolError::PayloadTooLarge {
            size: text.len(),
            max,
        });
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Encode a `ServerEvent` to a JSON text frame.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    encode(event)
}

/// Encode a `ClientEvent` to a JSON text frame.
pub fn encode_client_event(event: &ClientEvent) -> Result<String, ProtocolError> {
    encode(event)
}

/// Decode a JSON text frame into a `ClientEvent`, refusing frames over
/// [`MAX_MESSAGE_SIZE`]. Unknown event names and payloads with missing fields
/// are errors.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    decode(text, Some(MAX_MESSAGE_SIZE))
}

/// Like [`decode_client_event`] with a caller-chosen frame limit.
pub fn decode_client_event_within(
    text: &str,
    max_bytes: usize,
) -> Result<ClientEvent, ProtocolError> {
    decode(text, Some(max_bytes))
}

/// Decode a JSON text frame into a `ServerEvent`. Server frames carry whole
/// boards and snapshots, so no size limit applies.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    decode(text, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallKind;
    use crate::net::messages::*;

    #[test]
    fn decodes_join_from_browser_json() {
        let raw = r#"{"event":"join","data":{"roomCode":"AB12CD","displayName":"alice"}}"#;
        let event = decode_client_event(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join(JoinMsg {
                room_code: "AB12CD".to_string(),
                display_name: "alice".to_string(),
            })
        );
        assert_eq!(event.name(), "join");
    }

    #[test]
    fn missing_fields_fail_to_decode() {
        let raw = r#"{"event":"join","data":{"roomCode":"AB12CD"}}"#;
        assert!(matches!(
            decode_client_event(raw),
            Err(ProtocolError::DeserializeError(_))
        ));
        let raw = r#"{"event":"chat","data":{"roomCode":"AB12CD"}}"#;
        assert!(decode_client_event(raw).is_err());
    }

    #[test]
    fn unknown_event_fails_to_decode() {
        let raw = r#"{"event":"self-destruct","data":{}}"#;
        assert!(decode_client_event(raw).is_err());
    }

    #[test]
    fn empty_and_oversized_frames_are_rejected() {
        assert!(matches!(
            decode_client_event("   "),
            Err(ProtocolError::EmptyMessage)
        ));
        let huge = format!(
            r#"{{"event":"chat","data":{{"roomCode":"A","text":"{}"}}}}"#,
            "x".repeat(MAX_MESSAGE_SIZE)
        );
        assert!(matches!(
            decode_client_event(&huge),
            Err(ProtocolError::PayloadTooLarge { max: MAX_MESSAGE_SIZE, .. })
        ));
    }

    #[test]
    fn inbound_limit_is_caller_chosen() {
        let raw = r#"{"event":"leave","data":{"roomCode":"AB12CD"}}"#;
        match decode_client_event_within(raw, 16) {
            Err(ProtocolError::PayloadTooLarge { size, max }) => {
                assert_eq!(size, raw.len());
                assert_eq!(max, 16);
            },
            other => panic!("Expected PayloadTooLarge, got {other:?}"),
        }
        assert!(decode_client_event_within(raw, raw.len()).is_ok());
    }

    #[test]
    fn multi_second_voice_clip_fits_default_limit() {
        // ~30 s of opus at 64 kbit/s, base64 encoded
        let audio = "A".repeat(320 * 1024);
        let raw = format!(
            r#"{{"event":"voice-message","data":{{"roomCode":"AB12CD","audio":"{audio}","duration":30}}}}"#
        );
        match decode_client_event(&raw).unwrap() {
            ClientEvent::VoiceMessage(v) => assert_eq!(v.audio.len(), audio.len()),
            other => panic!("Expected VoiceMessage, got {other:?}"),
        }
    }

    #[test]
    fn signal_payload_is_opaque() {
        let raw = r#"{"event":"signal-ice","data":{"roomCode":"AB12CD","payload":{"candidate":"candidate:1 1 UDP 2122252543 10.0.0.2 54321 typ host","sdpMid":"0"},"targetConnectionId":7}}"#;
        match decode_client_event(raw).unwrap() {
            ClientEvent::SignalIce(sig) => {
                assert_eq!(sig.target_connection_id, 7);
                assert_eq!(sig.payload["sdpMid"], "0");
            },
            other => panic!("Expected SignalIce, got {other:?}"),
        }
    }

    #[test]
    fn task_toggle_accepts_numeric_id() {
        let raw = r#"{"event":"task-toggle","data":{"roomCode":"AB12CD","taskId":42,"completed":true}}"#;
        match decode_client_event(raw).unwrap() {
            ClientEvent::TaskToggle(t) => {
                assert_eq!(t.task_id, "42");
                assert!(t.completed);
            },
            other => panic!("Expected TaskToggle, got {other:?}"),
        }
    }

    #[test]
    fn voice_message_accepts_audio_blob_alias() {
        let raw = r#"{"event":"voice-message","data":{"roomCode":"AB12CD","audioBlob":"UklGRg==","duration":3}}"#;
        match decode_client_event(raw).unwrap() {
            ClientEvent::VoiceMessage(v) => {
                assert_eq!(v.audio, "UklGRg==");
                assert!((v.duration - 3.0).abs() < f64::EPSILON);
            },
            other => panic!("Expected VoiceMessage, got {other:?}"),
        }
    }

    #[test]
    fn participants_wire_shape_is_a_bare_array() {
        let event = ServerEvent::Participants(vec!["alice".into(), "bob".into()]);
        let json: serde_json::Value =
            serde_json::from_str(&encode_server_event(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "participants");
        assert_eq!(json["data"], serde_json::json!(["alice", "bob"]));
    }

    #[test]
    fn call_started_wire_shape() {
        let event = ServerEvent::CallStarted(CallStartedMsg {
            room_code: "AB12CD".into(),
            kind: CallKind::Video,
            initiator: "alice".into(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&encode_server_event(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "call-started");
        assert_eq!(json["data"]["kind"], "video");
        assert_eq!(json["data"]["initiator"], "alice");
        assert_eq!(json["data"]["roomCode"], "AB12CD");
    }

    #[test]
    fn server_events_beyond_the_inbound_limit_still_encode() {
        let event = ServerEvent::Notice(NoticeMsg {
            text: "y".repeat(MAX_MESSAGE_SIZE + 1),
        });
        let text = encode_server_event(&event).unwrap();
        assert!(text.len() > MAX_MESSAGE_SIZE);
        assert_eq!(decode_server_event(&text).unwrap(), event);
    }
}
