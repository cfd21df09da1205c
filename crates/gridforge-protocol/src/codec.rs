//! JSON codec for the `{type, payload}` envelope.
//!
//! Client frames are decoded in two steps:
//!
//! 1. Parse the envelope: `type` must be a string, `payload` is kept as a
//!    raw [`serde_json::Value`]. Failing here is a [`ProtocolError::Decode`].
//! 2. Pick the payload schema from `type` and deserialize into it.
//!    Failing here is a [`ProtocolError::InvalidPayload`].
//!
//! A known envelope with an unknown `type` is not an error at all: it
//! decodes to [`ClientMessage::Unrecognized`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClientMessage, ProtocolError, ServerMessage};

/// The raw envelope, before its payload is interpreted.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Stateless JSON codec. Cheap to copy; one instance serves every
/// connection.
///
/// ## Example
///
/// ```rust
/// use gridforge_protocol::{ClientMessage, JsonCodec};
///
/// let frame = br#"{ "type": "join_room", "payload": { "room_id": "ab12" } }"#;
/// let msg = JsonCodec.decode_client(frame).unwrap();
/// assert_eq!(msg.kind(), "join_room");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Decodes one client frame.
    ///
    /// # Errors
    /// - [`ProtocolError::Decode`] if the frame is not an envelope.
    /// - [`ProtocolError::InvalidPayload`] if the payload doesn't match
    ///   the schema of its `type`.
    pub fn decode_client(&self, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let RawEnvelope { kind, payload } =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;

        let msg = match kind.as_str() {
            "create_room" => ClientMessage::CreateRoom(payload_as(&kind, payload)?),
            "join_room" => ClientMessage::JoinRoom(payload_as(&kind, payload)?),
            "make_move" => ClientMessage::MakeMove(payload_as(&kind, payload)?),
            // These two carry no payload; whatever was sent is ignored.
            "start_game" => ClientMessage::StartGame,
            "leave_room" => ClientMessage::LeaveRoom,
            _ => ClientMessage::Unrecognized(kind),
        };
        Ok(msg)
    }

    /// Encodes a server message as JSON text, ready for a text frame.
    pub fn encode_server(&self, msg: &ServerMessage) -> Result<String, ProtocolError> {
        serde_json::to_string(msg).map_err(ProtocolError::Encode)
    }

    /// Decodes a server frame. Used by clients and tests.
    pub fn decode_server(&self, data: &[u8]) -> Result<ServerMessage, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    /// Encodes a client message. Used by clients and tests.
    ///
    /// [`ClientMessage::Unrecognized`] cannot be encoded.
    pub fn encode_client(&self, msg: &ClientMessage) -> Result<String, ProtocolError> {
        serde_json::to_string(msg).map_err(ProtocolError::Encode)
    }
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ProtocolError> {
    // A missing or null payload is read as an empty object, so that
    // `{"type": "create_room"}` means "default capacity".
    let payload = match payload {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientId, CreateRoom, JoinRoom, MakeMove, RoomId};

    fn decode(json: &str) -> Result<ClientMessage, ProtocolError> {
        JsonCodec.decode_client(json.as_bytes())
    }

    #[test]
    fn test_decode_create_room_with_capacity() {
        let msg = decode(r#"{"type":"create_room","payload":{"max_players":4}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom(CreateRoom {
                max_players: Some(4)
            })
        );
    }

    #[test]
    fn test_decode_create_room_accepts_legacy_key() {
        let msg = decode(r#"{"type":"create_room","payload":{"max_Players":3}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom(CreateRoom {
                max_players: Some(3)
            })
        );
    }

    #[test]
    fn test_decode_create_room_without_payload() {
        let msg = decode(r#"{"type":"create_room"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom(CreateRoom::default()));

        let msg = decode(r#"{"type":"create_room","payload":null}"#).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom(CreateRoom::default()));
    }

    #[test]
    fn test_decode_join_room() {
        let msg = decode(r#"{"type":"join_room","payload":{"room_id":"ab12"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom(JoinRoom {
                room_id: RoomId::from("ab12")
            })
        );
    }

    #[test]
    fn test_decode_make_move_keeps_negative_coordinates() {
        let msg = decode(
            r#"{"type":"make_move","payload":{"room_id":"r","row":-1,"col":2,"answer":"x"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakeMove(MakeMove {
                room_id: RoomId::from("r"),
                row: -1,
                col: 2,
                answer: "x".into(),
            })
        );
    }

    #[test]
    fn test_decode_unit_messages_ignore_payload() {
        assert_eq!(
            decode(r#"{"type":"start_game","payload":{"junk":true}}"#).unwrap(),
            ClientMessage::StartGame
        );
        assert_eq!(decode(r#"{"type":"leave_room"}"#).unwrap(), ClientMessage::LeaveRoom);
    }

    #[test]
    fn test_decode_unknown_type_is_unrecognized() {
        let msg = decode(r#"{"type":"fly_to_moon","payload":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unrecognized("fly_to_moon".into()));
    }

    #[test]
    fn test_decode_malformed_json_fails() {
        assert!(matches!(decode("{not json"), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode(r#"{"payload":{}}"#), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode(r#"{"type":7}"#), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_bad_payload_names_kind() {
        let err = decode(r#"{"type":"make_move","payload":{"room_id":"r","row":"zero","col":0}}"#)
            .unwrap_err();
        match err {
            ProtocolError::InvalidPayload { kind, .. } => assert_eq!(kind, "make_move"),
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_server_then_decode() {
        let msg = ServerMessage::Connected {
            client_id: ClientId(5),
        };
        let text = JsonCodec.encode_server(&msg).unwrap();
        assert_eq!(JsonCodec.decode_server(text.as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_encoded_client_message_decodes() {
        let msg = ClientMessage::JoinRoom(JoinRoom {
            room_id: RoomId::from("r9"),
        });
        let text = JsonCodec.encode_client(&msg).unwrap();
        assert_eq!(decode(&text).unwrap(), msg);

        let text = JsonCodec.encode_client(&ClientMessage::StartGame).unwrap();
        assert_eq!(decode(&text).unwrap(), ClientMessage::StartGame);
    }
}
