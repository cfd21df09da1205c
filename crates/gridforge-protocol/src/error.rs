//! Error types for the protocol layer.
//!
//! Each crate in Gridforge defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the shape of a frame, not in
//! networking or game rules.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a `{type, payload}` envelope at all.
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a
    /// non-string `type`. The connection ignores such frames.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope is fine but its payload doesn't match the schema of
    /// its `type`, e.g. `make_move` with `"row": "zero"`.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
