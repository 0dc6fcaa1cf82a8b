//! The client→server chat payload and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chat message as sent over the wire.
///
/// Both fields are optional on the wire (a missing field decodes to an
/// empty string), but a message carrying neither a handle nor text is
/// rejected. The relay never re-serializes this struct (the original
/// payload bytes are forwarded verbatim), so decoding exists purely to
/// validate shape and content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender-supplied display name.
    #[serde(default)]
    pub handle: String,
    /// Message body.
    #[serde(default)]
    pub text: String,
}

/// Why an inbound payload was rejected.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The payload is not JSON of the expected two-field shape.
    #[error("malformed message payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// Both `handle` and `text` decoded to empty strings.
    #[error("message has neither handle nor text")]
    Empty,
}

impl Message {
    /// Decode and validate a raw text payload.
    ///
    /// Pure function: no side effects, no shared state. Unknown fields in
    /// the payload are ignored here and pass through the relay untouched.
    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        let message: Self = serde_json::from_str(raw)?;
        if message.handle.is_empty() && message.text.is_empty() {
            return Err(MessageError::Empty);
        }
        Ok(message)
    }
}
