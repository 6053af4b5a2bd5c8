use super::{Command, Event};
use crate::error::CodecError;

/// Encode a command into the text payload of a WebSocket frame.
pub fn encode_command(cmd: &Command) -> Result<String, CodecError> {
    serde_json::to_string(cmd).map_err(CodecError::Encode)
}

/// Decode a text payload into an event. The `type` discriminant selects the
/// variant; unknown types and missing fields are decode errors.
pub fn decode_event(payload: &str) -> Result<Event, CodecError> {
    serde_json::from_str(payload).map_err(CodecError::Decode)
}
