//! Push-subscription envelopes
//!
//! A push delivery wraps the published payload as base64 inside
//! `{"message": {"data": "...", "messageId": "...", "publishTime": "..."}}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while unwrapping a push envelope. All are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The body is not a push envelope
    #[error("Invalid push envelope: {0}")]
    InvalidEnvelope(String),

    /// The envelope carries no `message.data`
    #[error("Push message has no data")]
    MissingData,

    /// `message.data` is not valid base64
    #[error("Invalid base64 data: {0}")]
    InvalidBase64(String),

    /// The decoded bytes are not UTF-8
    #[error("Decoded data is not UTF-8: {0}")]
    InvalidUtf8(String),
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    data: Option<String>,
    message_id: Option<String>,
    publish_time: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// Payload text and delivery metadata of one push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub message_id: Option<String>,
    pub publish_time: Option<String>,
    pub attributes: HashMap<String, String>,
    /// The published payload, UTF-8 decoded
    pub text: String,
}

/// Unwrap a push-subscription body into the published payload text
pub fn decode_push_message(body: &str) -> Result<DecodedMessage, MessageError> {
    let envelope: PushEnvelope =
        serde_json::from_str(body).map_err(|e| MessageError::InvalidEnvelope(e.to_string()))?;
    let message = envelope.message;
    let data = message.data.ok_or(MessageError::MissingData)?;

    Ok(DecodedMessage {
        message_id: message.message_id,
        publish_time: message.publish_time,
        attributes: message.attributes,
        text: decode_data(&data)?,
    })
}

/// Decode a base64 `data` field to UTF-8 text
pub fn decode_data(data: &str) -> Result<String, MessageError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| MessageError::InvalidBase64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| MessageError::InvalidUtf8(e.to_string()))
}
