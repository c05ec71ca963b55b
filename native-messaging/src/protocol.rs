//! Framing: a 4-byte little-endian length followed by that many bytes of
//! UTF-8 JSON, in both directions.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::NativeMessagingConfig;
use crate::error::{ErrorResponse, NativeMessagingError, NativeMessagingResult};

/// Incoming job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// `process` or `health`.
    pub route: String,

    /// Client-generated request ID for correlation
    pub request_id: String,

    /// Route-specific request payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Outgoing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Echo back the client request ID
    pub request_id: String,

    /// Indicates success or failure
    pub success: bool,

    /// Response data (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error details (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl OutgoingMessage {
    /// Create a success response.
    pub fn success(request_id: String, data: serde_json::Value) -> Self {
        Self {
            request_id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(request_id: String, error: ErrorResponse) -> Self {
        Self {
            request_id,
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Frame reader and writer.
pub struct NativeMessagingProtocol {
    config: NativeMessagingConfig,
}

impl NativeMessagingProtocol {
    /// Create a new protocol handler.
    pub fn new(config: NativeMessagingConfig) -> Self {
        Self { config }
    }

    /// Reads one frame. `Ok(None)` means the peer closed the stream.
    ///
    /// Oversized frames are drained before the error is returned so the
    /// stream stays aligned on the next header.
    pub async fn read_message<R>(&self, reader: &mut R) -> NativeMessagingResult<Option<IncomingMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let mut length_bytes = [0u8; 4];
        match reader.read_exact(&mut length_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let message_length = u32::from_le_bytes(length_bytes) as usize;
        if message_length == 0 {
            return Err(NativeMessagingError::protocol("Message length cannot be zero"));
        }
        if message_length > self.config.max_message_size {
            let mut skipped = (&mut *reader).take(message_length as u64);
            tokio::io::copy(&mut skipped, &mut tokio::io::sink()).await?;
            return Err(NativeMessagingError::protocol(format!(
                "Message length {} exceeds maximum size {}",
                message_length, self.config.max_message_size
            )));
        }

        let mut message_bytes = vec![0u8; message_length];
        reader.read_exact(&mut message_bytes).await.map_err(|e| {
            NativeMessagingError::protocol(format!("Failed to read message payload: {}", e))
        })?;

        let message = decode_payload(&message_bytes)?;
        validate_incoming_message(&message)?;
        Ok(Some(message))
    }

    /// Writes one frame and flushes.
    pub async fn write_message<W>(&self, writer: &mut W, message: &OutgoingMessage) -> NativeMessagingResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = encode_frame(message)?;
        if frame.len() - 4 > self.config.max_message_size {
            return Err(NativeMessagingError::protocol(format!(
                "Response message length {} exceeds maximum size {}",
                frame.len() - 4,
                self.config.max_message_size
            )));
        }
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Parse a message from raw bytes.
    pub fn parse_message(data: &[u8]) -> NativeMessagingResult<IncomingMessage> {
        let (header, rest) = data
            .split_first_chunk::<4>()
            .ok_or_else(|| NativeMessagingError::protocol("Data too short for length header"))?;
        let message_length = u32::from_le_bytes(*header) as usize;
        let payload = rest
            .get(..message_length)
            .ok_or_else(|| NativeMessagingError::protocol("Data too short for message payload"))?;
        decode_payload(payload)
    }
}

/// Serializes `message` into a length-prefixed frame.
pub fn encode_frame<T: Serialize>(message: &T) -> NativeMessagingResult<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    let length = u32::try_from(body.len())
        .map_err(|_| NativeMessagingError::protocol("Message does not fit a 32-bit length"))?;
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn decode_payload(bytes: &[u8]) -> NativeMessagingResult<IncomingMessage> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| NativeMessagingError::protocol(format!("Invalid UTF-8 in message: {}", e)))?;
    serde_json::from_str(text)
        .map_err(|e| NativeMessagingError::protocol(format!("Invalid JSON in message: {}", e)))
}

fn validate_incoming_message(message: &IncomingMessage) -> NativeMessagingResult<()> {
    if message.route.is_empty() {
        return Err(NativeMessagingError::validation("route", "Route cannot be empty"));
    }
    if message.request_id.is_empty() {
        return Err(NativeMessagingError::validation("request_id", "Request ID cannot be empty"));
    }
    if !message
        .route
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(NativeMessagingError::validation(
            "route",
            "Route must contain only alphanumeric characters, underscores, and hyphens",
        ));
    }
    Ok(())
}
