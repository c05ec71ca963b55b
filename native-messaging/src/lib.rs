//! Stdio job transport for the TryOn server.
//!
//! Each job is one frame: a 4-byte little-endian length followed by UTF-8
//! JSON `{route, request_id, payload}`. Each reply is framed the same way
//! as `{request_id, success, data?, error?}`.
//!
//! | Route     | Payload                                                     |
//! |-----------|-------------------------------------------------------------|
//! | `process` | canonical request fields plus `modelImage` / `clothImage` as base64 or `data:` URLs |
//! | `health`  | ignored                                                     |
//!
//! Successful `process` replies carry the result paths and, unless
//! disabled, the result images as base64 in `resultImages`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tryon_native_messaging::{run_host_with_state, NativeMessagingConfig};
//! # async fn example(state: Arc<dyn common::AppStateProvider>) -> anyhow::Result<()> {
//! run_host_with_state(state, NativeMessagingConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod config;
mod error;
mod images;
mod protocol;
mod router;

pub use config::NativeMessagingConfig;
pub use error::{ErrorResponse, NativeMessagingError, NativeMessagingResult};
pub use images::decode_image;
pub use protocol::{encode_frame, IncomingMessage, NativeMessagingProtocol, OutgoingMessage};
pub use router::MessageRouter;

use std::sync::Arc;

use common::AppStateProvider;
use tokio::io::{AsyncRead, AsyncWrite};

/// Job host: reads frames, dispatches them, writes replies.
pub struct NativeMessagingHost {
    router: MessageRouter,
    protocol: NativeMessagingProtocol,
}

impl NativeMessagingHost {
    /// Create a new host.
    pub fn new(state: Arc<dyn AppStateProvider>, config: NativeMessagingConfig) -> Self {
        Self {
            router: MessageRouter::new(state, config.clone()),
            protocol: NativeMessagingProtocol::new(config),
        }
    }

    /// Process a single message.
    pub async fn process_message(&self, message: IncomingMessage) -> NativeMessagingResult<OutgoingMessage> {
        self.router.dispatch(message).await
    }

    /// Serves jobs until `reader` reaches end of stream.
    ///
    /// A bad job gets an error reply and the loop moves on; only I/O
    /// failures on the reader end it.
    pub async fn run<R, W>(&self, reader: &mut R, writer: &mut W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("Job host starting message loop");

        loop {
            let response = match self.protocol.read_message(reader).await {
                Ok(None) => break,
                Ok(Some(message)) => {
                    let request_id = message.request_id.clone();
                    tracing::debug!(request_id = %request_id, route = %message.route, "Processing job");

                    match self.router.dispatch(message).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!(request_id = %request_id, error = %e, "Job rejected");
                            OutgoingMessage::error(request_id, e.into())
                        }
                    }
                }
                Err(NativeMessagingError::Io(e)) => {
                    return Err(anyhow::Error::new(e).context("Failed to read job stream"));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read message");
                    OutgoingMessage::error("unknown".to_string(), e.into())
                }
            };

            if let Err(e) = self.protocol.write_message(writer, &response).await {
                tracing::error!(request_id = %response.request_id, error = %e, "Failed to send response");
                if matches!(e, NativeMessagingError::Io(_)) {
                    return Err(anyhow::Error::new(e).context("Failed to write job stream"));
                }
                let fallback = OutgoingMessage::error(response.request_id, e.into());
                self.protocol.write_message(writer, &fallback).await?;
            }
        }

        tracing::info!("Job stream closed");
        Ok(())
    }
}

/// Runs the host on stdin/stdout.
pub async fn run_host_with_state(
    state: Arc<dyn AppStateProvider>,
    config: NativeMessagingConfig,
) -> anyhow::Result<()> {
    let host = NativeMessagingHost::new(state, config);
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    host.run(&mut stdin, &mut stdout).await
}
