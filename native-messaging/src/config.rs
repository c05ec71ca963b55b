//! Configuration for the stdio job host.

use serde::{Deserialize, Serialize};

/// Configuration for the native messaging host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeMessagingConfig {
    /// Largest frame accepted or emitted, in bytes. Frames carry base64
    /// images so this is far above the browser extension limit.
    pub max_message_size: usize,

    /// Attach base64 result images to successful `process` responses.
    pub include_result_images: bool,
}

impl Default for NativeMessagingConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024,
            include_result_images: true,
        }
    }
}
