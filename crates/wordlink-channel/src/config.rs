use std::time::Duration;

use serde::{Deserialize, Serialize};
use wordlink_frame::DEFAULT_ETHERTYPE;

use crate::error::{ChannelError, Result};

/// Receive buffer size on each endpoint; also the initial transmit credit.
pub const DEFAULT_WINDOW: usize = 512;

/// Largest message body accepted by default, in chunks.
pub const DEFAULT_MAX_MESSAGE_CHUNKS: u32 = 64 * 1024;

/// Upper bound for `max_message_chunks` (8 MiB of body). The body of an
/// inbound message is allocated when its header arrives, so this caps what
/// a single corrupt header can cost.
pub const MESSAGE_CHUNKS_LIMIT: u32 = 1 << 20;

/// Peer discovery behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long to listen for ping responses, in milliseconds.
    pub timeout_ms: u64,
    /// Fail when more than one distinct peer answers.
    pub require_single_peer: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 200,
            require_single_peer: true,
        }
    }
}

impl DiscoveryConfig {
    /// Listening period as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Channel configuration.
///
/// Both endpoints must agree on `window` and `ethertype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Credit window. Must equal the remote receive buffer size; the local
    /// receive buffer is sized to it as well.
    pub window: usize,
    /// Link-type tag identifying this protocol.
    pub ethertype: u16,
    /// Largest inbound message body, in chunks.
    pub max_message_chunks: u32,
    /// Receive wait before the background loop re-checks for shutdown.
    pub poll_interval_ms: u64,
    /// Name of the background receiver thread.
    pub receiver_thread_name: String,
    pub discovery: DiscoveryConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            ethertype: DEFAULT_ETHERTYPE,
            max_message_chunks: DEFAULT_MAX_MESSAGE_CHUNKS,
            poll_interval_ms: 50,
            receiver_thread_name: "wordlink-rx".to_string(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// Override the credit window.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Override the link-type tag.
    pub fn with_ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    /// Override the inbound message size limit.
    pub fn with_max_message_chunks(mut self, max: u32) -> Self {
        self.max_message_chunks = max;
        self
    }

    /// Override discovery behavior.
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    /// Receive poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ChannelError::InvalidConfig(
                "window must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ChannelError::InvalidConfig(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.max_message_chunks > MESSAGE_CHUNKS_LIMIT {
            return Err(ChannelError::InvalidConfig(format!(
                "max_message_chunks {} exceeds limit {MESSAGE_CHUNKS_LIMIT}",
                self.max_message_chunks
            )));
        }
        if self.receiver_thread_name.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "receiver_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
