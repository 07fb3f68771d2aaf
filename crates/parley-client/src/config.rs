//! Client configuration.

use std::{path::PathBuf, time::Duration};

use parley_proto::{FrameFormat, FrameHeader};

use crate::error::{Result, SessionError};

/// Connection and storage settings for one chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay host name or IP address
    pub relay_host: String,
    /// Relay TCP port
    pub relay_port: u16,
    /// Width of the ASCII length header, in bytes
    pub header_width: usize,
    /// Largest payload the receive loop will buffer
    pub max_payload_size: u64,
    /// Directory holding key registry and pair key files
    pub key_dir: PathBuf,
    /// How long to wait for the relay to accept the connection
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// `host:port` string for the relay.
    #[must_use]
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.relay_host, self.relay_port)
    }

    /// Frame format derived from the header width and payload ceiling.
    ///
    /// # Errors
    ///
    /// - `SessionError::Config` if the header width is outside
    ///   `1..=FrameHeader::MAX_WIDTH`
    pub fn frame_format(&self) -> Result<FrameFormat> {
        FrameFormat::new(self.header_width, self.max_payload_size).map_err(|e| {
            SessionError::Config {
                reason: format!("{e} (expected 1..={})", FrameHeader::MAX_WIDTH),
            }
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_host: "127.0.0.1".to_string(),
            relay_port: 1234,
            header_width: FrameHeader::DEFAULT_WIDTH,
            max_payload_size: FrameFormat::DEFAULT_MAX_PAYLOAD_SIZE,
            key_dir: PathBuf::from("."),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
