//! Link configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interpretation of the header length byte.
///
/// Firmware revisions in the wild disagree on whether the third header
/// byte counts the padding. Neither form is "correct"; the mode must
/// match the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    /// The length byte is the original payload length; the ciphertext
    /// body is `length + padding` bytes. This is what current firmware
    /// does.
    #[default]
    ExcludesPadding,
    /// The length byte already counts the padding; the ciphertext body
    /// is exactly `length` bytes.
    IncludesPadding,
}

/// Configuration for one encrypted link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Header length-byte interpretation for this device revision.
    pub length_mode: LengthMode,
    /// How long a driver waits for the handshake response before the
    /// connection attempt fails.
    pub handshake_timeout: Duration,
    /// How long a driver waits for a request's response.
    pub response_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            length_mode: LengthMode::default(),
            handshake_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(5),
        }
    }
}
