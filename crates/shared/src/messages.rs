//! WebSocket message types for the console subscription channel.
//!
//! The engine pushes [`ConsoleFrame`]s to every subscriber of a session;
//! byte chunks travel base64-encoded inside JSON text frames so the channel
//! stays debuggable with plain WebSocket tooling.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing or renaming variants is a breaking change

use serde::{Deserialize, Serialize};

use simbench_domain::SessionId;

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// One framed chunk of backend console output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleFrame {
    pub session_id: SessionId,
    pub stream: ConsoleStream,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Messages from engine to console subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleMessage {
    /// Subscription acknowledged.
    Subscribed { session_id: SessionId },
    /// A chunk of console output.
    Output(ConsoleFrame),
    /// The session's child process is gone; no further output will follow.
    Closed { session_id: SessionId },
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
