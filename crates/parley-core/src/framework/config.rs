//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do with a message whose sender is missing from the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSenderPolicy {
    /// Dispatch it anyway; handlers see `from_user == None`.
    #[default]
    Deliver,
    /// Log it and dispatch nothing.
    Drop,
}

/// Configuration of the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long the ack correlator waits for an acknowledgement, in seconds.
    pub ack_timeout_secs: u64,
    /// Capacity of the outgoing message queue. A full queue blocks senders.
    pub outgoing_buffer: usize,
    /// Pause between two outgoing messages, in milliseconds.
    pub send_interval_ms: u64,
    /// Handling of messages from senders the directory does not know.
    pub unknown_sender: UnknownSenderPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: 20,
            outgoing_buffer: 500,
            send_interval_ms: 50,
            unknown_sender: UnknownSenderPolicy::Deliver,
        }
    }
}

impl EngineConfig {
    /// The ack correlator's bound.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// The pause between outgoing messages.
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}
