//! Typed out-of-band stimuli for event injection.
//!
//! Payloads are a closed enum rather than free-form maps, so an unknown
//! event type or a mistyped field is a deserialization error at the API
//! boundary instead of a silent zero deep in an adapter.

use serde::{Deserialize, Serialize};

/// An out-of-band stimulus applied to a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetEvent {
    /// Drive a GPIO line.
    Gpio { pin: u32, state: bool },
    /// Write text into a UART receiver.
    Uart { data: String },
    /// Send a key chord (emulator input injection).
    Key { keys: String },
    /// Move the pointer (emulator input injection).
    Mouse {
        dx: i32,
        dy: i32,
        #[serde(default)]
        buttons: u8,
    },
}

impl TargetEvent {
    /// The event's type tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gpio { .. } => "gpio",
            Self::Uart { .. } => "uart",
            Self::Key { .. } => "key",
            Self::Mouse { .. } => "mouse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpio_event_round_trips() {
        let event = TargetEvent::Gpio { pin: 4, state: true };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""type":"gpio""#));
        let back: TargetEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let result: Result<TargetEvent, _> =
            serde_json::from_str(r#"{"type":"can","id":123}"#);
        assert!(result.is_err());
    }

    #[test]
    fn mistyped_field_is_rejected() {
        // state must be a bool, not a number to coerce
        let result: Result<TargetEvent, _> =
            serde_json::from_str(r#"{"type":"gpio","pin":4,"state":1}"#);
        assert!(result.is_err());
    }
}
