//! Declarative hardware target description.
//!
//! A board configuration is serialized verbatim into the session record at
//! creation and treated as opaque by the core afterwards; only backend
//! adapters interpret its fields.

use serde::{Deserialize, Serialize};

/// A declarative description of the simulated or attached target board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Predefined board name understood by the backend (e.g. "stm32vldiscovery").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    /// Custom processor, used when no predefined board is named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<ProcessorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory: Vec<MemoryRegion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peripherals: Vec<PeripheralSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSpec {
    /// Model identifier, e.g. "cortex-m4".
    pub model: String,
    #[serde(default)]
    pub frequency_hz: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRegion {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeripheralSpec {
    /// Type tag, e.g. "uart", "gpio", "timer".
    pub kind: String,
    pub name: String,
    pub base: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irq: Option<u32>,
}

impl BoardConfig {
    /// A configuration naming a predefined board, with no custom hardware.
    pub fn named(board: impl Into<String>) -> Self {
        Self {
            board: Some(board.into()),
            ..Self::default()
        }
    }

    /// Primary RAM region, when one is declared.
    pub fn main_ram(&self) -> Option<&MemoryRegion> {
        self.memory
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case("ram"))
            .or_else(|| self.memory.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_board_round_trips_through_json() {
        let config = BoardConfig::named("test-board");
        let blob = serde_json::to_string(&config).expect("serialize");
        let back: BoardConfig = serde_json::from_str(&blob).expect("deserialize");
        assert_eq!(back, config);
        assert_eq!(back.board.as_deref(), Some("test-board"));
    }

    #[test]
    fn main_ram_prefers_region_named_ram() {
        let config = BoardConfig {
            board: None,
            processor: Some(ProcessorSpec {
                model: "cortex-m4".into(),
                frequency_hz: 120_000_000,
            }),
            memory: vec![
                MemoryRegion {
                    name: "flash".into(),
                    base: 0x0800_0000,
                    size: 0x10_0000,
                },
                MemoryRegion {
                    name: "ram".into(),
                    base: 0x2000_0000,
                    size: 0x2_0000,
                },
            ],
            peripherals: vec![],
        };
        assert_eq!(config.main_ram().map(|r| r.base), Some(0x2000_0000));
    }
}
