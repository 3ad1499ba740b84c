//! Backend identification and static capability descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three backend families the control plane can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Full-system emulator with a human monitor over telnet.
    Qemu,
    /// Full-system emulator with a line-oriented script/monitor.
    Renode,
    /// Hardware-debug daemon bound to a physical probe.
    OpenOcd,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qemu => write!(f, "qemu"),
            Self::Renode => write!(f, "renode"),
            Self::OpenOcd => write!(f, "openocd"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qemu" => Ok(Self::Qemu),
            "renode" => Ok(Self::Renode),
            "openocd" => Ok(Self::OpenOcd),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

/// Parse failure for a backend kind tag.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown backend kind: {0}")]
pub struct UnknownBackend(pub String);

/// Which optional operations a backend implements natively.
///
/// The session service consults these before dispatch so an unsupported
/// operation is refused at the boundary rather than deep in a monitor call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub snapshot: bool,
    pub step: bool,
    pub coverage: bool,
    pub event_injection: bool,
    /// Backend can advance virtual time natively instead of the
    /// resume/sleep/pause approximation.
    pub native_run_for: bool,
}

/// Static per-adapter metadata. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub backend: BackendKind,
    pub processors: Vec<String>,
    pub peripherals: Vec<String>,
    pub buses: Vec<String>,
    pub features: FeatureFlags,
    /// Predefined board names the adapter accepts without a custom
    /// processor/memory description.
    pub boards: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_round_trips_through_str() {
        for kind in [BackendKind::Qemu, BackendKind::Renode, BackendKind::OpenOcd] {
            let parsed: BackendKind = kind.to_string().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_backend_kind_is_rejected() {
        assert!("verilator".parse::<BackendKind>().is_err());
    }
}
