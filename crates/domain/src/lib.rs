//! SimBench domain types.
//!
//! Core entities, ids, state machines, and the error taxonomy shared by the
//! engine and the wire protocol. This crate stays free of I/O and async.

pub mod board;
pub mod capability;
pub mod cosim;
pub mod error;
pub mod event;
pub mod ids;
pub mod program;
pub mod session;
pub mod snapshot;

pub use board::{BoardConfig, MemoryRegion, PeripheralSpec, ProcessorSpec};
pub use capability::{BackendKind, CapabilityDescriptor, FeatureFlags, UnknownBackend};
pub use cosim::{
    CosimMember, CosimSession, CosimStatus, MemberStatus, STEP_VIRTUAL_TIME_NS,
};
pub use error::CoreError;
pub use event::TargetEvent;
pub use ids::{
    CosimMemberId, CosimSessionId, ProgramId, SessionId, SnapshotId, SubscriberId,
};
pub use program::{Program, ProgramFormat};
pub use session::{Session, SessionState};
pub use snapshot::Snapshot;
