//! Outbound ports: contracts the application layer expects its
//! infrastructure to fulfill.

pub mod backend_port;
pub mod console_port;
pub mod repository_port;

pub use backend_port::BackendPort;
pub use console_port::{ConsolePort, ConsoleWriter};
pub use repository_port::{CosimRepo, ProgramRepo, SessionRepo, SnapshotRepo};

#[cfg(test)]
pub use repository_port::{MockProgramRepo, MockSessionRepo, MockSnapshotRepo};
