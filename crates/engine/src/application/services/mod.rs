//! Application services composed from the outbound ports.

pub mod cosim_service;
pub mod program_service;
pub mod session_service;

pub use cosim_service::CosimService;
pub use program_service::ProgramService;
pub use session_service::{CreateSession, SessionService, SessionServiceConfig};
