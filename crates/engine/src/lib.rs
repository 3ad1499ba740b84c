//! SimBench engine library.
//!
//! Control plane for heterogeneous embedded-target simulation and debug
//! backends: sessions over QEMU/Renode/OpenOCD children, co-simulation
//! coordination, and console fan-out, fronted by an HTTP/WebSocket API.
//!
//! ## Structure
//!
//! - `application/` - ports (adapter + repository contracts) and services
//! - `infrastructure/` - backends, persistence, networking, HTTP surface
//! - `state` - application composition

pub mod application;
pub mod infrastructure;
pub mod state;

/// Shared fixtures for service-level tests.
#[cfg(test)]
pub mod test_fixtures;

pub use state::AppState;
