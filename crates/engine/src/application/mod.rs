//! Application layer: ports and the services composed from them.

pub mod ports;
pub mod services;
