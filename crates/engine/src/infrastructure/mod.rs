//! Infrastructure: everything that touches the outside world.

pub mod backends;
pub mod config;
pub mod console;
pub mod http;
pub mod net;
pub mod persistence;
