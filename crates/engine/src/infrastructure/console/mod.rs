//! Per-session broadcast of backend stdio to console subscribers.

pub mod hub;

pub use hub::ConsoleHub;
