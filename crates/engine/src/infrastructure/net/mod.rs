//! Network plumbing: port allocation and the monitor command channel.

pub mod monitor;
pub mod port_alloc;

pub use monitor::MonitorChannel;
pub use port_alloc::{allocate_port, allocate_port_pair};
