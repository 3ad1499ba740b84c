//! Durable record storage: sqlite repositories and their in-memory twins.

pub mod cosim_repository;
pub mod memory;
pub mod program_repository;
pub mod session_repository;
pub mod snapshot_repository;
pub mod sqlite;

pub use cosim_repository::SqliteCosimRepo;
pub use program_repository::SqliteProgramRepo;
pub use session_repository::SqliteSessionRepo;
pub use snapshot_repository::SqliteSnapshotRepo;
