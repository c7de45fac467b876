//! Task persistence.

/// In-memory backend.
pub mod memory;
/// Postgres backend.
pub mod postgres;
/// Repository contract and sweep scheduling.
pub mod repository;

pub use memory::InMemoryTaskRepository;
pub use postgres::PostgresTaskRepository;
pub use repository::{
    StoreError, SweepReport, SweepSchedule, TaskPage, TaskQuery, TaskRepository,
};
