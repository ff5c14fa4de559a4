//! Repository backends for the quote lifecycle.
//!
//! `InMemoryRepository` backs tests and the CLI demo; `SqliteRepository`
//! is used by the server whenever `APP_DATABASE_PATH` is configured.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
