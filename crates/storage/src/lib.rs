//! Persistence for the course engine: repository contracts, an in-memory
//! backend for tests and a `SQLite` backend.

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{Storage, StorageError};
