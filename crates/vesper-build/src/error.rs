//! Infrastructure errors
//!
//! These abort a build outright. Problems in user code are never reported
//! through this type; they become [`CompileError`](crate::CompileError)s.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid build configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    DatabaseCreation(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Failed to create worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Unknown program asset: {0}")]
    UnknownAsset(String),
}
