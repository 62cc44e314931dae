//! Error types for the seeder components.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating or reading fixture files
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("No dated data directory (YYYY-MM-DD...) found in {}", .0.display())]
    NoDataDirectory(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture path {0} must stay inside the data directory")]
    OutsideDataDirectory(String),

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while downloading from the remote content host
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a complete response
    #[error("Content host unreachable for {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Content host returned {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Errors raised by the object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object store request failed for {key}: {message}")]
    Request { key: String, message: String },
}

impl StoreError {
    pub fn request(key: &str, error: impl std::fmt::Display) -> Self {
        StoreError::Request {
            key: key.to_string(),
            message: error.to_string(),
        }
    }
}

/// Errors raised by the persistence client
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Table {table} has no column {column}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Empty conflict target for table {0}")]
    EmptyConflictTarget(&'static str),
}

/// Fatal errors that abort a seeding run
#[derive(Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error("Failed to store thumbnail for pack {pack_id}: {source}")]
    Thumbnail {
        pack_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to upsert asset pack {pack_id}: {source}")]
    PackUpsert {
        pack_id: String,
        #[source]
        source: DatabaseError,
    },
}

pub type SeedResult<T> = Result<T, SeedError>;
