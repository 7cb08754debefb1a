//! Error types for credential store operations

use thiserror::Error;

/// Errors while capturing a secret from the terminal
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture interrupted")]
    Interrupted,

    #[error("Terminal IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while hashing a secret against a salt spec
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported salt spec")]
    BadFormat,

    #[error("Hash backend failure: {0}")]
    Backend(String),
}

/// Errors while opening or editing a record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot open store file: {0}")]
    Open(std::io::Error),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Resizing the store failed: {0}")]
    Allocate(std::io::Error),

    #[error("Mapping the store failed: {0}")]
    Map(std::io::Error),

    #[error("Truncating the store failed: {0}")]
    Truncate(std::io::Error),

    #[error("Writing the store back failed: {0}")]
    Sync(std::io::Error),
}

/// Errors from complete credential operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Secret capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Hash operation failed: {0}")]
    Hash(#[from] HashError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Entered secrets do not match")]
    PasswordMismatch,

    #[error("No record for the requested user")]
    UnknownUser,

    #[error("Secret does not match the stored record")]
    CredentialMismatch,

    #[error("Stored record payload is not readable")]
    MalformedRecord,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
pub type HashResult<T> = Result<T, HashError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ServiceResult<T> = Result<T, ServiceError>;
