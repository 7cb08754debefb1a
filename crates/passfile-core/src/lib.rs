//! Passfile core - flat-file credential records
//!
//! This crate provides:
//! - Masked secret capture from the controlling terminal with guaranteed
//!   mode restoration
//! - SHA-512 crypt hashing with random 16-symbol salts
//! - First-match lookup over newline-delimited record files
//! - In-place record splicing through a resizable memory mapping
//! - Credential operations (create, update, verify, delete) tying the
//!   pieces together

pub mod error;
pub mod hash;
pub mod prompt;
pub mod record;
pub mod salt;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use error::*;
pub use hash::*;
pub use prompt::*;
pub use record::*;
pub use salt::*;
pub use service::*;
pub use store::*;
