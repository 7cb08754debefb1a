//! Credential operations over a passwd-style record store.
//!
//! Each operation is a single pass: acquire the secret, derive or check
//! the hash, locate the record, splice the result into the file. The
//! store is opened before any secret is acquired so that file problems
//! surface without prompting anyone.

use std::io::Read;
use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{CaptureError, ServiceError, ServiceResult};
use crate::hash;
use crate::prompt;
use crate::record;
use crate::salt;
use crate::store::{OpenMode, StoreFile};

/// Where the secret for an operation comes from.
pub enum SecretSource {
    /// Caller supplies the secret directly
    Provided(Zeroizing<Vec<u8>>),
    /// First whitespace-delimited token on standard input
    StdinToken,
    /// Interactive capture from the terminal
    Prompt,
}

const PROMPT_NEW: &str = "New password: ";
const PROMPT_REPEAT: &str = "Verify: ";
const PROMPT_EXISTING: &str = "Enter password: ";

/// Insert or replace the record for `username`.
///
/// With `create` the store is truncated first. An existing record is
/// replaced in place; a missing one is appended at the end.
pub fn upsert_record(
    path: &Path,
    create: bool,
    username: &str,
    source: SecretSource,
) -> ServiceResult<()> {
    let mode = if create { OpenMode::Create } else { OpenMode::ReadWrite };
    let mut store = StoreFile::open(path, mode)?;
    let secret = acquire_secret(source, false)?;
    let line = build_record(username, &secret)?;

    let key = key_prefix(username);
    let range = {
        let view = store.view()?;
        record::find_record(&view, key.as_bytes()).unwrap_or(view.len()..view.len())
    };
    store.splice(range, line.as_bytes())?;
    store.close()?;
    Ok(())
}

/// Remove the record for `username`. A missing record is not an error.
///
/// With `create` the store is truncated on open, which leaves nothing
/// to remove. The secret is acquired exactly as for an update and then
/// discarded, so a failed confirmation aborts the delete.
pub fn delete_record(
    path: &Path,
    create: bool,
    username: &str,
    source: SecretSource,
) -> ServiceResult<()> {
    let mode = if create { OpenMode::Create } else { OpenMode::ReadWrite };
    let mut store = StoreFile::open(path, mode)?;
    acquire_secret(source, false)?;
    let key = key_prefix(username);
    let range = {
        let view = store.view()?;
        record::find_record(&view, key.as_bytes())
    };
    if let Some(range) = range {
        store.splice(range, b"")?;
    }
    store.close()?;
    Ok(())
}

/// Check `username`'s secret against the stored record.
///
/// The store is never written. A missing user and a wrong secret are
/// distinct errors here; callers are expected to present them
/// identically.
pub fn verify_record(path: &Path, username: &str, source: SecretSource) -> ServiceResult<()> {
    let store = StoreFile::open(path, OpenMode::ReadOnly)?;
    let secret = acquire_secret(source, true)?;
    let view = store.view()?;
    let key = key_prefix(username);
    let range = record::find_record(&view, key.as_bytes()).ok_or(ServiceError::UnknownUser)?;
    let stored = std::str::from_utf8(&view[range.start + key.len()..range.end])
        .map_err(|_| ServiceError::MalformedRecord)?;
    let recomputed = hash::hash_secret(&secret, stored)?;
    if recomputed == stored {
        Ok(())
    } else {
        Err(ServiceError::CredentialMismatch)
    }
}

/// Compute the record line for `username` without touching any file.
pub fn render_record(username: &str, source: SecretSource) -> ServiceResult<String> {
    let secret = acquire_secret(source, false)?;
    build_record(username, &secret)
}

fn build_record(username: &str, secret: &[u8]) -> ServiceResult<String> {
    let spec = hash::salt_spec(&salt::encode_salt(&salt::generate_salt()));
    let digest = hash::hash_secret(secret, &spec)?;
    Ok(format!("{username}:{digest}"))
}

fn key_prefix(username: &str) -> String {
    format!("{username}:")
}

fn acquire_secret(source: SecretSource, existing: bool) -> ServiceResult<Zeroizing<Vec<u8>>> {
    match source {
        SecretSource::Provided(secret) => Ok(secret),
        SecretSource::StdinToken => {
            read_stdin_token().map_err(|e| ServiceError::Capture(CaptureError::Io(e)))
        }
        SecretSource::Prompt => {
            let text = if existing { PROMPT_EXISTING } else { PROMPT_NEW };
            let secret = prompt::read_secret(Some(text), None)?;
            if !existing {
                let check = prompt::read_secret(Some(PROMPT_REPEAT), None)?;
                if *secret != *check {
                    return Err(ServiceError::PasswordMismatch);
                }
            }
            Ok(secret)
        }
    }
}

fn read_stdin_token() -> std::io::Result<Zeroizing<Vec<u8>>> {
    let mut stdin = std::io::stdin().lock();
    let mut token = Zeroizing::new(Vec::new());
    let mut byte = [0u8; 1];
    loop {
        if stdin.read(&mut byte)? == 0 {
            break;
        }
        if byte[0].is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            break;
        }
        token.push(byte[0]);
    }
    Ok(token)
}
