//! passfile - flat passwd-style credential file manager
//!
//! Creates, updates, verifies, and deletes `user:hash` records in place,
//! with SHA-512 crypt hashes and masked interactive password entry.

use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

use passfile_core::{
    delete_record, render_record, upsert_record, verify_record, CaptureError, HashError,
    SecretSource, ServiceError, StoreError,
};

const EXIT_ACCESSING_FILES: i32 = 1;
const EXIT_SYNTAX: i32 = 2;
const EXIT_PASSWORD: i32 = 3;
const EXIT_INTERRUPTED: i32 = 4;
const EXIT_VALUE: i32 = 5;
const EXIT_USERNAME: i32 = 6;
const EXIT_FILE_FORMAT: i32 = 7;

#[derive(Parser)]
#[command(name = "passfile")]
#[command(version)]
#[command(about = "Manage users in a flat passwd-style credential file")]
#[command(after_help = "EXAMPLES:
  passfile -c users.pw alice          Create the file with alice's record
  passfile users.pw alice             Set alice's password (asks twice)
  passfile -b users.pw alice s3cret   Take the password from the arguments
  passfile -v users.pw alice          Check alice's password
  passfile -D users.pw alice          Remove alice's record
  passfile -nb alice s3cret           Print the record instead of writing")]
struct Cli {
    /// Create a new file
    #[arg(short = 'c')]
    create: bool,

    /// Don't update the file; display the record on stdout
    #[arg(short = 'n')]
    no_file: bool,

    /// Use the password from the command line
    #[arg(short = 'b')]
    batch: bool,

    /// Read the password from stdin without verification (for scripts)
    #[arg(short = 'i')]
    password_from_stdin: bool,

    /// Force SHA-512 hashing of the password (the default)
    #[arg(short = 'd')]
    sha512: bool,

    /// Delete the specified user
    #[arg(short = 'D')]
    delete: bool,

    /// Verify the password for the specified user
    #[arg(short = 'v')]
    verify: bool,

    /// Password file, user name, and password, depending on the options
    #[arg(value_name = "ARG")]
    args: Vec<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    if (cli.create || cli.delete || cli.verify) && cli.no_file {
        return usage_error("Incompatible options were provided.", EXIT_SYNTAX);
    }
    if cli.batch && cli.password_from_stdin {
        return usage_error("Incompatible options were provided.", EXIT_SYNTAX);
    }
    if cli.delete && cli.verify {
        return usage_error("Incompatible options were provided.", EXIT_SYNTAX);
    }
    if cli.sha512 {
        debug!("SHA-512 scheme explicitly requested (already the default)");
    }

    let (file, username, password, extra) = distribute_args(cli.args, !cli.no_file, cli.batch);
    if extra > 0 {
        eprintln!("Warning. Ignoring extra command line arguments.");
    }

    let path = if cli.no_file {
        None
    } else {
        match file.filter(|f| !f.is_empty()) {
            Some(file) => Some(PathBuf::from(file)),
            None => {
                return usage_error(
                    "Password file name is required with the options provided.",
                    EXIT_SYNTAX,
                )
            }
        }
    };

    let username = match username.filter(|u| !u.is_empty()) {
        Some(username) => username,
        None => return usage_error("User name is required.", EXIT_USERNAME),
    };

    if cli.batch && password.as_deref().unwrap_or("").is_empty() {
        return usage_error(
            "Password is required with the options provided.",
            EXIT_VALUE,
        );
    }

    let source = if let Some(password) = password {
        SecretSource::Provided(Zeroizing::new(password.into_bytes()))
    } else if cli.password_from_stdin {
        SecretSource::StdinToken
    } else {
        SecretSource::Prompt
    };

    let outcome = match path {
        None => render_record(&username, source).map(|record| println!("{record}")),
        Some(path) => {
            if cli.delete {
                delete_record(&path, cli.create, &username, source)
            } else if cli.verify {
                verify_record(&path, &username, source)
            } else {
                upsert_record(&path, cli.create, &username, source)
            }
        }
    };

    match outcome {
        Ok(()) => 0,
        Err(err) => report_failure(&err),
    }
}

/// Split the positional arguments into file, user name, and password.
///
/// The file slot only exists when a file will be used, and the password
/// slot only when it comes from the command line; the remaining
/// arguments shift left accordingly. Returns the count of leftovers.
fn distribute_args(
    args: Vec<String>,
    use_file: bool,
    batch: bool,
) -> (Option<String>, Option<String>, Option<String>, usize) {
    let mut rest = args.into_iter();
    let file = if use_file { rest.next() } else { None };
    let username = rest.next();
    let password = if batch { rest.next() } else { None };
    (file, username, password, rest.count())
}

/// Print a usage failure the way the tool reports them: the message,
/// then the usage summary, both on stderr.
fn usage_error(message: &str, code: i32) -> i32 {
    eprintln!("{message}");
    eprintln!("{}", Cli::command().render_usage());
    code
}

fn report_failure(err: &ServiceError) -> i32 {
    debug!("operation failed: {err}");
    match err {
        ServiceError::Capture(CaptureError::Interrupted) => EXIT_INTERRUPTED,
        ServiceError::Capture(CaptureError::Io(_)) => EXIT_INTERRUPTED,
        ServiceError::Hash(HashError::BadFormat) => {
            eprintln!("Wrong file format.");
            EXIT_FILE_FORMAT
        }
        ServiceError::Hash(HashError::Backend(_)) => {
            eprintln!("System error.");
            EXIT_INTERRUPTED
        }
        ServiceError::Store(err) => {
            eprintln!("{}", store_message(err));
            EXIT_ACCESSING_FILES
        }
        ServiceError::PasswordMismatch => {
            eprintln!("Entered passwords mismatch.");
            EXIT_PASSWORD
        }
        ServiceError::UnknownUser | ServiceError::CredentialMismatch => {
            eprintln!("Wrong login or password.");
            EXIT_PASSWORD
        }
        ServiceError::MalformedRecord => {
            eprintln!("Wrong file format.");
            EXIT_FILE_FORMAT
        }
    }
}

fn store_message(err: &StoreError) -> &'static str {
    match err {
        StoreError::Open(_) | StoreError::NotAFile(_) => "Cannot open the file.",
        StoreError::Allocate(_) | StoreError::Map(_) => "File operation error.",
        StoreError::Truncate(_) => "Cannot modify the file.",
        StoreError::Sync(_) => "Cannot write to the file",
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_batch_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.pw");
        let file = path.to_str().unwrap();
        assert_eq!(run(Cli::parse_from(["passfile", "-cb", file, "alice", "pw"])), 0);
        assert_eq!(run(Cli::parse_from(["passfile", "-vb", file, "alice", "pw"])), 0);
        assert_eq!(
            run(Cli::parse_from(["passfile", "-vb", file, "alice", "wrong"])),
            EXIT_PASSWORD
        );
        // the batch password is consumed but plays no part in a delete
        assert_eq!(
            run(Cli::parse_from(["passfile", "-Db", file, "alice", "whatever"])),
            0
        );
        assert_eq!(
            run(Cli::parse_from(["passfile", "-vb", file, "alice", "pw"])),
            EXIT_PASSWORD
        );
    }

    #[test]
    fn test_run_create_delete_truncates_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.pw");
        let file = path.to_str().unwrap();
        assert_eq!(run(Cli::parse_from(["passfile", "-cb", file, "alice", "pw"])), 0);
        assert_eq!(run(Cli::parse_from(["passfile", "-cbD", file, "bob", "x"])), 0);
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn test_run_no_file_prints_record() {
        assert_eq!(run(Cli::parse_from(["passfile", "-nb", "alice", "pw"])), 0);
    }

    #[test]
    fn test_run_rejects_incompatible_options() {
        assert_eq!(run(Cli::parse_from(["passfile", "-nv", "alice"])), EXIT_SYNTAX);
        assert_eq!(run(Cli::parse_from(["passfile", "-bi", "f", "u"])), EXIT_SYNTAX);
        assert_eq!(run(Cli::parse_from(["passfile", "-Dv", "f", "u"])), EXIT_SYNTAX);
    }

    #[test]
    fn test_run_requires_file() {
        assert_eq!(run(Cli::parse_from(["passfile"])), EXIT_SYNTAX);
    }

    #[test]
    fn test_run_requires_username() {
        assert_eq!(run(Cli::parse_from(["passfile", "-b", "somefile"])), EXIT_USERNAME);
    }

    #[test]
    fn test_run_requires_password_with_batch() {
        assert_eq!(run(Cli::parse_from(["passfile", "-b", "f", "u"])), EXIT_VALUE);
    }

    #[test]
    fn test_run_missing_store_reports_file_access() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.pw");
        let file = path.to_str().unwrap();
        assert_eq!(
            run(Cli::parse_from(["passfile", "-vb", file, "alice", "pw"])),
            EXIT_ACCESSING_FILES
        );
    }

    #[test]
    fn test_cli_parses_combined_flags() {
        let cli = Cli::parse_from(["passfile", "-nb", "alice", "pw"]);
        assert!(cli.no_file && cli.batch);
        assert_eq!(cli.args, vec!["alice".to_string(), "pw".to_string()]);
    }

    #[test]
    fn test_distribute_with_file() {
        let (file, user, password, extra) =
            distribute_args(vec!["f".into(), "u".into()], true, false);
        assert_eq!(file.as_deref(), Some("f"));
        assert_eq!(user.as_deref(), Some("u"));
        assert_eq!(password, None);
        assert_eq!(extra, 0);
    }

    #[test]
    fn test_distribute_no_file_shifts_left() {
        let (file, user, password, extra) =
            distribute_args(vec!["u".into(), "p".into()], false, true);
        assert_eq!(file, None);
        assert_eq!(user.as_deref(), Some("u"));
        assert_eq!(password.as_deref(), Some("p"));
        assert_eq!(extra, 0);
    }

    #[test]
    fn test_distribute_counts_extras() {
        let args = vec!["f".into(), "u".into(), "x".into(), "y".into()];
        let (_, _, _, extra) = distribute_args(args, true, false);
        assert_eq!(extra, 2);
    }

    #[test]
    fn test_exit_codes_by_failure_kind() {
        assert_eq!(report_failure(&ServiceError::CredentialMismatch), EXIT_PASSWORD);
        assert_eq!(report_failure(&ServiceError::UnknownUser), EXIT_PASSWORD);
        assert_eq!(report_failure(&ServiceError::PasswordMismatch), EXIT_PASSWORD);
        assert_eq!(report_failure(&ServiceError::MalformedRecord), EXIT_FILE_FORMAT);
        assert_eq!(
            report_failure(&ServiceError::Hash(HashError::BadFormat)),
            EXIT_FILE_FORMAT
        );
        assert_eq!(
            report_failure(&ServiceError::Hash(HashError::Backend("x".into()))),
            EXIT_INTERRUPTED
        );
        assert_eq!(
            report_failure(&ServiceError::Capture(CaptureError::Interrupted)),
            EXIT_INTERRUPTED
        );
        let open = StoreError::Open(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(report_failure(&ServiceError::Store(open)), EXIT_ACCESSING_FILES);
    }

    #[test]
    fn test_store_failure_messages() {
        use std::io::{Error, ErrorKind};
        assert_eq!(
            store_message(&StoreError::Open(Error::from(ErrorKind::PermissionDenied))),
            "Cannot open the file."
        );
        assert_eq!(
            store_message(&StoreError::NotAFile("x".into())),
            "Cannot open the file."
        );
        assert_eq!(
            store_message(&StoreError::Allocate(Error::from(ErrorKind::PermissionDenied))),
            "File operation error."
        );
        assert_eq!(
            store_message(&StoreError::Map(Error::from(ErrorKind::PermissionDenied))),
            "File operation error."
        );
        assert_eq!(
            store_message(&StoreError::Truncate(Error::from(ErrorKind::PermissionDenied))),
            "Cannot modify the file."
        );
        assert_eq!(
            store_message(&StoreError::Sync(Error::from(ErrorKind::PermissionDenied))),
            "Cannot write to the file"
        );
    }
}
