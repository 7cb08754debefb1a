//! Masked secret capture from the controlling terminal.
//!
//! Capture runs in raw mode (echo and canonical processing off, one byte
//! per read) against `/dev/tty` when it can be opened, the process stdio
//! pair otherwise:
//! - Printable bytes are buffered and optionally echoed as a mask symbol
//! - Backspace and delete drop the last buffered byte and erase one
//!   masked column
//! - Escape sequences are drained without touching the buffer
//! - NUL, newline, end-of-transmission, and end of input all complete
//!   the capture
//!
//! The terminal attributes found at entry are restored on every exit
//! path. A capture whose final restore fails reports failure and drops
//! the secret rather than claiming success on a broken terminal.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use zeroize::Zeroizing;

use crate::error::{CaptureError, CaptureResult};

/// Secret buffers grow in blocks of this many bytes
const SECRET_BLOCK: usize = 64;

/// Backspace plus ANSI clear-to-end-of-line, erasing one masked column
const ERASE_MASKED: &[u8] = b"\x08\x1b[K";

/// Read a secret from the terminal with echo suppressed.
///
/// `prompt` is written once raw mode is active. With a printable `mask`
/// every buffered byte echoes that symbol instead of itself; otherwise
/// nothing is echoed. The completed capture always leaves the cursor on
/// a fresh line.
pub fn read_secret(prompt: Option<&str>, mask: Option<u8>) -> CaptureResult<Zeroizing<Vec<u8>>> {
    let streams = match OpenOptions::new().read(true).write(true).open("/dev/tty") {
        Ok(tty) => TtyStreams::Device(tty),
        Err(_) => TtyStreams::Std(io::stdin().lock(), io::stdout().lock()),
    };
    capture_from(streams, prompt, mask)
}

fn capture_from(
    streams: TtyStreams,
    prompt: Option<&str>,
    mask: Option<u8>,
) -> CaptureResult<Zeroizing<Vec<u8>>> {
    let fd = streams.attr_fd();
    let saved = attributes(fd)?;
    let mut raw = saved;
    raw.c_lflag &= !(libc::ECHO | libc::ICANON);
    raw.c_cc[libc::VTIME] = 0;
    raw.c_cc[libc::VMIN] = 1;
    apply_attributes(fd, &raw)?;
    // the guard must drop before `terminal` closes the descriptor
    let mut terminal = RawTerminal { streams, fd, raw };
    let guard = RestoreGuard::arm(fd, saved);

    if let Some(text) = prompt {
        terminal.write_bytes(text.as_bytes())?;
    }
    match capture_loop(&mut terminal, mask) {
        Ok(secret) => {
            // success must not stand if the terminal cannot be put back
            guard.restore()?;
            Ok(secret)
        }
        Err(err) => Err(err),
    }
}

/// Input/output endpoints for a capture session.
enum TtyStreams {
    /// Controlling terminal handle, used for both directions
    Device(File),
    /// Fallback stdio pair, locked for the duration of the capture
    Std(io::StdinLock<'static>, io::StdoutLock<'static>),
}

impl TtyStreams {
    fn attr_fd(&self) -> RawFd {
        match self {
            TtyStreams::Device(tty) => tty.as_raw_fd(),
            TtyStreams::Std(_, stdout) => stdout.as_raw_fd(),
        }
    }
}

struct RawTerminal {
    streams: TtyStreams,
    fd: RawFd,
    raw: libc::termios,
}

impl RawTerminal {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.streams {
            TtyStreams::Device(tty) => tty.read(buf),
            TtyStreams::Std(stdin, _) => stdin.read(buf),
        }
    }
}

impl SecretTerminal for RawTerminal {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read_some(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.streams {
            TtyStreams::Device(tty) => {
                tty.write_all(bytes)?;
                tty.flush()
            }
            TtyStreams::Std(_, stdout) => {
                stdout.write_all(bytes)?;
                stdout.flush()
            }
        }
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        // poll what is already buffered without waiting for more
        let mut drain = self.raw;
        drain.c_cc[libc::VTIME] = 0;
        drain.c_cc[libc::VMIN] = 0;
        apply_attributes(self.fd, &drain)?;
        let mut byte = [0u8; 1];
        loop {
            match self.read_some(&mut byte) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    let _ = apply_attributes(self.fd, &self.raw);
                    return Err(err);
                }
            }
        }
        apply_attributes(self.fd, &self.raw)
    }
}

/// Puts the saved terminal attributes back when dropped, so interrupted
/// captures cannot leave the terminal raw.
struct RestoreGuard {
    fd: RawFd,
    saved: libc::termios,
    armed: bool,
}

impl RestoreGuard {
    fn arm(fd: RawFd, saved: libc::termios) -> Self {
        Self { fd, saved, armed: true }
    }

    /// Restore now, reporting failure; disarms the drop path.
    fn restore(mut self) -> io::Result<()> {
        self.armed = false;
        apply_attributes(self.fd, &self.saved)
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = apply_attributes(self.fd, &self.saved);
        }
    }
}

fn attributes(fd: RawFd) -> io::Result<libc::termios> {
    let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut attrs) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(attrs)
}

fn apply_attributes(fd: RawFd, attrs: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, attrs) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Byte-level terminal interface the capture loop runs against.
trait SecretTerminal {
    /// Read one byte; `None` is end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
    /// Write `bytes` so they are visible immediately.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Consume any input already pending without blocking.
    fn discard_pending(&mut self) -> io::Result<()>;
}

fn capture_loop<T: SecretTerminal>(
    terminal: &mut T,
    mask: Option<u8>,
) -> CaptureResult<Zeroizing<Vec<u8>>> {
    let mask = mask.filter(|&m| m == b' ' || m.is_ascii_graphic());
    let mut secret = Zeroizing::new(Vec::with_capacity(SECRET_BLOCK));
    loop {
        match terminal.read_byte().map_err(read_failure)? {
            Some(0x1b) => terminal.discard_pending()?,
            Some(0x7f) | Some(0x08) => {
                if secret.pop().is_some() && mask.is_some() {
                    terminal.write_bytes(ERASE_MASKED)?;
                }
            }
            Some(0x00) | Some(b'\n') | Some(0x04) | None => {
                terminal.write_bytes(b"\n")?;
                return Ok(secret);
            }
            Some(byte) if byte == b' ' || byte.is_ascii_graphic() => {
                if secret.len() == secret.capacity() {
                    secret.reserve_exact(SECRET_BLOCK);
                }
                secret.push(byte);
                if let Some(mask) = mask {
                    terminal.write_bytes(&[mask])?;
                }
            }
            Some(_) => {}
        }
    }
}

fn read_failure(err: io::Error) -> CaptureError {
    if err.kind() == io::ErrorKind::Interrupted {
        CaptureError::Interrupted
    } else {
        CaptureError::Io(err)
    }
}
