//! Terminal I/O Layer
//!
//! Raw-mode entry and restoration around termios attributes, a blocking
//! EINTR-tolerant byte reader, and the small repertoire of VT escape
//! sequences the editor emits. A SIGWINCH handler sets a flag that the
//! editor polls between keystrokes.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set from the signal handler, consumed cooperatively by the editor.
static WINCH_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_winch(_signo: libc::c_int) {
    WINCH_PENDING.store(true, Ordering::Relaxed);
}

/// Consume the pending-resize flag.
pub fn take_winch() -> bool {
    WINCH_PENDING.swap(false, Ordering::Relaxed)
}

/// Fetch the terminal attributes of stdin.
pub fn save_attrs() -> io::Result<libc::termios> {
    let mut attrs = unsafe { std::mem::zeroed::<libc::termios>() };
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut attrs) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(attrs)
}

/// Switch stdin to raw mode: no echo, no canonical line assembly, no
/// signal generation, no extended input processing, no XON/XOFF.
/// Input CR-to-NL mapping stays on, so Enter arrives as `\n`.
pub fn enter_raw(saved: &libc::termios) -> io::Result<()> {
    let mut raw = *saved;
    raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
    raw.c_iflag &= !libc::IXON;
    raw.c_cc[libc::VMIN] = 1;
    raw.c_cc[libc::VTIME] = 0;
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Restore previously saved attributes, draining pending output first.
pub fn restore(saved: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, saved) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read the next byte from stdin, retrying on EINTR.
/// `Ok(None)` means end of input.
pub fn getch() -> io::Result<Option<u8>> {
    let mut byte = 0u8;
    loop {
        let n = unsafe {
            libc::read(libc::STDIN_FILENO, &mut byte as *mut u8 as *mut libc::c_void, 1)
        };
        match n {
            1 => return Ok(Some(byte)),
            0 => return Ok(None),
            _ => {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// Write all of `bytes` to stdout, retrying on EINTR and short writes.
pub fn write_all(bytes: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        let n = unsafe {
            libc::write(
                libc::STDOUT_FILENO,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        written += n as usize;
    }
    Ok(())
}

pub fn write_str(s: &str) -> io::Result<()> {
    write_all(s.as_bytes())
}

// =============================================================================
// VT escape emission
// =============================================================================

pub fn clear_screen() -> io::Result<()> {
    write_all(b"\x1b[2J")?;
    cursor_to(1, 1)
}

pub fn save_cursor() -> io::Result<()> {
    write_all(b"\x1b7")
}

pub fn restore_cursor() -> io::Result<()> {
    write_all(b"\x1b8")
}

pub fn clear_to_eol() -> io::Result<()> {
    write_all(b"\x1b[K")
}

pub fn cursor_forward(columns: usize) -> io::Result<()> {
    if columns == 0 {
        return Ok(());
    }
    write_str(&format!("\x1b[{}C", columns))
}

pub fn cursor_back(columns: usize) -> io::Result<()> {
    if columns == 0 {
        return Ok(());
    }
    write_str(&format!("\x1b[{}D", columns))
}

pub fn cursor_to(row: usize, column: usize) -> io::Result<()> {
    write_str(&format!("\x1b[{};{}H", row, column))
}

// =============================================================================
// Raw session guard
// =============================================================================

/// Raw mode plus a SIGWINCH handler, both undone on drop.
pub struct RawSession {
    saved: libc::termios,
    old_winch: libc::sigaction,
}

impl RawSession {
    pub fn enter(saved: &libc::termios) -> io::Result<Self> {
        enter_raw(saved)?;

        let mut action = unsafe { std::mem::zeroed::<libc::sigaction>() };
        let handler: extern "C" fn(libc::c_int) = on_winch;
        action.sa_sigaction = handler as libc::sighandler_t;
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        let mut old_winch = unsafe { std::mem::zeroed::<libc::sigaction>() };
        if unsafe { libc::sigaction(libc::SIGWINCH, &action, &mut old_winch) } != 0 {
            let err = io::Error::last_os_error();
            let _ = restore(saved);
            return Err(err);
        }

        Ok(Self { saved: *saved, old_winch })
    }
}

impl Drop for RawSession {
    fn drop(&mut self) {
        unsafe { libc::sigaction(libc::SIGWINCH, &self.old_winch, std::ptr::null_mut()) };
        let _ = restore(&self.saved);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winch_flag_roundtrip() {
        WINCH_PENDING.store(false, Ordering::Relaxed);
        assert!(!take_winch());
        on_winch(libc::SIGWINCH);
        assert!(take_winch());
        assert!(!take_winch());
    }
}
