//! Platform layer: terminal raw mode and non-blocking keyboard polling.
//!
//! Memory-mapped I/O needs two things from the host terminal: a way to ask
//! "is a byte available right now?" without blocking, and a way to read one
//! once it is. Both are behind the [`InputSource`] trait so [`Memory`](crate::memory::Memory)
//! never talks to stdin directly and can be driven by a stub in tests.

use libc::STDIN_FILENO;
use log::warn;
use nix::sys::select::{select, FdSet};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::time::{TimeVal, TimeValLike};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Installs a `SIGINT` handler that records the interrupt instead of
/// terminating the process, so the run loop can notice it between
/// instructions, unwind `RawModeGuard`, and exit on its own terms.
///
/// # Safety
///
/// Must be called at most once, before the run loop starts polling
/// [`interrupted`]; this mirrors `sigaction`'s own one-handler-per-signal
/// contract.
pub fn install_interrupt_handler() {
    let handler = SigHandler::Handler(handle_sigint);
    // SAFETY: `handle_sigint` only performs an atomic store, which is
    // async-signal-safe.
    unsafe {
        signal::signal(Signal::SIGINT, handler).expect("failed to install SIGINT handler");
    }
}

/// True once a `SIGINT` has been observed since the last reset.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Source of keyboard bytes for the memory-mapped keyboard device.
pub trait InputSource {
    /// Returns true iff at least one byte is currently readable without blocking.
    fn poll_input(&mut self) -> bool;

    /// Blocks until a byte is available, then returns it zero-extended to 16 bits.
    fn read_byte(&mut self) -> u16;
}

/// Reads from the process's stdin. `poll_input` never blocks: it asks the OS
/// via `select` with a zeroed timeout, so a tight KBSR polling loop doesn't
/// stall real programs.
pub struct Stdin;

impl InputSource for Stdin {
    fn poll_input(&mut self) -> bool {
        let mut readfds = FdSet::new();
        readfds.insert(STDIN_FILENO);

        match select(None, &mut readfds, None, None, &mut TimeVal::zero()) {
            Ok(ready) => ready == 1,
            Err(_) => false,
        }
    }

    fn read_byte(&mut self) -> u16 {
        let mut buffer = [0u8; 1];
        if let Err(e) = io::stdin().read_exact(&mut buffer) {
            warn!("failed to read a byte from stdin: {}", e);
            return 0;
        }
        u16::from(buffer[0])
    }
}

/// Puts the controlling terminal into non-canonical, no-echo mode for the
/// lifetime of the guard and restores the original mode when it is dropped,
/// on every exit path: normal return, `?`-propagated error, or unwind.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    /// Disables line buffering and local echo on stdin (fd 0).
    pub fn enable() -> io::Result<Self> {
        let original = Termios::from_fd(STDIN_FILENO)?;

        let mut raw = original;
        raw.c_lflag &= !(ICANON | ECHO);
        tcsetattr(STDIN_FILENO, TCSANOW, &raw)?;

        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = tcsetattr(STDIN_FILENO, TCSANOW, &self.original);
    }
}
