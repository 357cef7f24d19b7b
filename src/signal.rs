//! Ctrl-C handling for the listening loop.
//!
//! The handler only flips an atomic flag; the capture loop polls it once per
//! frame, returns normally, and the stream is released by its `Drop`.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the SIGINT handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Only uses atomic operations (async-signal-safe).
extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn install_interrupt_handler() -> Result<()> {
    // SAFETY: handle_sigint is an extern "C" signal handler whose only effect is
    // storing to an atomic, which is async-signal-safe.
    unsafe {
        let handler = handle_sigint as *const () as libc::sighandler_t;
        if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
            return Err(anyhow!("failed to install SIGINT handler"));
        }
    }
    Ok(())
}

/// Flag to hand to [`crate::VoiceListener::with_stop_flag`].
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
