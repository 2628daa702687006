//! Last-resort terminal restoration for panic hooks.
//!
//! The live session registers its descriptor and attribute snapshot here so a
//! panic hook can put the terminal back without access to the session value.

use std::os::fd::{BorrowedFd, RawFd};
use std::sync::Mutex;

use nix::sys::termios::{tcsetattr, SetArg, Termios};

use crate::terminal::SHOW_CURSOR;

struct Registration {
    input: RawFd,
    control: Option<RawFd>,
    original: Termios,
}

static REGISTRATION: Mutex<Option<Registration>> = Mutex::new(None);

pub(crate) fn register(input: RawFd, control: Option<RawFd>, original: Termios) {
    if let Ok(mut slot) = REGISTRATION.lock() {
        *slot = Some(Registration {
            input,
            control,
            original,
        });
    }
}

pub(crate) fn unregister(input: RawFd) {
    if let Ok(mut slot) = REGISTRATION.lock() {
        if slot.as_ref().is_some_and(|r| r.input == input) {
            *slot = None;
        }
    }
}

/// Show the cursor and reapply the registered snapshot, ignoring failures.
///
/// Uses `try_lock` so a panic raised while the registry is held cannot
/// deadlock the hook.
pub fn emergency_restore() {
    let Ok(mut slot) = REGISTRATION.try_lock() else {
        return;
    };
    let Some(reg) = slot.take() else {
        return;
    };

    // The registered descriptors stay open until the session unregisters.
    unsafe {
        match reg.control {
            Some(fd) => {
                let _ = nix::unistd::write(BorrowedFd::borrow_raw(fd), SHOW_CURSOR);
            }
            None => {
                let _ = nix::unistd::write(std::io::stdout(), SHOW_CURSOR);
            }
        }
        let _ = tcsetattr(BorrowedFd::borrow_raw(reg.input), SetArg::TCSANOW, &reg.original);
    }
}
