//! The raw-mode terminal session.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, IntoRawFd};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{
    tcgetattr, tcsetattr, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};

use crate::emergency;
use crate::error::InputError;
use crate::keys::{self, MenuChoice};

pub(crate) const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
pub(crate) const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

const STDIN_PATH: &str = "/dev/stdin";
const TTY_PATH: &str = "/dev/tty";

/// Sleep between readiness checks in the `wait_for_*` helpers.
const WAIT_STEP: Duration = Duration::from_millis(10);

/// Longest single wait inside `read_key`; the session lock is released
/// between waits.
const READ_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct RawModeOptions {
    /// Also clear ISIG, so Ctrl+C / Ctrl+Z / Ctrl+\ reach the reader as bytes
    /// instead of being turned into signals by the line discipline.
    pub deliver_control_bytes: bool,
}

impl Default for RawModeOptions {
    fn default() -> Self {
        Self {
            deliver_control_bytes: true,
        }
    }
}

/// Where cursor escape sequences go.
enum ControlStream {
    Tty(File),
    Stdout,
}

impl ControlStream {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            ControlStream::Tty(f) => {
                f.write_all(bytes)?;
                f.flush()
            }
            ControlStream::Stdout => {
                let mut out = std::io::stdout();
                out.write_all(bytes)?;
                out.flush()
            }
        }
    }

    fn raw_fd(&self) -> Option<i32> {
        match self {
            ControlStream::Tty(f) => Some(f.as_raw_fd()),
            ControlStream::Stdout => None,
        }
    }
}

struct Session {
    input: Option<File>,
    control: Option<ControlStream>,
    original: Termios,
    restored: bool,
}

pub struct RawTerminalInput {
    session: Mutex<Session>,
}

impl std::fmt::Debug for RawTerminalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawTerminalInput")
            .field("raw", &self.is_raw())
            .finish()
    }
}

/// The attribute set applied on open.
pub fn raw_attributes(original: &Termios, options: RawModeOptions) -> Termios {
    let mut raw = original.clone();
    raw.local_flags.remove(
        LocalFlags::ICANON
            | LocalFlags::ECHO
            | LocalFlags::ECHOE
            | LocalFlags::ECHOK
            | LocalFlags::ECHONL
            | LocalFlags::ECHOPRT
            | LocalFlags::ECHOKE,
    );
    if options.deliver_control_bytes {
        raw.local_flags.remove(LocalFlags::ISIG);
    }
    raw.input_flags
        .remove(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}

impl RawTerminalInput {
    /// Open the process terminal: `/dev/stdin` for keys, `/dev/tty` for the
    /// cursor. A missing `/dev/tty` falls back to standard output.
    pub fn open(options: RawModeOptions) -> Result<Self, InputError> {
        let input = File::open(STDIN_PATH).map_err(|source| InputError::DeviceUnavailable {
            path: STDIN_PATH.into(),
            source,
        })?;
        let control = match OpenOptions::new().write(true).open(TTY_PATH) {
            Ok(tty) => Some(tty),
            Err(e) => {
                tracing::warn!("{} unavailable ({}), cursor control via stdout", TTY_PATH, e);
                None
            }
        };
        Self::from_parts(input, control, options)
    }

    /// Drive a session over an already-open terminal descriptor.
    pub fn from_parts(
        input: File,
        control: Option<File>,
        options: RawModeOptions,
    ) -> Result<Self, InputError> {
        let original = tcgetattr(input.as_fd())?;
        let raw = raw_attributes(&original, options);
        tcsetattr(input.as_fd(), SetArg::TCSANOW, &raw)?;

        let mut control = match control {
            Some(tty) => ControlStream::Tty(tty),
            None => ControlStream::Stdout,
        };
        if let Err(e) = control.send(HIDE_CURSOR) {
            tracing::debug!("Could not hide cursor: {}", e);
        }

        emergency::register(input.as_raw_fd(), control.raw_fd(), original.clone());
        tracing::info!(
            "Terminal in raw mode (control bytes as data: {})",
            options.deliver_control_bytes
        );

        Ok(Self {
            session: Mutex::new(Session {
                input: Some(input),
                control: Some(control),
                original,
                restored: false,
            }),
        })
    }

    pub fn open_path(path: &Path, options: RawModeOptions) -> Result<Self, InputError> {
        let input = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| InputError::DeviceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_parts(input, None, options)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_raw(&self) -> bool {
        let session = self.lock();
        session.input.is_some() && !session.restored
    }

    /// The attributes captured before raw mode was applied.
    pub fn original_attributes(&self) -> Termios {
        self.lock().original.clone()
    }

    /// The attributes currently in effect on the input descriptor.
    pub fn current_attributes(&self) -> Result<Termios, InputError> {
        let session = self.lock();
        let input = session.input.as_ref().ok_or(InputError::InputDeviceClosed)?;
        Ok(tcgetattr(input.as_fd())?)
    }

    /// Block until one byte arrives.
    pub fn read_key(&self) -> Result<u8, InputError> {
        loop {
            if let Some(key) = self.read_key_with_timeout(READ_STEP)? {
                return Ok(key);
            }
        }
    }

    /// Poll without waiting.
    pub fn read_key_nonblocking(&self) -> Result<Option<u8>, InputError> {
        self.read_key_with_timeout(Duration::ZERO)
    }

    /// Wait at most `timeout` for one byte. `Ok(None)` means no data,
    /// including when the wait was interrupted by a signal.
    pub fn read_key_with_timeout(&self, timeout: Duration) -> Result<Option<u8>, InputError> {
        let mut session = self.lock();
        let input = session.input.as_mut().ok_or(InputError::InputDeviceClosed)?;

        let millis = timeout.as_millis().min(u16::MAX as u128) as u16;
        let mut fds = [PollFd::new(input.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(None),
            Err(e) => return Err(InputError::Io(e.into())),
        }

        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        let hung_up = revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL);
        if !revents.contains(PollFlags::POLLIN) {
            return if hung_up {
                Err(InputError::Disconnected)
            } else {
                Ok(None)
            };
        }

        let mut buf = [0u8; 1];
        match input.read(&mut buf) {
            Ok(0) if hung_up => Err(InputError::Disconnected),
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => Err(InputError::Disconnected),
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for one of `keys` (any key when empty), polling every 10 ms.
    pub fn wait_for_key(&self, keys: &[u8], timeout: Duration) -> Result<u8, InputError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(key) = self.read_key_nonblocking()? {
                if keys.is_empty() || keys.contains(&key) {
                    return Ok(key);
                }
            }
            if Instant::now() >= deadline {
                return Err(InputError::Timeout);
            }
            std::thread::sleep(WAIT_STEP);
        }
    }

    pub fn wait_for_enter(&self, timeout: Duration) -> Result<(), InputError> {
        self.wait_for_key(&[keys::CARRIAGE_RETURN, keys::LINE_FEED], timeout)
            .map(|_| ())
    }

    /// Wait for a menu key; anything unrecognized is skipped.
    pub fn wait_for_menu_choice(&self, timeout: Duration) -> Result<MenuChoice, InputError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let key = self.wait_for_key(&[], remaining)?;
            if let Some(choice) = MenuChoice::from_byte(key) {
                return Ok(choice);
            }
        }
    }

    /// Show the cursor and reapply the original attributes. Runs once.
    pub fn restore_terminal(&self) -> Result<(), InputError> {
        let mut session = self.lock();
        restore(&mut session)
    }

    /// Restore if needed, then close both streams. Every step runs even when
    /// an earlier one fails. A second call is a no-op.
    pub fn close(&self) -> Result<(), InputError> {
        let mut session = self.lock();
        let mut failures = Vec::new();

        if let Err(e) = restore(&mut session) {
            failures.push(format!("restore: {}", e));
        }
        if let Some(input) = session.input.take() {
            // The descriptor is going away, restored or not.
            emergency::unregister(input.as_raw_fd());
            if let Err(e) = nix::unistd::close(input.into_raw_fd()) {
                failures.push(format!("input: {}", e));
            }
        }
        if let Some(ControlStream::Tty(tty)) = session.control.take() {
            if let Err(e) = nix::unistd::close(tty.into_raw_fd()) {
                failures.push(format!("control: {}", e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InputError::Close(failures))
        }
    }
}

fn restore(session: &mut Session) -> Result<(), InputError> {
    if session.restored {
        return Ok(());
    }

    if let Some(control) = session.control.as_mut() {
        if let Err(e) = control.send(SHOW_CURSOR) {
            tracing::debug!("Could not show cursor: {}", e);
        }
    }
    let Some(input) = session.input.as_ref() else {
        session.restored = true;
        return Ok(());
    };
    // Stays registered for the panic hook until the reapply sticks.
    tcsetattr(input.as_fd(), SetArg::TCSANOW, &session.original)?;
    emergency::unregister(input.as_raw_fd());
    session.restored = true;
    tracing::info!("Terminal attributes restored");
    Ok(())
}

impl Drop for RawTerminalInput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Terminal cleanup on drop: {}", e);
        }
    }
}
