//! The activities feeding the main loop, and the state they share with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fbconsole_core::MenuContext;
use fbconsole_input::{InputError, RawTerminalInput};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Upper bound on one blocking readiness check in the poller.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long a key waits for the main loop before it is dropped.
pub const RELAY_GRACE: Duration = Duration::from_millis(50);

/// Events other than keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Refresh,
    Signal(ConsoleSignal),
}

/// The OS signals the console listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleSignal {
    Interrupt,
    Terminate,
    Hangup,
    Suspend,
    Quit,
}

impl ConsoleSignal {
    /// Signals a keyboard can raise when ISIG is left on.
    pub fn is_keyboard_generated(self) -> bool {
        matches!(
            self,
            ConsoleSignal::Interrupt | ConsoleSignal::Suspend | ConsoleSignal::Quit
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ConsoleSignal::Interrupt => "SIGINT",
            ConsoleSignal::Terminate => "SIGTERM",
            ConsoleSignal::Hangup => "SIGHUP",
            ConsoleSignal::Suspend => "SIGTSTP",
            ConsoleSignal::Quit => "SIGQUIT",
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// One-shot, cloneable shutdown flag every activity watches.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// The coarse flags the main loop publishes for everyone else.
#[derive(Debug, Default)]
pub struct SharedState {
    running: AtomicBool,
    context: Mutex<MenuContext>,
}

impl SharedState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn context(&self) -> MenuContext {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_context(&self, context: MenuContext) {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = context;
    }
}

// ============================================================================
// Input poller
// ============================================================================

/// Read keys on a blocking thread and relay them one at a time.
///
/// Stops on cancellation, on a closed relay, or when the terminal goes away.
/// Dropping the relay sender is how the main loop learns the input is gone.
pub fn spawn_input_poller(
    input: Arc<RawTerminalInput>,
    keys: mpsc::Sender<u8>,
    cancel: Cancellation,
) -> JoinHandle<()> {
    let handle = tokio::runtime::Handle::current();

    tokio::task::spawn_blocking(move || {
        tracing::info!("Input poller started");
        while !cancel.is_cancelled() {
            match input.read_key_with_timeout(POLL_INTERVAL) {
                Ok(Some(key)) => match handle.block_on(keys.send_timeout(key, RELAY_GRACE)) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(key)) => {
                        tracing::debug!("Dropped key 0x{:02x}, main loop busy", key);
                    }
                    Err(SendTimeoutError::Closed(_)) => break,
                },
                Ok(None) => {}
                Err(InputError::InputDeviceClosed) | Err(InputError::Disconnected) => {
                    tracing::warn!("Terminal input went away, poller stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Key read failed: {}", e);
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
        tracing::info!("Input poller stopped");
    })
}

// ============================================================================
// Refresh timer
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct TimerState {
    active: bool,
    // Bumped on every resume so the task restarts a full period.
    epoch: u64,
}

/// Handle to the periodic refresh task.
#[derive(Debug)]
pub struct RefreshTimer {
    control: watch::Sender<TimerState>,
}

impl RefreshTimer {
    /// Start ticking every `period`, sending [`AppEvent::Refresh`] into `events`.
    pub fn spawn(
        period: Duration,
        events: mpsc::Sender<AppEvent>,
        cancel: Cancellation,
    ) -> (Self, JoinHandle<()>) {
        let (control, mut rx) = watch::channel(TimerState {
            active: true,
            epoch: 0,
        });

        let task = tokio::spawn(async move {
            loop {
                let state = *rx.borrow_and_update();
                if !state.active {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        changed = rx.changed() => if changed.is_err() { break },
                    }
                    continue;
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => if changed.is_err() { break },
                    _ = tokio::time::sleep(period) => {
                        if events.send(AppEvent::Refresh).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Refresh timer stopped");
        });

        (Self { control }, task)
    }

    pub fn pause(&self) {
        self.control.send_modify(|s| s.active = false);
    }

    /// Resume with a full period before the next tick.
    pub fn resume(&self) {
        self.control.send_modify(|s| {
            s.active = true;
            s.epoch = s.epoch.wrapping_add(1);
        });
    }

    pub fn is_paused(&self) -> bool {
        !self.control.borrow().active
    }
}

// ============================================================================
// Signal watcher
// ============================================================================

/// Forward INT, TERM, HUP, TSTP and QUIT to the main loop.
pub fn spawn_signal_watcher(
    events: mpsc::Sender<AppEvent>,
    cancel: Cancellation,
) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut suspend = signal(SignalKind::from_raw(nix::sys::signal::Signal::SIGTSTP as i32))?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(()) = interrupt.recv() => ConsoleSignal::Interrupt,
                Some(()) = terminate.recv() => ConsoleSignal::Terminate,
                Some(()) = hangup.recv() => ConsoleSignal::Hangup,
                Some(()) = quit.recv() => ConsoleSignal::Quit,
                Some(()) = suspend.recv() => ConsoleSignal::Suspend,
                else => break,
            };
            tracing::info!("Received {}", received.name());
            if events.send(AppEvent::Signal(received)).await.is_err() {
                break;
            }
        }
        tracing::debug!("Signal watcher stopped");
    }))
}
