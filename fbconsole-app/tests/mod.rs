use fbconsole_app::events::{spawn_input_poller, RefreshTimer};
use fbconsole_app::logging::build_subscriber;
use fbconsole_app::{
    AppEvent, Cancellation, ControlOutcome, ControlPolicy, Orchestrator, SharedState,
    ShutdownReason,
};
use fbconsole_core::text::MonoFontRasterizer;
use fbconsole_core::{
    Config, ConfirmAction, MenuContext, MenuRenderer, NetworkInterface, SystemInfoSource,
    SystemSnapshot,
};
use fbconsole_display::FrameBufferDevice;
use fbconsole_input::{ControlKey, RawModeOptions, RawTerminalInput};
use nix::pty::openpty;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════

struct FixedInfo;

impl SystemInfoSource for FixedInfo {
    fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            uptime: "0d 1h 2m".into(),
            cpu_model: "Test CPU".into(),
            cpu_cores: 2,
            memory_usage: "50.0% (used 1.0 GB / total 2.0 GB)".into(),
            disk_size: "8.0 GB".into(),
            disk_count: 1,
            current_time: "2026-01-01 00:00:00".into(),
            ip_address: "192.168.1.20".into(),
            device_id: None,
        }
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        vec![NetworkInterface {
            name: "eth0".into(),
            up: true,
            loopback: false,
            mac: Some("02:00:00:00:00:01".into()),
            ipv4: vec!["192.168.1.20".into()],
            ipv6: Vec::new(),
        }]
    }
}

struct Console {
    master: File,
    display: Arc<FrameBufferDevice>,
    input: Arc<RawTerminalInput>,
    orchestrator: Orchestrator,
}

fn pty_input() -> (File, RawTerminalInput) {
    let pty = openpty(None, None).unwrap();
    let master = File::from(pty.master);
    let slave = File::from(pty.slave);
    let control = slave.try_clone().unwrap();
    let input = RawTerminalInput::from_parts(slave, Some(control), RawModeOptions::default()).unwrap();
    (master, input)
}

fn console(config: Config) -> Console {
    let (master, input) = pty_input();
    let input = Arc::new(input);
    let display = Arc::new(FrameBufferDevice::shadow(640, 480, 32).unwrap());
    let renderer = MenuRenderer::new(
        display.clone(),
        Box::new(MonoFontRasterizer::for_size(20.0)),
        None,
        None,
    );
    let orchestrator = Orchestrator::new(
        display.clone(),
        input.clone(),
        renderer,
        Arc::new(FixedInfo),
        config,
    );
    Console {
        master,
        display,
        input,
        orchestrator,
    }
}

fn type_keys(master: &mut File, bytes: &[u8]) {
    master.write_all(bytes).unwrap();
    master.flush().unwrap();
}

/// Poll `check` every 10 ms for up to two seconds.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn press(master: &mut File, shared: &SharedState, key: u8, expected: MenuContext) {
    type_keys(master, &[key]);
    assert!(
        eventually(|| shared.context() == expected).await,
        "expected {:?} after 0x{:02x}, still on {:?}",
        expected,
        key,
        shared.context()
    );
}

// ════════════════════════════════════════════════════════════════════
// Control Keys
// ════════════════════════════════════════════════════════════════════

#[test]
fn test_swallowed_control_key_is_logged() {
    let log_file = NamedTempFile::new().unwrap();
    let subscriber = build_subscriber(log_file.reopen().unwrap());
    let policy = ControlPolicy::new(false);

    let outcome = tracing::subscriber::with_default(subscriber, || {
        policy.intercept(0x03, "status screen")
    });

    assert_eq!(outcome, ControlOutcome::Swallowed(ControlKey::Interrupt));
    let contents = std::fs::read_to_string(log_file.path()).unwrap();
    assert!(contents.contains("INFO"));
    assert!(contents.contains("Ctrl+C on status screen ignored"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_byte_ends_session() {
    let Console {
        mut master,
        display,
        input,
        orchestrator,
    } = console(Config::default());
    let shared = orchestrator.shared();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    type_keys(&mut master, &[0x03]);

    let reason = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::ControlKey(ControlKey::Interrupt));
    assert!(!shared.is_running());
    assert!(display.is_closed());
    assert!(!input.is_raw());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_byte_ignored_when_exit_disabled() {
    let config = Config {
        exit_on_control_keys: false,
        ..Config::default()
    };
    let Console {
        mut master,
        display,
        orchestrator,
        ..
    } = console(config);
    let shared = orchestrator.shared();
    let cancel = orchestrator.cancellation();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    for key in [0x03, 0x1A, 0x1C, 0x04] {
        type_keys(&mut master, &[key]);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    assert!(!cancel.is_cancelled());
    assert!(shared.is_running());
    assert!(!display.is_closed());

    cancel.cancel();
    let reason = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::Cancelled);
    assert!(display.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hangup_on_terminal_ends_session() {
    let Console {
        master,
        display,
        orchestrator,
        ..
    } = console(Config::default());
    let shared = orchestrator.shared();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    drop(master);

    let reason = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::InputClosed);
    assert!(display.is_closed());
}

// ════════════════════════════════════════════════════════════════════
// Menu Flow
// ════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_config_menu_pauses_and_return_repaints() {
    let Console {
        mut master,
        display,
        orchestrator,
        ..
    } = console(Config::default());
    let shared = orchestrator.shared();
    let cancel = orchestrator.cancellation();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    assert_eq!(shared.context(), MenuContext::MainStatus);

    press(&mut master, &shared, b'\r', MenuContext::ConfigMenu).await;
    assert!(!shared.is_running());

    let clears_in_menu = display.stats().full_clears;
    press(&mut master, &shared, b'q', MenuContext::MainStatus).await;
    assert!(eventually(|| shared.is_running()).await);
    assert!(
        eventually(|| display.stats().full_clears > clears_in_menu).await,
        "returning to the status screen must repaint it from scratch"
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dialog_transitions() {
    let Console {
        mut master,
        orchestrator,
        ..
    } = console(Config::default());
    let shared = orchestrator.shared();
    let cancel = orchestrator.cancellation();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    press(&mut master, &shared, b'\n', MenuContext::ConfigMenu).await;
    press(&mut master, &shared, b'1', MenuContext::InfoDialog).await;
    press(&mut master, &shared, b'x', MenuContext::ConfigMenu).await;
    press(
        &mut master,
        &shared,
        b'4',
        MenuContext::ConfirmDialog(ConfirmAction::Reboot),
    )
    .await;
    press(&mut master, &shared, b'n', MenuContext::ConfigMenu).await;
    press(
        &mut master,
        &shared,
        b'2',
        MenuContext::ConfirmDialog(ConfirmAction::RestartServices),
    )
    .await;
    press(&mut master, &shared, 0x1B, MenuContext::ConfigMenu).await;
    press(&mut master, &shared, 0x1B, MenuContext::MainStatus).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_modal_returns_to_status() {
    let config = Config {
        modal_timeout_secs: 1,
        ..Config::default()
    };
    let Console {
        mut master,
        orchestrator,
        ..
    } = console(config);
    let shared = orchestrator.shared();
    let cancel = orchestrator.cancellation();
    let session = tokio::spawn(orchestrator.run());

    assert!(eventually(|| shared.is_running()).await);
    press(&mut master, &shared, b'\r', MenuContext::ConfigMenu).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(eventually(|| shared.context() == MenuContext::MainStatus).await);
    assert!(shared.is_running());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Input Relay
// ════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_relay_keeps_order() {
    let (mut master, input) = pty_input();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = Cancellation::new();
    let poller = spawn_input_poller(Arc::new(input), tx, cancel.clone());

    type_keys(&mut master, b"xyz");
    let mut received = Vec::new();
    for _ in 0..3 {
        let key = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(key);
    }
    assert_eq!(received, b"xyz");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), poller)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_relay_drops_keys_nobody_takes() {
    let (mut master, input) = pty_input();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = Cancellation::new();
    let poller = spawn_input_poller(Arc::new(input), tx, cancel.clone());

    type_keys(&mut master, b"abc");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(rx.recv().await, Some(b'a'));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "b and c should have been dropped");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), poller)
        .await
        .unwrap()
        .unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Refresh Timer
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_timer_ticks_each_period() {
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = Cancellation::new();
    let (_timer, _task) = RefreshTimer::spawn(Duration::from_secs(5), tx, cancel);

    let start = Instant::now();
    assert_eq!(rx.recv().await, Some(AppEvent::Refresh));
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_paused_timer_is_silent_until_resumed() {
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = Cancellation::new();
    let (timer, _task) = RefreshTimer::spawn(Duration::from_secs(5), tx, cancel);

    assert_eq!(rx.recv().await, Some(AppEvent::Refresh));
    timer.pause();
    assert!(timer.is_paused());
    assert!(tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .is_err());

    timer.resume();
    assert!(!timer.is_paused());
    let resumed = Instant::now();
    assert_eq!(rx.recv().await, Some(AppEvent::Refresh));
    assert!(resumed.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_resume_restarts_the_period() {
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = Cancellation::new();
    let (timer, _task) = RefreshTimer::spawn(Duration::from_secs(5), tx, cancel);

    assert_eq!(rx.recv().await, Some(AppEvent::Refresh));
    tokio::time::sleep(Duration::from_secs(3)).await;

    timer.resume();
    let resumed = Instant::now();
    assert_eq!(rx.recv().await, Some(AppEvent::Refresh));
    assert!(resumed.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_timer_stops_on_cancel() {
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = Cancellation::new();
    let (_timer, task) = RefreshTimer::spawn(Duration::from_secs(5), tx, cancel.clone());

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(rx.recv().await, None);
}

// ════════════════════════════════════════════════════════════════════
// Cancellation & Shared State
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_cancellation_wakes_every_clone() {
    let cancel = Cancellation::new();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let c = cancel.clone();
            tokio::spawn(async move { c.cancelled().await })
        })
        .collect();

    assert!(!cancel.is_cancelled());
    cancel.cancel();
    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_resolves_after_the_fact() {
    let cancel = Cancellation::new();
    cancel.cancel();
    tokio::time::timeout(Duration::from_millis(100), cancel.cancelled())
        .await
        .unwrap();
}

#[test]
fn test_shared_state_defaults() {
    let shared = SharedState::default();
    assert!(!shared.is_running());
    assert_eq!(shared.context(), MenuContext::MainStatus);

    shared.set_context(MenuContext::ConfigMenu);
    shared.set_running(true);
    assert_eq!(shared.context(), MenuContext::ConfigMenu);
    assert!(shared.is_running());
}
