//! The main loop: one screen at a time, one event at a time.

use std::future::Future;
use std::sync::Arc;

use fbconsole_core::menu::screens;
use fbconsole_core::system::{actions, probe};
use fbconsole_core::{
    Config, ConfirmAction, ConsoleError, MenuAction, MenuContext, MenuRenderer, PaintOutcome,
    SystemInfoSource,
};
use fbconsole_display::FrameBufferDevice;
use fbconsole_input::{ControlKey, RawTerminalInput};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::control::{ControlOutcome, ControlPolicy};
use crate::events::{self, AppEvent, Cancellation, ConsoleSignal, RefreshTimer, SharedState};

/// How long "Rebooting..." stays up before the command runs.
const POWER_NOTICE: Duration = Duration::from_secs(2);

/// Why the main loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Cancelled,
    ControlKey(ControlKey),
    Signal(ConsoleSignal),
    InputClosed,
}

enum Flow {
    Continue,
    Stop(ShutdownReason),
}

struct Inbox {
    keys: mpsc::Receiver<u8>,
    events: mpsc::Receiver<AppEvent>,
}

pub struct Orchestrator {
    display: Arc<FrameBufferDevice>,
    input: Arc<RawTerminalInput>,
    renderer: MenuRenderer,
    info: Arc<dyn SystemInfoSource>,
    config: Config,
    policy: ControlPolicy,
    shared: Arc<SharedState>,
    cancel: Cancellation,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("display", &self.display.path())
            .field("renderer", &self.renderer)
            .field("policy", &self.policy)
            .field("shared", &self.shared)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        display: Arc<FrameBufferDevice>,
        input: Arc<RawTerminalInput>,
        renderer: MenuRenderer,
        info: Arc<dyn SystemInfoSource>,
        config: Config,
    ) -> Self {
        Self {
            display,
            input,
            renderer,
            info,
            policy: ControlPolicy::new(config.exit_on_control_keys),
            config,
            shared: Arc::new(SharedState::default()),
            cancel: Cancellation::new(),
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Run until a shutdown trigger, then clean up.
    ///
    /// Cleanup always runs; an `Err` means a fatal device error ended the
    /// session rather than a request to stop.
    pub async fn run(mut self) -> Result<ShutdownReason, ConsoleError> {
        let (key_tx, keys) = mpsc::channel(1);
        let (event_tx, events) = mpsc::channel(8);

        let mut tasks = vec![events::spawn_input_poller(
            self.input.clone(),
            key_tx,
            self.cancel.clone(),
        )];
        let (timer, timer_task) = RefreshTimer::spawn(
            self.config.refresh_interval(),
            event_tx.clone(),
            self.cancel.clone(),
        );
        tasks.push(timer_task);
        match events::spawn_signal_watcher(event_tx, self.cancel.clone()) {
            Ok(task) => tasks.push(task),
            Err(e) => tracing::warn!("Signal watcher unavailable: {}", e),
        }

        self.shared.set_running(true);
        self.shared.set_context(MenuContext::MainStatus);
        self.refresh();
        tracing::info!(
            "Status console running, refresh every {:?}",
            self.config.refresh_interval()
        );

        let mut inbox = Inbox { keys, events };
        let outcome = self.main_loop(&timer, &mut inbox).await;

        match &outcome {
            Ok(reason) => tracing::info!("Shutting down: {:?}", reason),
            Err(e) => tracing::error!("Shutting down on fatal error: {}", e),
        }
        self.shutdown(tasks).await;
        drop(timer);
        outcome
    }

    async fn main_loop(
        &mut self,
        timer: &RefreshTimer,
        inbox: &mut Inbox,
    ) -> Result<ShutdownReason, ConsoleError> {
        let mut context = MenuContext::MainStatus;
        let mut idle_deadline: Option<Instant> = None;

        loop {
            let idle = async move {
                match idle_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(ShutdownReason::Cancelled),
                Some(event) = inbox.events.recv() => match event {
                    AppEvent::Refresh => {
                        if !context.is_modal() && self.shared.is_running() {
                            self.refresh();
                        }
                    }
                    AppEvent::Signal(signal) => {
                        if self.policy.on_signal(signal) {
                            return Ok(ShutdownReason::Signal(signal));
                        }
                    }
                },
                key = inbox.keys.recv() => {
                    let Some(key) = key else {
                        return Ok(ShutdownReason::InputClosed);
                    };
                    match self.policy.intercept(key, location(context)) {
                        ControlOutcome::Shutdown(control) => {
                            return Ok(ShutdownReason::ControlKey(control))
                        }
                        ControlOutcome::Swallowed(_) => continue,
                        ControlOutcome::NotControl => {}
                    }

                    match self.handle_key(&mut context, key, timer, inbox).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Stop(reason)) => return Ok(reason),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => tracing::warn!("Screen update failed: {}", e),
                    }
                    idle_deadline = context
                        .is_modal()
                        .then(|| Instant::now() + self.config.modal_timeout());
                },
                _ = idle => {
                    tracing::info!(
                        "No input for {:?} on {}, back to status",
                        self.config.modal_timeout(),
                        location(context)
                    );
                    self.leave_modal(&mut context, timer);
                    idle_deadline = None;
                }
            }
        }
    }

    async fn handle_key(
        &mut self,
        context: &mut MenuContext,
        key: u8,
        timer: &RefreshTimer,
        inbox: &mut Inbox,
    ) -> Result<Flow, ConsoleError> {
        let action = context.on_key(key);
        if action != MenuAction::Ignore {
            tracing::debug!("Key 0x{:02x} on {} -> {:?}", key, location(*context), action);
        }

        match action {
            MenuAction::Ignore => {}
            MenuAction::EnterConfig => {
                self.enter_modal(timer);
                self.switch(context, MenuContext::ConfigMenu);
                self.renderer.render_config_menu()?;
            }
            MenuAction::ShowNetworkInterfaces => {
                self.switch(context, MenuContext::InfoDialog);
                let lines = screens::network_interfaces(&self.info.network_interfaces());
                self.renderer.render_lines(&lines)?;
            }
            MenuAction::RunConnectivityTest => {
                self.switch(context, MenuContext::InfoDialog);
                return self.connectivity_test(inbox).await;
            }
            MenuAction::Confirm(action) => {
                self.switch(context, MenuContext::ConfirmDialog(action));
                let lines = screens::confirm_prompt(action, &self.config.services);
                self.renderer.render_lines(&lines)?;
            }
            MenuAction::Execute(action) => {
                self.switch(context, MenuContext::InfoDialog);
                return self.execute(action, inbox).await;
            }
            MenuAction::BackToConfig => {
                self.switch(context, MenuContext::ConfigMenu);
                self.renderer.render_config_menu()?;
            }
            MenuAction::BackToMain => self.leave_modal(context, timer),
        }
        Ok(Flow::Continue)
    }

    async fn connectivity_test(&mut self, inbox: &mut Inbox) -> Result<Flow, ConsoleError> {
        let targets = self.config.probe_targets.clone();
        tracing::info!("Connectivity test against {} targets", targets.len());

        let renderer = &mut self.renderer;
        let test = probe::run_connectivity_test(&targets, |index, total, target| {
            let lines = screens::connectivity_progress(index, total, target);
            if let Err(e) = renderer.render_lines(&lines) {
                tracing::warn!("Progress paint failed: {}", e);
            }
        });

        let results = match guarded(test, inbox, &self.policy, &self.cancel).await {
            Ok(results) => results,
            Err(reason) => return Ok(Flow::Stop(reason)),
        };
        self.renderer
            .render_lines(&screens::connectivity_report(&results))?;
        Ok(Flow::Continue)
    }

    async fn execute(&mut self, action: ConfirmAction, inbox: &mut Inbox) -> Result<Flow, ConsoleError> {
        tracing::info!("Confirmed {:?}", action);
        self.renderer
            .render_message(screens::action_in_progress(action))?;

        let work = perform(action, self.config.services.clone());
        let lines = match guarded(work, inbox, &self.policy, &self.cancel).await {
            Err(reason) => return Ok(Flow::Stop(reason)),
            Ok(Ok(())) => {
                tracing::info!("{:?} completed", action);
                screens::message("Done")
            }
            Ok(Err(e)) => {
                tracing::warn!("{:?} failed: {}", action, e);
                screens::message(&format!("Operation failed: {}", e))
            }
        };
        self.renderer.render_lines(&lines)?;
        Ok(Flow::Continue)
    }

    fn switch(&self, context: &mut MenuContext, next: MenuContext) {
        *context = next;
        self.shared.set_context(next);
    }

    fn enter_modal(&self, timer: &RefreshTimer) {
        timer.pause();
        self.shared.set_running(false);
        tracing::info!("Entered configuration menu, refresh paused");
    }

    fn leave_modal(&mut self, context: &mut MenuContext, timer: &RefreshTimer) {
        self.switch(context, MenuContext::MainStatus);
        self.renderer.invalidate();
        timer.resume();
        self.shared.set_running(true);
        tracing::info!("Back on the status screen, refresh resumed");
        self.refresh();
    }

    fn refresh(&mut self) {
        let snapshot = self.info.snapshot();
        match self.renderer.render_main_status(&snapshot) {
            Ok(PaintOutcome::Skipped) => {}
            Ok(outcome) => tracing::debug!("Status paint: {:?}", outcome),
            Err(e) => tracing::warn!("Status paint failed, retrying next tick: {}", e),
        }
    }

    async fn shutdown(&self, tasks: Vec<JoinHandle<()>>) {
        self.shared.set_running(false);
        self.cancel.cancel();

        let grace = self.config.shutdown_grace();
        let drain = async {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!("Activity ended abnormally: {}", e);
                }
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("Activities still busy after {:?}, cleaning up anyway", grace);
        }

        self.cleanup();
    }

    /// Restore the terminal, close the keyboard, close the framebuffer.
    /// Every step runs; the failures are returned and logged.
    pub fn cleanup(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if let Err(e) = self.input.restore_terminal() {
            failures.push(format!("restore terminal: {}", e));
        }
        if let Err(e) = self.input.close() {
            failures.push(format!("close keyboard: {}", e));
        }
        if let Err(e) = self.display.close() {
            failures.push(format!("close framebuffer: {}", e));
        }

        for failure in &failures {
            tracing::error!("Cleanup failed: {}", failure);
        }
        if failures.is_empty() {
            tracing::info!("Cleanup complete");
        }
        failures
    }
}

fn location(context: MenuContext) -> &'static str {
    match context {
        MenuContext::MainStatus => "status screen",
        MenuContext::ConfigMenu => "configuration menu",
        MenuContext::InfoDialog => "info dialog",
        MenuContext::ConfirmDialog(_) => "confirmation dialog",
    }
}

/// Drive `work` while still honoring control keys, signals and cancellation.
/// Other keys pressed meanwhile are discarded.
async fn guarded<F: Future>(
    work: F,
    inbox: &mut Inbox,
    policy: &ControlPolicy,
    cancel: &Cancellation,
) -> Result<F::Output, ShutdownReason> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Ok(output),
            _ = cancel.cancelled() => return Err(ShutdownReason::Cancelled),
            key = inbox.keys.recv() => match key {
                None => return Err(ShutdownReason::InputClosed),
                Some(key) => match policy.intercept(key, "busy screen") {
                    ControlOutcome::Shutdown(control) => {
                        return Err(ShutdownReason::ControlKey(control))
                    }
                    ControlOutcome::Swallowed(_) => {}
                    ControlOutcome::NotControl => {
                        tracing::debug!("Key 0x{:02x} ignored while busy", key);
                    }
                },
            },
            Some(AppEvent::Signal(signal)) = inbox.events.recv() => {
                if policy.on_signal(signal) {
                    return Err(ShutdownReason::Signal(signal));
                }
            }
        }
    }
}

async fn perform(action: ConfirmAction, services: Vec<String>) -> Result<(), ConsoleError> {
    actions::require_root()?;
    match action {
        ConfirmAction::RestartServices => {
            let mut failures = Vec::new();
            for service in &services {
                if let Err(e) = actions::restart_service(service).await {
                    tracing::warn!("Restart of {} failed: {}", service, e);
                    failures.push(format!("{}: {}", service, e));
                }
            }
            if failures.is_empty() {
                Ok(())
            } else {
                Err(ConsoleError::Command(failures.join("; ")))
            }
        }
        ConfirmAction::Reboot => {
            tokio::time::sleep(POWER_NOTICE).await;
            actions::reboot().await
        }
        ConfirmAction::Shutdown => {
            tokio::time::sleep(POWER_NOTICE).await;
            actions::shutdown().await
        }
    }
}
