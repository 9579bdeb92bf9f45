//! Engine polling thread
//!
//! The thread owns the engine, the coordinator and every backend. Other
//! threads only flip flags on `EngineControl` and unpark it; settings reach
//! it through `SharedSettings`, status leaves through a bounded channel.

use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

use super::{AutomationEngine, StatusSink, StatusUpdate};
use crate::config::SharedSettings;
use crate::constants::engine;
use crate::coordinator::HardwareCoordinator;
use crate::hardware::Backends;
use crate::process_monitor::{ProcessMonitor, ProcessSource};
use crate::safety::{panic_message, SafetyTrigger};

#[derive(Debug, Default)]
struct EngineControl {
    running: AtomicBool,
    shutdown: AtomicBool,
}

/// Control side of the automation thread
pub struct EngineHandle {
    control: Arc<EngineControl>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn start(&self) {
        self.set_running(true);
    }

    pub fn stop(&self) {
        self.set_running(false);
    }

    /// Flip automation on or off; returns the new state
    pub fn toggle(&self) -> bool {
        let running = !self.control.running.fetch_xor(true, Ordering::SeqCst);
        self.wake();
        running
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    /// Ask the thread to revert hardware and exit, then wait for it
    pub fn shutdown(mut self) -> Result<()> {
        self.join()
    }

    fn set_running(&self, running: bool) {
        self.control.running.store(running, Ordering::SeqCst);
        self.wake();
    }

    fn wake(&self) {
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }

    fn join(&mut self) -> Result<()> {
        self.control.shutdown.store(true, Ordering::SeqCst);
        self.wake();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|payload| anyhow::anyhow!("automation thread panicked: {}", panic_message(payload.as_ref())))?;
        }
        Ok(())
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            error!(error = %e, "Automation thread did not exit cleanly");
        }
    }
}

/// Reverts hardware however the thread leaves its loop
struct ExitGuard<S: ProcessSource> {
    engine: AutomationEngine<S>,
    settings: SharedSettings,
}

impl<S: ProcessSource> Drop for ExitGuard<S> {
    fn drop(&mut self) {
        let trigger = if thread::panicking() {
            SafetyTrigger::TickPanic
        } else {
            SafetyTrigger::Shutdown
        };
        self.engine.halt(&self.settings.snapshot(), trigger);
        if self.engine.state().running {
            self.engine.set_running(false);
            self.engine.publish(StatusUpdate::Stopped);
        }
        info!("Automation thread exiting");
    }
}

/// Start the automation thread.
///
/// With `start_running` false the thread idles until `EngineHandle::start`.
pub fn spawn<S>(
    source: S,
    backends: Backends,
    settings: SharedSettings,
    start_running: bool,
) -> Result<(EngineHandle, Receiver<StatusUpdate>)>
where
    S: ProcessSource + 'static,
{
    let (tx, rx) = sync_channel(engine::STATUS_CHANNEL_CAPACITY);
    let control = Arc::new(EngineControl {
        running: AtomicBool::new(start_running),
        shutdown: AtomicBool::new(false),
    });

    let automation = AutomationEngine::new(
        ProcessMonitor::new(source),
        HardwareCoordinator::new(backends),
        StatusSink::new(tx),
    );

    let thread_control = Arc::clone(&control);
    let thread = thread::Builder::new()
        .name(engine::THREAD_NAME.to_string())
        .spawn(move || {
            let mut guard = ExitGuard {
                engine: automation,
                settings,
            };
            run_loop(&mut guard, &thread_control);
        })
        .context("Failed to spawn automation thread")?;

    info!(running = start_running, "Automation thread started");
    Ok((
        EngineHandle {
            control,
            thread: Some(thread),
        },
        rx,
    ))
}

fn run_loop<S: ProcessSource>(guard: &mut ExitGuard<S>, control: &EngineControl) {
    let engine = &mut guard.engine;

    while !control.shutdown.load(Ordering::SeqCst) {
        let snapshot = guard.settings.snapshot();
        let running = control.running.load(Ordering::SeqCst);

        if running != engine.state().running {
            engine.set_running(running);
            if running {
                info!("Automation started");
                engine.publish(StatusUpdate::Started);
            } else {
                info!("Automation stopped");
                engine.halt(&snapshot, SafetyTrigger::Stop);
                engine.publish(StatusUpdate::Stopped);
            }
        }

        if running {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| engine.tick(&snapshot))) {
                error!(panic = %panic_message(payload.as_ref()), "Automation tick panicked, continuing");
            }
        }

        thread::park_timeout(Duration::from_millis(snapshot.poll_interval_ms));
    }
}
