//! Handlers for events emitted by the engine.

use buildwatch_core::{MonitorEvent, MonitorEventKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives every event the engine emits.
///
/// Called on the tick loop, so implementations must not block.
pub trait MonitorHandler: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: &MonitorEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl MonitorHandler for NoOpHandler {
    fn on_event(&self, _event: &MonitorEvent) {}
}

/// Handler that logs events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl MonitorHandler for LoggingHandler {
    fn on_event(&self, event: &MonitorEvent) {
        let session = &event.session;
        match &event.kind {
            MonitorEventKind::LogOpened { path } => {
                info!(%session, path = %path, "Log opened");
            }
            MonitorEventKind::CaughtUp { backlog_lines } => {
                info!(%session, backlog_lines, "Caught up with log");
            }
            MonitorEventKind::Stalled { idle, current, total } => {
                warn!(
                    %session,
                    idle_secs = idle.as_secs(),
                    current,
                    total,
                    "Build stalled"
                );
            }
            MonitorEventKind::Recovered => {
                info!(%session, "Build active again");
            }
            MonitorEventKind::Failed { line } => {
                warn!(%session, line = %line, "Build failed");
            }
            MonitorEventKind::PauseRequested => {
                info!(%session, "Pause requested");
            }
            MonitorEventKind::ResumeRequested => {
                info!(%session, "Resume requested");
            }
            MonitorEventKind::Completed { total, elapsed } => {
                info!(
                    %session,
                    total,
                    elapsed_secs = elapsed.as_secs(),
                    "Build complete"
                );
            }
        }
    }
}

/// Handler that forwards events into a bounded channel.
///
/// Never waits: when the channel is full the event is dropped and logged.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<MonitorEvent>,
}

impl ChannelHandler {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<MonitorEvent>) -> Self {
        Self { tx }
    }
}

impl MonitorHandler for ChannelHandler {
    fn on_event(&self, event: &MonitorEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(kind = ?dropped.kind, "Event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver gone");
            }
        }
    }
}

/// Create a bounded event channel and the handler feeding it.
pub fn event_channel(capacity: usize) -> (ChannelHandler, mpsc::Receiver<MonitorEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelHandler::new(tx), rx)
}
