use super::backend::{BackendAck, ScenarioBackend};
use crate::error::{ControlError, ValidationError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Bot lifecycle calls tracked by `BotController`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BotAction {
    Run,
    Restart,
    Stop,
    Status,
}

impl BotAction {
    pub fn name(self) -> &'static str {
        match self {
            BotAction::Run => "run",
            BotAction::Restart => "restart",
            BotAction::Stop => "stop",
            BotAction::Status => "status",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// What became of a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome<T> {
    Completed(T),
    /// A newer request of the same action was issued while this one was in
    /// flight; its result was discarded.
    Superseded,
}

impl<T> ControlOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            ControlOutcome::Completed(value) => Some(value),
            ControlOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, ControlOutcome::Superseded)
    }
}

/// Runs, stops and polls one bot.
///
/// Run, restart and stop share a loading gate: while one of them is in
/// flight the others fail with `ControlError::Busy`. Every request is
/// stamped with a per-action sequence number, and a response that arrives
/// after a newer request of the same action was issued is dropped. Starting
/// or stopping the bot also invalidates status polls already in flight.
pub struct BotController<B> {
    backend: B,
    bot_id: String,
    loading: AtomicBool,
    sequences: [AtomicU64; 4],
    running: AtomicBool,
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<B: ScenarioBackend> BotController<B> {
    pub fn new(backend: B, bot_id: impl Into<String>) -> Self {
        Self {
            backend,
            bot_id: bot_id.into(),
            loading: AtomicBool::new(false),
            sequences: Default::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// True while a run, restart or stop call is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Last running state reported by the backend.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest sequence number issued for `action`; 0 if never issued.
    pub fn latest_sequence(&self, action: BotAction) -> u64 {
        self.sequences[action.slot()].load(Ordering::SeqCst)
    }

    fn issue(&self, action: BotAction) -> u64 {
        self.sequences[action.slot()].fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, action: BotAction, sequence: u64) -> bool {
        self.latest_sequence(action) == sequence
    }

    fn acquire(&self, action: BotAction) -> Result<LoadingGuard<'_>, ControlError> {
        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(bot_id = %self.bot_id, action = action.name(), "Control request rejected, another is in flight");
            return Err(ControlError::Busy(action.name()));
        }
        Ok(LoadingGuard(&self.loading))
    }

    /// Start the bot with its saved token.
    pub async fn run(&self) -> Result<ControlOutcome<BackendAck>, ControlError> {
        let _guard = self.acquire(BotAction::Run)?;
        let sequence = self.issue(BotAction::Run);
        self.issue(BotAction::Status);
        let result = self.start().await;
        self.finish(BotAction::Run, sequence, result, true)
    }

    /// Stop, then start again.
    pub async fn restart(&self) -> Result<ControlOutcome<BackendAck>, ControlError> {
        let _guard = self.acquire(BotAction::Restart)?;
        let sequence = self.issue(BotAction::Restart);
        self.issue(BotAction::Status);
        let result = match self.backend.stop_bot(&self.bot_id).await {
            Ok(_) => self.start().await,
            Err(e) => Err(e.into()),
        };
        self.finish(BotAction::Restart, sequence, result, true)
    }

    pub async fn stop(&self) -> Result<ControlOutcome<BackendAck>, ControlError> {
        let _guard = self.acquire(BotAction::Stop)?;
        let sequence = self.issue(BotAction::Stop);
        self.issue(BotAction::Status);
        let result = self
            .backend
            .stop_bot(&self.bot_id)
            .await
            .map_err(ControlError::from);
        self.finish(BotAction::Stop, sequence, result, false)
    }

    /// Ask the backend whether the bot is running. A failed call counts as
    /// "not running".
    pub async fn status(&self) -> ControlOutcome<bool> {
        let sequence = self.issue(BotAction::Status);
        let running = match self.backend.running_status(&self.bot_id).await {
            Ok(running) => running,
            Err(e) => {
                warn!(bot_id = %self.bot_id, error = %e, "Status check failed, assuming the bot is stopped");
                false
            }
        };
        if !self.is_current(BotAction::Status, sequence) {
            debug!(bot_id = %self.bot_id, sequence, "Discarding stale status response");
            return ControlOutcome::Superseded;
        }
        self.running.store(running, Ordering::SeqCst);
        ControlOutcome::Completed(running)
    }

    async fn start(&self) -> Result<BackendAck, ControlError> {
        let token = self
            .backend
            .get_token(&self.bot_id)
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ValidationError::MissingToken(self.bot_id.clone()))?;
        Ok(self.backend.run_bot(&self.bot_id, &token).await?)
    }

    fn finish(
        &self,
        action: BotAction,
        sequence: u64,
        result: Result<BackendAck, ControlError>,
        running_on_success: bool,
    ) -> Result<ControlOutcome<BackendAck>, ControlError> {
        if !self.is_current(action, sequence) {
            debug!(bot_id = %self.bot_id, action = action.name(), sequence, "Discarding stale control response");
            return Ok(ControlOutcome::Superseded);
        }
        let ack = result?;
        self.running.store(running_on_success, Ordering::SeqCst);
        info!(bot_id = %self.bot_id, action = action.name(), "Bot control request completed");
        Ok(ControlOutcome::Completed(ack))
    }
}
