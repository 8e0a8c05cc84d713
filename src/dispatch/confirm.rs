//! Confirmation gate for destructive or hard-to-reverse actions.
//!
//! Holds at most one pending confirmation; opening a new one replaces it
//! (last wins, nothing is queued). While the confirmed action runs, the
//! gate is busy and both confirm and cancel are no-ops, which suppresses
//! duplicate submission. The gate closes on completion, success or failure
//! alike; failures surface through the dispatcher's policy, not its own.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;

use super::ActionError;

type PendingAction = Pin<Box<dyn Future<Output = Result<(), ActionError>> + Send + 'static>>;

struct PendingConfirmation {
    id: u64,
    title: String,
    message: String,
    danger: bool,
    action: Option<PendingAction>,
}

#[derive(Default)]
struct GateState {
    pending: Option<PendingConfirmation>,
    busy: bool,
    next_id: u64,
}

/// Result of a confirm/cancel attempt
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// The action ran to completion with this result
    Completed(Result<(), ActionError>),
    /// Another confirmation is still executing; nothing was done
    Busy,
    /// There was nothing to confirm
    NothingPending,
}

impl ConfirmOutcome {
    pub fn is_noop(&self) -> bool {
        !matches!(self, ConfirmOutcome::Completed(_))
    }
}

#[derive(Default)]
pub struct ConfirmationGate {
    state: Mutex<GateState>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a confirmation, replacing any pending one
    pub async fn request<F>(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        danger: bool,
        action: F,
    ) where
        F: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        state.pending = Some(PendingConfirmation {
            id: state.next_id,
            title: title.into(),
            message: message.into(),
            danger,
            action: Some(Box::pin(action)),
        });
    }

    /// What is currently awaiting confirmation: (title, message, danger)
    pub async fn pending(&self) -> Option<(String, String, bool)> {
        self.state
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| (p.title.clone(), p.message.clone(), p.danger))
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.busy
    }

    /// Execute the pending action. A second confirm while the first is
    /// still running is a no-op until it completes.
    pub async fn confirm(&self) -> ConfirmOutcome {
        let (action, id) = {
            let mut state = self.state.lock().await;
            if state.busy {
                return ConfirmOutcome::Busy;
            }
            let Some(pending) = state.pending.as_mut() else {
                return ConfirmOutcome::NothingPending;
            };
            let Some(action) = pending.action.take() else {
                return ConfirmOutcome::Busy;
            };
            let id = pending.id;
            state.busy = true;
            (action, id)
        };

        let result = action.await;

        {
            let mut state = self.state.lock().await;
            state.busy = false;
            // Close only if a newer request has not replaced us meanwhile
            if state.pending.as_ref().map(|p| p.id) == Some(id) {
                state.pending = None;
            }
        }

        ConfirmOutcome::Completed(result)
    }

    /// Dismiss the pending confirmation. Ignored while busy.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.busy {
            return false;
        }
        state.pending.take().is_some()
    }
}
