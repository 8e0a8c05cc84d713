//! Polling reconciler: keeps the project view fresh while any tracked
//! resource is in flight, and stops polling once everything settles.
//!
//! After every state update, user-triggered or background, the watcher
//! recomputes whether any resource still needs polling and starts or
//! cancels the timer task accordingly. Silent background polls never clear
//! the last-good view on failure. Every fetch is tagged with a monotonic
//! sequence number; a response older than the currently applied state is
//! discarded, so a stale in-flight fetch cannot overwrite a newer
//! optimistic update and responses arriving after teardown are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::gateway::{Backend, GatewayError};
use crate::model::{merge, ProjectView};

/// Default silent-poll cadence; longer than the implicit refresh a user
/// navigation triggers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Which log stream the detail view currently shows. Only the active tab
/// is refreshed by the poll loop; switching tabs fetches immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTab {
    Init,
    Server,
    Deployment,
    WikiTask(String),
}

struct WatchState {
    view: Option<ProjectView>,
    logs: String,
    active_tab: Option<LogTab>,
    /// Sequence of the last applied update (fetch or optimistic)
    applied_seq: u64,
    /// Next sequence to hand out
    next_seq: u64,
    poller: Option<JoinHandle<()>>,
}

struct WatchInner {
    backend: Arc<dyn Backend>,
    project_id: String,
    poll_interval: Duration,
    log_lines: u32,
    state: RwLock<WatchState>,
}

/// Watches a single project and its sub-resources
pub struct ProjectWatcher {
    inner: Arc<WatchInner>,
}

impl ProjectWatcher {
    pub fn new(backend: Arc<dyn Backend>, project_id: impl Into<String>) -> Self {
        Self::with_interval(backend, project_id, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        backend: Arc<dyn Backend>,
        project_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(WatchInner {
                backend,
                project_id: project_id.into(),
                poll_interval,
                log_lines: 800,
                state: RwLock::new(WatchState {
                    view: None,
                    logs: String::new(),
                    active_tab: None,
                    applied_seq: 0,
                    next_seq: 0,
                    poller: None,
                }),
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    /// Foreground refresh: fetch, merge, apply, and re-evaluate polling.
    /// Errors are surfaced to the caller.
    pub async fn refresh(&self) -> Result<ProjectView, GatewayError> {
        self.inner.refresh(false).await?;
        Ok(self
            .snapshot()
            .await
            .expect("refresh applied at least one view"))
    }

    /// Last-good merged view, if any fetch has succeeded yet
    pub async fn snapshot(&self) -> Option<ProjectView> {
        self.inner.state.read().await.view.clone()
    }

    /// Contents of the most recently fetched log stream
    pub async fn logs(&self) -> String {
        self.inner.state.read().await.logs.clone()
    }

    /// Apply an optimistic local mutation. Advances the sequence so any
    /// fetch already in flight cannot overwrite it, then re-evaluates
    /// whether polling is needed.
    pub async fn apply_local<F>(&self, mutate: F)
    where
        F: FnOnce(&mut ProjectView),
    {
        {
            let mut state = self.inner.state.write().await;
            if let Some(view) = state.view.as_mut() {
                mutate(view);
                state.next_seq += 1;
                state.applied_seq = state.next_seq;
            }
        }
        self.inner.evaluate().await;
    }

    /// Select the active log tab; a newly selected tab is fetched
    /// immediately rather than waiting for the next poll tick.
    pub async fn select_tab(&self, tab: Option<LogTab>) {
        {
            let mut state = self.inner.state.write().await;
            state.active_tab = tab.clone();
        }
        if let Some(tab) = tab {
            if let Err(e) = self.inner.fetch_tab(&tab).await {
                tracing::warn!("Failed to fetch logs for new tab: {}", e);
            }
        }
    }

    pub async fn is_polling(&self) -> bool {
        let state = self.inner.state.read().await;
        state
            .poller
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the poll timer. Responses already in flight are discarded by
    /// the sequence guard when they land.
    pub async fn stop(&self) {
        let mut state = self.inner.state.write().await;
        if let Some(handle) = state.poller.take() {
            handle.abort();
        }
    }
}

impl Drop for ProjectWatcher {
    fn drop(&mut self) {
        // Best-effort teardown; the lock is uncontended once the owner drops
        if let Ok(mut state) = self.inner.state.try_write() {
            if let Some(handle) = state.poller.take() {
                handle.abort();
            }
        }
    }
}

impl WatchInner {
    async fn refresh(self: &Arc<Self>, silent: bool) -> Result<(), GatewayError> {
        let seq = {
            let mut state = self.state.write().await;
            state.next_seq += 1;
            state.next_seq
        };

        let view = self.fetch().await?;
        let applied = self.apply(seq, view).await;

        if applied {
            self.refresh_active_logs(silent).await;
        }
        Ok(())
    }

    /// Fetch the project and its sub-resources. Sub-resource fetch failures
    /// degrade to "absent" rather than failing the whole refresh; the merge
    /// falls back to whatever copy the project payload embeds.
    async fn fetch(&self) -> Result<ProjectView, GatewayError> {
        let detail = self.backend.get_project(&self.project_id).await?;

        let server = match self.backend.get_code_server(&self.project_id).await {
            Ok(server) => server,
            Err(e) => {
                tracing::debug!("code-server fetch failed: {}", e);
                None
            }
        };

        let wiki = match self.backend.get_wiki(&self.project_id).await {
            Ok(wiki) => wiki,
            Err(e) => {
                tracing::debug!("wiki fetch failed: {}", e);
                None
            }
        };

        let tasks = if wiki.is_some() {
            self.backend
                .list_wiki_tasks(&self.project_id)
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(merge(detail, server, wiki, tasks))
    }

    /// Last-write-wins per poll cycle: apply only if this response is not
    /// older than the currently applied state.
    async fn apply(self: &Arc<Self>, seq: u64, view: ProjectView) -> bool {
        {
            let mut state = self.state.write().await;
            if seq < state.applied_seq {
                tracing::debug!(
                    "discarding stale response (seq {} < applied {})",
                    seq,
                    state.applied_seq
                );
                return false;
            }
            state.applied_seq = seq;
            state.view = Some(view);
        }
        self.evaluate().await;
        true
    }

    /// Start or cancel the poll timer to match the current view. Called
    /// after every applied update, never on a fixed schedule of its own.
    async fn evaluate(self: &Arc<Self>) {
        let mut state = self.state.write().await;
        let needs = state
            .view
            .as_ref()
            .map(|v| v.needs_polling())
            .unwrap_or(false);

        let running = state
            .poller
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);

        if needs && !running {
            let inner = Arc::clone(self);
            state.poller = Some(tokio::spawn(poll_loop(inner)));
        } else if !needs && running {
            if let Some(handle) = state.poller.take() {
                handle.abort();
            }
        }
    }

    async fn needs_polling(&self) -> bool {
        self.state
            .read()
            .await
            .view
            .as_ref()
            .map(|v| v.needs_polling())
            .unwrap_or(false)
    }

    /// Refresh whatever log stream is currently of interest: the selected
    /// tab if any, otherwise the ingest log while the project is still
    /// coming up.
    async fn refresh_active_logs(&self, silent: bool) {
        let (tab, project_in_flight) = {
            let state = self.state.read().await;
            let in_flight = state
                .view
                .as_ref()
                .map(|v| v.project.status_class() == crate::domain::StatusClass::InFlight)
                .unwrap_or(false);
            (state.active_tab.clone(), in_flight)
        };

        let tab = match tab {
            Some(tab) => tab,
            None if project_in_flight => LogTab::Init,
            None => return,
        };

        if let Err(e) = self.fetch_tab(&tab).await {
            if silent {
                tracing::debug!("silent log refresh failed: {}", e);
            } else {
                tracing::warn!("log refresh failed: {}", e);
            }
        }
    }

    async fn fetch_tab(&self, tab: &LogTab) -> Result<(), GatewayError> {
        let text = match tab {
            LogTab::Init => {
                self.backend
                    .init_logs(&self.project_id, self.log_lines)
                    .await?
            }
            LogTab::Server => {
                self.backend
                    .server_logs(&self.project_id, self.log_lines)
                    .await?
            }
            LogTab::Deployment => {
                self.backend
                    .deployment_logs(&self.project_id, "all", self.log_lines)
                    .await?
            }
            LogTab::WikiTask(task_id) => {
                self.backend
                    .wiki_task_logs(&self.project_id, task_id)
                    .await?
            }
        };

        let mut state = self.state.write().await;
        // The user may have switched tabs while the fetch was in flight
        let still_active = match (&state.active_tab, tab) {
            (Some(active), tab) => active == tab,
            (None, LogTab::Init) => true,
            _ => false,
        };
        if still_active {
            state.logs = text;
        }
        Ok(())
    }
}

/// Background poll loop. Errors are logged and the last-good view is kept;
/// the loop exits once nothing is in flight (and is aborted by `evaluate`
/// as soon as that is observed, whichever comes first).
fn poll_loop(inner: Arc<WatchInner>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut interval = tokio::time::interval(inner.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the caller just refreshed
        interval.tick().await;

        loop {
            interval.tick().await;

            if let Err(e) = inner.refresh(true).await {
                tracing::debug!("silent poll failed, keeping last-good view: {}", e);
            }

            if !inner.needs_polling().await {
                break;
            }
        }
    })
}
