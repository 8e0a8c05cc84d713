//! Action dispatcher: translates user lifecycle commands into backend calls
//! plus optimistic local transitions, then hands off to the reconciler.
//!
//! Preconditions are enforced client-side against the action rules; an
//! invalid command is rejected before any network call is made. Failed
//! calls surface a single normalized message and roll back the optimistic
//! transition where feasible; where rollback is not possible (create and
//! recreate) the next poll corrects the view.

mod confirm;
mod rules;

pub use confirm::{ConfirmOutcome, ConfirmationGate};
pub use rules::{build_rules, rule_for, ActionRule, ServerAction};

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    AnalysisTask, CodeServerRequest, ServiceStatus, WikiRequest,
};
use crate::gateway::{Backend, GatewayError};
use crate::model::ProjectView;
use crate::reconciler::ProjectWatcher;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Cannot {action} while the service is {status:?}")]
    InvalidState {
        action: ServerAction,
        status: Option<ServiceStatus>,
    },

    #[error("Project is not ready (status: {status})")]
    ProjectNotReady { status: String },

    #[error("A code server already exists for this project")]
    AlreadyExists,

    #[error("Delete the code server before recreating the storage volume")]
    VolumeInUse,

    #[error("The wiki must be running to start an analysis")]
    WikiNotRunning,

    #[error("No project state loaded yet")]
    NoState,

    #[error("{0}")]
    Backend(#[from] GatewayError),
}

/// Dispatches lifecycle commands for one watched project
pub struct ActionDispatcher {
    backend: Arc<dyn Backend>,
    watcher: Arc<ProjectWatcher>,
}

impl ActionDispatcher {
    pub fn new(backend: Arc<dyn Backend>, watcher: Arc<ProjectWatcher>) -> Self {
        Self { backend, watcher }
    }

    async fn view(&self) -> Result<ProjectView, ActionError> {
        self.watcher.snapshot().await.ok_or(ActionError::NoState)
    }

    fn project_id(&self) -> String {
        self.watcher.project_id().to_string()
    }

    /// Reconcile after a successful command; failures here are transient
    /// and the next poll covers them.
    async fn silent_refresh(&self) {
        if let Err(e) = self.watcher.refresh().await {
            tracing::debug!("post-action refresh failed: {}", e);
        }
    }

    /// Run a code-server lifecycle command. Create and recreate use the
    /// default resource limits; use [`Self::create_server`] /
    /// [`Self::recreate_server`] for custom ones.
    pub async fn server_action(&self, action: ServerAction) -> Result<(), ActionError> {
        match action {
            ServerAction::Create => self.create_server(CodeServerRequest::default()).await,
            ServerAction::Recreate => self.recreate_server(CodeServerRequest::default()).await,
            _ => self.simple_server_action(action).await,
        }
    }

    async fn simple_server_action(&self, action: ServerAction) -> Result<(), ActionError> {
        let view = self.view().await?;
        let current = view.server_status();
        let rule = rule_for(action);
        if !rule.permits(current) {
            return Err(ActionError::InvalidState {
                action,
                status: current,
            });
        }

        if let Some(next) = rule.optimistic {
            self.watcher
                .apply_local(|v| v.set_server_status(Some(next)))
                .await;
        }

        let id = self.project_id();
        let result = match action {
            ServerAction::Start => self.backend.start_code_server(&id).await,
            ServerAction::Stop => self.backend.stop_code_server(&id).await,
            ServerAction::Restart => self.backend.restart_code_server(&id).await,
            ServerAction::Delete => self.backend.delete_code_server(&id).await,
            _ => unreachable!("create/recreate handled above"),
        };

        match result {
            Ok(()) => {
                self.silent_refresh().await;
                Ok(())
            }
            Err(e) => {
                if rule.optimistic.is_some() {
                    // Roll back to the status we observed before the call
                    self.watcher
                        .apply_local(|v| v.set_server_status(current))
                        .await;
                }
                Err(e.into())
            }
        }
    }

    /// Provision the IDE. Requires the project to be ready and no live
    /// code server; the view flips to `creating` before the backend
    /// acknowledges.
    pub async fn create_server(&self, request: CodeServerRequest) -> Result<(), ActionError> {
        let view = self.view().await?;
        if !view.project.is_ready() {
            return Err(ActionError::ProjectNotReady {
                status: view.project.status.clone(),
            });
        }
        let current = view.server_status();
        if !rule_for(ServerAction::Create).permits(current) {
            return Err(ActionError::AlreadyExists);
        }

        self.watcher
            .apply_local(|v| v.set_server_status(Some(ServiceStatus::Creating)))
            .await;

        // A failure here cannot fully roll the optimistic flag back; the
        // next poll corrects the view
        self.backend
            .create_code_server(&self.project_id(), &request)
            .await?;
        self.silent_refresh().await;
        Ok(())
    }

    /// Delete (best-effort, the resource may already be gone) then create,
    /// with no visible absent intermediate.
    pub async fn recreate_server(&self, request: CodeServerRequest) -> Result<(), ActionError> {
        let view = self.view().await?;
        if !view.project.is_ready() {
            return Err(ActionError::ProjectNotReady {
                status: view.project.status.clone(),
            });
        }

        self.watcher
            .apply_local(|v| v.set_server_status(Some(ServiceStatus::Creating)))
            .await;

        let id = self.project_id();
        if let Err(e) = self.backend.delete_code_server(&id).await {
            tracing::debug!("recreate: ignoring delete failure: {}", e);
        }
        self.backend.create_code_server(&id, &request).await?;
        self.silent_refresh().await;
        Ok(())
    }

    /// Destructive: wipes the volume. Structurally rejected while any code
    /// server exists so live mounts cannot lose their backing storage.
    pub async fn recreate_pvc(&self) -> Result<(), ActionError> {
        let view = self.view().await?;
        if view.has_code_server() {
            return Err(ActionError::VolumeInUse);
        }
        self.backend.recreate_pvc(&self.project_id()).await?;
        self.silent_refresh().await;
        Ok(())
    }

    pub async fn delete_pvc(&self) -> Result<(), ActionError> {
        let view = self.view().await?;
        if view.has_code_server() {
            return Err(ActionError::VolumeInUse);
        }
        self.backend.delete_pvc(&self.project_id()).await?;
        self.silent_refresh().await;
        Ok(())
    }

    /// Delete the watched project itself (cascades files and code server)
    pub async fn delete_project(&self) -> Result<(), ActionError> {
        let view = self.view().await?;
        let prior = view.project.status.clone();
        self.watcher
            .apply_local(|v| v.project.status = "deleting".to_string())
            .await;

        match self.backend.delete_project(&self.project_id()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.watcher
                    .apply_local(|v| v.project.status = prior.clone())
                    .await;
                Err(e.into())
            }
        }
    }

    /// Provision the wiki service; requires an API key credential.
    pub async fn create_wiki(&self, request: WikiRequest) -> Result<(), ActionError> {
        let view = self.view().await?;
        if !view.project.is_ready() {
            return Err(ActionError::ProjectNotReady {
                status: view.project.status.clone(),
            });
        }
        let current = view.wiki_status();
        if !rule_for(ServerAction::Create).permits(current) {
            return Err(ActionError::AlreadyExists);
        }

        self.watcher
            .apply_local(|v| v.set_wiki_status(Some(ServiceStatus::Creating)))
            .await;
        self.backend
            .create_wiki(&self.project_id(), &request)
            .await?;
        self.silent_refresh().await;
        Ok(())
    }

    pub async fn update_wiki(&self, request: WikiRequest) -> Result<(), ActionError> {
        self.view().await?;
        self.backend
            .update_wiki(&self.project_id(), &request)
            .await?;
        self.silent_refresh().await;
        Ok(())
    }

    /// Start/stop/restart/delete the wiki, under the same rules as the
    /// code server. Create goes through [`Self::create_wiki`] instead
    /// because it needs the API key.
    pub async fn wiki_action(&self, action: ServerAction) -> Result<(), ActionError> {
        let view = self.view().await?;
        let current = view.wiki_status();

        if matches!(action, ServerAction::Create | ServerAction::Recreate) {
            return Err(ActionError::InvalidState {
                action,
                status: current,
            });
        }

        let rule = rule_for(action);
        if !rule.permits(current) {
            return Err(ActionError::InvalidState {
                action,
                status: current,
            });
        }

        if let Some(next) = rule.optimistic {
            self.watcher
                .apply_local(|v| v.set_wiki_status(Some(next)))
                .await;
        }

        let id = self.project_id();
        let result = match action {
            ServerAction::Start => self.backend.start_wiki(&id).await,
            ServerAction::Stop => self.backend.stop_wiki(&id).await,
            ServerAction::Restart => self.backend.restart_wiki(&id).await,
            ServerAction::Delete => self.backend.delete_wiki(&id).await,
            _ => unreachable!(),
        };

        match result {
            Ok(()) => {
                self.silent_refresh().await;
                Ok(())
            }
            Err(e) => {
                if rule.optimistic.is_some() {
                    self.watcher
                        .apply_local(|v| v.set_wiki_status(current))
                        .await;
                }
                Err(e.into())
            }
        }
    }

    /// Kick off an analysis run. The new task record is appended to the
    /// local view so polling starts tracking it immediately.
    pub async fn run_analysis(&self) -> Result<AnalysisTask, ActionError> {
        let view = self.view().await?;
        if view.wiki_status() != Some(ServiceStatus::Running) {
            return Err(ActionError::WikiNotRunning);
        }

        let task = self.backend.create_wiki_task(&self.project_id()).await?;
        let appended = task.clone();
        self.watcher
            .apply_local(move |v| v.tasks.push(appended))
            .await;
        Ok(task)
    }
}

/// Outcome of a fan-out bulk delete: each deletion is independent, a
/// failure in one never blocks or rolls back the others.
#[derive(Debug, Default)]
pub struct BulkDeleteReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BulkDeleteReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Deleted {} project(s)", self.succeeded.len())
        } else {
            format!(
                "Deleted {} project(s), {} failed: {}",
                self.succeeded.len(),
                self.failed.len(),
                self.failed
                    .iter()
                    .map(|(id, e)| format!("{} ({})", id, e))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }
}

/// Delete several projects concurrently with independent completion
pub async fn bulk_delete(backend: &dyn Backend, ids: &[String]) -> BulkDeleteReport {
    let results = futures::future::join_all(ids.iter().map(|id| async move {
        let result = backend.delete_project(id).await;
        (id.clone(), result)
    }))
    .await;

    let mut report = BulkDeleteReport::default();
    for (id, result) in results {
        match result {
            Ok(()) => report.succeeded.push(id),
            Err(e) => report.failed.push((id, e.to_string())),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CodeServer, CodeServerDetail, CodeWiki, Project, ProjectDetail,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records lifecycle calls and serves a configurable resource state
    struct RecordingBackend {
        project_status: Mutex<String>,
        server_status: Mutex<Option<String>>,
        wiki_status: Mutex<Option<String>>,
        lifecycle_calls: Mutex<Vec<String>>,
        fail_ops: HashSet<&'static str>,
    }

    impl RecordingBackend {
        fn new(project_status: &str, server_status: Option<&str>) -> Self {
            Self {
                project_status: Mutex::new(project_status.to_string()),
                server_status: Mutex::new(server_status.map(|s| s.to_string())),
                wiki_status: Mutex::new(None),
                lifecycle_calls: Mutex::new(Vec::new()),
                fail_ops: HashSet::new(),
            }
        }

        fn failing(mut self, ops: &[&'static str]) -> Self {
            self.fail_ops = ops.iter().copied().collect();
            self
        }

        fn with_wiki(self, status: &str) -> Self {
            *self.wiki_status.lock().unwrap() = Some(status.to_string());
            self
        }

        fn record(&self, op: &str) -> Result<(), GatewayError> {
            self.lifecycle_calls.lock().unwrap().push(op.to_string());
            if self.fail_ops.contains(op) {
                Err(GatewayError::Api {
                    status: 500,
                    message: format!("{} failed", op),
                })
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.lifecycle_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn get_project(&self, _id: &str) -> Result<ProjectDetail, GatewayError> {
            Ok(ProjectDetail {
                project: Project {
                    id: "p1".to_string(),
                    name: "Demo".to_string(),
                    description: None,
                    status: self.project_status.lock().unwrap().clone(),
                    owner_id: None,
                    total_size: 0,
                    file_count: 0,
                    archive_size: 0,
                    original_filename: None,
                    created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                    initialized_at: None,
                    code_server_status: None,
                    access_url: None,
                    error_message: None,
                    init_error: None,
                    pvc_name: None,
                    pvc_status: None,
                    pvc_size: None,
                },
                files: Vec::new(),
                code_server: None,
            })
        }

        async fn get_code_server(
            &self,
            _id: &str,
        ) -> Result<Option<CodeServerDetail>, GatewayError> {
            Ok(self.server_status.lock().unwrap().clone().map(|status| {
                CodeServerDetail {
                    code_server: Some(CodeServer {
                        status,
                        pod_status: None,
                        pod_name: None,
                        deployment_name: None,
                        access_url: Some("https://ide.example/p1".to_string()),
                        password: None,
                        cpu_limit: None,
                        memory_limit: None,
                    }),
                    k8s_info: None,
                }
            }))
        }

        async fn get_wiki(&self, _id: &str) -> Result<Option<CodeWiki>, GatewayError> {
            Ok(self.wiki_status.lock().unwrap().clone().map(|status| CodeWiki {
                status,
                pod_status: None,
                deployment_name: None,
                access_url: None,
                cpu_limit: None,
                memory_limit: None,
                created_at: None,
            }))
        }

        async fn list_wiki_tasks(
            &self,
            _id: &str,
        ) -> Result<Vec<AnalysisTask>, GatewayError> {
            Ok(Vec::new())
        }

        async fn init_logs(&self, _id: &str, _lines: u32) -> Result<String, GatewayError> {
            Ok(String::new())
        }

        async fn start_code_server(&self, _id: &str) -> Result<(), GatewayError> {
            self.record("start_server")?;
            *self.server_status.lock().unwrap() = Some("running".to_string());
            Ok(())
        }

        async fn stop_code_server(&self, _id: &str) -> Result<(), GatewayError> {
            self.record("stop_server")?;
            *self.server_status.lock().unwrap() = Some("stopped".to_string());
            Ok(())
        }

        async fn restart_code_server(&self, _id: &str) -> Result<(), GatewayError> {
            self.record("restart_server")
        }

        async fn delete_code_server(&self, _id: &str) -> Result<(), GatewayError> {
            self.record("delete_server")?;
            *self.server_status.lock().unwrap() = None;
            Ok(())
        }

        async fn create_code_server(
            &self,
            _id: &str,
            _request: &CodeServerRequest,
        ) -> Result<(), GatewayError> {
            self.record("create_server")?;
            *self.server_status.lock().unwrap() = Some("creating".to_string());
            Ok(())
        }

        async fn recreate_pvc(&self, _id: &str) -> Result<(), GatewayError> {
            self.record("recreate_pvc")
        }

        async fn delete_project(&self, id: &str) -> Result<(), GatewayError> {
            self.record(&format!("delete_project:{}", id))
        }

        async fn create_wiki_task(&self, _id: &str) -> Result<AnalysisTask, GatewayError> {
            self.record("create_wiki_task")?;
            Ok(AnalysisTask {
                id: "t1".to_string(),
                status: "pending".to_string(),
                created_at: None,
                error_message: None,
            })
        }
    }

    async fn dispatcher_for(
        backend: Arc<RecordingBackend>,
    ) -> (ActionDispatcher, Arc<ProjectWatcher>) {
        let watcher = Arc::new(ProjectWatcher::new(backend.clone(), "p1"));
        watcher.refresh().await.unwrap();
        let dispatcher = ActionDispatcher::new(backend, Arc::clone(&watcher));
        (dispatcher, watcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rejected_when_already_stopped() {
        let backend = Arc::new(RecordingBackend::new("ready", Some("stopped")));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Stop)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidState { .. }));
        // Rejected client-side: zero lifecycle calls made
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejected_when_running() {
        let backend = Arc::new(RecordingBackend::new("ready", Some("running")));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidState { .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_from_stopped_calls_backend() {
        let backend = Arc::new(RecordingBackend::new("ready", Some("stopped")));
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        dispatcher.server_action(ServerAction::Start).await.unwrap();
        assert_eq!(backend.calls(), vec!["start_server"]);

        let view = watcher.snapshot().await.unwrap();
        assert_eq!(view.server_status(), Some(ServiceStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_requires_ready_project() {
        let backend = Arc::new(RecordingBackend::new("initializing", None));
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Create)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ProjectNotReady { .. }));
        assert!(backend.calls().is_empty());
        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejected_when_server_exists() {
        let backend = Arc::new(RecordingBackend::new("ready", Some("running")));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Create)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::AlreadyExists));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_flips_to_creating_even_when_the_call_fails() {
        let backend = Arc::new(
            RecordingBackend::new("ready", None).failing(&["create_server"]),
        );
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Create)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Backend(_)));

        // The optimistic flag is not rolled back; the next poll corrects it
        let view = watcher.snapshot().await.unwrap();
        assert_eq!(view.server_status(), Some(ServiceStatus::Creating));
        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreate_swallows_delete_failure() {
        let backend = Arc::new(
            RecordingBackend::new("ready", Some("error")).failing(&["delete_server"]),
        );
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        dispatcher
            .server_action(ServerAction::Recreate)
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec!["delete_server", "create_server"]);

        let view = watcher.snapshot().await.unwrap();
        assert_eq!(view.server_status(), Some(ServiceStatus::Creating));
        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_rolls_back_on_failure() {
        let backend = Arc::new(
            RecordingBackend::new("ready", Some("running")).failing(&["delete_server"]),
        );
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher
            .server_action(ServerAction::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Backend(_)));

        let view = watcher.snapshot().await.unwrap();
        assert_eq!(view.server_status(), Some(ServiceStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pvc_recreate_rejected_while_server_exists() {
        let backend = Arc::new(RecordingBackend::new("ready", Some("running")));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher.recreate_pvc().await.unwrap_err();
        assert!(matches!(err, ActionError::VolumeInUse));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pvc_recreate_allowed_without_server() {
        let backend = Arc::new(RecordingBackend::new("ready", None));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        dispatcher.recreate_pvc().await.unwrap();
        assert_eq!(backend.calls(), vec!["recreate_pvc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_is_independent_per_project() {
        let backend =
            RecordingBackend::new("ready", None).failing(&["delete_project:bad"]);
        let ids = vec![
            "one".to_string(),
            "bad".to_string(),
            "two".to_string(),
        ];

        let report = bulk_delete(&backend, &ids).await;
        assert_eq!(report.succeeded, vec!["one", "two"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert!(!report.all_succeeded());

        // All three deletions were attempted despite the failure
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_analysis_requires_running_wiki() {
        let backend = Arc::new(RecordingBackend::new("ready", None).with_wiki("stopped"));
        let (dispatcher, _watcher) = dispatcher_for(backend.clone()).await;

        let err = dispatcher.run_analysis().await.unwrap_err();
        assert!(matches!(err, ActionError::WikiNotRunning));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_analysis_appends_task_and_polls() {
        let backend = Arc::new(RecordingBackend::new("ready", None).with_wiki("running"));
        let (dispatcher, watcher) = dispatcher_for(backend.clone()).await;

        let task = dispatcher.run_analysis().await.unwrap();
        assert_eq!(task.id, "t1");

        let view = watcher.snapshot().await.unwrap();
        assert_eq!(view.tasks.len(), 1);
        // A pending task is in flight, so the watcher starts polling
        assert!(watcher.is_polling().await);
        watcher.stop().await;
    }
}
