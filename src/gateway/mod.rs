//! Typed HTTP client for the CodeVault backend.
//!
//! All requests attach the bearer credential held by the injected
//! [`SessionStore`]; a 401 anywhere clears the stored session and surfaces
//! [`GatewayError::Unauthorized`] with no retry. Non-2xx responses are
//! normalized to a single human-readable message. The gateway never retries
//! on its own; retry policy belongs to the callers.

mod error;

pub use error::GatewayError;
pub(crate) use error::error_message;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::domain::{
    AnalysisTask, CodeServerDetail, CodeServerRequest, CodeWiki, HealthReport, LoginResponse,
    Project, ProjectDetail, ProjectPage, ProjectUpload, SearchResults, WikiRequest,
};
use crate::session::SessionStore;

/// The REST surface the reconciliation core depends on. Implemented by
/// [`BackendGateway`] over HTTP; test doubles override only the operations
/// they exercise (everything else reports `Unsupported`).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn change_password(
        &self,
        _old_password: &str,
        _new_password: &str,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn list_projects(
        &self,
        _page: u32,
        _size: u32,
        _search: Option<&str>,
    ) -> Result<ProjectPage, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn search(&self, _query: &str) -> Result<SearchResults, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn get_project(&self, _project_id: &str) -> Result<ProjectDetail, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn upload_project(&self, _upload: ProjectUpload) -> Result<Project, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn delete_project(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn init_logs(&self, _project_id: &str, _lines: u32) -> Result<String, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn recreate_pvc(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn delete_pvc(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn get_code_server(
        &self,
        _project_id: &str,
    ) -> Result<Option<CodeServerDetail>, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn create_code_server(
        &self,
        _project_id: &str,
        _request: &CodeServerRequest,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn delete_code_server(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn start_code_server(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn stop_code_server(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn restart_code_server(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn server_logs(&self, _project_id: &str, _lines: u32) -> Result<String, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn deployment_logs(
        &self,
        _project_id: &str,
        _log_type: &str,
        _lines: u32,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn get_wiki(&self, _project_id: &str) -> Result<Option<CodeWiki>, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn create_wiki(
        &self,
        _project_id: &str,
        _request: &WikiRequest,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn update_wiki(
        &self,
        _project_id: &str,
        _request: &WikiRequest,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn delete_wiki(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn start_wiki(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn stop_wiki(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn restart_wiki(&self, _project_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn list_wiki_tasks(&self, _project_id: &str) -> Result<Vec<AnalysisTask>, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn create_wiki_task(&self, _project_id: &str) -> Result<AnalysisTask, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn wiki_task_logs(
        &self,
        _project_id: &str,
        _task_id: &str,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Unsupported)
    }

    async fn health(&self) -> Result<HealthReport, GatewayError> {
        Err(GatewayError::Unsupported)
    }
}

/// HTTP implementation of [`Backend`]
pub struct BackendGateway {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl BackendGateway {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.load() {
            Some(session) => builder.bearer_auth(session.token),
            None => builder,
        }
    }

    /// Execute a request with the shared status handling: 401 invalidates
    /// the session globally, other failures are normalized.
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(GatewayError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.send(self.authed(self.http.get(self.endpoint(path)))).await?;
        Ok(response.json().await?)
    }

    /// GET that tolerates a 404 by returning None (sub-resource absent)
    async fn get_json_opt<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, GatewayError> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(GatewayError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn post_empty(&self, path: &str) -> Result<(), GatewayError> {
        self.send(self.authed(self.http.post(self.endpoint(path))))
            .await
            .map(|_| ())
    }

    async fn delete_empty(&self, path: &str) -> Result<(), GatewayError> {
        self.send(self.authed(self.http.delete(self.endpoint(path))))
            .await
            .map(|_| ())
    }

    async fn get_log_text(&self, builder: RequestBuilder) -> Result<String, GatewayError> {
        let response = self.send(self.authed(builder)).await?;
        let raw = response.text().await?;
        Ok(log_text(&raw))
    }

    /// Download one project file, streaming the body straight to disk
    pub async fn download_file(
        &self,
        project_id: &str,
        file_path: &str,
        dest: &Path,
    ) -> Result<u64, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint(&format!("/projects/{}/download", project_id)))
            .query(&[("file_path", file_path)]);
        self.stream_to_file(builder, dest).await
    }

    /// Download the original project archive
    pub async fn download_archive(
        &self,
        project_id: &str,
        dest: &Path,
    ) -> Result<u64, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint(&format!("/projects/{}/download/archive", project_id)));
        self.stream_to_file(builder, dest).await
    }

    /// Browser-style archive URL carrying the token as a query parameter
    pub fn archive_url(&self, project_id: &str) -> String {
        let token = self
            .session
            .load()
            .map(|s| s.token)
            .unwrap_or_default();
        format!(
            "{}/projects/{}/download/archive?token={}",
            self.base_url, project_id, token
        )
    }

    async fn stream_to_file(
        &self,
        builder: RequestBuilder,
        dest: &Path,
    ) -> Result<u64, GatewayError> {
        let response = self.send(self.authed(builder)).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Backend for BackendGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, GatewayError> {
        // No bearer header here; invalid credentials stay a local error
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                "Invalid credentials".to_string()
            } else {
                error_message(status.as_u16(), &body)
            };
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), GatewayError> {
        let builder = self
            .http
            .post(self.endpoint("/auth/change-password"))
            .json(&serde_json::json!({
                "old_password": old_password,
                "new_password": new_password,
            }));
        self.send(self.authed(builder)).await.map(|_| ())
    }

    async fn list_projects(
        &self,
        page: u32,
        size: u32,
        search: Option<&str>,
    ) -> Result<ProjectPage, GatewayError> {
        let mut builder = self
            .http
            .get(self.endpoint("/projects"))
            .query(&[("page", page), ("size", size)]);
        if let Some(q) = search {
            builder = builder.query(&[("search", q)]);
        }
        let response = self.send(self.authed(builder)).await?;
        Ok(response.json().await?)
    }

    async fn search(&self, query: &str) -> Result<SearchResults, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint("/search"))
            .query(&[("q", query)]);
        let response = self.send(self.authed(builder)).await?;
        Ok(response.json().await?)
    }

    async fn get_project(&self, project_id: &str) -> Result<ProjectDetail, GatewayError> {
        self.get_json(&format!("/projects/{}", project_id)).await
    }

    async fn upload_project(&self, upload: ProjectUpload) -> Result<Project, GatewayError> {
        let part = multipart::Part::bytes(upload.data).file_name(upload.file_name);
        let mut form = multipart::Form::new()
            .part("file", part)
            .text("project_name", upload.project_name)
            .text("storage_size", upload.storage_size);
        if let Some(description) = upload.description {
            form = form.text("description", description);
        }

        let builder = self
            .http
            .post(self.endpoint("/projects/upload"))
            .multipart(form);
        let response = self.send(self.authed(builder)).await?;
        Ok(response.json().await?)
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), GatewayError> {
        // Cascade everything the project owns
        let builder = self
            .http
            .delete(self.endpoint(&format!("/projects/{}", project_id)))
            .query(&[("delete_files", "true"), ("delete_code_server", "true")]);
        self.send(self.authed(builder)).await.map(|_| ())
    }

    async fn init_logs(&self, project_id: &str, lines: u32) -> Result<String, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint(&format!("/projects/{}/init-logs", project_id)))
            .query(&[("lines", lines)]);
        self.get_log_text(builder).await
    }

    async fn recreate_pvc(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/projects/{}/pvc/recreate", project_id))
            .await
    }

    async fn delete_pvc(&self, project_id: &str) -> Result<(), GatewayError> {
        self.delete_empty(&format!("/projects/{}/pvc", project_id))
            .await
    }

    async fn get_code_server(
        &self,
        project_id: &str,
    ) -> Result<Option<CodeServerDetail>, GatewayError> {
        self.get_json_opt(&format!("/code-servers/{}", project_id))
            .await
    }

    async fn create_code_server(
        &self,
        project_id: &str,
        request: &CodeServerRequest,
    ) -> Result<(), GatewayError> {
        let builder = self
            .http
            .post(self.endpoint(&format!("/code-servers/{}", project_id)))
            .json(request);
        self.send(self.authed(builder)).await.map(|_| ())
    }

    async fn delete_code_server(&self, project_id: &str) -> Result<(), GatewayError> {
        self.delete_empty(&format!("/code-servers/{}", project_id))
            .await
    }

    async fn start_code_server(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/code-servers/{}/start", project_id))
            .await
    }

    async fn stop_code_server(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/code-servers/{}/stop", project_id))
            .await
    }

    async fn restart_code_server(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/code-servers/{}/restart", project_id))
            .await
    }

    async fn server_logs(&self, project_id: &str, lines: u32) -> Result<String, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint(&format!("/code-servers/{}/logs", project_id)))
            .query(&[("lines", lines)]);
        self.get_log_text(builder).await
    }

    async fn deployment_logs(
        &self,
        project_id: &str,
        log_type: &str,
        lines: u32,
    ) -> Result<String, GatewayError> {
        let builder = self
            .http
            .get(self.endpoint(&format!(
                "/code-servers/{}/deployment/logs",
                project_id
            )))
            .query(&[("log_type", log_type.to_string()), ("lines", lines.to_string())]);
        self.get_log_text(builder).await
    }

    async fn get_wiki(&self, project_id: &str) -> Result<Option<CodeWiki>, GatewayError> {
        self.get_json_opt(&format!("/codewikis/{}", project_id))
            .await
    }

    async fn create_wiki(
        &self,
        project_id: &str,
        request: &WikiRequest,
    ) -> Result<(), GatewayError> {
        let builder = self
            .http
            .post(self.endpoint(&format!("/codewikis/{}", project_id)))
            .json(request);
        self.send(self.authed(builder)).await.map(|_| ())
    }

    async fn update_wiki(
        &self,
        project_id: &str,
        request: &WikiRequest,
    ) -> Result<(), GatewayError> {
        let builder = self
            .http
            .put(self.endpoint(&format!("/codewikis/{}", project_id)))
            .json(request);
        self.send(self.authed(builder)).await.map(|_| ())
    }

    async fn delete_wiki(&self, project_id: &str) -> Result<(), GatewayError> {
        self.delete_empty(&format!("/codewikis/{}", project_id)).await
    }

    async fn start_wiki(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/codewikis/{}/start", project_id))
            .await
    }

    async fn stop_wiki(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/codewikis/{}/stop", project_id))
            .await
    }

    async fn restart_wiki(&self, project_id: &str) -> Result<(), GatewayError> {
        self.post_empty(&format!("/codewikis/{}/restart", project_id))
            .await
    }

    async fn list_wiki_tasks(&self, project_id: &str) -> Result<Vec<AnalysisTask>, GatewayError> {
        self.get_json(&format!("/codewikis/{}/tasks", project_id))
            .await
    }

    async fn create_wiki_task(&self, project_id: &str) -> Result<AnalysisTask, GatewayError> {
        let builder = self
            .http
            .post(self.endpoint(&format!("/codewikis/{}/tasks", project_id)));
        let response = self.send(self.authed(builder)).await?;
        Ok(response.json().await?)
    }

    async fn wiki_task_logs(
        &self,
        project_id: &str,
        task_id: &str,
    ) -> Result<String, GatewayError> {
        let builder = self.http.get(self.endpoint(&format!(
            "/codewikis/{}/tasks/{}/logs",
            project_id, task_id
        )));
        self.get_log_text(builder).await
    }

    async fn health(&self) -> Result<HealthReport, GatewayError> {
        self.get_json("/health").await
    }
}

/// Log endpoints answer either a plain string or a JSON object with the
/// text under one of several keys, depending on the backend version.
pub(crate) fn log_text(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(value) => ["log_content", "logs", "content", "detail"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(String::from))
            .unwrap_or_default(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn test_log_text_plain() {
        assert_eq!(log_text("line one\nline two"), "line one\nline two");
    }

    #[test]
    fn test_log_text_json_string() {
        assert_eq!(log_text(r#""quoted log""#), "quoted log");
    }

    #[test]
    fn test_log_text_json_object_keys() {
        assert_eq!(log_text(r#"{"log_content": "a"}"#), "a");
        assert_eq!(log_text(r#"{"logs": "b"}"#), "b");
        assert_eq!(log_text(r#"{"content": "c"}"#), "c");
        assert_eq!(log_text(r#"{"detail": "d"}"#), "d");
        assert_eq!(log_text(r#"{"something_else": "e"}"#), "");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let gateway = BackendGateway::new(
            "https://api.example/api/",
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(
            gateway.endpoint("/projects"),
            "https://api.example/api/projects"
        );
    }

    #[test]
    fn test_archive_url_without_session() {
        let gateway = BackendGateway::new(
            "https://api.example/api",
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(
            gateway.archive_url("p1"),
            "https://api.example/api/projects/p1/download/archive?token="
        );
    }
}
