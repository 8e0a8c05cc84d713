//! Project domain model - the main entity tracked by the console

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code_server::CodeServer;
use super::status::{classify_project, ProjectStatus, StatusClass};

/// A project as reported by the backend. The `status` field is kept as the
/// raw wire string so that unknown values survive deserialization and
/// classify as terminal instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub archive_size: u64,
    #[serde(default)]
    pub original_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub initialized_at: Option<DateTime<Utc>>,
    /// Copy of the code-server status embedded in the project payload.
    /// May be stale; the live sub-resource takes precedence when merging.
    #[serde(default)]
    pub code_server_status: Option<String>,
    #[serde(default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub init_error: Option<String>,
    #[serde(default)]
    pub pvc_name: Option<String>,
    #[serde(default)]
    pub pvc_status: Option<String>,
    #[serde(default)]
    pub pvc_size: Option<String>,
}

impl Project {
    /// Parse the raw status into the known lifecycle enum
    pub fn lifecycle(&self) -> Option<ProjectStatus> {
        self.status.parse().ok()
    }

    pub fn status_class(&self) -> StatusClass {
        classify_project(Some(&self.status))
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Some(ProjectStatus::Ready)
    }
}

/// A single file within a project archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Response shape of the project detail endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectDetail {
    pub project: Project,
    #[serde(default)]
    pub files: Vec<FileItem>,
    /// Nested code-server copy some backend variants embed here; used only
    /// as a fallback when the dedicated sub-resource fetch fails
    #[serde(default)]
    pub code_server: Option<CodeServer>,
}

/// One page of the project listing
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectPage {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub total: u64,
}

/// Result of the cross-project search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub files: Vec<FileHit>,
}

/// A file matched by the global search
#[derive(Debug, Clone, Deserialize)]
pub struct FileHit {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Payload for the multipart archive upload
#[derive(Debug, Clone)]
pub struct ProjectUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub project_name: String,
    pub description: Option<String>,
    pub storage_size: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_project(status: &str) -> Project {
        Project {
            id: "p1".to_string(),
            name: "Demo".to_string(),
            description: None,
            status: status.to_string(),
            owner_id: Some("u1".to_string()),
            total_size: 12000,
            file_count: 3,
            archive_size: 4096,
            original_filename: Some("demo.zip".to_string()),
            created_at: Utc::now(),
            initialized_at: None,
            code_server_status: None,
            access_url: None,
            error_message: None,
            init_error: None,
            pvc_name: None,
            pvc_status: None,
            pvc_size: None,
        }
    }

    #[test]
    fn test_lifecycle_parsing() {
        assert_eq!(
            test_project("ready").lifecycle(),
            Some(ProjectStatus::Ready)
        );
        assert_eq!(test_project("who_knows").lifecycle(), None);
        assert!(test_project("ready").is_ready());
        assert!(!test_project("pending").is_ready());
    }

    #[test]
    fn test_unknown_status_classifies_terminal() {
        assert_eq!(test_project("who_knows").status_class(), StatusClass::Terminal);
        assert_eq!(
            test_project("initializing").status_class(),
            StatusClass::InFlight
        );
    }

    #[test]
    fn test_detail_deserializes_without_optional_sections() {
        let raw = r#"{
            "project": {
                "id": "p1",
                "name": "Demo",
                "status": "pending",
                "created_at": "2024-05-01T12:00:00Z"
            }
        }"#;
        let detail: ProjectDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.project.name, "Demo");
        assert!(detail.files.is_empty());
        assert!(detail.code_server.is_none());
    }
}
