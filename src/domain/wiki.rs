//! CodeWiki sub-resource model: the documentation/analysis service and its
//! append-only analysis task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code_server::Secret;
use super::status::{classify_service, classify_task, ServiceStatus, StatusClass, TaskStatus};

/// The codewiki deployment attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeWiki {
    pub status: String,
    #[serde(default)]
    pub pod_status: Option<String>,
    #[serde(default)]
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CodeWiki {
    pub fn lifecycle(&self) -> Option<ServiceStatus> {
        self.status.parse().ok()
    }

    pub fn status_class(&self) -> StatusClass {
        classify_service(Some(&self.status))
    }
}

/// An analysis run invoked against a wiki. Tasks are append-only; each has
/// its own log stream retrievable by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AnalysisTask {
    pub fn lifecycle(&self) -> Option<TaskStatus> {
        self.status.parse().ok()
    }

    pub fn status_class(&self) -> StatusClass {
        classify_task(Some(&self.status))
    }
}

/// Creation/update request for a wiki deployment. The API key is required
/// at creation and never echoed back by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct WikiRequest {
    pub api_key: Secret,
    pub cpu_limit: String,
    pub memory_limit: String,
}

impl WikiRequest {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key),
            cpu_limit: "1000m".to_string(),
            memory_limit: "1024Mi".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_classification() {
        let task: AnalysisTask =
            serde_json::from_str(r#"{"id": "t1", "status": "running"}"#).unwrap();
        assert_eq!(task.lifecycle(), Some(TaskStatus::Running));
        assert_eq!(task.status_class(), StatusClass::InFlight);

        let done: AnalysisTask =
            serde_json::from_str(r#"{"id": "t2", "status": "failed"}"#).unwrap();
        assert_eq!(done.status_class(), StatusClass::Terminal);
    }

    #[test]
    fn test_wiki_request_serializes_api_key() {
        let req = WikiRequest::new("sk-test");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["api_key"], "sk-test");
        assert_eq!(json["cpu_limit"], "1000m");
        // Debug output must not leak the key
        assert!(!format!("{:?}", req).contains("sk-test"));
    }
}
