//! Status definitions for projects and their provisioned sub-resources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a raw backend status for reconciliation purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The resource is still moving; keep polling
    InFlight,
    /// The resource has settled (or is absent/unknown); no polling needed
    Terminal,
}

/// Lifecycle of the archive-ingest / storage-setup pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    Initializing,
    Ready,
    Error,
    Deleting,
}

impl ProjectStatus {
    /// Returns whether this status is still in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Pending | ProjectStatus::Initializing | ProjectStatus::Deleting
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn class(&self) -> StatusClass {
        if self.is_in_flight() {
            StatusClass::InFlight
        } else {
            StatusClass::Terminal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Initializing => "initializing",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Error => "error",
            ProjectStatus::Deleting => "deleting",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProjectStatus::Pending),
            "initializing" => Ok(ProjectStatus::Initializing),
            "ready" => Ok(ProjectStatus::Ready),
            "error" => Ok(ProjectStatus::Error),
            "deleting" => Ok(ProjectStatus::Deleting),
            _ => Err(format!("Unknown project status: {}", s)),
        }
    }
}

/// Lifecycle of a deployed service pod (code-server or codewiki)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Pending,
    Creating,
    Running,
    Stopped,
    Error,
    Deleting,
}

impl ServiceStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Pending | ServiceStatus::Creating | ServiceStatus::Deleting
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn class(&self) -> StatusClass {
        if self.is_in_flight() {
            StatusClass::InFlight
        } else {
            StatusClass::Terminal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Creating => "creating",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Error => "error",
            ServiceStatus::Deleting => "deleting",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ServiceStatus::Pending),
            "creating" => Ok(ServiceStatus::Creating),
            "running" => Ok(ServiceStatus::Running),
            "stopped" => Ok(ServiceStatus::Stopped),
            "error" => Ok(ServiceStatus::Error),
            "deleting" => Ok(ServiceStatus::Deleting),
            _ => Err(format!("Unknown service status: {}", s)),
        }
    }
}

/// Lifecycle of a wiki analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Classify a raw project status string. Unknown values are terminal.
pub fn classify_project(raw: Option<&str>) -> StatusClass {
    raw.and_then(|s| s.parse::<ProjectStatus>().ok())
        .map(|s| s.class())
        .unwrap_or(StatusClass::Terminal)
}

/// Classify a raw service status string. Absent and unknown values are
/// terminal: no sub-resource is provisioned, so there is nothing to poll.
pub fn classify_service(raw: Option<&str>) -> StatusClass {
    raw.and_then(|s| s.parse::<ServiceStatus>().ok())
        .map(|s| s.class())
        .unwrap_or(StatusClass::Terminal)
}

/// Classify a raw analysis-task status string. Unknown values are terminal.
pub fn classify_task(raw: Option<&str>) -> StatusClass {
    match raw.and_then(|s| s.parse::<TaskStatus>().ok()) {
        Some(s) if s.is_in_flight() => StatusClass::InFlight,
        _ => StatusClass::Terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_status_from_str() {
        assert_eq!(
            ProjectStatus::from_str("pending").unwrap(),
            ProjectStatus::Pending
        );
        assert_eq!(
            ProjectStatus::from_str("initializing").unwrap(),
            ProjectStatus::Initializing
        );
        assert_eq!(ProjectStatus::from_str("ready").unwrap(), ProjectStatus::Ready);
        assert_eq!(ProjectStatus::from_str("error").unwrap(), ProjectStatus::Error);
        assert_eq!(
            ProjectStatus::from_str("deleting").unwrap(),
            ProjectStatus::Deleting
        );
        assert!(ProjectStatus::from_str("invalid").is_err());
    }

    #[test]
    fn test_project_status_partition() {
        // Every known status is exactly one of in-flight or terminal
        for status in [
            ProjectStatus::Pending,
            ProjectStatus::Initializing,
            ProjectStatus::Ready,
            ProjectStatus::Error,
            ProjectStatus::Deleting,
        ] {
            assert_ne!(status.is_in_flight(), status.is_terminal());
        }
        assert!(ProjectStatus::Pending.is_in_flight());
        assert!(ProjectStatus::Initializing.is_in_flight());
        assert!(ProjectStatus::Deleting.is_in_flight());
        assert!(ProjectStatus::Ready.is_terminal());
        assert!(ProjectStatus::Error.is_terminal());
    }

    #[test]
    fn test_service_status_partition() {
        for status in [
            ServiceStatus::Pending,
            ServiceStatus::Creating,
            ServiceStatus::Running,
            ServiceStatus::Stopped,
            ServiceStatus::Error,
            ServiceStatus::Deleting,
        ] {
            assert_ne!(status.is_in_flight(), status.is_terminal());
        }
        assert!(ServiceStatus::Creating.is_in_flight());
        assert!(ServiceStatus::Pending.is_in_flight());
        assert!(ServiceStatus::Deleting.is_in_flight());
        assert!(ServiceStatus::Running.is_terminal());
        assert!(ServiceStatus::Stopped.is_terminal());
        assert!(ServiceStatus::Error.is_terminal());
    }

    #[test]
    fn test_classify_unknown_is_terminal() {
        assert_eq!(classify_project(Some("exploded")), StatusClass::Terminal);
        assert_eq!(classify_project(None), StatusClass::Terminal);
        assert_eq!(classify_service(Some("warming_up")), StatusClass::Terminal);
        assert_eq!(classify_service(Some("")), StatusClass::Terminal);
        assert_eq!(classify_service(None), StatusClass::Terminal);
        assert_eq!(classify_task(Some("mystery")), StatusClass::Terminal);
        assert_eq!(classify_task(None), StatusClass::Terminal);
    }

    #[test]
    fn test_classify_known_values() {
        assert_eq!(classify_project(Some("initializing")), StatusClass::InFlight);
        assert_eq!(classify_project(Some("ready")), StatusClass::Terminal);
        assert_eq!(classify_service(Some("creating")), StatusClass::InFlight);
        assert_eq!(classify_service(Some("stopped")), StatusClass::Terminal);
        assert_eq!(classify_task(Some("running")), StatusClass::InFlight);
        assert_eq!(classify_task(Some("completed")), StatusClass::Terminal);
        assert_eq!(classify_task(Some("failed")), StatusClass::Terminal);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProjectStatus::Initializing.to_string(), "initializing");
        assert_eq!(ServiceStatus::Creating.to_string(), "creating");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ServiceStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");

        let deserialized: ProjectStatus = serde_json::from_str("\"deleting\"").unwrap();
        assert_eq!(deserialized, ProjectStatus::Deleting);
    }
}
