//! Code-server sub-resource model and the Kubernetes context reported with it

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::{classify_service, ServiceStatus, StatusClass};

/// A sensitive string that is masked in any Debug/Display output.
/// Call [`Secret::reveal`] to read the actual value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(********)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The code-server IDE deployment attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeServer {
    pub status: String,
    /// Finer-grained pod phase underlying the lifecycle status
    #[serde(default)]
    pub pod_status: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    #[serde(default)]
    pub cpu_limit: Option<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
}

impl CodeServer {
    pub fn lifecycle(&self) -> Option<ServiceStatus> {
        self.status.parse().ok()
    }

    pub fn status_class(&self) -> StatusClass {
        classify_service(Some(&self.status))
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Some(ServiceStatus::Running)
    }
}

/// Response shape of the code-server detail endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeServerDetail {
    #[serde(default)]
    pub code_server: Option<CodeServer>,
    #[serde(default)]
    pub k8s_info: Option<K8sInfo>,
}

/// Creation request for a code-server deployment
#[derive(Debug, Clone, Serialize)]
pub struct CodeServerRequest {
    pub cpu_limit: String,
    pub memory_limit: String,
    pub storage_size: String,
}

impl Default for CodeServerRequest {
    fn default() -> Self {
        Self {
            cpu_limit: "1000m".to_string(),
            memory_limit: "1024Mi".to_string(),
            storage_size: "5Gi".to_string(),
        }
    }
}

/// Kubernetes context reported alongside the code-server record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct K8sInfo {
    #[serde(default)]
    pub deployment: Option<DeploymentInfo>,
    #[serde(default)]
    pub service: Option<ServiceInfo>,
    #[serde(default)]
    pub pvc: Option<PvcInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(default)]
    pub pods: Vec<PodInfo>,
}

impl DeploymentInfo {
    pub fn is_available(&self) -> bool {
        self.available_replicas > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub cluster_ip: Option<String>,
    #[serde(default)]
    pub load_balancer: Vec<LoadBalancerIngress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerIngress {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Persistent volume claim backing a project workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvcInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub volume_name: Option<String>,
}

impl PvcInfo {
    pub fn is_bound(&self) -> bool {
        self.status.as_deref() == Some("Bound")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_masked() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(********)");
        assert_eq!(secret.to_string(), "********");
        assert_eq!(secret.reveal(), "hunter2");
    }

    #[test]
    fn test_secret_round_trips_transparently() {
        let server: CodeServer = serde_json::from_str(
            r#"{"status": "running", "password": "hunter2"}"#,
        )
        .unwrap();
        assert_eq!(server.password.as_ref().unwrap().reveal(), "hunter2");
        // Wire form stays a plain string
        let json = serde_json::to_string(&server.password).unwrap();
        assert_eq!(json, "\"hunter2\"");
    }

    #[test]
    fn test_lifecycle_and_running() {
        let server: CodeServer =
            serde_json::from_str(r#"{"status": "running"}"#).unwrap();
        assert!(server.is_running());
        assert_eq!(server.lifecycle(), Some(ServiceStatus::Running));

        let odd: CodeServer =
            serde_json::from_str(r#"{"status": "hibernating"}"#).unwrap();
        assert_eq!(odd.lifecycle(), None);
        assert_eq!(odd.status_class(), StatusClass::Terminal);
    }

    #[test]
    fn test_pvc_bound() {
        let pvc = PvcInfo {
            name: Some("pvc-p1".to_string()),
            status: Some("Bound".to_string()),
            capacity: Some("5Gi".to_string()),
            storage_class: Some("standard".to_string()),
            volume_name: Some("vol-1".to_string()),
        };
        assert!(pvc.is_bound());
    }
}
