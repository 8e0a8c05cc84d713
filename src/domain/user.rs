//! Authenticated principal and health reporting types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The authenticated user profile cached alongside the bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Response of the login endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

/// Aggregate backend health: overall status plus named per-check values.
/// Check values are strings like "healthy: connected" or free-form info
/// entries, so they stay untyped here.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub checks: BTreeMap<String, serde_json::Value>,
}

/// Resource counts published under the `stats` check
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceCounts {
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub projects: u64,
    #[serde(default)]
    pub code_servers: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// A named check passes when its value is a string starting with "healthy"
    pub fn check_ok(value: &serde_json::Value) -> bool {
        value
            .as_str()
            .map(|s| s.starts_with("healthy"))
            .unwrap_or(false)
    }

    /// Extract the resource counts from the `stats` check, if present
    pub fn stats(&self) -> Option<ResourceCounts> {
        self.checks
            .get("stats")
            .and_then(|v| v.get("details"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_checks() {
        let report: HealthReport = serde_json::from_str(
            r#"{
                "status": "healthy",
                "checks": {
                    "database": "healthy: connected",
                    "k8s_api": "unreachable",
                    "stats": {"details": {"users": 3, "projects": 12, "code_servers": 2}}
                }
            }"#,
        )
        .unwrap();

        assert!(report.is_healthy());
        assert!(HealthReport::check_ok(&report.checks["database"]));
        assert!(!HealthReport::check_ok(&report.checks["k8s_api"]));

        let stats = report.stats().unwrap();
        assert_eq!(stats.projects, 12);
        assert_eq!(stats.code_servers, 2);
    }

    #[test]
    fn test_health_without_checks() {
        let report: HealthReport =
            serde_json::from_str(r#"{"status": "unhealthy"}"#).unwrap();
        assert!(!report.is_healthy());
        assert!(report.stats().is_none());
    }
}
