//! Domain models: projects, provisioned sub-resources, and their statuses

mod code_server;
mod project;
mod status;
mod user;
mod wiki;

pub use code_server::{
    CodeServer, CodeServerDetail, CodeServerRequest, DeploymentInfo, K8sInfo,
    LoadBalancerIngress, PodInfo, PvcInfo, Secret, ServiceInfo,
};
pub use project::{
    FileHit, FileItem, Project, ProjectDetail, ProjectPage, ProjectUpload, SearchResults,
};
pub use status::{
    classify_project, classify_service, classify_task, ProjectStatus, ServiceStatus,
    StatusClass, TaskStatus,
};
pub use user::{HealthReport, LoginResponse, ResourceCounts, User};
pub use wiki::{AnalysisTask, CodeWiki, WikiRequest};
