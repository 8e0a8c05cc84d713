//! Composite project view: the latest known state of a project merged with
//! its code-server, wiki, and PVC sub-resources

use crate::domain::{
    classify_service, AnalysisTask, CodeServer, CodeServerDetail, CodeWiki, K8sInfo,
    FileItem, ProjectDetail, ServiceStatus, StatusClass,
};

/// The merged view the console renders and the reconciler keeps fresh
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectView {
    pub project: crate::domain::Project,
    pub files: Vec<FileItem>,
    pub code_server: Option<CodeServer>,
    pub k8s: Option<K8sInfo>,
    pub wiki: Option<CodeWiki>,
    pub tasks: Vec<AnalysisTask>,
}

/// Merge a project detail payload with independently fetched sub-resource
/// views. Pure and idempotent: the live sub-resource's status/access_url
/// take precedence over any stale copy embedded in the project payload, and
/// merging identical inputs twice yields an identical view, so silent
/// background polls never flicker the UI.
pub fn merge(
    detail: ProjectDetail,
    server: Option<CodeServerDetail>,
    wiki: Option<CodeWiki>,
    tasks: Vec<AnalysisTask>,
) -> ProjectView {
    let (live_server, k8s) = match server {
        Some(d) => (d.code_server, d.k8s_info),
        None => (None, None),
    };

    // Precedence chain: live sub-resource, then the copy nested in the
    // detail response, then whatever the project record itself carried.
    let code_server = live_server.or(detail.code_server);

    let mut project = detail.project;
    if let Some(cs) = &code_server {
        project.code_server_status = Some(cs.status.clone());
        if cs.access_url.is_some() {
            project.access_url = cs.access_url.clone();
        }
    }

    ProjectView {
        project,
        files: detail.files,
        code_server,
        k8s,
        wiki,
        tasks,
    }
}

impl ProjectView {
    /// Effective code-server status after overlay precedence
    pub fn server_status(&self) -> Option<ServiceStatus> {
        self.project
            .code_server_status
            .as_deref()
            .and_then(|s| s.parse().ok())
    }

    /// Effective wiki status
    pub fn wiki_status(&self) -> Option<ServiceStatus> {
        self.wiki.as_ref().and_then(|w| w.lifecycle())
    }

    pub fn access_url(&self) -> Option<&str> {
        self.project.access_url.as_deref()
    }

    /// Whether a code server exists in any non-absent status. Gates the
    /// destructive PVC recreate action.
    pub fn has_code_server(&self) -> bool {
        self.code_server.is_some() || self.project.code_server_status.is_some()
    }

    /// OR of the in-flight classification over every tracked resource.
    /// Drives the reconciler: polling continues while this is true.
    pub fn needs_polling(&self) -> bool {
        if self.project.status_class() == StatusClass::InFlight {
            return true;
        }
        if classify_service(self.project.code_server_status.as_deref()) == StatusClass::InFlight {
            return true;
        }
        if let Some(wiki) = &self.wiki {
            if wiki.status_class() == StatusClass::InFlight {
                return true;
            }
        }
        self.tasks
            .iter()
            .any(|t| t.status_class() == StatusClass::InFlight)
    }

    /// Case-insensitive file filter on path or name
    pub fn filter_files(&self, query: &str) -> Vec<&FileItem> {
        let needle = query.to_lowercase();
        self.files
            .iter()
            .filter(|f| {
                f.path.to_lowercase().contains(&needle)
                    || f.name.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Optimistically set the local code-server status (None removes the
    /// sub-resource). The next poll reconciles against the backend.
    pub fn set_server_status(&mut self, status: Option<ServiceStatus>) {
        match status {
            Some(s) => {
                match &mut self.code_server {
                    Some(cs) => cs.status = s.as_str().to_string(),
                    None => {
                        self.code_server = Some(CodeServer {
                            status: s.as_str().to_string(),
                            pod_status: None,
                            pod_name: None,
                            deployment_name: None,
                            access_url: None,
                            password: None,
                            cpu_limit: None,
                            memory_limit: None,
                        });
                    }
                }
                self.project.code_server_status = Some(s.as_str().to_string());
            }
            None => {
                self.code_server = None;
                self.project.code_server_status = None;
                self.project.access_url = None;
            }
        }
    }

    /// Optimistically set the local wiki status
    pub fn set_wiki_status(&mut self, status: Option<ServiceStatus>) {
        match status {
            Some(s) => match &mut self.wiki {
                Some(w) => w.status = s.as_str().to_string(),
                None => {
                    self.wiki = Some(CodeWiki {
                        status: s.as_str().to_string(),
                        pod_status: None,
                        deployment_name: None,
                        access_url: None,
                        cpu_limit: None,
                        memory_limit: None,
                        created_at: None,
                    });
                }
            },
            None => self.wiki = None,
        }
    }
}
