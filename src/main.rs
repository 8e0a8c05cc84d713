//! vaultctl - operations console for the CodeVault platform

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultctl::{
    config::{get_config_dir, get_data_dir, load_config, session_path, Config},
    dispatch::{bulk_delete, ActionDispatcher, ConfirmOutcome, ConfirmationGate, ServerAction},
    domain::{CodeServerRequest, HealthReport, ProjectUpload, WikiRequest},
    gateway::{Backend, BackendGateway, GatewayError},
    model::ProjectView,
    reconciler::{LogTab, ProjectWatcher},
    session::{FileSessionStore, Session, SessionStore},
};

#[derive(Parser)]
#[command(name = "vaultctl")]
#[command(author = "CodeVault Team")]
#[command(version = "0.1.0")]
#[command(about = "Operations console for the CodeVault source hosting platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend API base URL (overrides the configured one)
    #[arg(long, env = "VAULTCTL_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        username: String,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Drop the persisted session
    Logout,
    /// Change the account password
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// List projects
    Projects {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        #[arg(long)]
        search: Option<String>,
    },
    /// Search across all projects and files
    Search { query: String },
    /// Upload a project archive
    Upload {
        file: PathBuf,
        /// Project name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        storage_size: Option<String>,
    },
    /// Show a project with its sub-resources
    Show {
        id: String,
        /// Print the IDE password in clear text
        #[arg(long)]
        reveal_password: bool,
    },
    /// Watch a project until every resource settles
    Watch { id: String },
    /// Print a log stream for a project
    Logs {
        id: String,
        /// Which stream: init, server, deployment, or task
        #[arg(long, default_value = "init")]
        tab: String,
        /// Analysis task id (required for --tab task)
        #[arg(long)]
        task: Option<String>,
    },
    /// Delete one or more projects
    Delete {
        ids: Vec<String>,
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Code-server lifecycle commands
    Server {
        id: String,
        #[command(subcommand)]
        action: ServerCmd,
    },
    /// Storage volume maintenance
    Pvc {
        id: String,
        #[command(subcommand)]
        action: PvcCmd,
    },
    /// CodeWiki lifecycle and analysis commands
    Wiki {
        id: String,
        #[command(subcommand)]
        action: WikiCmd,
    },
    /// Backend health
    Health {
        /// Keep polling at the configured health interval
        #[arg(long)]
        watch: bool,
    },
    /// Download a project file or the original archive
    Download {
        id: String,
        /// File path inside the project; omit to download the archive
        #[arg(long)]
        file_path: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print a browser-usable archive URL instead of downloading
        #[arg(long)]
        url: bool,
    },
    /// Show configuration info
    Config,
}

#[derive(Subcommand)]
enum ServerCmd {
    /// Provision the IDE (project must be ready)
    Create {
        #[arg(long)]
        cpu_limit: Option<String>,
        #[arg(long)]
        memory_limit: Option<String>,
        #[arg(long)]
        storage_size: Option<String>,
    },
    Start,
    Stop,
    Restart,
    Delete {
        #[arg(long)]
        yes: bool,
    },
    /// Delete (best-effort) and create again
    Recreate {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PvcCmd {
    /// Destroy and recreate the volume (erases its contents)
    Recreate {
        #[arg(long)]
        yes: bool,
    },
    Delete {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum WikiCmd {
    /// Provision the wiki service
    Create {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        cpu_limit: Option<String>,
        #[arg(long)]
        memory_limit: Option<String>,
    },
    /// Update the wiki configuration
    Update {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        cpu_limit: Option<String>,
        #[arg(long)]
        memory_limit: Option<String>,
    },
    Start,
    Stop,
    Restart,
    Delete {
        #[arg(long)]
        yes: bool,
    },
    /// List analysis runs
    Tasks,
    /// Start an analysis run
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = load_config();
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let session: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(session_path()));
    let gateway = Arc::new(BackendGateway::new(
        config.api.base_url.clone(),
        Arc::clone(&session),
        Duration::from_secs(config.api.request_timeout_secs),
    )?);

    match cli.command {
        Commands::Login { username, password } => {
            login(&gateway, &session, &username, password).await
        }
        Commands::Logout => {
            session.clear();
            println!("Session cleared.");
            Ok(())
        }
        Commands::ChangePassword {
            old_password,
            new_password,
        } => {
            require_session(&session)?;
            gateway
                .change_password(&old_password, &new_password)
                .await
                .map_err(friendly)?;
            println!("Password changed.");
            Ok(())
        }
        Commands::Projects { page, size, search } => {
            require_session(&session)?;
            list_projects(&gateway, page, size, search.as_deref()).await
        }
        Commands::Search { query } => {
            require_session(&session)?;
            search(&gateway, &query).await
        }
        Commands::Upload {
            file,
            name,
            description,
            storage_size,
        } => {
            require_session(&session)?;
            upload(&gateway, &config, file, name, description, storage_size).await
        }
        Commands::Show {
            id,
            reveal_password,
        } => {
            require_session(&session)?;
            let watcher = watcher_for(&gateway, &config, &id);
            let view = watcher.refresh().await.map_err(friendly)?;
            print_view(&view, reveal_password);
            watcher.stop().await;
            Ok(())
        }
        Commands::Watch { id } => {
            require_session(&session)?;
            watch(&gateway, &config, &id).await
        }
        Commands::Logs { id, tab, task } => {
            require_session(&session)?;
            logs(&gateway, &config, &id, &tab, task).await
        }
        Commands::Delete { ids, yes } => {
            require_session(&session)?;
            delete_projects(&gateway, ids, yes).await
        }
        Commands::Server { id, action } => {
            require_session(&session)?;
            server_command(&gateway, &config, &id, action).await
        }
        Commands::Pvc { id, action } => {
            require_session(&session)?;
            pvc_command(&gateway, &config, &id, action).await
        }
        Commands::Wiki { id, action } => {
            require_session(&session)?;
            wiki_command(&gateway, &config, &id, action).await
        }
        Commands::Health { watch } => {
            require_session(&session)?;
            health(&gateway, &config, watch).await
        }
        Commands::Download {
            id,
            file_path,
            output,
            url,
        } => {
            require_session(&session)?;
            if url {
                println!("{}", gateway.archive_url(&id));
                return Ok(());
            }
            download(&gateway, &id, file_path, output).await
        }
        Commands::Config => {
            println!("vaultctl Configuration");
            println!("======================");
            println!("Config directory: {}", get_config_dir().display());
            println!("Data directory:   {}", get_data_dir().display());
            println!("Session file:     {}", session_path().display());
            println!("API base URL:     {}", config.api.base_url);
            println!(
                "Poll interval:    {}s (health {}s)",
                config.polling.detail_interval_secs, config.polling.health_interval_secs
            );
            Ok(())
        }
    }
}

fn require_session(session: &Arc<dyn SessionStore>) -> anyhow::Result<()> {
    if session.load().is_none() {
        anyhow::bail!("Not logged in. Run `vaultctl login <username>` first.");
    }
    Ok(())
}

/// Map gateway failures to the message the operator should act on
fn friendly(e: GatewayError) -> anyhow::Error {
    match e {
        GatewayError::Unauthorized => anyhow::anyhow!(
            "Session expired or unauthorized. Run `vaultctl login <username>` to sign in again."
        ),
        other => anyhow::anyhow!(other.to_string()),
    }
}

fn watcher_for(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
) -> Arc<ProjectWatcher> {
    let backend: Arc<dyn Backend> = gateway.clone();
    Arc::new(ProjectWatcher::with_interval(
        backend,
        project_id,
        Duration::from_secs(config.polling.detail_interval_secs),
    ))
}

async fn login(
    gateway: &Arc<BackendGateway>,
    session: &Arc<dyn SessionStore>,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };

    let response = gateway
        .login(username, &password)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    session.save(&Session {
        token: response.access_token,
        user: response.user.clone(),
    })?;
    println!("Logged in as {}.", response.user.username);
    Ok(())
}

async fn list_projects(
    gateway: &Arc<BackendGateway>,
    page: u32,
    size: u32,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let listing = gateway
        .list_projects(page, size, search)
        .await
        .map_err(friendly)?;

    println!(
        "{:<36}  {:<24}  {:<12}  {:>8}  {:>10}  {}",
        "ID", "NAME", "STATUS", "FILES", "SIZE", "IDE"
    );
    for project in &listing.projects {
        println!(
            "{:<36}  {:<24}  {:<12}  {:>8}  {:>10}  {}",
            project.id,
            truncate(&project.name, 24),
            project.status,
            project.file_count,
            format_size(project.total_size),
            project.code_server_status.as_deref().unwrap_or("-"),
        );
    }
    println!(
        "Displaying {} of {} projects (page {}).",
        listing.projects.len(),
        listing.total,
        page
    );
    Ok(())
}

async fn search(gateway: &Arc<BackendGateway>, query: &str) -> anyhow::Result<()> {
    let results = gateway.search(query).await.map_err(friendly)?;

    println!("Projects ({}):", results.projects.len());
    for project in &results.projects {
        println!("  {}  {}  [{}]", project.id, project.name, project.status);
    }
    println!("Files ({}):", results.files.len());
    for hit in &results.files {
        println!(
            "  {}  {}",
            hit.project_name.as_deref().or(hit.project_id.as_deref()).unwrap_or("?"),
            hit.path
        );
    }
    Ok(())
}

async fn upload(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    file: PathBuf,
    name: Option<String>,
    description: Option<String>,
    storage_size: Option<String>,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(&file).await?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive.zip".to_string());
    let project_name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.clone())
    });

    let project = gateway
        .upload_project(ProjectUpload {
            file_name,
            data,
            project_name,
            description,
            storage_size: storage_size.unwrap_or_else(|| config.code_server.storage_size.clone()),
        })
        .await
        .map_err(friendly)?;

    println!(
        "Uploaded project {} ({}), status: {}. Use `vaultctl watch {}` to follow the ingest.",
        project.name, project.id, project.status, project.id
    );
    Ok(())
}

async fn watch(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
) -> anyhow::Result<()> {
    let watcher = watcher_for(gateway, config, project_id);
    let view = watcher.refresh().await.map_err(friendly)?;

    let mut last_line = status_line(&view);
    println!("{}", last_line);

    while watcher.is_polling().await {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(view) = watcher.snapshot().await {
            let line = status_line(&view);
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }
        }
    }

    println!("All resources settled.");
    watcher.stop().await;
    Ok(())
}

async fn logs(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
    tab: &str,
    task: Option<String>,
) -> anyhow::Result<()> {
    let tab = match tab {
        "init" => LogTab::Init,
        "server" => LogTab::Server,
        "deployment" => LogTab::Deployment,
        "task" => LogTab::WikiTask(
            task.ok_or_else(|| anyhow::anyhow!("--task <id> is required with --tab task"))?,
        ),
        other => anyhow::bail!("Unknown log tab: {}", other),
    };

    let lines = config.polling.log_lines;
    let text = match &tab {
        LogTab::Init => gateway.init_logs(project_id, lines).await,
        LogTab::Server => gateway.server_logs(project_id, lines).await,
        LogTab::Deployment => gateway.deployment_logs(project_id, "all", lines).await,
        LogTab::WikiTask(task_id) => gateway.wiki_task_logs(project_id, task_id).await,
    }
    .map_err(friendly)?;

    if text.is_empty() {
        println!("Logs are currently empty or still being generated.");
    } else {
        println!("{}", text);
    }
    Ok(())
}

async fn delete_projects(
    gateway: &Arc<BackendGateway>,
    ids: Vec<String>,
    yes: bool,
) -> anyhow::Result<()> {
    if ids.is_empty() {
        anyhow::bail!("No project ids given.");
    }

    let gate = ConfirmationGate::new();
    let backend = gateway.clone();
    let delete_ids = ids.clone();
    gate.request(
        "Delete Projects",
        format!(
            "Delete {} project(s)? All associated data will be permanently removed.",
            ids.len()
        ),
        true,
        async move {
            let report = bulk_delete(backend.as_ref(), &delete_ids).await;
            println!("{}", report.summary());
            Ok(())
        },
    )
    .await;

    run_gate(&gate, yes).await
}

async fn server_command(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
    action: ServerCmd,
) -> anyhow::Result<()> {
    let watcher = watcher_for(gateway, config, project_id);
    watcher.refresh().await.map_err(friendly)?;
    let backend: Arc<dyn Backend> = gateway.clone();
    let dispatcher = Arc::new(ActionDispatcher::new(backend, Arc::clone(&watcher)));

    let result = match action {
        ServerCmd::Create {
            cpu_limit,
            memory_limit,
            storage_size,
        } => {
            let request = CodeServerRequest {
                cpu_limit: cpu_limit.unwrap_or_else(|| config.code_server.cpu_limit.clone()),
                memory_limit: memory_limit
                    .unwrap_or_else(|| config.code_server.memory_limit.clone()),
                storage_size: storage_size
                    .unwrap_or_else(|| config.code_server.storage_size.clone()),
            };
            dispatcher.create_server(request).await.map(|_| {
                println!(
                    "IDE provisioning started. Use `vaultctl watch {}` to follow it.",
                    project_id
                );
            })
        }
        ServerCmd::Start => dispatcher.server_action(ServerAction::Start).await,
        ServerCmd::Stop => dispatcher.server_action(ServerAction::Stop).await,
        ServerCmd::Restart => dispatcher.server_action(ServerAction::Restart).await,
        ServerCmd::Delete { yes } => {
            let gate = ConfirmationGate::new();
            let d = Arc::clone(&dispatcher);
            gate.request(
                "Delete IDE",
                "Delete the code-server deployment? Workspace data on the volume is preserved.",
                true,
                async move { d.server_action(ServerAction::Delete).await },
            )
            .await;
            watcher.stop().await;
            return run_gate(&gate, yes).await;
        }
        ServerCmd::Recreate { yes } => {
            let gate = ConfirmationGate::new();
            let d = Arc::clone(&dispatcher);
            gate.request(
                "Recreate IDE",
                "Delete the current IDE deployment and start a new one? \
                 Configuration may reset; persistent workspace data is preserved.",
                false,
                async move { d.server_action(ServerAction::Recreate).await },
            )
            .await;
            watcher.stop().await;
            return run_gate(&gate, yes).await;
        }
    };

    watcher.stop().await;
    result.map_err(|e| anyhow::anyhow!(e.to_string()))
}

async fn pvc_command(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
    action: PvcCmd,
) -> anyhow::Result<()> {
    let watcher = watcher_for(gateway, config, project_id);
    watcher.refresh().await.map_err(friendly)?;
    let backend: Arc<dyn Backend> = gateway.clone();
    let dispatcher = Arc::new(ActionDispatcher::new(backend, Arc::clone(&watcher)));

    let gate = ConfirmationGate::new();
    let yes = match action {
        PvcCmd::Recreate { yes } => {
            let d = Arc::clone(&dispatcher);
            gate.request(
                "Recreate PVC",
                "DANGER: this permanently deletes all storage data and recreates the volume. \
                 This cannot be undone.",
                true,
                async move { d.recreate_pvc().await },
            )
            .await;
            yes
        }
        PvcCmd::Delete { yes } => {
            let d = Arc::clone(&dispatcher);
            gate.request(
                "Delete PVC",
                "DANGER: this permanently deletes the volume and all data on it.",
                true,
                async move { d.delete_pvc().await },
            )
            .await;
            yes
        }
    };

    watcher.stop().await;
    run_gate(&gate, yes).await
}

async fn wiki_command(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    project_id: &str,
    action: WikiCmd,
) -> anyhow::Result<()> {
    let watcher = watcher_for(gateway, config, project_id);
    watcher.refresh().await.map_err(friendly)?;
    let backend: Arc<dyn Backend> = gateway.clone();
    let dispatcher = Arc::new(ActionDispatcher::new(backend, Arc::clone(&watcher)));

    let result = match action {
        WikiCmd::Create {
            api_key,
            cpu_limit,
            memory_limit,
        } => {
            let mut request = WikiRequest::new(api_key);
            if let Some(cpu) = cpu_limit {
                request.cpu_limit = cpu;
            }
            if let Some(memory) = memory_limit {
                request.memory_limit = memory;
            }
            dispatcher.create_wiki(request).await
        }
        WikiCmd::Update {
            api_key,
            cpu_limit,
            memory_limit,
        } => {
            let mut request = WikiRequest::new(api_key);
            if let Some(cpu) = cpu_limit {
                request.cpu_limit = cpu;
            }
            if let Some(memory) = memory_limit {
                request.memory_limit = memory;
            }
            dispatcher.update_wiki(request).await
        }
        WikiCmd::Start => dispatcher.wiki_action(ServerAction::Start).await,
        WikiCmd::Stop => dispatcher.wiki_action(ServerAction::Stop).await,
        WikiCmd::Restart => dispatcher.wiki_action(ServerAction::Restart).await,
        WikiCmd::Delete { yes } => {
            let gate = ConfirmationGate::new();
            let d = Arc::clone(&dispatcher);
            gate.request(
                "Delete Wiki",
                "Delete the wiki deployment and its analysis history?",
                true,
                async move { d.wiki_action(ServerAction::Delete).await },
            )
            .await;
            watcher.stop().await;
            return run_gate(&gate, yes).await;
        }
        WikiCmd::Tasks => {
            let tasks = gateway
                .list_wiki_tasks(project_id)
                .await
                .map_err(friendly)?;
            if tasks.is_empty() {
                println!("No analysis runs yet.");
            }
            for task in tasks {
                println!(
                    "{}  {}  {}{}",
                    task.id,
                    task.status,
                    task.created_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    task.error_message
                        .map(|e| format!("  ({})", e))
                        .unwrap_or_default(),
                );
            }
            watcher.stop().await;
            return Ok(());
        }
        WikiCmd::Run => match dispatcher.run_analysis().await {
            Ok(task) => {
                println!(
                    "Analysis {} started. Logs: `vaultctl logs {} --tab task --task {}`",
                    task.id, project_id, task.id
                );
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    watcher.stop().await;
    result.map_err(|e| anyhow::anyhow!(e.to_string()))
}

async fn health(
    gateway: &Arc<BackendGateway>,
    config: &Config,
    watch: bool,
) -> anyhow::Result<()> {
    let report = gateway.health().await.map_err(friendly)?;
    print_health(&report);

    if watch {
        let interval = Duration::from_secs(config.polling.health_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            // Transient failures keep the watch alive; 401 still aborts
            match gateway.health().await {
                Ok(report) => print_health(&report),
                Err(GatewayError::Unauthorized) => {
                    return Err(friendly(GatewayError::Unauthorized))
                }
                Err(e) => tracing::warn!("health poll failed: {}", e),
            }
        }
    }
    Ok(())
}

async fn download(
    gateway: &Arc<BackendGateway>,
    project_id: &str,
    file_path: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (dest, written) = match file_path {
        Some(path) => {
            let dest = output.unwrap_or_else(|| {
                PathBuf::from(path.rsplit('/').next().unwrap_or("file"))
            });
            let written = gateway
                .download_file(project_id, &path, &dest)
                .await
                .map_err(friendly)?;
            (dest, written)
        }
        None => {
            let dest = output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", project_id)));
            let written = gateway
                .download_archive(project_id, &dest)
                .await
                .map_err(friendly)?;
            (dest, written)
        }
    };
    println!("Wrote {} ({}).", dest.display(), format_size(written));
    Ok(())
}

/// Drive a staged confirmation: interactive y/N unless pre-approved
async fn run_gate(gate: &ConfirmationGate, yes: bool) -> anyhow::Result<()> {
    if !yes {
        if let Some((title, message, danger)) = gate.pending().await {
            println!("{}{}", title, if danger { " (destructive)" } else { "" });
            println!("{}", message);
            let answer = prompt("Confirm? [y/N] ")?;
            if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                gate.cancel().await;
                println!("Cancelled.");
                return Ok(());
            }
        }
    }

    match gate.confirm().await {
        ConfirmOutcome::Completed(Ok(())) => {
            println!("Done.");
            Ok(())
        }
        ConfirmOutcome::Completed(Err(e)) => Err(anyhow::anyhow!(e.to_string())),
        ConfirmOutcome::Busy | ConfirmOutcome::NothingPending => Ok(()),
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

fn status_line(view: &ProjectView) -> String {
    format!(
        "project: {:<13} ide: {:<10} wiki: {:<10} tasks in flight: {}",
        view.project.status,
        view.project.code_server_status.as_deref().unwrap_or("-"),
        view.wiki.as_ref().map(|w| w.status.as_str()).unwrap_or("-"),
        view.tasks
            .iter()
            .filter(|t| t.status_class() == vaultctl::domain::StatusClass::InFlight)
            .count(),
    )
}

fn print_view(view: &ProjectView, reveal_password: bool) {
    let project = &view.project;
    println!("{} ({})", project.name, project.id);
    println!("  status:     {}", project.status);
    if let Some(description) = &project.description {
        println!("  about:      {}", description);
    }
    println!(
        "  files:      {} ({})",
        project.file_count,
        format_size(project.total_size)
    );
    if let Some(filename) = &project.original_filename {
        println!("  archive:    {} ({})", filename, format_size(project.archive_size));
    }
    println!("  created:    {}", project.created_at.to_rfc3339());
    if let Some(error) = project.error_message.as_ref().or(project.init_error.as_ref()) {
        println!("  error:      {}", error);
    }

    match &view.code_server {
        Some(server) => {
            println!("  ide:");
            println!(
                "    status:   {} ({})",
                server.status,
                server.pod_status.as_deref().unwrap_or("n/a")
            );
            if let Some(pod) = &server.pod_name {
                println!("    pod:      {}", pod);
            }
            if let Some(url) = &server.access_url {
                println!("    url:      {}", url);
            }
            if let Some(password) = &server.password {
                if reveal_password {
                    println!("    password: {}", password.reveal());
                } else {
                    println!("    password: {} (--reveal-password to show)", password);
                }
            }
            if let (Some(cpu), Some(memory)) = (&server.cpu_limit, &server.memory_limit) {
                println!("    limits:   {} CPU / {} RAM", cpu, memory);
            }
        }
        None => println!("  ide:        not provisioned"),
    }

    if let Some(wiki) = &view.wiki {
        println!("  wiki:");
        println!(
            "    status:   {} ({})",
            wiki.status,
            wiki.pod_status.as_deref().unwrap_or("n/a")
        );
        if let Some(url) = &wiki.access_url {
            println!("    url:      {}", url);
        }
        if !view.tasks.is_empty() {
            println!("    tasks:    {}", view.tasks.len());
        }
    }

    if let Some(k8s) = &view.k8s {
        if let Some(deployment) = &k8s.deployment {
            println!(
                "  replicas:   {}/{}",
                deployment.available_replicas, deployment.replicas
            );
        }
        if let Some(pvc) = &k8s.pvc {
            println!(
                "  volume:     {} {} ({})",
                pvc.name.as_deref().unwrap_or("-"),
                pvc.capacity.as_deref().unwrap_or("-"),
                pvc.status.as_deref().unwrap_or("unknown"),
            );
        }
    }
}

fn print_health(report: &HealthReport) {
    println!(
        "Overall: {}",
        if report.is_healthy() { "healthy" } else { report.status.as_str() }
    );
    for (name, value) in &report.checks {
        if name == "stats" {
            continue;
        }
        if value.is_string() {
            println!(
                "  {:<16} {}",
                name,
                if HealthReport::check_ok(value) { "OK" } else { "FAIL" }
            );
        } else {
            println!("  {:<16} {}", name, value);
        }
    }
    if let Some(stats) = report.stats() {
        println!(
            "  resources: {} users, {} projects, {} code servers",
            stats.users, stats.projects, stats.code_servers
        );
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}
