// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Conduit
//!
//! The `conduit` binary runs the deployment orchestrator.
//!
//! ## Commands
//!
//! - `conduit serve` (default) - HTTP front door: `/info`, `/hook`, git smart-HTTP
//! - `conduit destroy <owner>/<repo>` - Tear down a git-deployed compose project
//! - `conduit version` - Print name and version
//!
//! Configuration is layered: built-in defaults, then the YAML file
//! (`--config`, `CONDUIT_CONFIG_PATH` or a discovered path), then flags and
//! their environment variables.

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use conduit_core::{
    application::{DeploymentService, GitPushPipeline, RolloverEngine},
    domain::{config::DeployerConfig, trigger::TriggerValidator},
    infrastructure::{tls, DockerRuntime, GitHttpBackend, HttpCallbackReporter, TokioCommandRunner},
    presentation::api::{self, AppState},
};

/// Conduit - container rollover and git push deployments
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONDUIT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CONDUIT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short = 'D', long, global = true, env = "CONDUIT_DEBUG")]
    debug: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP front door (default)
    #[command(name = "serve")]
    Serve,

    /// Kill and remove the compose project deployed from a repository
    #[command(name = "destroy")]
    Destroy {
        /// Repository as owner/name
        #[arg(value_name = "OWNER/REPO")]
        repo: String,
    },

    /// Print name and version
    #[command(name = "version")]
    Version,
}

/// Flags layered over the configuration file
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Listen address
    #[arg(short, long = "listen", global = true, env = "CONDUIT_LISTEN_ADDR", value_name = "ADDR")]
    listen_addr: Option<String>,

    /// Certificate served by the front door (enables HTTPS)
    #[arg(long, global = true, env = "CONDUIT_SERVER_TLS_CERT", value_name = "FILE")]
    server_tls_cert: Option<PathBuf>,

    #[arg(long, global = true, env = "CONDUIT_SERVER_TLS_KEY", value_name = "FILE")]
    server_tls_key: Option<PathBuf>,

    /// Require client certificates signed by this CA
    #[arg(long, global = true, env = "CONDUIT_SERVER_TLS_CA_CERT", value_name = "FILE")]
    server_tls_ca_cert: Option<PathBuf>,

    /// Container runtime URL
    #[arg(long = "docker", global = true, env = "CONDUIT_DOCKER_URL", value_name = "URL")]
    docker_url: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_TLS_CA_CERT", value_name = "FILE")]
    tls_ca_cert: Option<PathBuf>,

    #[arg(long, global = true, env = "CONDUIT_TLS_CERT", value_name = "FILE")]
    tls_cert: Option<PathBuf>,

    #[arg(long, global = true, env = "CONDUIT_TLS_KEY", value_name = "FILE")]
    tls_key: Option<PathBuf>,

    /// Whitelisted repository (repeatable, `*` for any)
    #[arg(
        short,
        long = "repo",
        global = true,
        env = "CONDUIT_REPOSITORIES",
        value_delimiter = ',',
        value_name = "REPO"
    )]
    repositories: Vec<String>,

    /// Tag eligible for rollover (repeatable)
    #[arg(
        short,
        long = "tag",
        global = true,
        env = "CONDUIT_TAGS",
        value_delimiter = ',',
        value_name = "TAG"
    )]
    tags: Vec<String>,

    /// Shared hook token
    #[arg(short = 'k', long, global = true, env = "CONDUIT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_AUTH_USERNAME")]
    auth_username: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_AUTH_PASSWORD", hide_env_values = true)]
    auth_password: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_AUTH_EMAIL")]
    auth_email: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_AUTH_SERVER")]
    auth_server: Option<String>,

    /// Root directory for bare repositories
    #[arg(long, global = true, env = "CONDUIT_REPO_ROOT_DIR", value_name = "DIR")]
    repo_root_dir: Option<PathBuf>,

    /// Root directory for checked-out work trees
    #[arg(long, global = true, env = "CONDUIT_REPO_WORK_DIR", value_name = "DIR")]
    repo_work_dir: Option<PathBuf>,

    /// Deploy hooks post a trigger here instead of running compose
    #[arg(long, global = true, env = "CONDUIT_ROLLOVER_URL", value_name = "URL")]
    rollover_url: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_GIT_BINARY")]
    git_binary: Option<String>,

    #[arg(long, global = true, env = "CONDUIT_COMPOSE_BINARY")]
    compose_binary: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut DeployerConfig) {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }

        if self.server_tls_cert.is_some() {
            config.server_tls.cert = self.server_tls_cert;
        }
        if self.server_tls_key.is_some() {
            config.server_tls.key = self.server_tls_key;
        }
        if self.server_tls_ca_cert.is_some() {
            config.server_tls.ca_cert = self.server_tls_ca_cert;
        }

        if let Some(url) = self.docker_url {
            config.docker.url = url;
        }
        if self.tls_ca_cert.is_some() {
            config.docker.tls_ca_cert = self.tls_ca_cert;
        }
        if self.tls_cert.is_some() {
            config.docker.tls_cert = self.tls_cert;
        }
        if self.tls_key.is_some() {
            config.docker.tls_key = self.tls_key;
        }

        if !self.repositories.is_empty() {
            config.repositories = self.repositories;
        }
        if !self.tags.is_empty() {
            config.tags = self.tags;
        }
        if let Some(token) = self.token {
            config.token = token;
        }

        if self.auth_username.is_some()
            || self.auth_password.is_some()
            || self.auth_email.is_some()
            || self.auth_server.is_some()
        {
            let auth = config.registry_auth.get_or_insert_with(Default::default);
            if let Some(username) = self.auth_username {
                auth.username = username;
            }
            if let Some(password) = self.auth_password {
                auth.password = password;
            }
            if let Some(email) = self.auth_email {
                auth.email = email;
            }
            if self.auth_server.is_some() {
                auth.server_address = self.auth_server;
            }
        }

        if let Some(dir) = self.repo_root_dir {
            config.git.repo_root_dir = dir;
        }
        if let Some(dir) = self.repo_work_dir {
            config.git.repo_work_dir = dir;
        }
        if self.rollover_url.is_some() {
            config.git.rollover_url = self.rollover_url;
        }
        if let Some(git) = self.git_binary {
            config.git.git_binary = git;
        }
        if let Some(compose) = self.compose_binary {
            config.git.compose_binary = compose;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Serve);
    if let Commands::Version = command {
        println!("{} {}", conduit_core::NAME, conduit_core::version());
        return Ok(());
    }

    let level = if cli.debug { "debug" } else { cli.log_level.as_str() };
    init_logging(level)?;

    let mut config = DeployerConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.overrides.apply(&mut config);

    match command {
        Commands::Serve => serve(config).await,
        Commands::Destroy { repo } => destroy(config, &repo).await,
        Commands::Version => Ok(()),
    }
}

async fn serve(config: DeployerConfig) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = conduit_core::NAME,
        version = %conduit_core::version(),
        "Conduit starting"
    );
    info!(
        repositories = ?config.repositories,
        tags = ?config.tags,
        repo_root = %config.git.repo_root_dir.display(),
        work_root = %config.git.repo_work_dir.display(),
        rollover_hooks = config.git.rollover_url.is_some(),
        "Configuration loaded"
    );
    if config.token.is_empty() {
        warn!("No token configured, only requests with an empty token are accepted");
    }

    let server_tls =
        tls::server_config(&config.server_tls).context("Failed to load server TLS material")?;

    for dir in [&config.git.repo_root_dir, &config.git.repo_work_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let runtime = DockerRuntime::connect(&config.docker)
        .with_context(|| format!("Failed to connect to container runtime at {}", config.docker.url))?;
    match runtime.healthcheck().await {
        Ok(()) => info!(url = %config.docker.url, "Container runtime reachable"),
        Err(e) => warn!(url = %config.docker.url, error = %e, "Container runtime not reachable yet"),
    }

    let engine = Arc::new(RolloverEngine::new(Arc::new(runtime), config.pull_credentials()));
    let reporter = Arc::new(HttpCallbackReporter::new().context("Failed to build callback client")?);
    let deployment = Arc::new(DeploymentService::new(
        TriggerValidator::new(config.token.clone(), config.whitelist()),
        config.tag_allow_list(),
        engine,
        reporter,
    ));
    let pipeline = Arc::new(
        GitPushPipeline::new(config.git.clone(), config.token.clone(), Arc::new(TokioCommandRunner))
            .context("Failed to initialize git push pipeline")?,
    );
    let backend = Arc::new(GitHttpBackend::new(
        config.git.git_binary.clone(),
        config.git.repo_root_dir.clone(),
    ));

    let app = api::app(Arc::new(AppState {
        deployment,
        pipeline,
        backend,
    }));

    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    match server_tls {
        Some(server_tls) => {
            let addr = tokio::net::lookup_host(&config.listen_addr)
                .await
                .with_context(|| format!("Failed to resolve {}", config.listen_addr))?
                .next()
                .with_context(|| format!("No address for {}", config.listen_addr))?;

            let handle = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                async move {
                    shutdown_signal().await;
                    handle.graceful_shutdown(None);
                }
            });

            info!(
                client_certs = config.server_tls.ca_cert.is_some(),
                "Listening on {} (TLS)", addr
            );

            axum_server::bind_rustls(addr, RustlsConfig::from_config(Arc::new(server_tls)))
                .handle(handle)
                .serve(app)
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            let listener = TcpListener::bind(&config.listen_addr)
                .await
                .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

            info!("Listening on {}", config.listen_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
    }

    info!("Conduit shutting down");

    Ok(())
}

async fn destroy(config: DeployerConfig, repo: &str) -> Result<()> {
    let pipeline = GitPushPipeline::new(config.git, config.token, Arc::new(TokioCommandRunner))
        .context("Failed to initialize git push pipeline")?;

    let lines = pipeline
        .destroy(repo)
        .await
        .with_context(|| format!("Failed to destroy {}", repo))?;

    for line in lines {
        println!("{}", line);
    }
    println!("{} {}", "Destroyed".green(), repo);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
