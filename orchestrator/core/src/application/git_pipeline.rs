// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Git Push Pipeline
//!
//! Prepares a repository for every git smart-HTTP request:
//!
//! | State | Transition |
//! |-------|------------|
//! | Absent → Bare | `git --bare init` when the bare directory is missing |
//! | Bare → Hooked | `post-receive` and `deploy` rewritten (0755) on every request |
//! | Hooked → Synced | work tree removed and re-cloned on every request |
//!
//! Every step overwrites what a previous, possibly interrupted, request left
//! behind, so a failed request is repaired by the next one. Requests for the
//! same repository are serialised: [`GitPushPipeline::prepare`] hands back a
//! [`RepositoryLease`] that keeps the repository locked until the caller has
//! finished serving the git request, deploy hooks included.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Provision bare repositories and their deploy hooks

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::locks::{KeyedGuard, KeyedLocks};
use crate::domain::config::GitConfig;
use crate::domain::repository::{RepositoryInfo, RepositoryPathError};
use crate::infrastructure::hook_templates::{
    HookParams, HookTemplateEngine, HookTemplateError, RenderedHooks,
};
use crate::infrastructure::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};

pub const POST_RECEIVE_HOOK: &str = "post-receive";
pub const DEPLOY_HOOK: &str = "deploy";
const HOOK_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidPath(#[from] RepositoryPathError),
    #[error("repository {0} does not exist")]
    NotFound(String),
    #[error("filesystem error on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Subprocess(#[from] ProcessError),
    #[error(transparent)]
    Template(#[from] HookTemplateError),
}

fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

/// A synced repository, locked against other pipeline runs until dropped
#[derive(Debug)]
pub struct RepositoryLease {
    repo: RepositoryInfo,
    _guard: KeyedGuard,
}

impl RepositoryLease {
    /// Drop the lock and keep the resolved paths
    pub fn release(self) -> RepositoryInfo {
        self.repo
    }
}

impl std::ops::Deref for RepositoryLease {
    type Target = RepositoryInfo;

    fn deref(&self) -> &RepositoryInfo {
        &self.repo
    }
}

pub struct GitPushPipeline {
    config: GitConfig,
    token: String,
    runner: Arc<dyn CommandRunner>,
    templates: HookTemplateEngine,
    locks: KeyedLocks,
}

impl GitPushPipeline {
    pub fn new(
        config: GitConfig,
        token: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            config,
            token: token.into(),
            runner,
            templates: HookTemplateEngine::new()?,
            locks: KeyedLocks::new(),
        })
    }

    pub fn resolve(&self, url_path: &str) -> Result<RepositoryInfo, PipelineError> {
        Ok(RepositoryInfo::from_url_path(
            url_path,
            &self.config.repo_root_dir,
            &self.config.repo_work_dir,
        )?)
    }

    /// Bring the repository addressed by `url_path` to the synced state.
    /// The repository stays locked for as long as the lease is held.
    pub async fn prepare(&self, url_path: &str) -> Result<RepositoryLease, PipelineError> {
        let repo = self.resolve(url_path)?;
        let guard = self.locks.acquire(&repo.lock_key()).await;

        self.provision(&repo).await?;
        self.install_hooks(&repo).await?;
        self.sync_work_dir(&repo).await?;

        Ok(RepositoryLease {
            repo,
            _guard: guard,
        })
    }

    /// Absent → Bare. A no-op when the bare directory already exists.
    pub async fn provision(&self, repo: &RepositoryInfo) -> Result<(), PipelineError> {
        if repo.exists() {
            return Ok(());
        }

        info!(dir = %repo.path.display(), "Creating new repository");
        if let Some(parent) = repo.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(fs_error(parent))?;
        }

        self.runner
            .run(
                CommandSpec::new(&self.config.git_binary)
                    .arg("--bare")
                    .arg("init")
                    .arg(&repo.path),
            )
            .await?;
        Ok(())
    }

    /// Bare → Hooked. Rewrites both hook scripts unconditionally.
    pub async fn install_hooks(&self, repo: &RepositoryInfo) -> Result<RenderedHooks, PipelineError> {
        debug!(name = %repo.name, repo = %repo.path.display(), "Creating post-receive hook");

        let rollover_url = self.config.rollover_url.clone();
        let params = HookParams {
            name: repo.name.clone(),
            identity: repo.identity(),
            repo_dir: repo.path.display().to_string(),
            work_dir: repo.work_dir.display().to_string(),
            git_binary: self.config.git_binary.clone(),
            compose_binary: self.config.compose_binary.clone(),
            token: rollover_url.as_ref().map(|_| self.token.clone()),
            rollover_url,
        };
        let hooks = self.templates.render(&params)?;

        let hooks_dir = repo.path.join("hooks");
        tokio::fs::create_dir_all(&hooks_dir)
            .await
            .map_err(fs_error(&hooks_dir))?;

        write_executable(&hooks_dir.join(POST_RECEIVE_HOOK), &hooks.post_receive).await?;
        write_executable(&hooks_dir.join(DEPLOY_HOOK), &hooks.deploy).await?;

        Ok(hooks)
    }

    /// Hooked → Synced. The work tree is always rebuilt from the bare repo.
    pub async fn sync_work_dir(&self, repo: &RepositoryInfo) -> Result<(), PipelineError> {
        debug!(
            repo = %repo.path.display(),
            work_dir = %repo.work_dir.display(),
            "Setting up repo work dir"
        );

        if tokio::fs::try_exists(&repo.work_dir)
            .await
            .map_err(fs_error(&repo.work_dir))?
        {
            debug!(path = %repo.work_dir.display(), "Removing existing work dir");
            tokio::fs::remove_dir_all(&repo.work_dir)
                .await
                .map_err(fs_error(&repo.work_dir))?;
        }

        if let Some(parent) = repo.work_dir.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(fs_error(parent))?;
        }

        self.runner
            .run(
                CommandSpec::new(&self.config.git_binary)
                    .arg("clone")
                    .arg(&repo.path)
                    .arg(&repo.work_dir),
            )
            .await?;
        Ok(())
    }

    /// Tear down the compose project of a repository: `kill`, then `rm --force`,
    /// both run inside its work tree where the compose file lives.
    pub async fn destroy(&self, slug: &str) -> Result<Vec<String>, PipelineError> {
        let repo = RepositoryInfo::from_slug(
            slug,
            &self.config.repo_root_dir,
            &self.config.repo_work_dir,
        )?;
        let _guard = self.locks.acquire(&repo.lock_key()).await;

        if !repo.exists() {
            return Err(PipelineError::NotFound(repo.lock_key()));
        }
        if !repo.work_dir.is_dir() {
            return Err(PipelineError::NotFound(repo.work_dir.display().to_string()));
        }

        info!(name = %repo.name, work_dir = %repo.work_dir.display(), "Destroying deployment");

        let mut lines = Vec::new();
        for args in [&["kill"][..], &["rm", "--force"][..]] {
            let mut spec = CommandSpec::new(&self.config.compose_binary).current_dir(&repo.work_dir);
            for arg in args {
                spec = spec.arg(arg);
            }
            let output: CommandOutput = self.runner.run(spec).await?;
            lines.extend(output.lines().map(|l| format!(" --> {}", l)));
        }

        for line in &lines {
            info!(name = %repo.name, "{}", line);
        }
        Ok(lines)
    }
}

async fn write_executable(path: &Path, content: &str) -> Result<(), PipelineError> {
    tokio::fs::write(path, content).await.map_err(fs_error(path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(HOOK_MODE))
            .await
            .map_err(fs_error(path))?;
    }

    Ok(())
}
