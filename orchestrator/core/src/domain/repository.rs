// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Git Repository Resolution
//!
//! Maps a git smart-HTTP request path (`/{owner}/{name}/...`) onto the bare
//! repository and work tree it addresses. The filesystem is the only
//! registry: a repository exists when its bare directory exists.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Deterministic path derivation with traversal prevention

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryPathError {
    #[error("repository path must be /{{owner}}/{{name}}: {0}")]
    TooFewSegments(String),

    #[error("invalid repository path segment {segment:?} in {path}")]
    InvalidSegment { path: String, segment: String },
}

/// Bare repository addressed by a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub owner: String,
    /// Last path component of the bare repo, e.g. `app.git`
    pub name: String,
    /// `{repo_root}/{owner}/{name}`
    pub path: PathBuf,
    /// `{work_root}/{owner}/{name}`
    pub work_dir: PathBuf,
}

impl RepositoryInfo {
    /// Resolve from a URL path. Only the first two segments are used; any
    /// remainder (`info/refs`, `git-receive-pack`) belongs to the git protocol.
    pub fn from_url_path(
        url_path: &str,
        repo_root: &Path,
        work_root: &Path,
    ) -> Result<Self, RepositoryPathError> {
        let mut segments = url_path.split('/').filter(|s| !s.is_empty());
        let (owner, name) = match (segments.next(), segments.next()) {
            (Some(owner), Some(name)) => (owner, name),
            _ => return Err(RepositoryPathError::TooFewSegments(url_path.to_string())),
        };

        for segment in [owner, name] {
            if !is_safe_segment(segment) {
                return Err(RepositoryPathError::InvalidSegment {
                    path: url_path.to_string(),
                    segment: segment.to_string(),
                });
            }
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            path: repo_root.join(owner).join(name),
            work_dir: work_root.join(owner).join(name),
        })
    }

    /// Resolve from an `owner/name` slug as typed on the command line
    pub fn from_slug(
        slug: &str,
        repo_root: &Path,
        work_root: &Path,
    ) -> Result<Self, RepositoryPathError> {
        Self::from_url_path(&format!("/{}", slug.trim_matches('/')), repo_root, work_root)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Image identity deployed from this repository, `owner/name` without `.git`
    pub fn identity(&self) -> String {
        let name = self.name.strip_suffix(".git").unwrap_or(&self.name);
        format!("{}/{}", self.owner, name)
    }

    /// Key used to serialise pipeline runs on the same repository. Both the
    /// bare repository and the work tree are derived from it.
    pub fn lock_key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

// Segments end up in filesystem paths and generated shell scripts.
fn is_safe_segment(segment: &str) -> bool {
    !segment.starts_with('.')
        && !segment.starts_with('-')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Whether a request path is a push (`.../git-receive-pack`)
pub fn is_receive_pack(url_path: &str) -> bool {
    url_path.rsplit('/').next() == Some("git-receive-pack")
}
