// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Git Smart-HTTP Backend
//!
//! Bridges an HTTP request to `git http-backend` over CGI. The request body
//! is streamed into the child's stdin; the child's stdout is a CGI response
//! (header block, blank line, body). Only the header block is read up front,
//! the body is streamed back as the child produces it.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Serve clone/fetch/push for repositories under the repo root

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Header blocks from git are a handful of lines
const MAX_HEAD_BYTES: usize = 16 * 1024;

pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[derive(Debug, Error)]
pub enum GitBackendError {
    #[error("Failed to spawn git http-backend: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git http-backend I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("Malformed CGI response from git http-backend: {0}")]
    MalformedOutput(String),
}

/// One smart-HTTP request as seen by the CGI program
pub struct CgiRequest {
    pub method: String,
    pub path_info: String,
    pub query_string: String,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub content_encoding: Option<String>,
    pub git_protocol: Option<String>,
    pub remote_addr: String,
    pub body: BodyStream,
}

pub struct CgiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Ends once the child has exited
    pub body: BodyStream,
}

pub struct GitHttpBackend {
    git_binary: String,
    project_root: PathBuf,
}

impl GitHttpBackend {
    pub fn new(git_binary: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
            project_root: project_root.into(),
        }
    }

    pub async fn serve(&self, request: CgiRequest) -> Result<CgiResponse, GitBackendError> {
        debug!(
            method = %request.method,
            path = %request.path_info,
            "Forwarding request to git http-backend"
        );

        let mut cmd = tokio::process::Command::new(&self.git_binary);
        cmd.arg("http-backend")
            .env("GIT_PROJECT_ROOT", &self.project_root)
            .env("GIT_HTTP_EXPORT_ALL", "1")
            .env("REMOTE_USER", "git")
            .env("REMOTE_ADDR", &request.remote_addr)
            .env("GATEWAY_INTERFACE", "CGI/1.1")
            .env("REQUEST_METHOD", &request.method)
            .env("PATH_INFO", &request.path_info)
            .env("QUERY_STRING", &request.query_string)
            .env("CONTENT_TYPE", request.content_type.as_deref().unwrap_or_default())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Without a length git reads the body until EOF.
        if let Some(length) = &request.content_length {
            cmd.env("CONTENT_LENGTH", length);
        }
        if let Some(encoding) = &request.content_encoding {
            cmd.env("HTTP_CONTENT_ENCODING", encoding);
        }
        if let Some(protocol) = &request.git_protocol {
            cmd.env("GIT_PROTOCOL", protocol);
        }

        let mut child = cmd.spawn().map_err(GitBackendError::Spawn)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitBackendError::Io(std::io::Error::other("stdout not captured")))?;

        // Feed stdin from its own task, or a large push deadlocks on full pipes.
        if let Some(mut stdin) = child.stdin.take() {
            let mut body = request.body;
            tokio::spawn(async move {
                while let Some(chunk) = body.next().await {
                    let written = match chunk {
                        Ok(chunk) => stdin.write_all(&chunk).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = written {
                        debug!(error = %e, "Stopped feeding git http-backend");
                        return;
                    }
                }
                if let Err(e) = stdin.shutdown().await {
                    debug!(error = %e, "git http-backend closed stdin early");
                }
            });
        }

        let stderr = child.stderr.take();
        let exit = tokio::spawn(async move {
            let mut errors = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut errors).await;
            }
            if !errors.is_empty() {
                warn!(stderr = %String::from_utf8_lossy(&errors).trim(), "git http-backend");
            }
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(%status, "git http-backend exited unsuccessfully")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to wait for git http-backend"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let (status, headers) = read_cgi_head(&mut reader).await?;

        let tail = stream::once(async move {
            let _ = exit.await;
            None::<Result<Bytes, std::io::Error>>
        })
        .filter_map(futures::future::ready);
        let body = ReaderStream::new(reader).chain(tail).boxed();

        Ok(CgiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read the CGI header block up to the blank line, leaving the reader at the
/// first body byte. `Status:` sets the HTTP status and is not forwarded as a
/// header; the default status is 200.
pub async fn read_cgi_head<R>(reader: &mut R) -> Result<(u16, Vec<(String, String)>), GitBackendError>
where
    R: AsyncBufRead + Unpin,
{
    let mut status = 200;
    let mut headers = Vec::new();
    let mut consumed = 0;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(GitBackendError::Io)?;
        if n == 0 || !line.ends_with(b"\n") {
            return Err(GitBackendError::MalformedOutput(
                "missing header terminator".to_string(),
            ));
        }
        consumed += n;
        if consumed > MAX_HEAD_BYTES {
            return Err(GitBackendError::MalformedOutput(
                "header block too large".to_string(),
            ));
        }

        let text = std::str::from_utf8(&line)
            .map_err(|e| GitBackendError::MalformedOutput(e.to_string()))?
            .trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok((status, headers));
        }

        let (name, value) = text
            .split_once(':')
            .ok_or_else(|| GitBackendError::MalformedOutput(format!("bad header line {text:?}")))?;
        let value = value.trim();

        if name.eq_ignore_ascii_case("status") {
            status = value
                .split_whitespace()
                .next()
                .and_then(|code| code.parse().ok())
                .ok_or_else(|| GitBackendError::MalformedOutput(format!("bad status {value:?}")))?;
        } else {
            headers.push((name.trim().to_string(), value.to_string()));
        }
    }
}
