// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! HTTP Front Door
//!
//! | Method | Path | Purpose | Auth |
//! |--------|------|---------|------|
//! | GET | `/info`, `/` | name and version | none |
//! | POST | `/hook`, `/` | registry webhook, triggers a rollover | token |
//! | GET/POST | `/{owner}/{repo}/...` | git smart-HTTP (clone, fetch, push) | none |
//! | DELETE | `/{owner}/{repo}` | tear down the compose project | token |
//!
//! The token travels in the `X-Token` header or the `token` query parameter.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{Extensions, HeaderMap},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{future, stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::deployment::{DeploymentError, DeploymentService};
use crate::application::git_pipeline::{GitPushPipeline, RepositoryLease};
use crate::domain::callback::OutcomePayload;
use crate::domain::repository::is_receive_pack;
use crate::domain::trigger::{TriggerEvent, TriggerRejection};
use crate::infrastructure::git_http_backend::{BodyStream, CgiRequest, GitHttpBackend};
use crate::presentation::error::ApiError;

pub const TOKEN_HEADER: &str = "x-token";

pub struct AppState {
    pub deployment: Arc<DeploymentService>,
    pub pipeline: Arc<GitPushPipeline>,
    pub backend: Arc<GitHttpBackend>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(info_handler).post(webhook_handler))
        .route("/info", get(info_handler))
        .route("/hook", post(webhook_handler))
        .route(
            "/{*path}",
            get(git_handler).post(git_handler).delete(destroy_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub repository: WebhookRepository,
    #[serde(default)]
    pub push_data: Option<PushData>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub repo_name: String,
    #[serde(default)]
    pub repo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushData {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub pusher: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

async fn info_handler() -> Json<Value> {
    Json(json!({
        "name": crate::NAME,
        "version": crate::version(),
    }))
}

async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Result<Json<OutcomePayload>, ApiError> {
    let token = request_token(&headers, &query);
    let ip = remote_addr(&headers, &extensions);

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            state
                .deployment
                .validator()
                .authenticate(&token)
                .inspect_err(|_| warn!(ip = %ip, "Invalid token"))?;
            return Err(ApiError::BadRequest(format!("invalid webhook body: {}", e)));
        }
    };

    info!(
        repo = %payload.repository.repo_name,
        url = payload.repository.repo_url.as_deref().unwrap_or_default(),
        pusher = payload.push_data.as_ref().and_then(|p| p.pusher.as_deref()).unwrap_or_default(),
        "Received webhook"
    );

    let mut event = TriggerEvent::new(payload.repository.repo_name, token);
    if let Some(tag) = payload
        .push_data
        .and_then(|p| p.tag)
        .filter(|t| !t.is_empty())
    {
        event = event.with_tag(tag);
    }
    if let Some(url) = payload.callback_url {
        event = event.with_callback(url);
    }

    match state.deployment.deploy(event).await {
        Ok(report) => Ok(Json(OutcomePayload::from_report(&report))),
        Err(DeploymentError::Rejected(TriggerRejection::Unauthorized)) => {
            warn!(ip = %ip, "Invalid token");
            Err(TriggerRejection::Unauthorized.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn git_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let ip = remote_addr(&parts.headers, &parts.extensions);

    let lease = state.pipeline.prepare(&path).await?;
    if is_receive_pack(&path) {
        info!(name = %lease.name, ip = %ip, "deploy");
    }

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let cgi = CgiRequest {
        method: parts.method.to_string(),
        path_info: path,
        query_string: parts.uri.query().unwrap_or_default().to_string(),
        content_type: header("content-type"),
        content_length: header("content-length"),
        content_encoding: header("content-encoding"),
        git_protocol: header("git-protocol"),
        remote_addr: ip,
        body: body.into_data_stream().map_err(std::io::Error::other).boxed(),
    };
    let response = state.backend.serve(cgi).await?;

    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from_stream(hold_until_done(response.body, lease)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Keep the repository locked until git has finished with it, push hooks
/// included, or the client has gone away.
fn hold_until_done(body: BodyStream, lease: RepositoryLease) -> BodyStream {
    let release = stream::once(async move {
        drop(lease);
        None::<Result<Bytes, std::io::Error>>
    })
    .filter_map(future::ready);
    body.chain(release).boxed()
}

async fn destroy_handler(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Json<OutcomePayload>, ApiError> {
    let token = request_token(&headers, &query);
    if let Err(rejection) = state.deployment.validator().authenticate(&token) {
        warn!(ip = %remote_addr(&headers, &extensions), "Invalid token");
        return Err(rejection.into());
    }

    let slug = path.trim_matches('/');
    if slug.split('/').count() != 2 {
        return Err(ApiError::BadRequest(format!(
            "teardown path must be /{{owner}}/{{repo}}: /{}",
            slug
        )));
    }

    state.pipeline.destroy(slug).await?;
    Ok(Json(OutcomePayload::success(format!("destroyed {}", slug))))
}

/// `X-Token` header, else `?token=`. Empty values count as absent.
fn request_token(headers: &HeaderMap, query: &TokenQuery) -> String {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| query.token.clone())
        .unwrap_or_default()
}

/// First `X-Forwarded-For` entry, else the peer address
fn remote_addr(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
