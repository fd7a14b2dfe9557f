// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the rollover engine against a recording runtime
//!
//! These tests verify:
//! 1. Call ordering with and without host port bindings
//! 2. Tag allow-list filtering
//! 3. Per-container failure isolation
//! 4. Replacement spec derivation and registry credentials

mod common;

use common::{container, port_bindings, Call, FakeRuntime};
use conduit_core::application::rollover::RolloverEngine;
use conduit_core::domain::rollover::OutcomeState;
use conduit_core::domain::runtime::PullCredentials;
use conduit_core::domain::trigger::TagAllowList;
use serde_json::json;
use std::sync::Arc;

fn latest() -> TagAllowList {
    TagAllowList::default()
}

fn engine(runtime: &Arc<FakeRuntime>) -> RolloverEngine {
    RolloverEngine::new(runtime.clone(), None)
}

#[tokio::test]
async fn test_start_before_retire_without_port_bindings() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app:latest",
        json!({}),
    )]));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].state, OutcomeState::Success);
    assert_eq!(report.outcomes[0].container, "c1aaaaaaaa");
    assert_eq!(
        runtime.kinds(),
        vec!["list", "pull", "inspect", "create", "start", "stop", "remove"]
    );

    let calls = runtime.calls();
    assert_eq!(calls[4], Call::Start("new000000000001".to_string()));
    assert_eq!(calls[5], Call::Stop("c1aaaaaaaaaaaaaa".to_string()));
    assert_eq!(calls[6], Call::Remove("c1aaaaaaaaaaaaaa".to_string()));
}

#[tokio::test]
async fn test_retire_before_start_with_port_bindings() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app:latest",
        port_bindings(),
    )]));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(report.is_success());
    assert_eq!(
        runtime.kinds_after_list(),
        vec!["pull", "inspect", "create", "stop", "remove", "start"]
    );
}

#[tokio::test]
async fn test_empty_port_bindings_count_as_none() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app:latest",
        json!({"PortBindings": {}}),
    )]));

    engine(&runtime).rollover("acme/app", &latest()).await;

    assert_eq!(
        runtime.kinds_after_list(),
        vec!["pull", "inspect", "create", "start", "stop", "remove"]
    );
}

#[tokio::test]
async fn test_only_allowed_tags_are_rolled_over() {
    let runtime = Arc::new(FakeRuntime::new(vec![
        container("latest0000000000", "acme/app:latest", json!({})),
        container("old0000000000000", "acme/app:old", json!({})),
        container("other00000000000", "acme/api:latest", json!({})),
    ]));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].container, "latest0000");

    let touched: Vec<String> = runtime
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Inspect(id) | Call::Stop(id) | Call::Remove(id) => Some(id),
            _ => None,
        })
        .collect();
    assert!(touched.iter().all(|id| id == "latest0000000000"));
}

#[tokio::test]
async fn test_untagged_image_matches_latest() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app",
        json!({}),
    )]));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        runtime.calls()[1],
        Call::Pull {
            image: "acme/app".to_string(),
            tag: "latest".to_string(),
            authenticated: false,
        }
    );
}

#[tokio::test]
async fn test_no_matching_containers_is_success() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/api:latest",
        json!({}),
    )]));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(report.is_success());
    assert!(report.outcomes.is_empty());
    assert_eq!(report.description(), "deployed acme/app");
    assert_eq!(runtime.kinds(), vec!["list"]);
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_container() {
    let runtime = Arc::new(
        FakeRuntime::new(vec![
            container("c1aaaaaaaaaaaaaa", "acme/app:latest", json!({})),
            container("c2bbbbbbbbbbbbbb", "acme/app:latest", json!({})),
        ])
        .fail("inspect:c1aaaaaaaaaaaaaa"),
    );

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert_eq!(report.state(), OutcomeState::Error);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].state, OutcomeState::Error);
    let error = report.outcomes[0].error.as_deref().unwrap();
    assert!(error.starts_with("c1aaaaaaaa: Failed to inspect container:"));
    assert_eq!(error.matches("c1aaaaaaaa").count(), 1, "{error}");
    assert_eq!(report.outcomes[1].state, OutcomeState::Success);
    assert_eq!(report.succeeded(), 1);

    // c1 never got a replacement and was never stopped
    assert!(!runtime.calls().contains(&Call::Stop("c1aaaaaaaaaaaaaa".to_string())));
    assert!(runtime.calls().contains(&Call::Remove("c2bbbbbbbbbbbbbb".to_string())));
    assert!(report
        .description()
        .starts_with("error deploying acme/app: c1aaaaaaaa:"));
}

#[tokio::test]
async fn test_start_failure_keeps_old_container_running() {
    let runtime = Arc::new(
        FakeRuntime::new(vec![container("c1aaaaaaaaaaaaaa", "acme/app:latest", json!({}))])
            .fail("start:new000000000001"),
    );

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(!report.is_success());
    assert_eq!(
        report.outcomes[0].replacement.as_deref(),
        Some("new0000000")
    );
    assert_eq!(runtime.kinds_after_list(), vec!["pull", "inspect", "create", "start"]);
}

#[tokio::test]
async fn test_pull_failure_stops_before_create() {
    let runtime = Arc::new(
        FakeRuntime::new(vec![container("c1aaaaaaaaaaaaaa", "acme/app:latest", port_bindings())])
            .fail("pull:acme/app"),
    );

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(!report.is_success());
    assert!(report.outcomes[0].replacement.is_none());
    assert_eq!(runtime.kinds_after_list(), vec!["pull"]);
}

#[tokio::test]
async fn test_list_failure_is_fatal() {
    let runtime = Arc::new(FakeRuntime::new(vec![]).fail("list"));

    let report = engine(&runtime).rollover("acme/app", &latest()).await;

    assert!(!report.is_success());
    assert!(report.outcomes.is_empty());
    assert!(report.fatal.is_some());
    assert!(report.description().contains("Failed to list containers"));
}

#[tokio::test]
async fn test_replacement_clears_hostname_and_keeps_config() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app:latest",
        port_bindings(),
    )]));

    engine(&runtime).rollover("acme/app", &latest()).await;

    let spec = runtime
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Create(spec) => Some(spec),
            _ => None,
        })
        .unwrap();
    assert!(spec.config.get("Hostname").is_none());
    assert_eq!(spec.config["Image"], "acme/app:latest");
    assert_eq!(spec.config["Env"], json!(["PORT=80"]));
    assert_eq!(spec.host_config, port_bindings());
}

#[tokio::test]
async fn test_credentials_are_forwarded_to_pull() {
    let runtime = Arc::new(FakeRuntime::new(vec![container(
        "c1aaaaaaaaaaaaaa",
        "acme/app:latest",
        json!({}),
    )]));
    let credentials = PullCredentials {
        username: "bot".to_string(),
        password: "hunter2".to_string(),
        email: None,
        server_address: None,
    };

    RolloverEngine::new(runtime.clone(), Some(credentials))
        .rollover("acme/app", &latest())
        .await;

    assert!(matches!(
        runtime.calls()[1],
        Call::Pull {
            authenticated: true,
            ..
        }
    ));
}

#[tokio::test]
async fn test_every_allowed_tag_is_evaluated() {
    let runtime = Arc::new(FakeRuntime::new(vec![
        container("latest0000000000", "acme/app:latest", json!({})),
        container("stable0000000000", "acme/app:stable", json!({})),
    ]));
    let tags = TagAllowList::new(vec!["latest".to_string(), "stable".to_string()]);

    let report = engine(&runtime).rollover("acme/app", &tags).await;

    assert_eq!(report.outcomes.len(), 2);
    let pulled: Vec<String> = runtime
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Pull { tag, .. } => Some(tag),
            _ => None,
        })
        .collect();
    assert_eq!(pulled, vec!["latest", "stable"]);
}
