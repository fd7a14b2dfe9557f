// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Shared fakes for integration tests: a recording container runtime, a
//! channel-backed callback reporter and a recording command runner.

#![allow(dead_code)]

use async_trait::async_trait;
use conduit_core::domain::callback::{CallbackError, CallbackReporter, OutcomePayload};
use conduit_core::domain::runtime::{
    ContainerId, ContainerRecord, ContainerSpec, ContainerSummary, PullCredentials, RuntimeClient,
    RuntimeError,
};
use conduit_core::infrastructure::process::{
    CommandOutput, CommandRunner, CommandSpec, ProcessError,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// One adapter call, in the order it was made
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Pull {
        image: String,
        tag: String,
        authenticated: bool,
    },
    Inspect(String),
    Create(ContainerSpec),
    Start(String),
    Stop(String),
    Remove(String),
}

impl Call {
    /// Call name without arguments, for order assertions
    pub fn kind(&self) -> &'static str {
        match self {
            Call::List => "list",
            Call::Pull { .. } => "pull",
            Call::Inspect(_) => "inspect",
            Call::Create(_) => "create",
            Call::Start(_) => "start",
            Call::Stop(_) => "stop",
            Call::Remove(_) => "remove",
        }
    }
}

/// In-memory runtime recording every call. Failures are injected by key:
/// `list`, `pull:<image>`, `inspect:<id>`, `create`, `start:<id>`,
/// `stop:<id>`, `remove:<id>`.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Vec<ContainerRecord>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashSet<String>>,
    created: AtomicUsize,
}

pub fn container(id: &str, image: &str, host_config: Value) -> ContainerRecord {
    ContainerRecord {
        id: ContainerId::new(id),
        image: image.to_string(),
        config: json!({
            "Hostname": id.chars().take(12).collect::<String>(),
            "Image": image,
            "Env": ["PORT=80"],
        }),
        host_config,
    }
}

pub fn port_bindings() -> Value {
    json!({"PortBindings": {"80/tcp": [{"HostIp": "", "HostPort": "80"}]}})
}

impl FakeRuntime {
    pub fn new(containers: Vec<ContainerRecord>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn fail(self, key: &str) -> Self {
        self.failures.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::kind).collect()
    }

    /// Calls made after the initial list
    pub fn kinds_after_list(&self) -> Vec<&'static str> {
        self.kinds().into_iter().filter(|k| *k != "list").collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fails(&self, key: &str) -> bool {
        self.failures.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.record(Call::List);
        if self.fails("list") {
            return Err(RuntimeError::List("connection refused".to_string()));
        }
        Ok(self
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                image: c.image.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError> {
        self.record(Call::Inspect(id.to_string()));
        if self.fails(&format!("inspect:{}", id)) {
            return Err(RuntimeError::Inspect {
                id: id.to_string(),
                reason: "no such container".to_string(),
            });
        }
        self.containers
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::Inspect {
                id: id.to_string(),
                reason: "no such container".to_string(),
            })
    }

    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        credentials: Option<&PullCredentials>,
    ) -> Result<(), RuntimeError> {
        self.record(Call::Pull {
            image: image.to_string(),
            tag: tag.to_string(),
            authenticated: credentials.is_some(),
        });
        if self.fails(&format!("pull:{}", image)) {
            return Err(RuntimeError::Pull {
                image: format!("{}:{}", image, tag),
                reason: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<ContainerId, RuntimeError> {
        self.record(Call::Create(spec));
        if self.fails("create") {
            return Err(RuntimeError::Create("conflict".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ContainerId::new(format!("new{:012}", n)))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.record(Call::Start(id.to_string()));
        if self.fails(&format!("start:{}", id)) {
            return Err(RuntimeError::Start {
                id: id.to_string(),
                reason: "port is already allocated".to_string(),
            });
        }
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _grace: Duration) -> Result<(), RuntimeError> {
        self.record(Call::Stop(id.to_string()));
        if self.fails(&format!("stop:{}", id)) {
            return Err(RuntimeError::Stop {
                id: id.to_string(),
                reason: "timeout".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.record(Call::Remove(id.to_string()));
        if self.fails(&format!("remove:{}", id)) {
            return Err(RuntimeError::Remove {
                id: id.to_string(),
                reason: "removal in progress".to_string(),
            });
        }
        Ok(())
    }
}

/// Forwards every reported payload to a channel
pub struct RecordingReporter {
    tx: mpsc::UnboundedSender<(OutcomePayload, String)>,
}

impl RecordingReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(OutcomePayload, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl CallbackReporter for RecordingReporter {
    async fn report(&self, payload: &OutcomePayload, url: &str) -> Result<(), CallbackError> {
        let _ = self.tx.send((payload.clone(), url.to_string()));
        Ok(())
    }
}

/// Records commands and emulates the filesystem effects the pipeline relies
/// on: `git --bare init <dir>` and `git clone <src> <dst>` create their target
/// directory.
#[derive(Default)]
pub struct FakeRunner {
    commands: Mutex<Vec<CommandSpec>>,
    fail_args: Mutex<Option<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose first argument equals `arg`
    pub fn failing(arg: &str) -> Self {
        let runner = Self::default();
        *runner.fail_args.lock().unwrap() = Some(arg.to_string());
        runner
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    pub fn first_args(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| c.args.first().cloned().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.commands.lock().unwrap().push(command.clone());

        let first = command.args.first().map(String::as_str).unwrap_or_default();
        if self.fail_args.lock().unwrap().as_deref() == Some(first) {
            return Err(ProcessError::Failed {
                program: command.program.clone(),
                args: command.display_args(),
                code: 128,
                output: "fatal: simulated failure".to_string(),
            });
        }

        match command.args.as_slice() {
            [bare, init, dir] if bare == "--bare" && init == "init" => {
                std::fs::create_dir_all(PathBuf::from(dir)).map_err(|source| ProcessError::Spawn {
                    program: command.program.clone(),
                    source,
                })?;
            }
            [clone, _src, dst] if clone == "clone" => {
                std::fs::create_dir_all(PathBuf::from(dst)).map_err(|source| {
                    ProcessError::Spawn {
                        program: command.program.clone(),
                        source,
                    }
                })?;
                std::fs::write(PathBuf::from(dst).join("docker-compose.yml"), "services: {}\n")
                    .map_err(|source| ProcessError::Spawn {
                        program: command.program.clone(),
                        source,
                    })?;
            }
            _ => {}
        }

        Ok(CommandOutput {
            output: format!("{} {}\n", command.program, command.display_args()),
        })
    }
}
