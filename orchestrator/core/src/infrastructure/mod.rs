// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod callback;
pub mod git_http_backend;
pub mod hook_templates;
pub mod process;
pub mod runtime;
pub mod tls;

pub use callback::HttpCallbackReporter;
pub use git_http_backend::GitHttpBackend;
pub use process::TokioCommandRunner;
pub use runtime::DockerRuntime;
