// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Conduit core
//!
//! Deployment orchestration: registry webhooks roll running containers over
//! to freshly pulled images, and git pushes provision repositories whose
//! hooks deploy the pushed tree.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain, use cases, adapters and the HTTP front door

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;

/// Process name reported by `/info`
pub const NAME: &str = "conduit";

/// `<package version> (<git commit>)`; the commit comes from
/// `CONDUIT_GIT_COMMIT` at build time and falls back to `HEAD`.
pub fn version() -> String {
    format!(
        "{} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("CONDUIT_GIT_COMMIT").unwrap_or("HEAD")
    )
}
