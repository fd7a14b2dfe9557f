// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`conduit-core`)
//!
//! HTTP surface that translates requests into application service calls.
//! No deployment logic lives here.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | axum router: info, webhook, git smart-HTTP, teardown |
//! | [`error`] | Error taxonomy to HTTP status mapping |

pub mod api;
pub mod error;
