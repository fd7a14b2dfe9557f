// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Plain types and decisions with no I/O: configuration, trigger validation,
//! the container runtime capability, rollover reports, callback payloads and
//! repository path resolution.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by every use case and adapter

pub mod callback;
pub mod config;
pub mod repository;
pub mod rollover;
pub mod runtime;
pub mod trigger;
