// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! TFC Provisioner Core
//!
//! Provisioning engine that turns product-catalog lifecycle events into
//! Terraform Cloud runs and reports their results back to the catalog.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model and ports, one use case per workflow stage,
//!   and the concrete adapters (Terraform Cloud HTTP client, archive
//!   toolkit, configuration parser, telemetry)
//!
//! The `testing` module carries in-process fakes for every port. It is only
//! compiled for this crate's tests or with the `testing` feature.

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::*;
