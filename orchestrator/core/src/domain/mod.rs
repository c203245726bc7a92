// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: operation model, ports to external collaborators, and the
//! pure rules (run classification, failure reasons, provider override).

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod event_source;
pub mod failure_reason;
pub mod object_store;
pub mod operation;
pub mod parameters;
pub mod provider_override;
pub mod run_status;
pub mod terraform;
pub mod workflow_runtime;
