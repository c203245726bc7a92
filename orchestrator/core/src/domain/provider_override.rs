// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AWS provider override injected into every uploaded configuration.
//!
//! Pins the provider region to the engine's region and applies the billing
//! tags plus the tracer tag as default tags on every resource.

use crate::domain::operation::KeyValue;
use serde_json::{json, Map, Value};

/// Entry name of the override inside the configuration archive.
pub const PROVIDER_OVERRIDE_FILE: &str = "provider_override.tf.json";

pub fn build_provider_override(region: &str, billing_tags: &[KeyValue], tracer_tag: &KeyValue) -> Value {
    let mut tags = Map::new();
    for tag in billing_tags {
        tags.insert(tag.key.clone(), Value::String(tag.value.clone()));
    }
    // The tracer tag always wins over a billing tag with the same key.
    tags.insert(tracer_tag.key.clone(), Value::String(tracer_tag.value.clone()));

    json!({
        "provider": {
            "aws": {
                "region": region,
                "default_tags": {
                    "tags": tags
                }
            }
        }
    })
}
