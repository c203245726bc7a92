// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the `tfp` CLI

pub mod archive;
pub mod failure;
pub mod run;
pub mod workspace;

pub use self::archive::{InjectOverrideCommand, ParametersCommand};
pub use self::failure::FormatErrorCommand;
pub use self::run::RunStatusCommand;
pub use self::workspace::WorkspaceNameCommand;

use anyhow::{anyhow, Result};
use tfc_provisioner_core::domain::operation::KeyValue;

/// Parse a `key=value` argument. The value may itself contain `=`.
pub fn parse_key_value(raw: &str) -> Result<KeyValue> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(KeyValue::new(key, value)),
        _ => Err(anyhow!("expected key=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("env=prod").unwrap(), KeyValue::new("env", "prod"));
        assert_eq!(parse_key_value("expr=a=b").unwrap(), KeyValue::new("expr", "a=b"));
        assert_eq!(parse_key_value("empty=").unwrap(), KeyValue::new("empty", ""));
        assert!(parse_key_value("=value").is_err());
        assert!(parse_key_value("novalue").is_err());
    }
}
