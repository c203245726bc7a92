// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Failure Reasons
//!
//! Stage failures travel through the workflow runtime as an error envelope
//! `{"errorMessage": …, "errorType": …}`. Before the result stage reports a
//! failure to the catalog it simplifies that envelope to a human-readable
//! message and bounds its length.

use crate::domain::catalog::MAX_FAILURE_REASON_LEN;
use crate::domain::run_status::RUN_ERRORED_MESSAGE;
use crate::domain::terraform::TerraformError;
use serde::{Deserialize, Serialize};

pub const ERROR_TYPE_STRING: &str = "errorString";
pub const ERROR_TYPE_UNAUTHORIZED: &str = "TFEUnauthorized";

pub const TIMEOUT_MESSAGE: &str = "A lambda function invoked by the state machine has timed out";

pub const APPLY_FAILED_GUIDANCE: &str = "Failed running terraform apply. Review the run in the Terraform Cloud workspace for this provisioned product to find the cause, then update the provisioned product to retry.";

const TIMEOUT_ERROR_NAMES: [&str; 2] = ["States.Timeout", "Sandbox.Timedout"];
const ELLIPSIS: &str = "...";

/// Serialized form of a stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
    #[serde(rename = "errorType", default)]
    pub error_type: String,
}

impl ErrorEnvelope {
    /// Classify a stage error for the workflow runtime.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let unauthorized = err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<TerraformError>(), Some(TerraformError::AuthInvalid)));

        if unauthorized {
            Self {
                error_message: TerraformError::AuthInvalid.to_string(),
                error_type: ERROR_TYPE_UNAUTHORIZED.to_string(),
            }
        } else {
            Self {
                error_message: format!("{:#}", err),
                error_type: ERROR_TYPE_STRING.to_string(),
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.error_message.clone())
    }
}

/// Reduce a stage failure to the message shown on the catalog record.
pub fn simplify(message: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(message) {
        Err(_) if message == RUN_ERRORED_MESSAGE => APPLY_FAILED_GUIDANCE.to_string(),
        Err(_) => message.to_string(),
        Ok(envelope)
            if (envelope.error_type == ERROR_TYPE_STRING || envelope.error_type == ERROR_TYPE_UNAUTHORIZED)
                && !envelope.error_message.is_empty() =>
        {
            envelope.error_message
        }
        Ok(_) => message.to_string(),
    }
}

/// Bound a failure reason to the catalog's limit.
pub fn truncate(reason: String) -> String {
    if reason.chars().count() <= MAX_FAILURE_REASON_LEN {
        return reason;
    }
    let keep = MAX_FAILURE_REASON_LEN - ELLIPSIS.len();
    let mut truncated: String = reason.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

pub fn is_timeout(error_name: &str) -> bool {
    TIMEOUT_ERROR_NAMES.contains(&error_name)
}

/// Failure reason for a result-stage input carrying `error_name` and `message`.
pub fn format_failure_reason(error_name: &str, message: &str) -> String {
    let reason = if is_timeout(error_name) {
        TIMEOUT_MESSAGE.to_string()
    } else if message.is_empty() {
        error_name.to_string()
    } else {
        simplify(message)
    };
    truncate(reason)
}
