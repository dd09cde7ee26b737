//! Events emitted to the notifier.

use serde::Serialize;

use crate::classify::{ErrorCategory, Severity};

/// Lifecycle of a single validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    NotStarted,
    Checking,
    Retrying,
    Succeeded,
    Failed,
}

impl ValidationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ValidationState::Succeeded | ValidationState::Failed)
    }
}

/// State of a loading monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    Loading,
    Loaded,
    TimedOut,
    Cancelled,
}

impl LoadingState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoadingState::Loading)
    }
}

/// Structured event for a UI/notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValidationEvent {
    /// A validation moved to a new non-terminal state.
    Progress {
        model_id: String,
        base_url: String,
        state: ValidationState,
        /// One-based attempt number.
        attempt: u32,
    },
    Succeeded {
        model_id: String,
        base_url: String,
        loaded_models: usize,
    },
    Failed {
        model_id: String,
        base_url: String,
        category: ErrorCategory,
        severity: Severity,
        message: String,
    },
    /// A loading monitor changed state.
    Loading {
        model_id: String,
        base_url: String,
        state: LoadingState,
        elapsed_ms: u64,
    },
}

impl ValidationEvent {
    pub fn model_id(&self) -> &str {
        match self {
            ValidationEvent::Progress { model_id, .. }
            | ValidationEvent::Succeeded { model_id, .. }
            | ValidationEvent::Failed { model_id, .. }
            | ValidationEvent::Loading { model_id, .. } => model_id,
        }
    }
}
