use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Provision,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision => f.write_str("provision"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    /// A create request is already in flight; the new one was dropped.
    #[error("a provisioning request is already in flight")]
    Busy,
    #[error("store name must not be empty")]
    EmptyName,
    /// Transport failures, non-2xx responses and undecodable bodies all land here.
    #[error("{action} request failed: {source}")]
    Failed {
        action: ActionKind,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}
