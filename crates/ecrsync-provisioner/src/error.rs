use thiserror::Error;

use crate::api::ApiError;
use crate::config::ReconcilerConfig;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The repository does not exist remotely. Triggers creation on the
    /// update path and counts as success on the delete path.
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("remote API error: {0}")]
    Api(#[from] ApiError),

    #[error("reconcile pass cancelled before {before}")]
    Cancelled { before: &'static str },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconcileError {
    /// Remote error code, when this error came back from the remote API.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Terminal errors stop automatic retries until the desired state
    /// changes. Only remote codes listed in the config qualify.
    pub fn is_terminal(&self, config: &ReconcilerConfig) -> bool {
        self.api_code()
            .is_some_and(|code| config.terminal_error_codes.iter().any(|t| t == code))
    }
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
