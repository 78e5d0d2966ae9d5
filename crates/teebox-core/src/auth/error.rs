use std::error::Error as StdError;

use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced by the session manager. None are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A local precondition failed; nothing was sent to the server
    #[error("{0}")]
    Validation(String),

    /// The server rejected the credentials or the token
    #[error("{0}")]
    Auth(String),

    /// Transport failure or a response that could not be understood
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not logged in")]
    Unauthenticated,
}

impl SessionError {
    /// Map a wire error, using `fallback` when the server gave no message
    pub(crate) fn from_api(err: ApiError, fallback: &str) -> Self {
        match &err {
            ApiError::Rejected { .. } => SessionError::Auth(err.detail_or(fallback)),
            ApiError::Network(e) => SessionError::Network(error_chain(e)),
            ApiError::InvalidResponse(msg) => SessionError::Network(msg.clone()),
        }
    }

    /// The caller has to send the user back to the login view
    pub fn requires_login(&self) -> bool {
        matches!(self, SessionError::Auth(_) | SessionError::Unauthenticated)
    }
}

/// Join an error with its sources, e.g. "error sending request: connection refused"
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}
