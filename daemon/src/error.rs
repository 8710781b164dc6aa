use std::io;

use thiserror::Error;

/// Why an action could not be carried out.
///
/// The `Display` text ends up as the argument of the `ERROR` reply, so it is
/// written for the requesting client.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to create pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send control datagram: {0}")]
    Control(#[source] io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },
}

impl ActionError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
