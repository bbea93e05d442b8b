//! Error classification shared by the retry driver and the pipeline.
//!
//! Every error type in the crate reports an [`ErrorKind`], so retry decisions
//! are made by testing the kind against a policy's retryable set instead of
//! matching on concrete error types.

use serde::Serialize;

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable configuration (e.g. no languages). Fatal to the request.
    Configuration,
    /// Transport or API failure talking to a subtitle provider.
    ProviderCommunication,
    /// Downloaded subtitle is not in the requested language.
    Verification,
    /// Session or default stream update failed on the media server.
    Activation,
    /// Transport or API failure talking to the media server.
    MediaServer,
    /// The requested resource does not exist.
    NotFound,
    /// Anything else (I/O, parse errors, ...).
    Other,
}

/// Implemented by every error that can flow through a [`crate::RetryPolicy`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
