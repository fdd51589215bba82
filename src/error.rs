use std::time::Duration;

use crate::schema::Violation;

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{}: {}", violation.path, violation.rule))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// A poll loop ran out of wall-clock budget before its predicate held.
    #[error("timeout after {elapsed:?}: {message}")]
    Timeout {
        /// Caller-supplied context describing what was being waited for.
        message: String,
        /// Wall-clock time spent before giving up.
        elapsed: Duration,
    },
    /// A retry or poll wait was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
    /// Response body did not conform to the named schema.
    ///
    /// Lists every violated field, not just the first one found.
    #[error("schema '{name}' rejected body: {}", render_violations(.violations))]
    Schema {
        /// Cache key the schema was compiled under.
        name: String,
        /// One entry per violated field path.
        violations: Vec<Violation>,
    },
    /// Expected/actual mismatch raised by an assertion helper.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// Response decoding or shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Missing or malformed environment configuration.
    #[error("config error: {0}")]
    Config(String),
}
