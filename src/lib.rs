//! `apiharness` is an async utility layer for HTTP API test suites.
//!
//! It wraps the repetitive plumbing of fixture-driven API tests with
//! ergonomic primitives:
//! - [`retry()`]/[`retry_cancellable`]: transparent retry with exponential
//!   backoff on transient statuses
//! - [`poll_until`]: predicate polling with a hard wall-clock deadline
//! - [`dispatch`]: concurrency-bounded batch execution
//! - [`measure`]: response-time measurement
//! - [`SchemaValidator`]: structural body validation with a compiled cache
//! - [`Interceptor`]: request/response capture with derived statistics
//! - [`ApiClient`]: the request context composing all of the above

mod assertion;
mod batch;
mod client;
mod error;
mod intercept;
mod options;
mod params;
mod poll;
mod retry;
mod schema;
mod timing;
mod types;

pub use assertion::{
    assert_body_contains, assert_body_is_array, assert_body_matches, assert_header, assert_status,
    validate_idempotency, HeaderExpectation,
};
pub use batch::dispatch;
pub use client::ApiClient;
pub use error::HarnessError;
pub use intercept::{
    CallLog, CallStats, CallToken, Interceptor, LogFilter, RequestRecord, ResponseRecord,
};
pub use options::{HarnessOptions, PollOptions, RetryPolicy};
pub use params::{encode_form, unique_email, unique_suffix, unique_username};
pub use poll::{poll_until, poll_until_cancellable};
pub use retry::{backoff_delay, retry, retry_cancellable};
pub use schema::{CompiledSchema, Schema, SchemaType, SchemaValidator, Violation};
pub use timing::{measure, Timed};
pub use types::{ApiResponse, Body, HasStatus};

pub type Result<T> = std::result::Result<T, HarnessError>;
