//! Retry support for the Unite settlement services
//!
//! - `ExponentialBackoff`: capped exponential delay schedule
//! - `RetryPolicy` / `retry_with_backoff`: async retry bounded by attempts
//!   and an overall deadline, retrying only errors classified as transient

pub mod backoff;
pub mod retry;

pub use backoff::ExponentialBackoff;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy, Retryable};
