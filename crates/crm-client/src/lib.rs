//! Rate-limited HTTP access to a CRM account.
//!
//! This crate provides:
//! - [`RateLimitedClient`]: one logical request with 429/5xx retry,
//!   exponential backoff, and inter-request pacing
//! - [`ApiFailure`]: the classified failure taxonomy
//! - [`CrmApi`]: the data-provider trait the migration core consumes
//! - [`HttpCrmApi`]: the production implementation over HTTP
//! - [`MockCrmApi`]: an in-memory implementation for tests

mod api;
mod client;
mod error;
mod http;
mod mock;
mod retry;

pub use api::CrmApi;
pub use client::{ApiRequest, HttpMethod, HttpSend, RateLimitedClient, RawResponse, ReqwestSender};
pub use error::{ApiFailure, Result};
pub use http::HttpCrmApi;
pub use mock::MockCrmApi;
pub use retry::RetryPolicy;
