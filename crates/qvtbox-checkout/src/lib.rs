//! Client for the hosted-checkout payment provider.
//!
//! Builds session-creation payloads, calls the provider over HTTPS with
//! bearer-token auth, and retries transient failures with exponential
//! back-off. The client enforces one invariant above all: a success response
//! without a redirect URL is an error, never a session.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::CheckoutClient;
pub use error::CheckoutError;
pub use retry::{is_retriable, retry_with_backoff};
pub use types::{
    Address, CheckoutItem, CheckoutSession, SessionMetadata, SessionRequest,
    ALLOWED_SHIPPING_COUNTRIES,
};
