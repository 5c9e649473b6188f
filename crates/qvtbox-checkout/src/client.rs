//! HTTP client for the hosted-checkout provider.
//!
//! Wraps `reqwest` with provider-specific error handling, bearer-token
//! authentication, and typed response deserialization. Error bodies are
//! surfaced as [`CheckoutError::Api`] with the provider's own message so the
//! storefront can log something actionable.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::CheckoutError;
use crate::types::{CheckoutSession, ErrorResponse, SessionRequest, SessionResponse};

const DEFAULT_BASE_URL: &str = "https://pay.qvtbox.com/api";

/// Client for the hosted-checkout provider API.
///
/// Manages the HTTP client, API key, and base URL. Use [`CheckoutClient::new`]
/// for production or [`CheckoutClient::with_base_url`] to point at a mock
/// server in tests.
#[derive(Debug)]
pub struct CheckoutClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl CheckoutClient {
    /// Creates a new client pointed at the production checkout API.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, CheckoutError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`CheckoutError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("qvtbox/0.1 (storefront-checkout)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends the endpoint path rather than replacing the last
        // path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| CheckoutError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Creates a hosted-checkout session and returns the redirect target.
    ///
    /// Calls `POST v1/sessions` with the session payload. A success body
    /// without a usable `checkout_url` is rejected: a session the shopper
    /// cannot be sent to is worthless, and treating it as success would
    /// strand the order flow.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Api`] if the provider rejects the request; carries
    ///   the provider's message when the error body parses, the raw body
    ///   otherwise.
    /// - [`CheckoutError::Http`] on network failure, timeout, or a 5xx
    ///   status.
    /// - [`CheckoutError::MissingRedirectUrl`] if the session was created
    ///   without a redirect URL.
    /// - [`CheckoutError::Deserialize`] if the success body does not match
    ///   the expected shape.
    pub async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        let url = self.endpoint("v1/sessions")?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        // A 5xx keeps its status inside a retriable Http error; a 4xx falls
        // through so the provider's message can be read from the body.
        let response = if status.is_server_error() {
            response.error_for_status()?
        } else {
            response
        };

        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |parsed| parsed.error.message);
            return Err(CheckoutError::Api(message));
        }

        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| CheckoutError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        match session.checkout_url {
            Some(checkout_url) if !checkout_url.trim().is_empty() => Ok(CheckoutSession {
                session_id: session.session_id,
                checkout_url,
            }),
            _ => Err(CheckoutError::MissingRedirectUrl {
                session_id: session.session_id,
            }),
        }
    }

    /// Resolves an endpoint path against the stored base URL.
    fn endpoint(&self, path: &str) -> Result<Url, CheckoutError> {
        self.base_url
            .join(path)
            .map_err(|e| CheckoutError::Api(format!("invalid endpoint path '{path}': {e}")))
    }
}
