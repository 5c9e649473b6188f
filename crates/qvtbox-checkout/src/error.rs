use thiserror::Error;

/// Errors returned by the checkout provider client.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request and said why.
    #[error("checkout provider error: {0}")]
    Api(String),

    /// The provider accepted the session but sent no URL to redirect the
    /// shopper to, which leaves the session unusable.
    #[error("checkout session {session_id} has no redirect URL")]
    MissingRedirectUrl { session_id: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
