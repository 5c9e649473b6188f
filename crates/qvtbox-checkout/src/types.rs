//! Wire types for the hosted-checkout provider API.
//!
//! The provider takes a session-creation payload (line items in minor units,
//! addresses, return URLs) and answers with a session id plus the URL the
//! shopper is redirected to. [`CheckoutSession`] is the validated form of
//! that answer: by the time one exists, the redirect URL is known present.

use serde::{Deserialize, Serialize};

/// Countries the storefront ships to, ISO 3166-1 alpha-2.
pub const ALLOWED_SHIPPING_COUNTRIES: [&str; 4] = ["FR", "BE", "LU", "CH"];

/// One purchasable line in a checkout session. `unit_amount_cents` is the
/// effective per-unit price, base price plus any variant modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: u32,
}

/// Postal address as sent to the provider. Also the shape the storefront API
/// accepts from the client, so it deserializes too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Address {
    /// Returns the required fields that are blank, in declaration order.
    /// An empty list means the address is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.full_name.trim().is_empty() {
            missing.push("full_name");
        }
        if self.line1.trim().is_empty() {
            missing.push("line1");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        if self.country.trim().is_empty() {
            missing.push("country");
        }
        missing
    }
}

/// Payload for `POST /v1/sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub items: Vec<CheckoutItem>,
    pub shipping_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    pub shipping_cents: i64,
    pub automatic_tax: bool,
    pub allowed_countries: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: SessionMetadata,
}

/// Correlation data echoed back by the provider on its webhooks and
/// dashboard; never interpreted on this side.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMetadata {
    pub source: String,
    pub item_count: u64,
}

/// Raw provider success body. `checkout_url` stays optional here because the
/// wire cannot be trusted; [`crate::CheckoutClient::create_session`] refuses
/// to hand it on unless the URL is present.
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

/// Provider error body: `{ "error": { "message": "…" } }`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// A session the shopper can actually be redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}
