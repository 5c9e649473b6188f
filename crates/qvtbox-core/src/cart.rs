//! The shopping cart: an owned collection of lines with derived totals.
//!
//! All mutation goes through [`Cart`] methods; nothing else touches the
//! lines. Prices are unit cents captured when the line is added, so totals
//! are integer sums with no parsing and no floats. Stock ceilings are
//! display information and are not enforced here.

use serde::{Deserialize, Serialize};

use crate::money::{shipping_cost_cents, FREE_SHIPPING_THRESHOLD_CENTS};

/// Identity of a cart line: the product plus the chosen variant, if any.
/// The same product with two different variants forms two distinct lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: i64,
    pub variant_id: Option<i64>,
}

/// The descriptive part of a line, everything except the quantity.
/// Display fields are denormalized at add time so the cart renders without
/// further catalog lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    pub key: LineKey,
    pub name: String,
    pub variant_label: Option<String>,
    pub unit_price_cents: i64,
    pub origin: Option<String>,
    pub category: Option<String>,
}

/// One cart line: a [`NewLine`] that has accumulated a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub key: LineKey,
    pub name: String,
    pub variant_label: Option<String>,
    pub unit_price_cents: i64,
    pub origin: Option<String>,
    pub category: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }

    fn from_new(item: NewLine, quantity: u32) -> Self {
        Self {
            key: item.key,
            name: item.name,
            variant_label: item.variant_label,
            unit_price_cents: item.unit_price_cents,
            origin: item.origin,
            category: item.category,
            quantity,
        }
    }
}

/// The cart itself. Lines keep insertion order; merging an existing key
/// bumps that line's quantity in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, key: LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.key == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` of an item (callers pass `1` for the common case).
    ///
    /// An existing line with the same [`LineKey`] is incremented and keeps
    /// its position; otherwise a new line is appended. Adding zero is a
    /// no-op.
    pub fn add(&mut self, item: NewLine, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.key == item.key) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.lines.push(CartLine::from_new(item, quantity));
        }
    }

    /// Replaces a line's quantity. Zero or negative removes the line; an
    /// unknown key is a silent no-op.
    pub fn update_quantity(&mut self, key: LineKey, quantity: i64) {
        if quantity <= 0 {
            self.remove(key);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.key == key) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    /// Removes a line; an unknown key is a no-op.
    pub fn remove(&mut self, key: LineKey) {
        self.lines.retain(|l| l.key != key);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of articles: the sum of line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of line totals in cents; `0` for an empty cart.
    #[must_use]
    pub fn subtotal_cents(&self) -> i64 {
        self.lines.iter().map(CartLine::line_total_cents).sum()
    }

    /// Shipping for this cart: the threshold rule applied to the subtotal.
    /// An empty cart has nothing to ship and costs `0`.
    #[must_use]
    pub fn shipping_cents(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            shipping_cost_cents(self.subtotal_cents())
        }
    }

    /// What checkout charges: subtotal plus shipping.
    #[must_use]
    pub fn total_with_shipping_cents(&self) -> i64 {
        self.subtotal_cents() + self.shipping_cents()
    }

    /// Whether this cart already ships free.
    #[must_use]
    pub fn qualifies_for_free_shipping(&self) -> bool {
        self.subtotal_cents() >= FREE_SHIPPING_THRESHOLD_CENTS
    }
}
