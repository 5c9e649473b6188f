//! Monetary amounts as integer euro cents.
//!
//! All computation (carts, shipping, checkout payloads) works on `i64`
//! minor units. Formatted strings exist only at the edges:
//! [`parse_price_cents`] turns human-entered amounts into cents when a
//! catalog is ingested, [`format_cents_eur`] renders cents for display.
//! Nothing ever re-parses a formatted price to do arithmetic on it.

/// Orders at or above this subtotal ship free.
pub const FREE_SHIPPING_THRESHOLD_CENTS: i64 = 80_00;

/// Flat shipping fee charged below [`FREE_SHIPPING_THRESHOLD_CENTS`].
pub const FLAT_SHIPPING_FEE_CENTS: i64 = 5_90;

/// Shipping cost for a given subtotal: free at or above the threshold,
/// the flat fee below it.
///
/// A subtotal of `0` still yields the flat fee; callers decide whether an
/// empty cart is shippable at all (see `Cart::shipping_cents`).
#[must_use]
pub fn shipping_cost_cents(subtotal_cents: i64) -> i64 {
    if subtotal_cents >= FREE_SHIPPING_THRESHOLD_CENTS {
        0
    } else {
        FLAT_SHIPPING_FEE_CENTS
    }
}

/// How far a subtotal is from free shipping, floored at zero.
#[must_use]
pub fn missing_for_free_shipping_cents(subtotal_cents: i64) -> i64 {
    (FREE_SHIPPING_THRESHOLD_CENTS - subtotal_cents).max(0)
}

/// Parses a human-entered euro amount into cents.
///
/// Accepts the formats that show up in hand-maintained catalog data:
/// - French display form: `"29,90 €"`, `"1 234,56 €"` (space or NBSP groups)
/// - Dotted form: `"29.90"`, `"1.234,56"`, `"12,345.67"`
/// - Bare integers: `"12"`, `"EUR 12"`
/// - An optional `-` sign anywhere before the first digit
///
/// Rules:
/// 1. The scan starts at the first ASCII digit; anything before it other
///    than a sign is ignored (currency words, symbols).
/// 2. Digit runs may be separated by `.`, `,` or whitespace. The span ends
///    at the first other character, or at two separators in a row.
/// 3. The last `.` or `,` is the decimal separator when exactly one or two
///    digits follow it; otherwise every separator is a group separator
///    (`"1.234"` is one thousand two hundred thirty-four euros).
///
/// Returns `None` when the string contains no usable digits or the value
/// does not fit in `i64` cents.
#[must_use]
pub fn parse_price_cents(raw: &str) -> Option<i64> {
    let negative = raw
        .chars()
        .take_while(|c| !c.is_ascii_digit())
        .any(|c| c == '-');

    let (runs, seps) = scan_digit_span(raw);
    if runs.is_empty() {
        return None;
    }

    let (int_digits, frac) = split_decimal(&runs, &seps);
    let int_part: i64 = int_digits.parse().ok()?;
    let cents = int_part.checked_mul(100)?.checked_add(frac)?;
    if negative {
        cents.checked_neg()
    } else {
        Some(cents)
    }
}

/// Formats cents as a French-style euro string, e.g. `2990` → `"29,90 €"`.
///
/// No thousands grouping; display-only, never parsed back for arithmetic.
#[must_use]
pub fn format_cents_eur(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{},{:02} €", abs / 100, abs % 100)
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

/// Collects consecutive digit runs starting at the first ASCII digit.
///
/// Runs are split by `.`, `,` or whitespace (including NBSP). The span ends
/// at any other character, at two separators in a row, or at end of input.
/// A trailing separator with no digits after it is dropped.
fn scan_digit_span(raw: &str) -> (Vec<String>, Vec<char>) {
    let mut runs: Vec<String> = Vec::new();
    let mut seps: Vec<char> = Vec::new();
    let mut current = String::new();
    let mut started = false;

    for c in raw.chars() {
        if c.is_ascii_digit() {
            started = true;
            current.push(c);
        } else if started {
            let is_sep = c == '.' || c == ',' || c.is_whitespace();
            if !is_sep || current.is_empty() {
                break;
            }
            runs.push(std::mem::take(&mut current));
            seps.push(c);
        }
    }

    if current.is_empty() {
        // Trailing separator: drop it so "12," parses like "12".
        seps.pop();
    } else {
        runs.push(current);
    }
    (runs, seps)
}

/// Splits runs into integer digits and fraction cents per the decimal rule.
fn split_decimal(runs: &[String], seps: &[char]) -> (String, i64) {
    let last_is_decimal = seps
        .last()
        .is_some_and(|&s| (s == '.' || s == ','))
        && runs
            .last()
            .is_some_and(|r| r.len() == 1 || r.len() == 2);

    if last_is_decimal {
        // The scan only records a separator once a run precedes it, so the
        // decimal branch always has at least one integer run to concat.
        let int_digits: String = runs[..runs.len() - 1].concat();
        let frac_run = &runs[runs.len() - 1];
        let mut frac: i64 = frac_run.parse().unwrap_or(0);
        if frac_run.len() == 1 {
            frac *= 10;
        }
        (int_digits, frac)
    } else {
        (runs.concat(), 0)
    }
}
