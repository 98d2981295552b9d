//! Tax-inclusive (TTC) / tax-exclusive (HT) price arithmetic.
//!
//! Every amount the backend exposes to customers is TTC. The subscription
//! flow only receives TTC prices, so HT and VAT amounts are derived from the
//! fixed French standard rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Standard VAT rate applied to cart and subscription totals (20 %).
pub const VAT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Tolerance used when checking TTC/HT consistency (one cent).
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Derive the tax-exclusive amount from a TTC amount, rounded to cents.
#[must_use]
pub fn excl_vat(ttc: Decimal) -> Decimal {
    (ttc / (Decimal::ONE + VAT_RATE)).round_dp(2)
}

/// VAT part of a TTC amount (`ttc - excl_vat(ttc)`).
#[must_use]
pub fn vat_amount(ttc: Decimal) -> Decimal {
    ttc - excl_vat(ttc)
}

/// Coerce a JSON value into a decimal amount.
///
/// The backend is inconsistent: amounts arrive as numbers (`12.5`), numeric
/// strings (`"12.50"`), French-formatted strings (`"12,50 €"`) or `null`.
#[must_use]
pub fn coerce_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64()
                    .and_then(|f| Decimal::try_from(f).ok())
                    .map(|d| d.normalize())
            }
        }
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('€')
                .trim()
                .replace(['\u{a0}', ' '], "")
                .replace(',', ".");
            cleaned.parse::<Decimal>().ok()
        }
        _ => None,
    }
}

/// Serde helper: deserialize an amount from a number or string, `0` when absent.
///
/// # Errors
///
/// Never fails on shape; unparseable values become zero.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_amount(&value).unwrap_or_default())
}

/// Format an amount in euros for display (`1 234,50 €`).
#[must_use]
pub fn format_eur(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{rounded:.2}");
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let (sign, digits) = int_part
        .strip_prefix('-')
        .map_or(("", int_part), |d| ("-", d));

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped},{frac_part}\u{a0}€")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_vat_rate_is_twenty_percent() {
        assert_eq!(VAT_RATE, dec("0.20"));
    }

    #[test]
    fn test_excl_vat_and_vat_amount_sum_back() {
        let ttc = dec("120.00");
        assert_eq!(excl_vat(ttc), dec("100.00"));
        assert_eq!(vat_amount(ttc), dec("20.00"));
        assert_eq!(excl_vat(ttc) + vat_amount(ttc), ttc);
    }

    #[test]
    fn test_coerce_amount_shapes() {
        assert_eq!(coerce_amount(&serde_json::json!(12)), Some(dec("12")));
        assert_eq!(coerce_amount(&serde_json::json!(12.5)), Some(dec("12.5")));
        assert_eq!(coerce_amount(&serde_json::json!("12.50")), Some(dec("12.50")));
        assert_eq!(coerce_amount(&serde_json::json!("1 234,50 €")), Some(dec("1234.50")));
        assert_eq!(coerce_amount(&serde_json::json!(null)), None);
        assert_eq!(coerce_amount(&serde_json::json!("abc")), None);
    }

    #[test]
    fn test_format_eur_groups_thousands() {
        assert_eq!(format_eur(dec("1234.5")), "1\u{202f}234,50\u{a0}€");
        assert_eq!(format_eur(dec("9.99")), "9,99\u{a0}€");
    }
}
