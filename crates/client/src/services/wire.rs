//! Tolerant readers for backend JSON.
//!
//! The backend is not consistent about naming (`firstName`, `firstname`,
//! `first_name`), number encoding (`19.9`, `"19,90"`) or envelopes
//! (`{"data": ..}`, `{"user": ..}`, bare objects). Every mapper reads through
//! these helpers with an explicit fallback chain so internal code never
//! branches on upstream naming. Missing and `null` fields read as absent.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use jdp_core::coerce_amount;

/// First present, non-null field among `names`.
pub fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find(|v| !v.is_null())
}

/// String field; numbers are stringified, blanks are absent.
pub fn string(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Identifier field: like [`string`] but also accepts `{"id": ..}` objects.
pub fn id(value: &Value, names: &[&str]) -> Option<String> {
    string(value, names).or_else(|| {
        names
            .iter()
            .filter_map(|name| value.get(*name))
            .find_map(|v| string(v, &["id"]))
    })
}

/// Monetary field, coerced from numbers or formatted strings.
pub fn amount(value: &Value, names: &[&str]) -> Option<Decimal> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find_map(coerce_amount)
}

/// Boolean field accepting `true`, `1`, `"1"`, `"true"`, `"oui"`.
pub fn flag(value: &Value, names: &[&str]) -> Option<bool> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "oui" => Some(true),
            "0" | "false" | "no" | "non" | "" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Non-negative integer field, from a number or a numeric string.
pub fn count(value: &Value, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// [`count`] narrowed to `u32`.
pub fn count_u32(value: &Value, names: &[&str]) -> Option<u32> {
    count(value, names).and_then(|n| u32::try_from(n).ok())
}

/// Array field; anything else reads as empty.
pub fn list<'a>(value: &'a Value, names: &[&str]) -> &'a [Value] {
    field(value, names)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// List of strings: an array of strings, or a single string.
pub fn strings(value: &Value, names: &[&str]) -> Vec<String> {
    match field(value, names) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(_) => string(v, &["name", "label", "slug"]),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Timestamp field: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or unix
/// seconds.
pub fn datetime(value: &Value, names: &[&str]) -> Option<DateTime<Utc>> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::String(s) => parse_datetime(s.trim()),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Calendar date field (`YYYY-MM-DD`, or the date part of a timestamp).
pub fn date(value: &Value, names: &[&str]) -> Option<NaiveDate> {
    names.iter().find_map(|name| {
        let s = value.get(*name)?.as_str()?.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
    })
}

/// Unwrap the first envelope present (`data`, `user`, ...), or the value
/// itself when none is.
pub fn unwrap<'a>(value: &'a Value, envelopes: &[&str]) -> &'a Value {
    field(value, envelopes)
        .filter(|v| v.is_object() || v.is_array())
        .unwrap_or(value)
}

/// Items of a list response: a bare array, or an array under one of
/// `envelopes`.
pub fn items<'a>(value: &'a Value, envelopes: &[&str]) -> &'a [Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        _ => list(value, envelopes),
    }
}

// =============================================================================
// HTML
// =============================================================================

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("Invalid regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Decode HTML character references. Unknown named entities are kept.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let entity = caps.get(1).map_or("", |m| m.as_str());
            decode_entity(entity).map_or_else(|| whole.to_string(), String::from)
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    let c = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "eacute" => 'é',
        "Eacute" => 'É',
        "egrave" => 'è',
        "Egrave" => 'È',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "agrave" => 'à',
        "Agrave" => 'À',
        "acirc" => 'â',
        "ccedil" => 'ç',
        "Ccedil" => 'Ç',
        "icirc" => 'î',
        "iuml" => 'ï',
        "ocirc" => 'ô',
        "ugrave" => 'ù',
        "ucirc" => 'û',
        "oelig" => 'œ',
        "laquo" => '«',
        "raquo" => '»',
        "rsquo" => '\u{2019}',
        "lsquo" => '\u{2018}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '…',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "euro" => '€',
        "deg" => '°',
        _ => return None,
    };
    Some(c)
}

/// Plain text of an HTML fragment: tags removed, entities decoded,
/// whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    let decoded = decode_entities(&stripped);
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// First `max_chars` characters of the plain text, cut on a word boundary
/// with an ellipsis when truncated.
pub fn excerpt(html: &str, max_chars: usize) -> Option<String> {
    let text = html_to_text(html);
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= max_chars {
        return Some(text);
    }
    let cut: String = text.chars().take(max_chars).collect();
    let cut = cut.rsplit_once(' ').map_or(cut.as_str(), |(head, _)| head);
    Some(format!("{}…", cut.trim_end_matches([',', ';', ':', '.'])))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_fallback_chain_skips_null() {
        let v = json!({ "firstName": null, "firstname": "Camille" });
        assert_eq!(string(&v, &["firstName", "firstname"]).as_deref(), Some("Camille"));
    }

    #[test]
    fn test_string_accepts_numbers() {
        assert_eq!(string(&json!({ "id": 42 }), &["id"]).as_deref(), Some("42"));
        assert!(string(&json!({ "id": "  " }), &["id"]).is_none());
    }

    #[test]
    fn test_id_accepts_nested_object() {
        let v = json!({ "plan": { "id": "premium" } });
        assert_eq!(id(&v, &["plan"]).as_deref(), Some("premium"));
    }

    #[test]
    fn test_amount_accepts_comma_strings() {
        let v = json!({ "priceTTC": "1 234,50" });
        assert_eq!(amount(&v, &["price", "priceTTC"]), Some(Decimal::from_str("1234.50").unwrap()));
    }

    #[test]
    fn test_flag_variants() {
        let v = json!({ "a": 1, "b": "oui", "c": "0", "d": false });
        assert_eq!(flag(&v, &["a"]), Some(true));
        assert_eq!(flag(&v, &["b"]), Some(true));
        assert_eq!(flag(&v, &["c"]), Some(false));
        assert_eq!(flag(&v, &["d"]), Some(false));
        assert_eq!(flag(&v, &["missing"]), None);
    }

    #[test]
    fn test_datetime_formats() {
        let v = json!({ "a": "2024-10-30 09:00:00", "b": "2024-10-30", "c": 1_730_278_800, "d": "2024-10-30T09:00:00+01:00" });
        assert_eq!(datetime(&v, &["a"]).unwrap().to_rfc3339(), "2024-10-30T09:00:00+00:00");
        assert!(datetime(&v, &["b"]).is_some());
        assert!(datetime(&v, &["c"]).is_some());
        assert_eq!(datetime(&v, &["d"]).unwrap().to_rfc3339(), "2024-10-30T08:00:00+00:00");
    }

    #[test]
    fn test_unwrap_envelope() {
        let v = json!({ "data": { "id": 1 } });
        assert_eq!(unwrap(&v, &["data", "user"])["id"], 1);
        let bare = json!({ "id": 2 });
        assert_eq!(unwrap(&bare, &["data"])["id"], 2);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Napol&eacute;on &amp; Marianne"), "Napoléon & Marianne");
        assert_eq!(decode_entities("Lingot d&#39;or &#x2014; 100 g"), "Lingot d'or \u{2014} 100 g");
        assert_eq!(decode_entities("&unknown; stays"), "&unknown; stays");
    }

    #[test]
    fn test_excerpt_cuts_on_word_boundary() {
        let html = "<p>Le métal jaune a dépassé les 2 700 $ l'once.</p>";
        assert_eq!(excerpt(html, 20).unwrap(), "Le métal jaune a…");
        assert_eq!(excerpt("<p>Court.</p>", 20).unwrap(), "Court.");
        assert!(excerpt("<p> </p>", 20).is_none());
    }
}
