// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::model::{CellValue, SENTINEL};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

/// Canonical text of a cell: trimmed, or the sentinel when null/blank.
pub fn normalize(value: &CellValue) -> String {
    normalize_str(&value.display())
}

pub fn normalize_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        SENTINEL.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Case-folded normalized form; the only form filter equality looks at.
pub fn fold(value: &CellValue) -> String {
    fold_str(&value.display())
}

pub fn fold_str(raw: &str) -> String {
    normalize_str(raw).to_lowercase()
}

pub fn is_sentinel(value: &str) -> bool {
    value == SENTINEL
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // `f64::from_str` accepts "inf" and "NaN"; a cell holding those is text.
    if !trimmed.bytes().any(|byte| byte.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    if trimmed.len() != DATE_LAYOUT.len() {
        return None;
    }
    Date::parse(trimmed, format_description!("[year]-[month]-[day]")).ok()
}

/// Reads the calendar date at the start of a date or timestamp cell
/// (`2026-01-05`, `2026-01-05T10:00:00Z`, `2026-01-05 10:00:00`).
pub fn parse_date_prefix(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    let len = DATE_LAYOUT.len();
    match trimmed.as_bytes().get(len) {
        None => parse_date(trimmed),
        Some(b'T' | b' ') => parse_date(trimmed.get(..len)?),
        Some(_) => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        trimmed,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(parsed.assume_utc());
    }
    parse_date(trimmed).map(|date| date.midnight().assume_utc())
}

pub fn collation_key(raw: &str) -> String {
    raw.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case- and accent-insensitive text order, refined by case and then raw
/// bytes so that distinct strings never compare equal.
pub fn compare_text(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(&collation_key(right))
        .then_with(|| left.to_lowercase().cmp(&right.to_lowercase()))
        .then_with(|| left.cmp(right))
}
