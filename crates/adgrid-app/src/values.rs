// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Ordering of filter-dropdown candidate values.

use std::cmp::Ordering;
use time::Date;

use crate::normalize::{compare_text, is_sentinel, parse_date, parse_number};

#[derive(Debug, Clone, Copy, PartialEq)]
enum ValueClass {
    Number(f64),
    Date(Date),
    Text,
    Sentinel,
}

impl ValueClass {
    fn of(value: &str) -> Self {
        if is_sentinel(value) {
            Self::Sentinel
        } else if let Some(number) = parse_number(value) {
            Self::Number(number)
        } else if let Some(date) = parse_date(value) {
            Self::Date(date)
        } else {
            Self::Text
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Date(_) => 1,
            Self::Text => 2,
            Self::Sentinel => 3,
        }
    }
}

pub fn compare_values(left: &str, right: &str) -> Ordering {
    let (left_class, right_class) = (ValueClass::of(left), ValueClass::of(right));
    match (left_class, right_class) {
        (ValueClass::Number(a), ValueClass::Number(b)) => {
            a.total_cmp(&b).then_with(|| compare_text(left, right))
        }
        (ValueClass::Date(a), ValueClass::Date(b)) => a.cmp(&b),
        (ValueClass::Text, ValueClass::Text) => compare_text(left, right),
        (ValueClass::Sentinel, ValueClass::Sentinel) => Ordering::Equal,
        _ => left_class.rank().cmp(&right_class.rank()),
    }
}

pub fn sort_values(mut values: Vec<String>) -> Vec<String> {
    values.sort_by(|left, right| compare_values(left, right));
    values
}

#[cfg(test)]
mod tests {
    use super::sort_values;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn sentinel_sorts_last() {
        let sorted = sort_values(owned(&["-", "beta", "Alpha"]));
        assert_eq!(sorted, owned(&["Alpha", "beta", "-"]));
    }

    #[test]
    fn numbers_compare_numerically() {
        let sorted = sort_values(owned(&["10", "9", "100", "-", "2.5"]));
        assert_eq!(sorted, owned(&["2.5", "9", "10", "100", "-"]));
    }

    #[test]
    fn dates_compare_chronologically() {
        let sorted = sort_values(owned(&["2026-02-01", "2025-12-31", "2026-01-15"]));
        assert_eq!(sorted, owned(&["2025-12-31", "2026-01-15", "2026-02-01"]));
    }

    #[test]
    fn text_is_case_insensitive() {
        let sorted = sort_values(owned(&["zeta", "Beta", "alpha", "Émile"]));
        assert_eq!(sorted, owned(&["alpha", "Beta", "Émile", "zeta"]));
    }

    #[test]
    fn mixed_classes_keep_a_total_order() {
        let sorted = sort_values(owned(&["tofu", "-", "2026-01-01", "7", "apple", "3"]));
        assert_eq!(
            sorted,
            owned(&["3", "7", "2026-01-01", "apple", "tofu", "-"])
        );
    }
}
