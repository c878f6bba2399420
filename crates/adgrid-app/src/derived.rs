// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Computed columns. Rules are pure functions of a row and are re-evaluated
//! every time an input may have changed; outputs are written back into the
//! row so filtering and sorting see them like stored fields.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::error::{GridError, GridResult};
use crate::model::{CellValue, Row};
use crate::normalize::normalize;

/// Share of the advertiser amount a publisher payout may reach before the
/// approved count is scaled down.
pub const PAYOUT_SHARE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing: {}", .fields.join(", "))]
pub struct MissingFields {
    pub output: String,
    pub fields: Vec<String>,
}

impl MissingFields {
    pub fn label(&self) -> String {
        format!("Missing: {}", self.fields.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutColumns {
    pub total: String,
    pub deductions: String,
    pub advertiser_rate: String,
    pub publisher_rate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedRule {
    /// `output = minuend - subtrahend`; null when either side is missing.
    Difference {
        output: String,
        minuend: String,
        subtrahend: String,
    },
    /// `output = left * right`; null when either side is missing.
    Product {
        output: String,
        left: String,
        right: String,
    },
    /// Publisher-approved count; see [`publisher_approved_count`].
    PayoutShare {
        output: String,
        columns: PayoutColumns,
        share: f64,
    },
}

impl DerivedRule {
    pub fn difference(output: &str, minuend: &str, subtrahend: &str) -> Self {
        Self::Difference {
            output: output.to_owned(),
            minuend: minuend.to_owned(),
            subtrahend: subtrahend.to_owned(),
        }
    }

    pub fn product(output: &str, left: &str, right: &str) -> Self {
        Self::Product {
            output: output.to_owned(),
            left: left.to_owned(),
            right: right.to_owned(),
        }
    }

    pub fn payout_share(output: &str, columns: PayoutColumns) -> Self {
        Self::PayoutShare {
            output: output.to_owned(),
            columns,
            share: PAYOUT_SHARE,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Difference { output, .. }
            | Self::Product { output, .. }
            | Self::PayoutShare { output, .. } => output,
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Difference {
                minuend,
                subtrahend,
                ..
            } => vec![minuend.as_str(), subtrahend.as_str()],
            Self::Product { left, right, .. } => vec![left.as_str(), right.as_str()],
            Self::PayoutShare { columns, .. } => vec![
                columns.total.as_str(),
                columns.deductions.as_str(),
                columns.advertiser_rate.as_str(),
                columns.publisher_rate.as_str(),
            ],
        }
    }

    pub fn evaluate(&self, row: &Row) -> Result<CellValue, MissingFields> {
        match self {
            Self::Difference {
                minuend,
                subtrahend,
                ..
            } => Ok(match (row.number(minuend), row.number(subtrahend)) {
                (Some(total), Some(deductions)) => {
                    CellValue::Number(approved_count(total, deductions))
                }
                _ => CellValue::Null,
            }),
            Self::Product { left, right, .. } => Ok(match (row.number(left), row.number(right)) {
                (Some(left), Some(right)) => CellValue::Number(left * right),
                _ => CellValue::Null,
            }),
            Self::PayoutShare {
                output,
                columns,
                share,
            } => {
                let missing: Vec<String> = self
                    .inputs()
                    .into_iter()
                    .filter(|input| row.number(input).is_none())
                    .map(str::to_owned)
                    .collect();
                let (Some(total), Some(deductions), Some(advertiser_rate), Some(publisher_rate)) = (
                    row.number(&columns.total),
                    row.number(&columns.deductions),
                    row.number(&columns.advertiser_rate),
                    row.number(&columns.publisher_rate),
                ) else {
                    return Err(MissingFields {
                        output: output.clone(),
                        fields: missing,
                    });
                };
                Ok(CellValue::Number(publisher_approved_count(
                    total,
                    deductions,
                    advertiser_rate,
                    publisher_rate,
                    *share,
                )))
            }
        }
    }
}

pub fn approved_count(total: f64, deductions: f64) -> f64 {
    total - deductions
}

/// Approved count credited to the publisher. When the publisher's payout
/// would exceed `share` of the advertiser's amount, the count is scaled so
/// the payout lands on that share, rounded to one decimal.
pub fn publisher_approved_count(
    total: f64,
    deductions: f64,
    advertiser_rate: f64,
    publisher_rate: f64,
    share: f64,
) -> f64 {
    let approved = approved_count(total, deductions);
    let advertiser_amount = approved * advertiser_rate;
    let publisher_amount = approved * publisher_rate;
    let threshold = advertiser_amount * share;
    if publisher_amount > threshold && publisher_rate != 0.0 {
        round_to_tenth((share * approved * advertiser_rate) / publisher_rate)
    } else {
        approved
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Ordered rule set for one screen. A rule may read outputs of rules
/// declared before it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedFields {
    rules: Vec<DerivedRule>,
}

impl DerivedFields {
    pub fn new(rules: Vec<DerivedRule>) -> GridResult<Self> {
        let mut outputs = BTreeSet::new();
        let all_outputs: BTreeSet<&str> = rules.iter().map(DerivedRule::output).collect();
        for rule in &rules {
            for input in rule.inputs() {
                if input == rule.output() {
                    return Err(GridError::InvalidConfig(format!(
                        "derived column `{}` reads itself",
                        rule.output()
                    )));
                }
                if all_outputs.contains(input) && !outputs.contains(input) {
                    return Err(GridError::InvalidConfig(format!(
                        "derived column `{}` reads `{input}`, which is computed later",
                        rule.output()
                    )));
                }
            }
            if !outputs.insert(rule.output()) {
                return Err(GridError::InvalidConfig(format!(
                    "derived column `{}` has two rules",
                    rule.output()
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[DerivedRule] {
        &self.rules
    }

    pub fn rule(&self, output: &str) -> Option<&DerivedRule> {
        self.rules.iter().find(|rule| rule.output() == output)
    }

    pub fn is_output(&self, key: &str) -> bool {
        self.rule(key).is_some()
    }

    pub fn is_input(&self, key: &str) -> bool {
        self.rules.iter().any(|rule| rule.inputs().contains(&key))
    }

    /// Evaluates every rule in order, writing outputs into `row`. Failed
    /// rules leave a null output and are returned.
    pub fn annotate(&self, row: &mut Row) -> Vec<MissingFields> {
        let mut failures = Vec::new();
        for rule in &self.rules {
            apply_rule(rule, row, &mut failures);
        }
        failures
    }

    /// Rules whose value can change when `field` changes, in evaluation
    /// order. Includes rules that only read other affected outputs.
    pub fn affected_by(&self, field: &str) -> Vec<&DerivedRule> {
        let mut dirty: BTreeSet<&str> = BTreeSet::from([field]);
        let mut affected = Vec::new();
        for rule in &self.rules {
            if rule.inputs().iter().any(|input| dirty.contains(input)) {
                dirty.insert(rule.output());
                affected.push(rule);
            }
        }
        affected
    }

    pub fn recompute_affected(&self, row: &mut Row, field: &str) -> Vec<MissingFields> {
        let mut failures = Vec::new();
        for rule in self.affected_by(field) {
            apply_rule(rule, row, &mut failures);
        }
        failures
    }

    /// Display text for a cell: a `Missing: ...` label for failed rules,
    /// otherwise the normalized value.
    pub fn label(&self, row: &Row, key: &str) -> String {
        match self.rule(key).map(|rule| rule.evaluate(row)) {
            Some(Err(missing)) => missing.label(),
            Some(Ok(value)) => normalize(&value),
            None => normalize(row.get(key)),
        }
    }
}

fn apply_rule(rule: &DerivedRule, row: &mut Row, failures: &mut Vec<MissingFields>) {
    match rule.evaluate(row) {
        Ok(value) => row.set(rule.output(), value),
        Err(missing) => {
            row.set(rule.output(), CellValue::Null);
            failures.push(missing);
        }
    }
}
