// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Static screen declarations: which columns a grid shows, which of them
//! are computed, and who may edit what.

use crate::derived::{DerivedFields, DerivedRule, PayoutColumns};
use crate::edit::EditPolicy;
use crate::error::{GridError, GridResult};
use crate::model::{ColumnDef, Columns};
use crate::presets::KeyAliases;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenLayout {
    pub name: &'static str,
    pub columns: Columns,
    pub derived: DerivedFields,
    pub policy: EditPolicy,
    pub aliases: KeyAliases,
    /// Column the date-range prefilter reads.
    pub date_column: String,
}

impl ScreenLayout {
    /// Cross-checks the pieces: every rule writes a derived column and reads
    /// declared ones, every derived column has a rule, and every column the
    /// policy names exists.
    pub fn new(
        name: &'static str,
        columns: Columns,
        derived: DerivedFields,
        policy: EditPolicy,
        aliases: KeyAliases,
        date_column: &str,
    ) -> GridResult<Self> {
        for rule in derived.rules() {
            let output = columns.require(rule.output())?;
            if !output.is_derived {
                return Err(GridError::InvalidConfig(format!(
                    "`{}` is computed but not declared as a derived column",
                    rule.output()
                )));
            }
            for input in rule.inputs() {
                columns.require(input)?;
            }
        }
        if let Some(orphan) = columns
            .iter()
            .find(|def| def.is_derived && !derived.is_output(&def.key))
        {
            return Err(GridError::InvalidConfig(format!(
                "derived column `{}` has no rule",
                orphan.key
            )));
        }

        columns.require(date_column)?;
        columns.require(&policy.created_column)?;
        let named = policy
            .late_editable
            .iter()
            .chain(&policy.required)
            .chain(
                policy
                    .cascades
                    .iter()
                    .flat_map(|cascade| [&cascade.parent, &cascade.child]),
            );
        for column in named {
            columns.require(column)?;
        }

        Ok(Self {
            name,
            columns,
            derived,
            policy,
            aliases,
            date_column: date_column.to_owned(),
        })
    }
}

pub const CAMPAIGN_LATE_EDITABLE: [&str; 3] = ["notes", "funnel_stage", "funnel_substage"];

/// Daily campaign performance: one row per campaign per day with counts and
/// payout rates for both sides of the deal.
pub fn campaign_screen() -> GridResult<ScreenLayout> {
    let columns = Columns::new(vec![
        ColumnDef::new("report_date", "Date"),
        ColumnDef::new("campaign", "Campaign").editable(),
        ColumnDef::new("advertiser", "Advertiser").editable(),
        ColumnDef::new("publisher", "Publisher").editable(),
        ColumnDef::new("funnel_stage", "Funnel stage").editable(),
        ColumnDef::new("funnel_substage", "Funnel substage").editable(),
        ColumnDef::new("total_count", "Total").editable(),
        ColumnDef::new("deductions", "Deductions").editable(),
        ColumnDef::new("approved_count", "Approved").derived(),
        ColumnDef::new("advertiser_rate", "Adv. payout").editable(),
        ColumnDef::new("publisher_rate", "Pub. payout").editable(),
        ColumnDef::new("advertiser_amount", "Adv. amount").derived(),
        ColumnDef::new("publisher_amount", "Pub. amount").derived(),
        ColumnDef::new("publisher_approved_count", "Pub. approved").derived(),
        ColumnDef::new("notes", "Notes").editable(),
        ColumnDef::new("created_at", "Created").fixed(),
    ])?;

    let derived = DerivedFields::new(vec![
        DerivedRule::difference("approved_count", "total_count", "deductions"),
        DerivedRule::product("advertiser_amount", "approved_count", "advertiser_rate"),
        DerivedRule::product("publisher_amount", "approved_count", "publisher_rate"),
        DerivedRule::payout_share(
            "publisher_approved_count",
            PayoutColumns {
                total: "total_count".to_owned(),
                deductions: "deductions".to_owned(),
                advertiser_rate: "advertiser_rate".to_owned(),
                publisher_rate: "publisher_rate".to_owned(),
            },
        ),
    ])?;

    let policy = EditPolicy::new("created_at")
        .with_late_editable(CAMPAIGN_LATE_EDITABLE)
        .with_required(["campaign", "advertiser", "publisher"])
        .with_cascade("funnel_stage", "funnel_substage");

    let aliases = KeyAliases::new([
        ("total", "total_count"),
        ("adv_payout", "advertiser_rate"),
        ("pub_payout", "publisher_rate"),
    ]);

    ScreenLayout::new(
        "campaigns",
        columns,
        derived,
        policy,
        aliases,
        "report_date",
    )
}
