// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use adgrid_app::normalize::parse_date_prefix;
use adgrid_app::{
    CellValue, DateRange, LocalStorage, Preset, PresetBackend, PresetId, PresetPayload, Row,
    RowBackend, RowId, UserId,
};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Date, Duration, OffsetDateTime};

const ADVERTISERS: [&str; 8] = [
    "Acme Media",
    "Globex",
    "Initech",
    "Umbrella Health",
    "Stark Retail",
    "Wayne Travel",
    "Hooli",
    "Soylent Foods",
];

const PUBLISHERS: [&str; 8] = [
    "Northwind Ads",
    "Blue Harbor",
    "Click Orchard",
    "Redline Network",
    "Pixel Coop",
    "Lumen Traffic",
    "Owl Reach",
    "Tidewater",
];

const CAMPAIGN_THEMES: [&str; 10] = [
    "Spring", "Summer", "Autumn", "Winter", "Launch", "Loyalty", "Retarget", "Holiday",
    "Clearance", "Brand",
];

const CAMPAIGN_KINDS: [&str; 5] = ["Push", "Search", "Display", "Social", "Email"];

const FUNNEL_STAGES: [(&str, &[&str]); 3] = [
    ("lead", &["cold", "warm", "hot"]),
    ("qualified", &["demo", "trial"]),
    ("closed", &["won", "lost"]),
];

const NOTES: [&str; 6] = [
    "",
    "awaiting invoice",
    "fraud review",
    "rate renegotiated",
    "paused by advertiser",
    "cap reached",
];

/// Reference "now" shared by fixtures.
pub const FIXTURE_NOW: OffsetDateTime = datetime!(2026-02-19 12:34:56 UTC);

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        min + (self.next_u64() % ((max - min + 1) as u64)) as i64
    }
}

/// Seeded generator of campaign-screen rows.
#[derive(Debug, Clone)]
pub struct CampaignFaker {
    rng: DeterministicRng,
}

impl CampaignFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn advertiser(&mut self) -> &'static str {
        self.pick(&ADVERTISERS)
    }

    pub fn publisher(&mut self) -> &'static str {
        self.pick(&PUBLISHERS)
    }

    pub fn campaign_name(&mut self) -> String {
        format!(
            "{} {}",
            self.pick(&CAMPAIGN_THEMES),
            self.pick(&CAMPAIGN_KINDS)
        )
    }

    /// One row reported on `day`, created a few hours after midnight that
    /// day.
    pub fn row(&mut self, id: i64, day: Date) -> Row {
        let (stage, substages) = FUNNEL_STAGES[self.rng.int_n(FUNNEL_STAGES.len())];
        let substage = substages[self.rng.int_n(substages.len())];
        let total = self.rng.range(20, 500);
        let deductions = self.rng.range(0, total / 5);
        let advertiser_rate = self.rng.range(2, 12);
        let publisher_rate = self.rng.range(1, advertiser_rate);
        let created = day.midnight().assume_utc() + Duration::minutes(self.rng.range(0, 23 * 60));
        let advertiser = self.advertiser();
        let publisher = self.publisher();
        let campaign = self.campaign_name();
        let notes = self.pick(&NOTES);

        Row::new(RowId::new(id))
            .with("report_date", day.to_string())
            .with("campaign", campaign)
            .with("advertiser", advertiser)
            .with("publisher", publisher)
            .with("funnel_stage", stage)
            .with("funnel_substage", substage)
            .with("total_count", total)
            .with("deductions", deductions)
            .with("advertiser_rate", advertiser_rate)
            .with("publisher_rate", publisher_rate)
            .with("notes", notes)
            .with("created_at", rfc3339(created))
    }

    /// `per_day` rows for every day of `range`, ids counting up from 1.
    pub fn rows(&mut self, range: DateRange, per_day: usize) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut day = range.start();
        let mut next_id = 1;
        while day <= range.end() {
            for _ in 0..per_day {
                rows.push(self.row(next_id, day));
                next_id += 1;
            }
            let Some(next) = day.next_day() else {
                break;
            };
            day = next;
        }
        rows
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items[self.rng.int_n(items.len())]
    }
}

/// Minimal campaign row with the payout inputs set.
pub fn campaign_row(
    id: i64,
    total: f64,
    deductions: f64,
    advertiser_rate: f64,
    publisher_rate: f64,
    created_at: OffsetDateTime,
) -> Row {
    Row::new(RowId::new(id))
        .with("report_date", created_at.date().to_string())
        .with("campaign", format!("Campaign {id}"))
        .with("advertiser", "Acme Media")
        .with("publisher", "Northwind Ads")
        .with("total_count", total)
        .with("deductions", deductions)
        .with("advertiser_rate", advertiser_rate)
        .with("publisher_rate", publisher_rate)
        .with("created_at", rfc3339(created_at))
}

fn rfc3339(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{}T{:02}:{:02}:{:02}Z",
        at.date(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    FetchRows(DateRange),
    UpdateRow(Row),
    ListPresets(UserId),
    CreatePreset(PresetPayload),
    UpdatePreset(PresetId, PresetPayload),
    DeletePreset(PresetId),
}

/// In-memory rows and presets with a request log and switchable failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub rows: Vec<Row>,
    pub presets: Vec<Preset>,
    pub requests: Vec<BackendRequest>,
    /// Rows are only returned when this column's date is inside the range.
    pub date_column: Option<String>,
    pub fail_fetch: bool,
    pub fail_update: bool,
    pub fail_presets: bool,
    /// Fail only preset listing, so mutations land but the reload after them
    /// does not.
    pub fail_preset_list: bool,
    /// Return no row from updates, as some endpoints do.
    pub silent_updates: bool,
    /// Fields the "server" rewrites on every update.
    pub server_overrides: BTreeMap<String, CellValue>,
    pub next_preset_id: i64,
}

impl MemoryBackend {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<&Row> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                BackendRequest::UpdateRow(row) => Some(row),
                _ => None,
            })
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests
            .iter()
            .filter(|request| matches!(request, BackendRequest::FetchRows(_)))
            .count()
    }

    fn preset_from(id: PresetId, payload: &PresetPayload) -> Preset {
        Preset {
            id,
            owner_id: payload.user_id,
            name: payload.name.clone(),
            hidden: payload
                .columns
                .iter()
                .map(|(key, flag)| (key.clone(), *flag != 0))
                .collect(),
        }
    }
}

impl RowBackend for MemoryBackend {
    fn fetch_rows(&mut self, range: DateRange) -> Result<Vec<Row>> {
        self.requests.push(BackendRequest::FetchRows(range));
        if self.fail_fetch {
            bail!("GET rows: connection refused");
        }
        let Some(column) = &self.date_column else {
            return Ok(self.rows.clone());
        };
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                parse_date_prefix(&row.get(column).display()).is_some_and(|day| range.contains(day))
            })
            .cloned()
            .collect())
    }

    fn update_row(&mut self, row: &Row) -> Result<Option<Row>> {
        self.requests.push(BackendRequest::UpdateRow(row.clone()));
        if self.fail_update {
            bail!("server error (500): database is locked");
        }
        let mut saved = row.clone();
        for (key, value) in &self.server_overrides {
            saved.set(key, value.clone());
        }
        match self.rows.iter_mut().find(|stored| stored.id == row.id) {
            Some(stored) => *stored = saved.clone(),
            None => bail!("server error (404): row {} not found", row.id),
        }
        if self.silent_updates {
            return Ok(None);
        }
        Ok(Some(saved))
    }
}

impl PresetBackend for MemoryBackend {
    fn list_presets(&mut self, owner: UserId) -> Result<Vec<Preset>> {
        self.requests.push(BackendRequest::ListPresets(owner));
        if self.fail_presets || self.fail_preset_list {
            bail!("GET presets: connection refused");
        }
        Ok(self
            .presets
            .iter()
            .filter(|preset| preset.owner_id == owner)
            .cloned()
            .collect())
    }

    fn create_preset(&mut self, payload: &PresetPayload) -> Result<()> {
        self.requests
            .push(BackendRequest::CreatePreset(payload.clone()));
        if self.fail_presets {
            bail!("POST presets: connection refused");
        }
        self.next_preset_id += 1;
        let id = PresetId::new(self.next_preset_id);
        self.presets.push(Self::preset_from(id, payload));
        Ok(())
    }

    fn update_preset(&mut self, id: PresetId, payload: &PresetPayload) -> Result<()> {
        self.requests
            .push(BackendRequest::UpdatePreset(id, payload.clone()));
        if self.fail_presets {
            bail!("PUT presets/{id}: connection refused");
        }
        let Some(preset) = self.presets.iter_mut().find(|preset| preset.id == id) else {
            bail!("server error (404): preset {id} not found");
        };
        *preset = Self::preset_from(id, payload);
        Ok(())
    }

    fn delete_preset(&mut self, id: PresetId) -> Result<()> {
        self.requests.push(BackendRequest::DeletePreset(id));
        if self.fail_presets {
            bail!("DELETE presets/{id}: connection refused");
        }
        self.presets.retain(|preset| preset.id != id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub entries: BTreeMap<String, String>,
    pub fail_writes: bool,
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            bail!("local storage is full");
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("adgrid.db");
    Ok((dir, db_path))
}
