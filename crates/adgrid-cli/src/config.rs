// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use adgrid_app::{GridConfig, UserId};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_API_TIMEOUT: &str = "10s";
const DEFAULT_SEARCH_DEBOUNCE: &str = "300ms";
const DEFAULT_LOG_LEVEL: &str = "warn";
pub const CONFIG_PATH_ENV: &str = "ADGRID_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            storage: Storage::default(),
            grid: Grid::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<i64>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_API_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
            token: None,
            user_id: Some(1),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grid {
    pub search_debounce: Option<String>,
    pub edit_window_days: Option<i64>,
    pub late_editable: Option<Vec<String>>,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            search_debounce: Some(DEFAULT_SEARCH_DEBOUNCE.to_owned()),
            edit_window_days: Some(i64::from(adgrid_app::DEFAULT_EDIT_WINDOW_DAYS)),
            late_editable: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(adgrid_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [storage], [grid], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!("api.base_url in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("api.timeout in {}", path.display()))?;
            if parsed.is_zero() {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(user_id) = self.api.user_id
            && user_id <= 0
        {
            bail!(
                "api.user_id in {} must be positive, got {}",
                path.display(),
                user_id
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            adgrid_db::check_db_path(Path::new(db_path))
                .with_context(|| format!("storage.db_path in {}", path.display()))?;
        }

        if let Some(debounce) = &self.grid.search_debounce {
            parse_duration(debounce)
                .with_context(|| format!("grid.search_debounce in {}", path.display()))?;
        }

        if let Some(days) = self.grid.edit_window_days
            && u32::try_from(days).is_err()
        {
            bail!(
                "grid.edit_window_days in {} must be non-negative, got {}",
                path.display(),
                days
            );
        }

        if let Some(late) = &self.grid.late_editable
            && late.iter().any(|column| column.trim().is_empty())
        {
            bail!(
                "grid.late_editable in {} must not contain blank column names",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).map_err(|error| {
                anyhow!(
                    "log.level in {} is not a valid filter ({error}); use error, warn, info, debug or trace",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => adgrid_db::default_db_path(),
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn api_token(&self) -> &str {
        self.api.token.as_deref().unwrap_or("")
    }

    pub fn user_id(&self) -> UserId {
        UserId::new(self.api.user_id.unwrap_or(1))
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn grid_config(&self) -> Result<GridConfig> {
        let search_debounce = parse_duration(
            self.grid
                .search_debounce
                .as_deref()
                .unwrap_or(DEFAULT_SEARCH_DEBOUNCE),
        )?;
        let edit_window_days = match self.grid.edit_window_days {
            Some(days) => u32::try_from(days)
                .with_context(|| format!("grid.edit_window_days out of range: {days}"))?,
            None => adgrid_app::DEFAULT_EDIT_WINDOW_DAYS,
        };
        Ok(GridConfig {
            user_id: self.user_id(),
            search_debounce,
            edit_window_days,
            late_editable: self.grid.late_editable.clone(),
        })
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# adgrid config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# token = \"...\"\nuser_id = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/adgrid/adgrid.db)\n# db_path = \"/absolute/path/to/adgrid.db\"\n\n[grid]\nsearch_debounce = \"{}\"\nedit_window_days = {}\nlate_editable = [{}]\n\n[log]\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            DEFAULT_SEARCH_DEBOUNCE,
            adgrid_app::DEFAULT_EDIT_WINDOW_DAYS,
            adgrid_app::CAMPAIGN_LATE_EDITABLE
                .iter()
                .map(|column| format!("\"{column}\""))
                .collect::<Vec<_>>()
                .join(", "),
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 300ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_PATH_ENV, Config, parse_duration};
    use adgrid_app::UserId;
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.api_base_url(), "http://localhost:8080/api");
        assert_eq!(config.api_timeout()?, Duration::from_secs(10));
        assert_eq!(config.log_level(), "warn");

        let grid = config.grid_config()?;
        assert_eq!(grid.user_id, UserId::new(1));
        assert_eq!(grid.search_debounce, Duration::from_millis(300));
        assert_eq!(grid.edit_window_days, 3);
        assert_eq!(grid.late_editable, None);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[api]\nbase_url = \"http://x\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[api], [storage], [grid], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[api]\nbase_url = \"https://ops.example.com/api//\"\ntimeout = \"2s\"\ntoken = \"abc\"\nuser_id = 42\n[grid]\nsearch_debounce = \"150ms\"\nedit_window_days = 7\nlate_editable = [\"notes\"]\n[log]\nlevel = \"adgrid_app=debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.api_base_url(), "https://ops.example.com/api");
        assert_eq!(config.api_token(), "abc");
        assert_eq!(config.log_level(), "adgrid_app=debug");

        let grid = config.grid_config()?;
        assert_eq!(grid.user_id, UserId::new(42));
        assert_eq!(grid.search_debounce, Duration::from_millis(150));
        assert_eq!(grid.edit_window_days, 7);
        assert_eq!(grid.late_editable, Some(vec!["notes".to_owned()]));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn negative_edit_window_names_the_key() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[grid]\nedit_window_days = -1\n")?;
        let error = Config::load(&path).expect_err("negative window should fail");
        let message = error.to_string();
        assert!(message.contains("grid.edit_window_days"), "{message}");
        assert!(message.contains("non-negative"), "{message}");
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[api]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn bad_debounce_names_the_key() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[grid]\nsearch_debounce = \"soon\"\n")?;
        let error = Config::load(&path).expect_err("bad debounce should fail");
        assert!(format!("{error:#}").contains("grid.search_debounce"));
        Ok(())
    }

    #[test]
    fn uri_db_path_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/adgrid.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = format!("{error:#}");
        assert!(message.contains("storage.db_path"), "{message}");
        assert!(message.contains("looks like a URI"), "{message}");
        Ok(())
    }

    #[test]
    fn non_positive_user_id_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[api]\nuser_id = 0\n")?;
        let error = Config::load(&path).expect_err("user id 0 should fail");
        assert!(error.to_string().contains("api.user_id"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(adgrid_db::DB_PATH_ENV, "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(adgrid_db::DB_PATH_ENV);
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(adgrid_db::DB_PATH_ENV, "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(adgrid_db::DB_PATH_ENV);
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("300ms")?, Duration::from_millis(300));
        assert_eq!(parse_duration("10s")?, Duration::from_secs(10));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn oversized_minute_durations_are_errors() -> Result<()> {
        let error = parse_duration(&format!("{}m", u64::MAX)).expect_err("minutes overflow");
        assert!(error.to_string().contains("too large"), "{error:#}");

        let (_temp, path) =
            write_config(&format!("version = 1\n[api]\ntimeout = \"{}m\"\n", u64::MAX))?;
        let error = Config::load(&path).expect_err("overflowing timeout should fail");
        assert!(format!("{error:#}").contains("api.timeout"), "{error:#}");
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[api]"));
        assert!(example.contains("[grid]"));
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(
            config.grid_config()?.late_editable,
            Some(vec![
                "notes".to_owned(),
                "funnel_stage".to_owned(),
                "funnel_substage".to_owned(),
            ])
        );
        Ok(())
    }
}
