// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Named hidden-column presets. The backend stores one `0|1` flag per
//! column under its own key names; [`KeyAliases`] translates those to the
//! grid's column keys.

use std::collections::{BTreeMap, BTreeSet};
use anyhow::Context;
use tracing::{debug, info, warn};

use crate::backend::{LocalStorage, PresetBackend};
use crate::error::{GridError, GridResult};
use crate::ids::{PresetId, UserId};
use crate::model::{Preset, PresetPayload};

/// Local storage key for hidden columns chosen without a preset.
pub const LOCAL_HIDDEN_KEY: &str = "adgrid.hidden_columns";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAliases {
    backend_to_ui: BTreeMap<String, String>,
}

impl KeyAliases {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            backend_to_ui: pairs
                .into_iter()
                .map(|(backend, ui)| (backend.to_owned(), ui.to_owned()))
                .collect(),
        }
    }

    pub fn to_ui<'a>(&'a self, backend: &'a str) -> &'a str {
        self.backend_to_ui
            .get(backend)
            .map_or(backend, String::as_str)
    }

    pub fn to_backend<'a>(&'a self, ui: &'a str) -> &'a str {
        self.backend_to_ui
            .iter()
            .find(|(_, alias)| alias.as_str() == ui)
            .map_or(ui, |(backend, _)| backend.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetManager {
    owner: UserId,
    aliases: KeyAliases,
    known_columns: Vec<String>,
    presets: Vec<Preset>,
    active: Option<PresetId>,
    hidden: BTreeSet<String>,
}

impl PresetManager {
    pub fn new(owner: UserId, known_columns: Vec<String>, aliases: KeyAliases) -> Self {
        Self {
            owner,
            aliases,
            known_columns,
            presets: Vec::new(),
            active: None,
            hidden: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn active(&self) -> Option<&Preset> {
        let id = self.active?;
        self.presets.iter().find(|preset| preset.id == id)
    }

    pub fn hidden(&self) -> &BTreeSet<String> {
        &self.hidden
    }

    pub fn is_hidden(&self, column: &str) -> bool {
        self.hidden.contains(column)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Preset> {
        let wanted = name.trim();
        self.presets
            .iter()
            .find(|preset| preset.name.trim().eq_ignore_ascii_case(wanted))
    }

    /// Replaces the preset list with the owner's presets. An active preset
    /// that disappeared is deselected; hidden columns are kept.
    pub fn load(&mut self, backend: &mut dyn PresetBackend) -> GridResult<usize> {
        let presets = backend
            .list_presets(self.owner)
            .map_err(|error| GridError::backend("load presets", &error))?;
        debug!(owner = %self.owner, count = presets.len(), "loaded presets");
        self.presets = presets;
        if let Some(id) = self.active
            && !self.presets.iter().any(|preset| preset.id == id)
        {
            self.active = None;
        }
        Ok(self.presets.len())
    }

    /// Activates `id` and hides every column it flags, or with `None`
    /// clears both the active preset and the hidden set.
    pub fn apply(
        &mut self,
        id: Option<PresetId>,
        storage: &mut dyn LocalStorage,
    ) -> GridResult<()> {
        let Some(id) = id else {
            self.active = None;
            self.hidden.clear();
            self.mirror(storage);
            return Ok(());
        };

        let preset = self
            .presets
            .iter()
            .find(|preset| preset.id == id)
            .ok_or_else(|| {
                GridError::Validation(format!("preset {id} is not loaded -- reload presets"))
            })?;
        let hidden: BTreeSet<String> = preset
            .hidden
            .iter()
            .filter(|(_, hidden)| **hidden)
            .map(|(key, _)| self.aliases.to_ui(key).to_owned())
            .filter(|key| self.known_columns.contains(key))
            .collect();
        debug!(preset = %id, hidden = hidden.len(), "applied preset");
        self.hidden = hidden;
        self.active = Some(id);
        Ok(())
    }

    /// Manual show/hide. Mirrored to local storage while no preset is
    /// active. Returns whether anything changed.
    pub fn set_hidden(
        &mut self,
        column: &str,
        hidden: bool,
        storage: &mut dyn LocalStorage,
    ) -> GridResult<bool> {
        if !self.known_columns.iter().any(|key| key == column) {
            return Err(GridError::UnknownColumn(column.to_owned()));
        }
        let changed = if hidden {
            self.hidden.insert(column.to_owned())
        } else {
            self.hidden.remove(column)
        };
        if changed {
            self.mirror(storage);
        }
        Ok(changed)
    }

    /// Creates a preset from the current hidden set. The outer result is the
    /// create request; the inner one is the reload that follows it.
    pub fn save(
        &mut self,
        name: &str,
        backend: &mut dyn PresetBackend,
    ) -> GridResult<GridResult<usize>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GridError::Validation(
                "preset name is required -- type a name and save again".to_owned(),
            ));
        }
        let payload = self.payload(name);
        backend
            .create_preset(&payload)
            .map_err(|error| GridError::backend("save preset", &error))?;
        info!(owner = %self.owner, name, "saved preset");
        Ok(self.load(backend))
    }

    /// Overwrites the active preset with the current hidden set. Returns
    /// `None` when no preset is active, else the outcome of the reload.
    pub fn update(
        &mut self,
        backend: &mut dyn PresetBackend,
    ) -> GridResult<Option<GridResult<usize>>> {
        let Some(active) = self.active() else {
            return Ok(None);
        };
        let id = active.id;
        let payload = self.payload(&active.name);
        backend
            .update_preset(id, &payload)
            .map_err(|error| GridError::backend("update preset", &error))?;
        info!(preset = %id, "updated preset");
        Ok(Some(self.load(backend)))
    }

    pub fn delete(
        &mut self,
        backend: &mut dyn PresetBackend,
        storage: &mut dyn LocalStorage,
    ) -> GridResult<Option<GridResult<usize>>> {
        let Some(id) = self.active else {
            return Ok(None);
        };
        backend
            .delete_preset(id)
            .map_err(|error| GridError::backend("delete preset", &error))?;
        info!(preset = %id, "deleted preset");
        self.active = None;
        self.hidden.clear();
        self.mirror(storage);
        Ok(Some(self.load(backend)))
    }

    /// Restores hidden columns saved locally by a previous session. Unknown
    /// columns are dropped. Returns how many columns were hidden.
    pub fn restore_local(&mut self, storage: &dyn LocalStorage) -> anyhow::Result<usize> {
        let Some(raw) = storage.get(LOCAL_HIDDEN_KEY)? else {
            return Ok(0);
        };
        let stored: Vec<String> = serde_json::from_str(&raw).with_context(|| {
            format!("stored hidden columns under {LOCAL_HIDDEN_KEY} are not a JSON list")
        })?;
        self.hidden = stored
            .into_iter()
            .filter(|key| self.known_columns.contains(key))
            .collect();
        Ok(self.hidden.len())
    }

    fn payload(&self, name: &str) -> PresetPayload {
        let columns = self
            .known_columns
            .iter()
            .map(|key| {
                (
                    self.aliases.to_backend(key).to_owned(),
                    u8::from(self.hidden.contains(key)),
                )
            })
            .collect();
        PresetPayload {
            user_id: self.owner,
            name: name.to_owned(),
            columns,
        }
    }

    fn mirror(&self, storage: &mut dyn LocalStorage) {
        if self.active.is_some() {
            return;
        }
        let hidden: Vec<&str> = self.hidden.iter().map(String::as_str).collect();
        let result = serde_json::to_string(&hidden)
            .map_err(anyhow::Error::from)
            .and_then(|encoded| storage.set(LOCAL_HIDDEN_KEY, &encoded));
        if let Err(error) = result {
            warn!(error = %format!("{error:#}"), "could not save hidden columns locally");
        }
    }
}
