use crate::effectors::EffectorCatalog;
use crate::panel::{PanelPrefabs, DEFAULT_PANEL_PREFAB};
use crate::trigger::AgentKind;
use crate::undo::UndoHistory;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_agent")]
    pub default_agent: AgentKind,
    #[serde(default = "EditorConfig::default_undo_capacity")]
    pub undo_capacity: usize,
    #[serde(default = "EditorConfig::default_log_filter")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectorsConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default = "EffectorsConfig::default_panel_prefab")]
    pub default_panel_prefab: String,
    #[serde(default)]
    pub panel_prefabs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllablesConfig {
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub effectors: EffectorsConfig,
    #[serde(default)]
    pub controllables: ControllablesConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioConfigOverrides {
    pub agent: Option<AgentKind>,
    pub log_filter: Option<String>,
    pub catalog_path: Option<PathBuf>,
}

impl EditorConfig {
    fn default_agent() -> AgentKind {
        AgentKind::Npc
    }

    const fn default_undo_capacity() -> usize {
        128
    }

    fn default_log_filter() -> String {
        "info".to_string()
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_agent: Self::default_agent(),
            undo_capacity: Self::default_undo_capacity(),
            log_filter: Self::default_log_filter(),
        }
    }
}

impl EffectorsConfig {
    fn default_panel_prefab() -> String {
        DEFAULT_PANEL_PREFAB.to_string()
    }
}

impl Default for EffectorsConfig {
    fn default() -> Self {
        Self { disabled: Vec::new(), default_panel_prefab: Self::default_panel_prefab(), panel_prefabs: BTreeMap::new() }
    }
}

impl ScenarioConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(target: "scenario::config", "Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ScenarioConfigOverrides) {
        if let Some(agent) = overrides.agent {
            self.editor.default_agent = agent;
        }
        if let Some(filter) = &overrides.log_filter {
            self.editor.log_filter = filter.clone();
        }
        if let Some(path) = &overrides.catalog_path {
            self.controllables.catalog_path = Some(path.clone());
        }
    }

    /// Built-in effector catalog minus the disabled keys.
    pub fn effector_catalog(&self) -> EffectorCatalog {
        let mut catalog = EffectorCatalog::builtin();
        let unknown = catalog.disable(self.effectors.disabled.iter().map(String::as_str));
        for key in unknown {
            tracing::warn!(target: "scenario::config", "Ignoring unknown disabled effector '{key}'");
        }
        catalog
    }

    pub fn panel_prefabs(&self) -> PanelPrefabs {
        self.effectors
            .panel_prefabs
            .iter()
            .fold(PanelPrefabs::new(self.effectors.default_panel_prefab.clone()), |prefabs, (key, prefab)| {
                prefabs.with_override(key.clone(), prefab.clone())
            })
    }

    pub fn undo_history(&self) -> UndoHistory {
        UndoHistory::with_capacity(self.editor.undo_capacity)
    }
}

impl ScenarioConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.agent.is_none() && self.log_filter.is_none() && self.catalog_path.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.agent.is_some() {
            fields.push("agent");
        }
        if self.log_filter.is_some() {
            fields.push("log");
        }
        if self.catalog_path.is_some() {
            fields.push("catalog");
        }
        fields
    }
}
