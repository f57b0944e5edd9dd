use crate::effectors::{EffectorConfig, EffectorInstance};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Ego,
    Npc,
    Pedestrian,
    #[default]
    Unknown,
}

impl AgentKind {
    pub fn label(self) -> &'static str {
        match self {
            AgentKind::Ego => "Ego",
            AgentKind::Npc => "NPC",
            AgentKind::Pedestrian => "Pedestrian",
            AgentKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgentKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ego" => Ok(AgentKind::Ego),
            "npc" => Ok(AgentKind::Npc),
            "pedestrian" | "ped" => Ok(AgentKind::Pedestrian),
            "unknown" => Ok(AgentKind::Unknown),
            other => bail!("Unknown agent kind '{other}'. Use ego, npc, pedestrian or unknown."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

impl TriggerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable handle for an effector attached to one trigger. Ids are never reused
/// within the owning trigger, so viewers can key on them across removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectorId(u64);

impl EffectorId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

const DEFAULT_ACTIVATION_DISTANCE: f32 = 5.0;

/// Waypoint trigger: an ordered list of attached effectors scoped to one agent.
#[derive(Debug, Clone)]
pub struct Trigger {
    id: TriggerId,
    agent: AgentKind,
    activation_distance: f32,
    effectors: Vec<EffectorInstance>,
    next_effector: u64,
}

impl Trigger {
    pub fn new(id: TriggerId, agent: AgentKind) -> Self {
        Self {
            id,
            agent,
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
            effectors: Vec::new(),
            next_effector: 0,
        }
    }

    pub fn id(&self) -> TriggerId {
        self.id
    }

    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    pub fn activation_distance(&self) -> f32 {
        self.activation_distance
    }

    pub fn set_activation_distance(&mut self, distance: f32) {
        self.activation_distance = distance.max(0.0);
    }

    pub fn effectors(&self) -> &[EffectorInstance] {
        &self.effectors
    }

    pub fn is_empty(&self) -> bool {
        self.effectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effectors.len()
    }

    pub fn get(&self, id: EffectorId) -> Option<&EffectorInstance> {
        self.effectors.iter().find(|instance| instance.id() == id)
    }

    /// Mutable access to an effector's configuration. Attachment itself only
    /// changes through the registry.
    pub fn config_mut(&mut self, id: EffectorId) -> Option<&mut EffectorConfig> {
        self.effectors.iter_mut().find(|instance| instance.id() == id).map(|instance| instance.config_mut())
    }

    pub fn count_of(&self, type_key: &str) -> usize {
        self.effectors.iter().filter(|instance| instance.type_key() == type_key).count()
    }

    pub fn contains_type(&self, type_key: &str) -> bool {
        self.effectors.iter().any(|instance| instance.type_key() == type_key)
    }

    pub(crate) fn allocate_effector_id(&mut self) -> EffectorId {
        let id = EffectorId(self.next_effector);
        self.next_effector = self.next_effector.wrapping_add(1);
        id
    }

    pub(crate) fn push_effector(&mut self, instance: EffectorInstance) {
        self.effectors.push(instance);
    }

    pub(crate) fn remove_effector(&mut self, id: EffectorId) -> Option<(usize, EffectorInstance)> {
        let position = self.effectors.iter().position(|instance| instance.id() == id)?;
        Some((position, self.effectors.remove(position)))
    }

    pub(crate) fn take_effectors(&mut self) -> Vec<EffectorInstance> {
        std::mem::take(&mut self.effectors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshotEntry {
    pub type_key: String,
    pub config: EffectorConfig,
}

/// Detached deep copy of a trigger's effectors and trigger-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    #[serde(default)]
    pub source_agent: AgentKind,
    #[serde(default = "TriggerSnapshot::default_activation_distance")]
    pub activation_distance: f32,
    #[serde(default)]
    pub effectors: Vec<TriggerSnapshotEntry>,
}

impl TriggerSnapshot {
    const fn default_activation_distance() -> f32 {
        DEFAULT_ACTIVATION_DISTANCE
    }

    pub fn from_trigger(trigger: &Trigger) -> Self {
        Self {
            source_agent: trigger.agent(),
            activation_distance: trigger.activation_distance(),
            effectors: trigger
                .effectors()
                .iter()
                .map(|instance| TriggerSnapshotEntry {
                    type_key: instance.type_key().to_string(),
                    config: instance.config().clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.effectors.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing trigger snapshot")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Parsing trigger snapshot")
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("Reading trigger snapshot {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Loading trigger snapshot {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).with_context(|| format!("Writing trigger snapshot {}", path.display()))
    }
}
