use crate::trigger::{AgentKind, EffectorId, TriggerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WAIT_TIME: &str = "wait_time";
pub const WAIT_FOR_DISTANCE: &str = "wait_for_distance";
pub const TIME_TO_COLLISION: &str = "time_to_collision";
pub const CONTROL_TRIGGER: &str = "control_trigger";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectorError {
    /// A consumer-held index no longer fits its available-types snapshot.
    #[error("effector index {index} is out of range for {len} available types")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("effector {effector} is not attached to trigger {trigger}")]
    NotFound { trigger: TriggerId, effector: EffectorId },

    /// An invariant breach that should be impossible, usually a stale snapshot.
    #[error("consistency violation on trigger {trigger}: {reason}")]
    ConsistencyViolation { trigger: TriggerId, reason: String },

    #[error("unknown effector type '{0}'")]
    UnknownEffectorType(String),

    #[error("effector type '{key}' cannot be attached to {agent} agents")]
    UnsupportedAgentKind { key: String, agent: AgentKind },

    #[error("effector type '{0}' is already registered")]
    DuplicateEffectorType(String),
}

/// Type-specific effector settings, produced by each type's factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectorConfig {
    WaitTime {
        #[serde(default)]
        value: f32,
    },
    WaitForDistance {
        #[serde(default)]
        value: f32,
    },
    TimeToCollision,
    ControlTrigger {
        #[serde(default)]
        controllables: Vec<u64>,
        #[serde(default)]
        policy: String,
    },
    Custom {
        #[serde(default)]
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl EffectorConfig {
    /// Built-in type key this configuration belongs to; `None` for custom data.
    pub fn builtin_type_key(&self) -> Option<&'static str> {
        match self {
            EffectorConfig::WaitTime { .. } => Some(WAIT_TIME),
            EffectorConfig::WaitForDistance { .. } => Some(WAIT_FOR_DISTANCE),
            EffectorConfig::TimeToCollision => Some(TIME_TO_COLLISION),
            EffectorConfig::ControlTrigger { .. } => Some(CONTROL_TRIGGER),
            EffectorConfig::Custom { .. } => None,
        }
    }
}

fn default_wait_time() -> EffectorConfig {
    EffectorConfig::WaitTime { value: 0.0 }
}

fn default_wait_for_distance() -> EffectorConfig {
    EffectorConfig::WaitForDistance { value: 0.0 }
}

fn default_time_to_collision() -> EffectorConfig {
    EffectorConfig::TimeToCollision
}

fn default_control_trigger() -> EffectorConfig {
    EffectorConfig::ControlTrigger { controllables: Vec::new(), policy: String::new() }
}

/// One entry of the registration table: a stable key plus the factory that
/// produces a default configuration.
#[derive(Debug, Clone, Copy)]
pub struct EffectorType {
    key: &'static str,
    label: &'static str,
    allow_many: bool,
    unsupported_agents: &'static [AgentKind],
    factory: fn() -> EffectorConfig,
}

impl EffectorType {
    pub const fn new(
        key: &'static str,
        label: &'static str,
        allow_many: bool,
        unsupported_agents: &'static [AgentKind],
        factory: fn() -> EffectorConfig,
    ) -> Self {
        Self { key, label, allow_many, unsupported_agents, factory }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn allow_many(&self) -> bool {
        self.allow_many
    }

    pub fn unsupported_agents(&self) -> &'static [AgentKind] {
        self.unsupported_agents
    }

    pub fn supports(&self, agent: AgentKind) -> bool {
        !self.unsupported_agents.contains(&agent)
    }

    pub fn default_config(&self) -> EffectorConfig {
        (self.factory)()
    }
}

const BUILTIN_EFFECTORS: &[EffectorType] = &[
    EffectorType::new(WAIT_TIME, "Wait Time", false, &[], default_wait_time),
    EffectorType::new(WAIT_FOR_DISTANCE, "Wait For Distance", false, &[], default_wait_for_distance),
    EffectorType::new(TIME_TO_COLLISION, "Time To Collision", false, &[AgentKind::Ego], default_time_to_collision),
    EffectorType::new(CONTROL_TRIGGER, "Control Trigger", true, &[], default_control_trigger),
];

/// Fixed, ordered catalog of effector types. Order is registration order and
/// doubles as display order everywhere the catalog is listed.
#[derive(Debug, Clone, Default)]
pub struct EffectorCatalog {
    types: Vec<EffectorType>,
}

impl EffectorCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self { types: BUILTIN_EFFECTORS.to_vec() }
    }

    pub fn register(&mut self, effector: EffectorType) -> Result<(), EffectorError> {
        if self.get(effector.key()).is_some() {
            return Err(EffectorError::DuplicateEffectorType(effector.key().to_string()));
        }
        self.types.push(effector);
        Ok(())
    }

    /// Drops the listed keys. Unknown keys are reported back so configuration
    /// typos do not go unnoticed.
    pub fn disable<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut unknown = Vec::new();
        for key in keys {
            let before = self.types.len();
            self.types.retain(|effector| effector.key() != key);
            if self.types.len() == before {
                unknown.push(key.to_string());
            }
        }
        unknown
    }

    pub fn get(&self, key: &str) -> Option<&EffectorType> {
        self.types.iter().find(|effector| effector.key() == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.types.iter().position(|effector| effector.key() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectorType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectorInstance {
    id: EffectorId,
    type_key: &'static str,
    config: EffectorConfig,
}

impl EffectorInstance {
    pub(crate) fn new(id: EffectorId, type_key: &'static str, config: EffectorConfig) -> Self {
        Self { id, type_key, config }
    }

    pub fn id(&self) -> EffectorId {
        self.id
    }

    pub fn type_key(&self) -> &'static str {
        self.type_key
    }

    pub fn config(&self) -> &EffectorConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut EffectorConfig {
        &mut self.config
    }
}
