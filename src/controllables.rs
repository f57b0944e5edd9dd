use crate::dirty::DirtyFlag;
use crate::events::{EventBus, SubscriptionId};
use crate::policy::{ControlPolicy, PolicyError};
use anyhow::Context;
use bevy_ecs::prelude::Entity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllableError {
    #[error("controllable {0:?} is already registered")]
    AlreadyRegistered(Entity),

    #[error("controllable {0:?} is not registered")]
    NotRegistered(Entity),

    #[error("controllables manager is already initialized")]
    AlreadyInitialized,

    #[error("controllables manager is not initialized")]
    NotInitialized,

    #[error("unknown controllable kind '{0}'")]
    UnknownKind(String),

    #[error("invalid policy for controllable {entity:?}: {source}")]
    Policy {
        entity: Entity,
        #[source]
        source: PolicyError,
    },

    /// Loader failure flattened with `{:#}`, so the message keeps every
    /// context layer down to the root cause.
    #[error("loading controllable catalog failed: {0}")]
    Load(String),
}

/// Catalog entry describing one placeable controllable prefab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllableKind {
    pub key: String,
    #[serde(default)]
    pub valid_actions: Vec<String>,
    #[serde(default)]
    pub default_policy: String,
}

impl ControllableKind {
    pub fn builtin() -> Vec<Self> {
        vec![
            ControllableKind {
                key: "traffic_light".to_string(),
                valid_actions: ["green", "yellow", "red", "flashing", "off", "wait", "loop"]
                    .iter()
                    .map(|action| action.to_string())
                    .collect(),
                default_policy: "green=15;yellow=3;red=20;loop".to_string(),
            },
            ControllableKind {
                key: "barrier".to_string(),
                valid_actions: ["open", "close", "wait", "loop"].iter().map(|action| action.to_string()).collect(),
                default_policy: "close".to_string(),
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Controllable {
    entity: Entity,
    kind: String,
    valid_actions: Vec<String>,
    policy: String,
}

impl Controllable {
    pub fn new(entity: Entity, kind: impl Into<String>, valid_actions: Vec<String>, policy: impl Into<String>) -> Self {
        Self { entity, kind: kind.into(), valid_actions, policy: policy.into() }
    }

    pub fn from_kind(entity: Entity, kind: &ControllableKind) -> Self {
        Self::new(entity, kind.key.clone(), kind.valid_actions.clone(), kind.default_policy.clone())
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn valid_actions(&self) -> &[String] {
        &self.valid_actions
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllableEvent {
    Registered { entity: Entity, kind: String },
    Unregistered { entity: Entity, kind: String },
}

impl fmt::Display for ControllableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllableEvent::Registered { entity, kind } => {
                write!(f, "ControllableRegistered entity={} kind={}", entity.index(), kind)
            }
            ControllableEvent::Unregistered { entity, kind } => {
                write!(f, "ControllableUnregistered entity={} kind={}", entity.index(), kind)
            }
        }
    }
}

/// Supplies the controllable catalog during [`ControllablesManager::initialize`].
pub trait ControllableLoader {
    fn load_catalog(&self) -> impl Future<Output = anyhow::Result<Vec<ControllableKind>>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalogLoader;

impl ControllableLoader for BuiltinCatalogLoader {
    fn load_catalog(&self) -> impl Future<Output = anyhow::Result<Vec<ControllableKind>>> {
        async { Ok(ControllableKind::builtin()) }
    }
}

/// Reads a JSON array of [`ControllableKind`] entries.
#[derive(Debug, Clone)]
pub struct JsonCatalogLoader {
    path: PathBuf,
}

impl JsonCatalogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ControllableLoader for JsonCatalogLoader {
    fn load_catalog(&self) -> impl Future<Output = anyhow::Result<Vec<ControllableKind>>> {
        let path = self.path.clone();
        async move {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Reading controllable catalog {}", path.display()))?;
            let kinds: Vec<ControllableKind> = serde_json::from_str(&text)
                .with_context(|| format!("Parsing controllable catalog {}", path.display()))?;
            Ok(kinds)
        }
    }
}

/// Live controllables placed in the scenario plus a one-slot policy clipboard.
#[derive(Default)]
pub struct ControllablesManager {
    catalog: Vec<ControllableKind>,
    live: Vec<Controllable>,
    copied_policy: Option<(Entity, String)>,
    events: EventBus<ControllableEvent>,
    dirty: DirtyFlag,
    initialized: bool,
}

impl ControllablesManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirty_flag(mut self, dirty: DirtyFlag) -> Self {
        self.dirty = dirty;
        self
    }

    pub async fn initialize<L: ControllableLoader>(&mut self, loader: &L) -> Result<(), ControllableError> {
        if self.initialized {
            return Err(ControllableError::AlreadyInitialized);
        }
        let catalog = loader.load_catalog().await.map_err(|err| ControllableError::Load(format!("{err:#}")))?;
        tracing::info!(target: "scenario::controllables", kinds = catalog.len(), "controllable catalog loaded");
        self.catalog = catalog;
        self.initialized = true;
        Ok(())
    }

    /// Unregisters every live controllable (emitting `Unregistered` in
    /// registration order), then drops the catalog and the policy clipboard.
    /// Teardown does not mark the scenario dirty.
    pub fn deinitialize(&mut self) {
        let live = std::mem::take(&mut self.live);
        tracing::debug!(target: "scenario::controllables", live = live.len(), "controllables deinitialized");
        for controllable in live {
            self.events.emit(&ControllableEvent::Unregistered {
                entity: controllable.entity(),
                kind: controllable.kind.clone(),
            });
        }
        self.catalog.clear();
        self.copied_policy = None;
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn catalog(&self) -> &[ControllableKind] {
        &self.catalog
    }

    pub fn kind(&self, key: &str) -> Option<&ControllableKind> {
        self.catalog.iter().find(|kind| kind.key == key)
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&ControllableEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn register(&mut self, controllable: Controllable) -> Result<(), ControllableError> {
        if self.get(controllable.entity()).is_some() {
            return Err(ControllableError::AlreadyRegistered(controllable.entity()));
        }
        let event = ControllableEvent::Registered { entity: controllable.entity(), kind: controllable.kind.clone() };
        self.live.push(controllable);
        self.dirty.mark();
        self.events.emit(&event);
        Ok(())
    }

    /// Registers a new controllable of catalog kind `key` with its default policy.
    pub fn instantiate(&mut self, entity: Entity, key: &str) -> Result<(), ControllableError> {
        if !self.initialized {
            return Err(ControllableError::NotInitialized);
        }
        let kind = self.kind(key).ok_or_else(|| ControllableError::UnknownKind(key.to_string()))?;
        let controllable = Controllable::from_kind(entity, kind);
        self.register(controllable)
    }

    pub fn unregister(&mut self, entity: Entity) -> Result<Controllable, ControllableError> {
        let position = self
            .live
            .iter()
            .position(|controllable| controllable.entity() == entity)
            .ok_or(ControllableError::NotRegistered(entity))?;
        let controllable = self.live.remove(position);
        if matches!(self.copied_policy, Some((target, _)) if target == entity) {
            self.copied_policy = None;
        }
        self.dirty.mark();
        self.events.emit(&ControllableEvent::Unregistered { entity, kind: controllable.kind.clone() });
        Ok(controllable)
    }

    pub fn get(&self, entity: Entity) -> Option<&Controllable> {
        self.live.iter().find(|controllable| controllable.entity() == entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Controllable> {
        self.live.iter()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn set_policy(&mut self, entity: Entity, text: &str) -> Result<(), ControllableError> {
        let controllable = self
            .live
            .iter_mut()
            .find(|controllable| controllable.entity == entity)
            .ok_or(ControllableError::NotRegistered(entity))?;
        let policy = ControlPolicy::parse(text).map_err(|source| ControllableError::Policy { entity, source })?;
        policy
            .validate_against(&controllable.valid_actions)
            .map_err(|source| ControllableError::Policy { entity, source })?;
        controllable.policy = policy.to_string();
        self.dirty.mark();
        Ok(())
    }

    /// Stores `policy` for `target`, replacing whatever was copied before.
    pub fn copy_policy(&mut self, target: Entity, policy: impl Into<String>) {
        self.copied_policy = Some((target, policy.into()));
    }

    /// Returns the copied policy only when it was copied for exactly `target`.
    pub fn get_copied_policy(&self, target: Entity) -> Option<&str> {
        match &self.copied_policy {
            Some((stored, policy)) if *stored == target => Some(policy.as_str()),
            _ => None,
        }
    }
}
