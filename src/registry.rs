use crate::dirty::DirtyFlag;
use crate::effectors::{EffectorCatalog, EffectorConfig, EffectorError, EffectorInstance, EffectorType};
use crate::events::{EffectorEvent, EventBus, SubscriptionId};
use crate::trigger::{AgentKind, EffectorId, Trigger, TriggerId, TriggerSnapshot};
use crate::undo::{NullUndoLog, UndoLog, UndoRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableEntry {
    key: &'static str,
    label: &'static str,
    allow_many: bool,
    order: usize,
}

impl AvailableEntry {
    fn new(effector: &EffectorType, order: usize) -> Self {
        Self { key: effector.key(), label: effector.label(), allow_many: effector.allow_many(), order }
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
}

/// Consumer-held copy of a trigger's available effector types, addressed by
/// position (a dropdown index). The registry patches it in place on attach and
/// detach so those positions stay meaningful without a full recompute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailableSnapshot {
    trigger: Option<TriggerId>,
    agent: Option<AgentKind>,
    entries: Vec<AvailableEntry>,
}

impl AvailableSnapshot {
    pub fn trigger(&self) -> Option<TriggerId> {
        self.trigger
    }

    pub fn entries(&self) -> &[AvailableEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&AvailableEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.key).collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.label).collect()
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    /// Patches the snapshot after an event on its trigger, for changes made
    /// without handing this snapshot to the registry. Events for other
    /// triggers are ignored. Applying an event twice is harmless.
    pub fn reconcile(&mut self, catalog: &EffectorCatalog, event: &EffectorEvent) {
        if self.trigger != Some(event.trigger()) {
            return;
        }
        let key = event.instance().type_key();
        let (Some(order), Some(effector)) = (catalog.position(key), catalog.get(key)) else {
            return;
        };
        match event {
            EffectorEvent::EffectorAdded { .. } => {
                if !effector.allow_many() {
                    if let Some(index) = self.position_of(key) {
                        self.remove_at(index);
                    }
                }
            }
            // A single-instance type has no other copy left once one is removed.
            EffectorEvent::EffectorRemoved { .. } => {
                if self.agent.map_or(true, |agent| effector.supports(agent)) {
                    self.restore(AvailableEntry::new(effector, order));
                }
            }
        }
    }

    fn remove_at(&mut self, index: usize) {
        self.entries.remove(index);
    }

    fn restore(&mut self, entry: AvailableEntry) {
        if self.entries.iter().any(|existing| existing.key == entry.key) {
            return;
        }
        let at = self.entries.iter().position(|existing| existing.order > entry.order).unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
    }
}

/// Owns the effector catalog and the attach/detach protocol. Triggers own
/// their attached effectors; the registry only mutates them.
pub struct EffectorRegistry {
    catalog: EffectorCatalog,
    events: EventBus<EffectorEvent>,
    undo: Box<dyn UndoLog>,
    dirty: DirtyFlag,
}

impl EffectorRegistry {
    pub fn new(catalog: EffectorCatalog) -> Self {
        Self { catalog, events: EventBus::default(), undo: Box::new(NullUndoLog), dirty: DirtyFlag::new() }
    }

    pub fn with_undo_log(mut self, log: impl UndoLog + 'static) -> Self {
        self.undo = Box::new(log);
        self
    }

    pub fn with_dirty_flag(mut self, dirty: DirtyFlag) -> Self {
        self.dirty = dirty;
        self
    }

    pub fn catalog(&self) -> &EffectorCatalog {
        &self.catalog
    }

    pub fn dirty_flag(&self) -> &DirtyFlag {
        &self.dirty
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&EffectorEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Types that may still be attached to `trigger`, in registration order.
    pub fn compute_available(&self, trigger: &Trigger) -> Vec<&EffectorType> {
        self.catalog
            .iter()
            .filter(|effector| effector.allow_many() || !trigger.contains_type(effector.key()))
            .filter(|effector| effector.supports(trigger.agent()))
            .collect()
    }

    pub fn snapshot(&self, trigger: &Trigger) -> AvailableSnapshot {
        let entries = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, effector)| effector.allow_many() || !trigger.contains_type(effector.key()))
            .filter(|(_, effector)| effector.supports(trigger.agent()))
            .map(|(order, effector)| AvailableEntry::new(effector, order))
            .collect();
        AvailableSnapshot { trigger: Some(trigger.id()), agent: Some(trigger.agent()), entries }
    }

    /// Attaches the type at `index` of the consumer's snapshot and removes that
    /// entry from the snapshot when the type admits a single instance.
    pub fn attach(
        &mut self,
        trigger: &mut Trigger,
        snapshot: &mut AvailableSnapshot,
        index: usize,
    ) -> Result<EffectorInstance, EffectorError> {
        if snapshot.trigger() != Some(trigger.id()) {
            let reason = match snapshot.trigger() {
                Some(other) => format!("available snapshot belongs to trigger {other}"),
                None => "available snapshot was never taken".to_string(),
            };
            return Err(self.violation(trigger.id(), reason));
        }
        let entry =
            *snapshot.get(index).ok_or(EffectorError::IndexOutOfRange { index, len: snapshot.len() })?;
        let effector = self.check_attachable(trigger, entry.key())?;
        if !effector.allow_many() {
            snapshot.remove_at(index);
        }
        Ok(self.commit_attach(trigger, effector))
    }

    /// Attaches by stable type key, for callers that do not hold a snapshot.
    pub fn attach_key(&mut self, trigger: &mut Trigger, key: &str) -> Result<EffectorInstance, EffectorError> {
        let effector = self.check_attachable(trigger, key)?;
        Ok(self.commit_attach(trigger, effector))
    }

    pub fn detach(&mut self, trigger: &mut Trigger, id: EffectorId) -> Result<EffectorInstance, EffectorError> {
        let mut unused = AvailableSnapshot::default();
        self.detach_with_snapshot(trigger, &mut unused, id)
    }

    /// Detaches `id` and puts its type back into `snapshot` (at its catalog
    /// position) when the type becomes attachable again.
    pub fn detach_with_snapshot(
        &mut self,
        trigger: &mut Trigger,
        snapshot: &mut AvailableSnapshot,
        id: EffectorId,
    ) -> Result<EffectorInstance, EffectorError> {
        let (position, instance) =
            trigger.remove_effector(id).ok_or(EffectorError::NotFound { trigger: trigger.id(), effector: id })?;

        if snapshot.trigger() == Some(trigger.id()) {
            let key = instance.type_key();
            if let (Some(order), Some(effector)) = (self.catalog.position(key), self.catalog.get(key)) {
                let attachable = effector.allow_many() || !trigger.contains_type(key);
                if attachable && effector.supports(trigger.agent()) {
                    snapshot.restore(AvailableEntry::new(effector, order));
                }
            }
        }

        self.undo.register_record(UndoRecord::EffectorRemoved {
            trigger: trigger.id(),
            instance: instance.clone(),
            position,
        });
        self.dirty.mark();
        tracing::debug!(
            target: "scenario::effectors",
            trigger = %trigger.id(),
            effector = %instance.id(),
            kind = instance.type_key(),
            "effector detached"
        );
        self.events.emit(&EffectorEvent::EffectorRemoved { trigger: trigger.id(), instance: instance.clone() });
        Ok(instance)
    }

    pub fn copy_all(&self, source: &Trigger) -> TriggerSnapshot {
        TriggerSnapshot::from_trigger(source)
    }

    /// Replaces every effector on `target` with fresh copies from `snapshot`.
    /// The snapshot is validated in full before anything changes. Emits every
    /// removal (in original order) before any addition.
    pub fn paste_all(
        &mut self,
        target: &mut Trigger,
        snapshot: &TriggerSnapshot,
    ) -> Result<Vec<EffectorInstance>, EffectorError> {
        let mut planned: Vec<(EffectorType, EffectorConfig)> = Vec::with_capacity(snapshot.effectors.len());
        for entry in &snapshot.effectors {
            let effector = *self
                .catalog
                .get(&entry.type_key)
                .ok_or_else(|| EffectorError::UnknownEffectorType(entry.type_key.clone()))?;
            if !effector.supports(target.agent()) {
                return Err(EffectorError::UnsupportedAgentKind {
                    key: entry.type_key.clone(),
                    agent: target.agent(),
                });
            }
            let expected = effector.default_config().builtin_type_key();
            let carried = entry.config.builtin_type_key();
            if carried != expected {
                let reason = format!(
                    "snapshot entry '{}' carries {} settings",
                    effector.key(),
                    carried.map_or_else(|| "custom".to_string(), |key| format!("'{key}'"))
                );
                return Err(self.violation(target.id(), reason));
            }
            if !effector.allow_many() && planned.iter().any(|(existing, _)| existing.key() == effector.key()) {
                let reason = format!("snapshot holds more than one '{}' effector", effector.key());
                return Err(self.violation(target.id(), reason));
            }
            planned.push((effector, entry.config.clone()));
        }

        let previous = TriggerSnapshot::from_trigger(target);
        let removed = target.take_effectors();
        target.set_activation_distance(snapshot.activation_distance);
        let mut added = Vec::with_capacity(planned.len());
        for (effector, config) in planned {
            let id = target.allocate_effector_id();
            let instance = EffectorInstance::new(id, effector.key(), config);
            target.push_effector(instance.clone());
            added.push(instance);
        }

        self.undo.register_record(UndoRecord::TriggerReplaced {
            trigger: target.id(),
            previous,
            replacement: added.clone(),
        });
        self.dirty.mark();
        tracing::debug!(
            target: "scenario::effectors",
            trigger = %target.id(),
            removed = removed.len(),
            added = added.len(),
            "trigger effectors replaced"
        );
        for instance in removed {
            self.events.emit(&EffectorEvent::EffectorRemoved { trigger: target.id(), instance });
        }
        for instance in &added {
            self.events.emit(&EffectorEvent::EffectorAdded { trigger: target.id(), instance: instance.clone() });
        }
        Ok(added)
    }

    fn check_attachable(&self, trigger: &Trigger, key: &str) -> Result<EffectorType, EffectorError> {
        let effector =
            *self.catalog.get(key).ok_or_else(|| EffectorError::UnknownEffectorType(key.to_string()))?;
        if !effector.supports(trigger.agent()) {
            return Err(EffectorError::UnsupportedAgentKind { key: key.to_string(), agent: trigger.agent() });
        }
        if !effector.allow_many() && trigger.contains_type(key) {
            return Err(self.violation(trigger.id(), format!("'{key}' is already attached and allows one instance")));
        }
        Ok(effector)
    }

    fn commit_attach(&mut self, trigger: &mut Trigger, effector: EffectorType) -> EffectorInstance {
        let id = trigger.allocate_effector_id();
        let instance = EffectorInstance::new(id, effector.key(), effector.default_config());
        trigger.push_effector(instance.clone());
        self.undo.register_record(UndoRecord::EffectorAdded { trigger: trigger.id(), instance: instance.clone() });
        self.dirty.mark();
        tracing::debug!(
            target: "scenario::effectors",
            trigger = %trigger.id(),
            effector = %id,
            kind = effector.key(),
            "effector attached"
        );
        self.events.emit(&EffectorEvent::EffectorAdded { trigger: trigger.id(), instance: instance.clone() });
        instance
    }

    fn violation(&self, trigger: TriggerId, reason: String) -> EffectorError {
        tracing::error!(target: "scenario::effectors", trigger = %trigger, "{reason}");
        EffectorError::ConsistencyViolation { trigger, reason }
    }
}
