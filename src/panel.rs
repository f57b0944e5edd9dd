use crate::effectors::{EffectorCatalog, EffectorError, EffectorInstance};
use crate::events::{EffectorEvent, SubscriptionId};
use crate::pool::{PanelHandle, PanelPool, PrefabPool};
use crate::registry::{AvailableSnapshot, EffectorRegistry};
use crate::trigger::{EffectorId, Trigger, TriggerId, TriggerSnapshot};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Asks the user before a destructive action.
pub trait ConfirmationDialog {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> ConfirmationDialog for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteOutcome {
    Pasted { removed: usize, added: usize },
    Cancelled,
    NothingCopied,
}

pub const DEFAULT_PANEL_PREFAB: &str = "effector_panel";

/// Maps effector type keys to the prefab used to display them.
#[derive(Debug, Clone)]
pub struct PanelPrefabs {
    default_prefab: String,
    overrides: BTreeMap<String, String>,
}

impl Default for PanelPrefabs {
    fn default() -> Self {
        Self { default_prefab: DEFAULT_PANEL_PREFAB.to_string(), overrides: BTreeMap::new() }
    }
}

impl PanelPrefabs {
    pub fn new(default_prefab: impl Into<String>) -> Self {
        Self { default_prefab: default_prefab.into(), overrides: BTreeMap::new() }
    }

    pub fn with_override(mut self, type_key: impl Into<String>, prefab: impl Into<String>) -> Self {
        self.overrides.insert(type_key.into(), prefab.into());
        self
    }

    pub fn prefab_for(&self, type_key: &str) -> &str {
        self.overrides.get(type_key).map(String::as_str).unwrap_or(&self.default_prefab)
    }
}

struct PanelState<P> {
    selected: Option<TriggerId>,
    visible: BTreeMap<EffectorId, PanelHandle>,
    available: AvailableSnapshot,
    catalog: EffectorCatalog,
    pool: P,
    prefabs: PanelPrefabs,
}

impl<P: PanelPool> PanelState<P> {
    fn show(&mut self, instance: &EffectorInstance) {
        if self.visible.contains_key(&instance.id()) {
            return;
        }
        let handle = self.pool.get_instance(self.prefabs.prefab_for(instance.type_key()));
        self.visible.insert(instance.id(), handle);
    }

    fn hide(&mut self, id: EffectorId) {
        if let Some(handle) = self.visible.remove(&id) {
            self.pool.return_instance(handle);
        }
    }

    fn hide_all(&mut self) {
        for (_, handle) in std::mem::take(&mut self.visible) {
            self.pool.return_instance(handle);
        }
    }

    fn on_event(&mut self, event: &EffectorEvent) {
        if self.selected != Some(event.trigger()) {
            return;
        }
        self.available.reconcile(&self.catalog, event);
        match event {
            EffectorEvent::EffectorAdded { instance, .. } => self.show(instance),
            EffectorEvent::EffectorRemoved { instance, .. } => self.hide(instance.id()),
        }
    }
}

/// Editor panel for one selected trigger: a dropdown of attachable effector
/// types and one pooled display panel per attached effector. Registry events
/// keep the panel set equal to the trigger's effector list.
pub struct TriggerEditPanel<P: PanelPool + 'static = PrefabPool> {
    state: Rc<RefCell<PanelState<P>>>,
    subscription: Option<SubscriptionId>,
    clipboard: Option<TriggerSnapshot>,
    dialog: Box<dyn ConfirmationDialog>,
}

impl<P: PanelPool + 'static> TriggerEditPanel<P> {
    pub fn new(
        registry: &mut EffectorRegistry,
        pool: P,
        prefabs: PanelPrefabs,
        dialog: impl ConfirmationDialog + 'static,
    ) -> Self {
        let state = Rc::new(RefCell::new(PanelState {
            selected: None,
            visible: BTreeMap::new(),
            available: AvailableSnapshot::default(),
            catalog: registry.catalog().clone(),
            pool,
            prefabs,
        }));
        let listener = Rc::clone(&state);
        let subscription = registry.subscribe(move |event| listener.borrow_mut().on_event(event));
        Self { state, subscription: Some(subscription), clipboard: None, dialog: Box::new(dialog) }
    }

    /// Stops listening to the registry and hands every panel back to the pool.
    pub fn deinitialize(&mut self, registry: &mut EffectorRegistry) {
        if let Some(subscription) = self.subscription.take() {
            registry.unsubscribe(subscription);
        }
        self.deselect();
    }

    pub fn select(&mut self, registry: &EffectorRegistry, trigger: &Trigger) {
        let mut state = self.state.borrow_mut();
        state.hide_all();
        state.selected = Some(trigger.id());
        for instance in trigger.effectors() {
            state.show(instance);
        }
        state.available = registry.snapshot(trigger);
        tracing::trace!(
            target: "scenario::panel",
            trigger = %trigger.id(),
            panels = trigger.len(),
            options = state.available.len(),
            "trigger selected"
        );
    }

    pub fn deselect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.hide_all();
        state.selected = None;
        state.available = AvailableSnapshot::default();
    }

    pub fn selected(&self) -> Option<TriggerId> {
        self.state.borrow().selected
    }

    /// The dropdown contents, kept current by registry events for the
    /// selected trigger whoever made the change.
    pub fn available(&self) -> AvailableSnapshot {
        self.state.borrow().available.clone()
    }

    pub fn dropdown_options(&self) -> Vec<&'static str> {
        self.state.borrow().available.labels()
    }

    pub fn visible_panels(&self) -> Vec<(EffectorId, PanelHandle)> {
        self.state.borrow().visible.iter().map(|(id, handle)| (*id, *handle)).collect()
    }

    pub fn panel_for(&self, id: EffectorId) -> Option<PanelHandle> {
        self.state.borrow().visible.get(&id).copied()
    }

    pub fn with_pool<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.state.borrow().pool)
    }

    /// Attaches the dropdown entry at `index`.
    pub fn add_selected(
        &mut self,
        registry: &mut EffectorRegistry,
        trigger: &mut Trigger,
        index: usize,
    ) -> Result<EffectorInstance, EffectorError> {
        self.ensure_selected(registry, trigger);
        // Taken out of the shared state so the event handler can borrow it
        // while the registry emits.
        let mut available = std::mem::take(&mut self.state.borrow_mut().available);
        let result = registry.attach(trigger, &mut available, index);
        self.state.borrow_mut().available = available;
        result
    }

    pub fn remove(
        &mut self,
        registry: &mut EffectorRegistry,
        trigger: &mut Trigger,
        id: EffectorId,
    ) -> Result<EffectorInstance, EffectorError> {
        self.ensure_selected(registry, trigger);
        let mut available = std::mem::take(&mut self.state.borrow_mut().available);
        let result = registry.detach_with_snapshot(trigger, &mut available, id);
        self.state.borrow_mut().available = available;
        result
    }

    pub fn copy(&mut self, registry: &EffectorRegistry, trigger: &Trigger) {
        self.clipboard = Some(registry.copy_all(trigger));
        tracing::debug!(target: "scenario::panel", trigger = %trigger.id(), "trigger effectors copied");
    }

    pub fn copied(&self) -> Option<&TriggerSnapshot> {
        self.clipboard.as_ref()
    }

    /// Replaces `trigger`'s effectors with the copied ones. A non-empty target
    /// is only overwritten once the dialog confirms.
    pub fn paste(
        &mut self,
        registry: &mut EffectorRegistry,
        trigger: &mut Trigger,
    ) -> Result<PasteOutcome, EffectorError> {
        let Some(snapshot) = self.clipboard.clone() else {
            return Ok(PasteOutcome::NothingCopied);
        };
        if !trigger.is_empty() {
            let prompt =
                format!("Replace {} effector(s) on trigger {} with the copied ones?", trigger.len(), trigger.id());
            if !self.dialog.confirm(&prompt) {
                tracing::debug!(target: "scenario::panel", trigger = %trigger.id(), "paste cancelled");
                return Ok(PasteOutcome::Cancelled);
            }
        }
        self.ensure_selected(registry, trigger);
        let removed = trigger.len();
        let added = registry.paste_all(trigger, &snapshot)?;
        Ok(PasteOutcome::Pasted { removed, added: added.len() })
    }

    fn ensure_selected(&mut self, registry: &EffectorRegistry, trigger: &Trigger) {
        if self.selected() != Some(trigger.id()) {
            self.select(registry, trigger);
        }
    }
}
