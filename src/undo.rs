use crate::effectors::EffectorInstance;
use crate::trigger::{TriggerId, TriggerSnapshot};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Enough information to reverse one registry mutation. Applying it is the
/// editor's job.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoRecord {
    EffectorAdded { trigger: TriggerId, instance: EffectorInstance },
    EffectorRemoved { trigger: TriggerId, instance: EffectorInstance, position: usize },
    TriggerReplaced { trigger: TriggerId, previous: TriggerSnapshot, replacement: Vec<EffectorInstance> },
}

impl UndoRecord {
    pub fn trigger(&self) -> TriggerId {
        match self {
            UndoRecord::EffectorAdded { trigger, .. }
            | UndoRecord::EffectorRemoved { trigger, .. }
            | UndoRecord::TriggerReplaced { trigger, .. } => *trigger,
        }
    }

    pub fn label(&self) -> String {
        match self {
            UndoRecord::EffectorAdded { instance, .. } => format!("Add {} effector", instance.type_key()),
            UndoRecord::EffectorRemoved { instance, .. } => format!("Remove {} effector", instance.type_key()),
            UndoRecord::TriggerReplaced { replacement, .. } => {
                format!("Paste trigger ({} effectors)", replacement.len())
            }
        }
    }
}

pub trait UndoLog {
    fn register_record(&mut self, record: UndoRecord);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NullUndoLog;

impl UndoLog for NullUndoLog {
    fn register_record(&mut self, _record: UndoRecord) {}
}

const DEFAULT_UNDO_CAPACITY: usize = 128;

/// Bounded in-memory log. Clones share storage so the editor can keep a handle
/// while the registry owns another.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    records: Rc<RefCell<VecDeque<UndoRecord>>>,
    capacity: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { records: Rc::new(RefCell::new(VecDeque::with_capacity(capacity.min(1_024)))), capacity }
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn last(&self) -> Option<UndoRecord> {
        self.records.borrow().back().cloned()
    }

    pub fn records(&self) -> Vec<UndoRecord> {
        self.records.borrow().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl UndoLog for UndoHistory {
    fn register_record(&mut self, record: UndoRecord) {
        let mut records = self.records.borrow_mut();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}
