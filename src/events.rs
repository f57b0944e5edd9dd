use crate::effectors::EffectorInstance;
use crate::trigger::TriggerId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EffectorEvent {
    EffectorAdded { trigger: TriggerId, instance: EffectorInstance },
    EffectorRemoved { trigger: TriggerId, instance: EffectorInstance },
}

impl EffectorEvent {
    pub fn trigger(&self) -> TriggerId {
        match self {
            EffectorEvent::EffectorAdded { trigger, .. } | EffectorEvent::EffectorRemoved { trigger, .. } => {
                *trigger
            }
        }
    }

    pub fn instance(&self) -> &EffectorInstance {
        match self {
            EffectorEvent::EffectorAdded { instance, .. } | EffectorEvent::EffectorRemoved { instance, .. } => {
                instance
            }
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, EffectorEvent::EffectorAdded { .. })
    }
}

impl fmt::Display for EffectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectorEvent::EffectorAdded { trigger, instance } => {
                write!(f, "EffectorAdded trigger={} effector={} type={}", trigger, instance.id(), instance.type_key())
            }
            EffectorEvent::EffectorRemoved { trigger, instance } => {
                write!(
                    f,
                    "EffectorRemoved trigger={} effector={} type={}",
                    trigger,
                    instance.id(),
                    instance.type_key()
                )
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E)>;

/// Synchronous publish/subscribe channel. Handlers run in subscription order,
/// once per emitted event, before `emit` returns.
pub struct EventBus<E> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Handler<E>)>,
    emitted: u64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { next_id: 0, subscribers: Vec::new(), emitted: 0 }
    }
}

impl<E> EventBus<E> {
    pub fn subscribe(&mut self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        self.emitted = self.emitted.wrapping_add(1);
        for (_, handler) in self.subscribers.iter_mut() {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }
}
