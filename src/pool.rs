use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelHandle(u64);

impl PanelHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PanelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel:{}", self.0)
    }
}

/// Source of recyclable display panels, keyed by prefab.
pub trait PanelPool {
    fn get_instance(&mut self, prefab_key: &str) -> PanelHandle;
    fn return_instance(&mut self, handle: PanelHandle);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub live: usize,
    pub idle: usize,
}

/// In-memory pool: returned handles are parked per prefab and handed out again
/// before new ones are minted.
#[derive(Debug, Default)]
pub struct PrefabPool {
    next_handle: u64,
    idle: HashMap<String, Vec<PanelHandle>>,
    live: HashMap<PanelHandle, String>,
    created: u64,
    reused: u64,
}

impl PrefabPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            live: self.live.len(),
            idle: self.idle.values().map(Vec::len).sum(),
        }
    }

    pub fn prefab_of(&self, handle: PanelHandle) -> Option<&str> {
        self.live.get(&handle).map(String::as_str)
    }
}

impl PanelPool for PrefabPool {
    fn get_instance(&mut self, prefab_key: &str) -> PanelHandle {
        let recycled = self.idle.get_mut(prefab_key).and_then(Vec::pop);
        let handle = match recycled {
            Some(handle) => {
                self.reused += 1;
                handle
            }
            None => {
                let handle = PanelHandle(self.next_handle);
                self.next_handle += 1;
                self.created += 1;
                handle
            }
        };
        self.live.insert(handle, prefab_key.to_string());
        handle
    }

    fn return_instance(&mut self, handle: PanelHandle) {
        match self.live.remove(&handle) {
            Some(prefab) => self.idle.entry(prefab).or_default().push(handle),
            None => tracing::warn!(target: "scenario::pool", %handle, "returned a panel the pool does not own"),
        }
    }
}
