use std::cell::Cell;
use std::rc::Rc;

/// Shared "unsaved changes" marker. Every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Rc<Cell<bool>>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.get()
    }

    /// Returns the previous value, for save paths that need to know whether
    /// anything changed.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_the_same_flag() {
        let flag = DirtyFlag::new();
        let other = flag.clone();
        assert!(!flag.is_dirty());
        other.mark();
        assert!(flag.is_dirty());
        assert!(flag.take());
        assert!(!other.is_dirty());
    }
}
