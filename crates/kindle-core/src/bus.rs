use std::sync::{Arc, PoisonError, RwLock};

use kindle_model::{SessionEvent, Subscribe};

/// Fan-out of session events to registered subscribers.
///
/// Shared between the session loop and the control service task.
#[derive(Clone, Default)]
pub struct Bus {
    subs: Arc<RwLock<Vec<Arc<dyn Subscribe>>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sub: Arc<dyn Subscribe>) {
        self.subs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sub);
    }

    pub fn publish(&self, event: &SessionEvent) {
        let subs = self.subs.read().unwrap_or_else(PoisonError::into_inner);
        for sub in subs.iter() {
            sub.on_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
