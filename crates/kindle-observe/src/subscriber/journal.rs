use kindle_model::{SessionEvent, Subscribe};

use crate::subscriber::view::log_event;

/// Subscriber that renders every session event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &SessionEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
