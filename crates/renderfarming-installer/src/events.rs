use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// One-way notifications a front-end consumes while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TasksTotal(u64),
    TaskDone(u64),
    Error(String),
    Complete,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete)
    }
}

/// Fire-and-forget receiver of [`ProgressEvent`]s.
pub trait EventSink: Send {
    fn emit(&self, event: ProgressEvent);
}

impl EventSink for mpsc::Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A front-end that hung up no longer cares about progress.
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
