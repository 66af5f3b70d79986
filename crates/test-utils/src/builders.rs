#![allow(dead_code)]

use std::time::Duration;

use fsevent_bridge::{CreateFlags, CreateOptions, EventFlags, EventId, RawEvent};

/// Builder for `CreateOptions` to simplify test setup.
pub struct OptionsBuilder {
    options: CreateOptions,
}

impl OptionsBuilder {
    /// Immediate delivery: zero latency, `NO_DEFER`, per-file events.
    pub fn immediate() -> Self {
        Self {
            options: CreateOptions::new(CreateFlags::NO_DEFER | CreateFlags::FILE_EVENTS),
        }
    }

    pub fn new() -> Self {
        Self {
            options: CreateOptions::default(),
        }
    }

    pub fn flag(mut self, flag: CreateFlags) -> Self {
        self.options.flags |= flag;
        self
    }

    pub fn without(mut self, flag: CreateFlags) -> Self {
        self.options.flags -= flag;
        self
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.options.latency = Duration::from_millis(ms);
        self
    }

    pub fn since(mut self, id: EventId) -> Self {
        self.options = self.options.since(id);
        self
    }

    pub fn build(self) -> CreateOptions {
        self.options
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a raw native callback batch.
pub struct BatchBuilder {
    events: Vec<RawEvent>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn event(mut self, path: &str, flags: EventFlags, id: u64) -> Self {
        self.events.push(RawEvent::new(path, flags, id));
        self
    }

    /// Append an event whose flag word is passed through untouched.
    pub fn raw(mut self, path: &str, flags: u32, id: u64) -> Self {
        self.events.push(RawEvent {
            path: path.to_string(),
            flags,
            id: EventId(id),
        });
        self
    }

    pub fn build(self) -> Vec<RawEvent> {
        self.events
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
