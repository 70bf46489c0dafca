use gridmart_primitives::Event;
use serde::{Deserialize, Serialize};

/// A published notification with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub seq: u64,
    pub event: Event,
}

/// Append-only, causally ordered notification log.
///
/// Only events of successful operations reach the log, each exactly once.
/// Read-side indexers replay it from any sequence number.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<Notification>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events in order, returning their sequence numbers.
    pub fn append(&mut self, events: Vec<Event>) -> Vec<u64> {
        let mut seqs = Vec::with_capacity(events.len());
        for event in events {
            let seq = self.records.len() as u64;
            tracing::trace!(seq, kind = event.kind(), "notification published");
            self.records.push(Notification { seq, event });
            seqs.push(seq);
        }
        seqs
    }

    /// Notifications with `seq >= from`.
    pub fn since(&self, from: u64) -> &[Notification] {
        let start = (from as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.records.iter()
    }

    /// Sequence number the next notification will get.
    pub fn next_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
