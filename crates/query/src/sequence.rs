//! Discards responses that were overtaken by a newer request for the same
//! input field.

use std::collections::HashMap;
use std::sync::Mutex;

/// Ticket for one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub field: String,
    pub seq: u64,
}

/// Outcome of a request once its response arrived.
#[derive(Debug, PartialEq)]
pub enum Settled<T> {
    Current(T),
    /// A newer request for the same field was issued meanwhile.
    Stale,
}

impl<T> Settled<T> {
    pub fn into_current(self) -> Option<T> {
        match self {
            Settled::Current(value) => Some(value),
            Settled::Stale => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Settled::Stale)
    }
}

/// Per-field monotonically increasing request numbers.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: Mutex<HashMap<String, u64>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, field: &str) -> RequestTicket {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let seq = latest.entry(field.to_string()).or_insert(0);
        *seq += 1;
        RequestTicket {
            field: field.to_string(),
            seq: *seq,
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.get(&ticket.field) == Some(&ticket.seq)
    }

    /// Accept `result` only if `ticket` is still the latest for its field.
    /// A stale error is discarded along with a stale value.
    pub fn settle<T, E>(&self, ticket: &RequestTicket, result: Result<T, E>) -> Result<Settled<T>, E> {
        if !self.is_current(ticket) {
            return Ok(Settled::Stale);
        }
        result.map(Settled::Current)
    }
}
