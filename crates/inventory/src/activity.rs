//! Caller-owned record of stock additions.

use chrono::{DateTime, Utc};

use crate::item::{ItemName, Quantity};
use crate::stock::StockAdded;

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub item: ItemName,
    pub quantity: Quantity,
}

impl core::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: Added {} of {}",
            self.at.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.quantity,
            self.item
        )
    }
}

/// Ordered log of additions, appended to by `InventoryStore::add` when the
/// caller passes one in. The store never keeps a reference to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, event: &StockAdded) {
        self.entries.push(LogEntry {
            at: event.occurred_at,
            item: event.item.clone(),
            quantity: event.quantity,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(ToString::to_string)
    }
}
