//! Whole-file JSON persistence for the stock table.
//!
//! The file is a single JSON object mapping item names to quantities. Saves
//! overwrite the whole file; loads replace the whole table.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::Error as _;
use serde_json::Value as JsonValue;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::item::{ItemName, Quantity};
use crate::stock::InventoryStore;

/// File used when the caller does not name one.
pub const DEFAULT_INVENTORY_PATH: &str = "inventory.json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read inventory file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write inventory file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed JSON in inventory file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid inventory data in {path}: {reason}")]
    InvalidData { path: PathBuf, reason: String },

    #[error("failed to serialize inventory: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl InventoryStore {
    /// Replace the table with the contents of `path`.
    ///
    /// A missing file empties the table. Entries that cannot be stocked (blank
    /// name, zero or negative quantity) are skipped with a warning. Malformed
    /// JSON, a non-object document or a non-numeric quantity is an error and
    /// leaves the table unchanged. Returns the number of items loaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, PersistenceError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "inventory file not found; starting empty");
                self.clear();
                return Ok(0);
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let loaded = parse_table(&raw).map_err(|err| err.at(path))?;
        let count = loaded.len();
        self.replace(loaded);

        debug!(path = %path.display(), items = count, "inventory loaded");
        Ok(count)
    }

    /// Overwrite `path` with the table as 4-space-indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;

        std::fs::write(path, json).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), items = self.len(), "inventory saved");
        Ok(())
    }

    /// The table as the JSON text `save` writes.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.table().serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(serde_json::Error::custom)
    }
}

/// Parse failure without a path attached yet.
enum TableError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl TableError {
    fn at(self, path: &Path) -> PersistenceError {
        let path = path.to_path_buf();
        match self {
            TableError::Parse(source) => PersistenceError::Parse { path, source },
            TableError::Invalid(reason) => PersistenceError::InvalidData { path, reason },
        }
    }
}

fn parse_table(raw: &str) -> Result<InventoryStore, TableError> {
    let value: JsonValue = serde_json::from_str(raw).map_err(TableError::Parse)?;
    let map = match value {
        JsonValue::Object(map) => map,
        other => {
            return Err(TableError::Invalid(format!(
                "expected a JSON object at the top level, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let number = value.as_f64().ok_or_else(|| {
            TableError::Invalid(format!(
                "quantity for {key:?} must be a number, found {}",
                json_kind(&value)
            ))
        })?;
        let quantity =
            Quantity::new(number).map_err(|e| TableError::Invalid(format!("item {key:?}: {e}")))?;

        // Same rule as `remove`: nothing at or below zero is kept.
        if !quantity.is_positive() {
            warn!(item = %key, %quantity, "skipping non-positive quantity in inventory file");
            continue;
        }
        let Ok(item) = ItemName::new(key.as_str()) else {
            warn!(item = ?key, "skipping blank item name in inventory file");
            continue;
        };
        entries.push((item, quantity));
    }

    InventoryStore::from_entries(entries).map_err(|e| TableError::Invalid(e.to_string()))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
