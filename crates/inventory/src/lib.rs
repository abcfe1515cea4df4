//! Inventory stock table with JSON file persistence.
//!
//! `InventoryStore` owns a quantity-by-item table. Changes go through the
//! handle/apply cycle of [`stockroom_core::Aggregate`]; rejected changes are
//! reported as warnings rather than errors. Only load/save can fail.

pub mod activity;
pub mod item;
pub mod persistence;
pub mod stock;

#[cfg(test)]
mod log_capture;

pub use activity::{ActivityLog, LogEntry};
pub use item::{ItemName, Quantity};
pub use persistence::{DEFAULT_INVENTORY_PATH, PersistenceError};
pub use stock::{
    AddStock, Adjustment, DEFAULT_LOW_STOCK_THRESHOLD, InventoryStore, ItemDepleted, Rejection,
    RemoveStock, StockAdded, StockCommand, StockEvent, StockRemoved,
};
