//! The demonstration run behind the `stockroom` binary.

use std::io::Write;

use anyhow::Context;
use tracing::debug;

use stockroom_inventory::{ActivityLog, InventoryStore};

use crate::config::Config;

/// Stock a few items, query them, then save, reload and print the report.
///
/// Status lines and the report go to `out`; warnings go through `tracing`.
pub fn run<W: Write>(config: &Config, out: &mut W) -> anyhow::Result<InventoryStore> {
    let mut store = InventoryStore::new();
    let mut log = ActivityLog::new();

    store.add("apple", 10.0, Some(&mut log));
    store.add("banana", 2.0, Some(&mut log));
    store.add("grapes", 5.0, Some(&mut log));
    store.remove("orange", 1.0);

    writeln!(out, "Apple stock: {}", store.quantity("apple"))?;
    writeln!(out, "Low items: {:?}", store.low_stock(config.low_stock_threshold))?;

    let path = &config.inventory_path;
    store
        .save(path)
        .with_context(|| format!("saving inventory to {}", path.display()))?;
    store
        .load(path)
        .with_context(|| format!("loading inventory from {}", path.display()))?;
    store.report(out)?;

    for line in log.lines() {
        debug!("{line}");
    }

    Ok(store)
}
