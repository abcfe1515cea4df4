use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use stockroom_core::{Aggregate, DomainError, DomainResult};

use crate::activity::ActivityLog;
use crate::item::{ItemName, Quantity};

/// Threshold used by `low_stock` when the caller has no preference.
pub const DEFAULT_LOW_STOCK_THRESHOLD: f64 = 5.0;

/// Command: AddStock.
#[derive(Debug, Clone, PartialEq)]
pub struct AddStock {
    pub item: ItemName,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveStock.
///
/// The quantity is not bounded: removing more than is stocked depletes the
/// item, and a negative quantity increases it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveStock {
    pub item: ItemName,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StockCommand {
    AddStock(AddStock),
    RemoveStock(RemoveStock),
}

/// Event: StockAdded.
#[derive(Debug, Clone, PartialEq)]
pub struct StockAdded {
    pub item: ItemName,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockRemoved (item still stocked afterwards).
#[derive(Debug, Clone, PartialEq)]
pub struct StockRemoved {
    pub item: ItemName,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDepleted (quantity reached zero or below; entry dropped).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDepleted {
    pub item: ItemName,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StockEvent {
    StockAdded(StockAdded),
    StockRemoved(StockRemoved),
    ItemDepleted(ItemDepleted),
}

impl StockEvent {
    pub fn item(&self) -> &ItemName {
        match self {
            StockEvent::StockAdded(e) => &e.item,
            StockEvent::StockRemoved(e) => &e.item,
            StockEvent::ItemDepleted(e) => &e.item,
        }
    }
}

/// Why an add or remove left the table untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Blank item name or non-numeric/non-finite quantity. Not reported.
    InvalidInput,
    NegativeQuantity { item: String, quantity: f64 },
    MissingItem { item: String },
    Overflow { item: String },
}

impl Rejection {
    /// Whether the rejection is reported on the output channel.
    pub fn is_warning(&self) -> bool {
        !matches!(self, Rejection::InvalidInput)
    }

    fn from_domain(err: DomainError, item: &ItemName, quantity: Quantity) -> Self {
        match err {
            DomainError::Validation(_) => Rejection::NegativeQuantity {
                item: item.to_string(),
                quantity: quantity.value(),
            },
            DomainError::NotFound(_) => Rejection::MissingItem { item: item.to_string() },
            DomainError::InvariantViolation(_) => Rejection::Overflow { item: item.to_string() },
        }
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Rejection::InvalidInput => f.write_str("invalid input ignored"),
            Rejection::NegativeQuantity { item, .. } => {
                write!(f, "Warning: Negative quantity for {item} ignored.")
            }
            Rejection::MissingItem { item } => {
                write!(f, "Warning: Tried to remove missing item '{item}'")
            }
            Rejection::Overflow { item } => {
                write!(f, "Warning: Quantity of {item} would overflow; change ignored.")
            }
        }
    }
}

/// Outcome of an add or remove.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    /// The item is stocked at `quantity` after the change.
    Applied { item: ItemName, quantity: Quantity },
    /// The item dropped to zero or below and was removed from the table.
    Removed { item: ItemName },
    /// Valid request with nothing to change (adding zero).
    Unchanged,
    Rejected(Rejection),
}

/// In-memory stock table.
///
/// Every stored quantity is strictly positive; an item whose quantity falls to
/// zero or below is dropped. Iteration is in item-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryStore {
    stock: BTreeMap<ItemName, Quantity>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from existing entries, rejecting non-positive quantities.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ItemName, Quantity)>,
    ) -> DomainResult<Self> {
        let mut stock = BTreeMap::new();
        for (item, quantity) in entries {
            if !quantity.is_positive() {
                return Err(DomainError::invariant(format!(
                    "stored quantity for {item} must be positive, got {quantity}"
                )));
            }
            stock.insert(item, quantity);
        }
        Ok(Self { stock })
    }

    /// Add `qty` of `item`, recording the addition in `log` when given.
    ///
    /// A non-finite quantity or a blank item name is ignored silently; a
    /// negative quantity is ignored with a warning. The sign is checked before
    /// the name, so a negative add of a blank name still warns.
    pub fn add(&mut self, item: &str, qty: f64, log: Option<&mut ActivityLog>) -> Adjustment {
        let Ok(quantity) = Quantity::new(qty) else {
            return Adjustment::Rejected(Rejection::InvalidInput);
        };
        if quantity.is_negative() {
            return self.reject(Rejection::NegativeQuantity {
                item: item.to_string(),
                quantity: qty,
            });
        }
        let Ok(item) = ItemName::new(item) else {
            return Adjustment::Rejected(Rejection::InvalidInput);
        };
        self.apply_command(
            StockCommand::AddStock(AddStock {
                item,
                quantity,
                occurred_at: Utc::now(),
            }),
            log,
        )
    }

    /// `add` for untyped input: a non-string item or non-numeric quantity is a
    /// silent no-op.
    pub fn add_json(
        &mut self,
        item: &JsonValue,
        qty: &JsonValue,
        log: Option<&mut ActivityLog>,
    ) -> Adjustment {
        match (item.as_str(), qty.as_f64()) {
            (Some(item), Some(qty)) => self.add(item, qty, log),
            _ => Adjustment::Rejected(Rejection::InvalidInput),
        }
    }

    /// Remove `qty` of `item`; an absent item is reported and left alone.
    pub fn remove(&mut self, item: &str, qty: f64) -> Adjustment {
        let Ok(quantity) = Quantity::new(qty) else {
            return Adjustment::Rejected(Rejection::InvalidInput);
        };
        let Ok(item) = ItemName::new(item) else {
            return self.reject(Rejection::MissingItem { item: item.to_string() });
        };
        self.apply_command(
            StockCommand::RemoveStock(RemoveStock {
                item,
                quantity,
                occurred_at: Utc::now(),
            }),
            None,
        )
    }

    /// Decide and apply a command. Additions are appended to `log`.
    pub fn apply_command(
        &mut self,
        command: StockCommand,
        log: Option<&mut ActivityLog>,
    ) -> Adjustment {
        let (item, quantity) = match &command {
            StockCommand::AddStock(c) => (c.item.clone(), c.quantity),
            StockCommand::RemoveStock(c) => (c.item.clone(), c.quantity),
        };

        let events = match self.execute(&command) {
            Ok(events) => events,
            Err(err) => return self.reject(Rejection::from_domain(err, &item, quantity)),
        };

        if let Some(log) = log {
            for event in &events {
                if let StockEvent::StockAdded(added) = event {
                    log.record(added);
                }
            }
        }

        match events.last() {
            None => Adjustment::Unchanged,
            Some(StockEvent::ItemDepleted(e)) => {
                debug!(item = %e.item, "item depleted");
                Adjustment::Removed { item: e.item.clone() }
            }
            Some(event) => {
                let quantity = self.quantity(event.item().as_str());
                debug!(item = %event.item(), %quantity, "stock adjusted");
                Adjustment::Applied {
                    item: event.item().clone(),
                    quantity,
                }
            }
        }
    }

    fn reject(&self, rejection: Rejection) -> Adjustment {
        if rejection.is_warning() {
            warn!("{rejection}");
        }
        Adjustment::Rejected(rejection)
    }

    /// Stored quantity, or zero when the item is absent.
    pub fn quantity(&self, item: &str) -> Quantity {
        self.stock.get(item).copied().unwrap_or(Quantity::ZERO)
    }

    /// Names of items stocked strictly below `threshold`, in table order.
    pub fn low_stock(&self, threshold: f64) -> Vec<&str> {
        self.stock
            .iter()
            .filter(|(_, qty)| qty.value() < threshold)
            .map(|(item, _)| item.as_str())
            .collect()
    }

    pub fn items(&self) -> impl Iterator<Item = (&ItemName, Quantity)> {
        self.stock.iter().map(|(item, qty)| (item, *qty))
    }

    pub fn contains(&self, item: &str) -> bool {
        self.stock.contains_key(item)
    }

    pub fn len(&self) -> usize {
        self.stock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    pub fn clear(&mut self) {
        self.stock.clear();
    }

    pub(crate) fn replace(&mut self, other: InventoryStore) {
        self.stock = other.stock;
    }

    pub(crate) fn table(&self) -> &BTreeMap<ItemName, Quantity> {
        &self.stock
    }

    /// Write the item report: a header line, then `<item> -> <qty>` per item.
    pub fn report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Items Report")?;
        for (item, qty) in &self.stock {
            writeln!(out, "{item} -> {qty}")?;
        }
        Ok(())
    }
}

impl Aggregate for InventoryStore {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockAdded(e) => {
                let total = self.quantity(e.item.as_str()) + e.quantity;
                self.stock.insert(e.item.clone(), total);
            }
            StockEvent::StockRemoved(e) => {
                let remaining = self.quantity(e.item.as_str()) - e.quantity;
                self.stock.insert(e.item.clone(), remaining);
            }
            StockEvent::ItemDepleted(e) => {
                self.stock.remove(e.item.as_str());
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::AddStock(cmd) => self.handle_add(cmd),
            StockCommand::RemoveStock(cmd) => self.handle_remove(cmd),
        }
    }
}

impl InventoryStore {
    fn handle_add(&self, cmd: &AddStock) -> DomainResult<Vec<StockEvent>> {
        if cmd.quantity.is_negative() {
            return Err(DomainError::validation(format!(
                "negative quantity for {}",
                cmd.item
            )));
        }
        if cmd.quantity.is_zero() {
            return Ok(vec![]);
        }

        let total = self.quantity(cmd.item.as_str()) + cmd.quantity;
        Quantity::new(total.value())
            .map_err(|_| DomainError::invariant(format!("quantity of {} overflows", cmd.item)))?;

        Ok(vec![StockEvent::StockAdded(StockAdded {
            item: cmd.item.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveStock) -> DomainResult<Vec<StockEvent>> {
        let Some(current) = self.stock.get(cmd.item.as_str()).copied() else {
            return Err(DomainError::not_found(cmd.item.as_str()));
        };

        let remaining = current - cmd.quantity;
        Quantity::new(remaining.value())
            .map_err(|_| DomainError::invariant(format!("quantity of {} overflows", cmd.item)))?;

        if remaining.is_positive() {
            Ok(vec![StockEvent::StockRemoved(StockRemoved {
                item: cmd.item.clone(),
                quantity: cmd.quantity,
                occurred_at: cmd.occurred_at,
            })])
        } else {
            Ok(vec![StockEvent::ItemDepleted(ItemDepleted {
                item: cmd.item.clone(),
                occurred_at: cmd.occurred_at,
            })])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_capture::capture_logs;
    use proptest::prelude::*;
    use serde_json::json;

    fn name(s: &str) -> ItemName {
        ItemName::new(s).unwrap()
    }

    fn stocked(entries: &[(&str, f64)]) -> InventoryStore {
        InventoryStore::from_entries(
            entries
                .iter()
                .map(|(item, qty)| (name(item), Quantity::new(*qty).unwrap())),
        )
        .unwrap()
    }

    #[test]
    fn demo_scenario() {
        let mut store = InventoryStore::new();
        store.add("apple", 10.0, None);
        store.add("banana", 2.0, None);
        store.add("grapes", 5.0, None);
        let outcome = store.remove("orange", 1.0);

        assert_eq!(
            outcome,
            Adjustment::Rejected(Rejection::MissingItem {
                item: "orange".to_string()
            })
        );
        assert_eq!(store.quantity("apple"), 10.0);
        assert_eq!(store.low_stock(DEFAULT_LOW_STOCK_THRESHOLD), vec!["banana"]);
    }

    #[test]
    fn add_accumulates_and_reports_new_total() {
        let mut store = InventoryStore::new();
        store.add("apple", 3.0, None);
        let outcome = store.add("apple", 1.5, None);

        assert_eq!(
            outcome,
            Adjustment::Applied {
                item: name("apple"),
                quantity: Quantity::new(4.5).unwrap()
            }
        );
    }

    #[test]
    fn negative_add_is_rejected_with_warning() {
        let mut store = stocked(&[("x", 2.0)]);
        let outcome = store.add("x", -1.0, None);

        match outcome {
            Adjustment::Rejected(r @ Rejection::NegativeQuantity { .. }) => {
                assert!(r.is_warning());
                assert_eq!(r.to_string(), "Warning: Negative quantity for x ignored.");
            }
            other => panic!("expected negative quantity rejection, got {other:?}"),
        }
        assert_eq!(store.quantity("x"), 2.0);
    }

    #[test]
    fn untyped_add_ignores_wrong_types_silently() {
        let mut store = stocked(&[("x", 2.0)]);
        let before = store.clone();

        let a = store.add_json(&json!(123), &json!(5), None);
        let b = store.add_json(&json!("x"), &json!("5"), None);

        assert_eq!(a, Adjustment::Rejected(Rejection::InvalidInput));
        assert_eq!(b, Adjustment::Rejected(Rejection::InvalidInput));
        assert!(!Rejection::InvalidInput.is_warning());
        assert_eq!(store, before);
    }

    #[test]
    fn untyped_add_accepts_valid_values() {
        let mut store = InventoryStore::new();
        store.add_json(&json!("pear"), &json!(2.5), None);
        assert_eq!(store.quantity("pear"), 2.5);
    }

    #[test]
    fn blank_name_and_non_finite_quantity_are_silent_no_ops() {
        let mut store = InventoryStore::new();
        assert_eq!(
            store.add("  ", 1.0, None),
            Adjustment::Rejected(Rejection::InvalidInput)
        );
        assert_eq!(
            store.add("x", f64::NAN, None),
            Adjustment::Rejected(Rejection::InvalidInput)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn adding_zero_to_absent_item_stores_nothing() {
        let mut store = InventoryStore::new();
        assert_eq!(store.add("ghost", 0.0, None), Adjustment::Unchanged);
        assert!(!store.contains("ghost"));
    }

    #[test]
    fn negative_add_of_blank_name_still_warns() {
        let mut store = InventoryStore::new();
        let outcome = store.add(" ", -1.0, None);

        assert_eq!(
            outcome,
            Adjustment::Rejected(Rejection::NegativeQuantity {
                item: " ".to_string(),
                quantity: -1.0
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn warnings_reach_the_log_output() {
        let mut store = stocked(&[("x", 2.0)]);

        let (_, logs) = capture_logs(|| {
            store.remove("missing", 1.0);
            store.add("x", -1.0, None);
        });

        assert!(logs.contains("WARN"));
        assert!(logs.contains("Tried to remove missing item 'missing'"));
        assert!(logs.contains("Negative quantity for x ignored."));
    }

    #[test]
    fn invalid_input_is_not_logged_as_warning() {
        let mut store = InventoryStore::new();

        let (_, logs) = capture_logs(|| {
            store.add("", 1.0, None);
            store.add_json(&json!(123), &json!(5), None);
        });

        assert!(!logs.contains("WARN"));
    }

    #[test]
    fn add_overflow_is_rejected() {
        let mut store = stocked(&[("x", f64::MAX)]);
        let outcome = store.add("x", f64::MAX, None);
        assert!(matches!(outcome, Adjustment::Rejected(Rejection::Overflow { .. })));
        assert_eq!(store.quantity("x"), f64::MAX);
    }

    #[test]
    fn add_appends_to_log_only_when_applied() {
        let mut store = InventoryStore::new();
        let mut log = ActivityLog::new();

        store.add("apple", 10.0, Some(&mut log));
        store.add("apple", -1.0, Some(&mut log));
        store.add("", 1.0, Some(&mut log));

        assert_eq!(log.len(), 1);
        assert!(log.entries()[0].to_string().ends_with("Added 10 of apple"));
    }

    #[test]
    fn remove_partial_keeps_item() {
        let mut store = stocked(&[("x", 5.0)]);
        let outcome = store.remove("x", 2.0);
        assert_eq!(
            outcome,
            Adjustment::Applied {
                item: name("x"),
                quantity: Quantity::from(3)
            }
        );
    }

    #[test]
    fn remove_to_zero_or_below_deletes_item() {
        let mut store = stocked(&[("x", 3.0), ("y", 1.0)]);

        assert_eq!(store.remove("x", 3.0), Adjustment::Removed { item: name("x") });
        assert_eq!(store.remove("y", 50.0), Adjustment::Removed { item: name("y") });

        assert_eq!(store.quantity("x"), 0.0);
        assert!(!store.contains("x"));
        assert!(store.low_stock(100.0).is_empty());
        assert_eq!(store.items().count(), 0);
    }

    #[test]
    fn remove_negative_quantity_increases_stock() {
        let mut store = stocked(&[("x", 1.0)]);
        store.remove("x", -2.0);
        assert_eq!(store.quantity("x"), 3.0);
    }

    #[test]
    fn remove_missing_item_leaves_table_unchanged() {
        let mut store = stocked(&[("x", 1.0)]);
        let before = store.clone();

        let outcome = store.remove("missing", 1.0);

        match outcome {
            Adjustment::Rejected(r) => {
                assert!(r.is_warning());
                assert_eq!(r.to_string(), "Warning: Tried to remove missing item 'missing'");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(store, before);
    }

    #[test]
    fn quantity_of_absent_item_is_zero() {
        assert_eq!(InventoryStore::new().quantity("nothing"), Quantity::ZERO);
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let store = stocked(&[("a", 4.99), ("b", 5.0), ("c", 1.0)]);
        assert_eq!(store.low_stock(5.0), vec!["a", "c"]);
        assert!(store.low_stock(1.0).is_empty());
    }

    #[test]
    fn from_entries_rejects_non_positive_quantities() {
        let err = InventoryStore::from_entries([(name("x"), Quantity::ZERO)]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn handle_does_not_mutate() {
        let store = stocked(&[("x", 1.0)]);
        let cmd = StockCommand::RemoveStock(RemoveStock {
            item: name("x"),
            quantity: Quantity::from(1),
            occurred_at: Utc::now(),
        });
        let events = store.handle(&cmd).unwrap();
        assert!(matches!(events.as_slice(), [StockEvent::ItemDepleted(_)]));
        assert_eq!(store.quantity("x"), 1.0);
    }

    #[test]
    fn report_lists_items_after_header() {
        let store = stocked(&[("apple", 10.0), ("banana", 2.5)]);
        let mut out = Vec::new();
        store.report(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Items Report\napple -> 10\nbanana -> 2.5\n"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: quantity after a series of non-negative adds equals their sum.
        #[test]
        fn quantity_is_cumulative_sum_of_adds(
            amounts in prop::collection::vec(0u32..10_000u32, 1..20)
        ) {
            let mut store = InventoryStore::new();
            let mut expected = 0.0;
            for amount in &amounts {
                store.add("widget", f64::from(*amount), None);
                expected += f64::from(*amount);
            }
            prop_assert_eq!(store.quantity("widget").value(), expected);
        }

        /// Property: no stored quantity is ever zero or negative.
        #[test]
        fn stored_quantities_stay_positive(
            ops in prop::collection::vec((any::<bool>(), 0usize..3, -5i32..20i32), 1..40)
        ) {
            let names = ["a", "b", "c"];
            let mut store = InventoryStore::new();
            for (is_add, idx, amount) in ops {
                if is_add {
                    store.add(names[idx], f64::from(amount), None);
                } else {
                    store.remove(names[idx], f64::from(amount));
                }
            }
            for (_, qty) in store.items() {
                prop_assert!(qty.is_positive());
            }
        }
    }
}
