//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are validated once at construction,
/// so code holding one can rely on its invariants without re-checking.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Quantity(f64);
///
/// impl ValueObject for Quantity {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
