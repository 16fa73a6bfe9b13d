//! Live external data sources behind interface resources.

use crate::array::ArrayData;

/// A live external data source.
///
/// Interface resources hold one of these in their data slot. The package
/// engine never calls [`sample`](DataSource::sample) itself; it only stores
/// the object, refuses to serialize it, and hands it back to consumers.
/// On `finalize_serialization` the slot is replaced by a dehydrated
/// placeholder, and a fresh implementation must be supplied after loading.
pub trait DataSource: std::fmt::Debug {
    /// Number of rows this source yields per draw. Must match the row count
    /// of the group's indices array.
    fn len(&self) -> usize;

    /// Whether the source yields no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pull the next batch of values from the external source.
    fn sample(&mut self) -> ArrayData;
}
