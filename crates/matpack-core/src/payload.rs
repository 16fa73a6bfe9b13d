//! Data objects: what sits in each slot of the data list.

use std::cell::RefCell;
use std::rc::Rc;

use matpack_types::{ArrayData, DataSource, Table};
use serde_json::Value;

use crate::proxy::ReadProxy;

/// One data object, parallel to one resource record.
#[derive(Debug)]
pub enum Payload {
    /// A materialized numeric array.
    Array(ArrayData),
    /// A materialized metadata table.
    Table(Table),
    /// Free-form JSON metadata.
    Json(Value),
    /// A live external data source; never serialized.
    Interface(Box<dyn DataSource>),
    /// Placeholder for an interface that was finalized away or loaded back.
    Dehydrated,
    /// A deferred read; materialized in place on first access.
    Proxy(ReadProxy),
}

impl Payload {
    /// Row count of the payload, where one is defined.
    pub fn len(&self) -> Option<usize> {
        match self {
            Payload::Array(a) => Some(a.len()),
            Payload::Table(t) => Some(t.len()),
            Payload::Interface(s) => Some(s.len()),
            Payload::Json(_) | Payload::Dehydrated | Payload::Proxy(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            Payload::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Payload::Proxy(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, Payload::Interface(_))
    }

    pub fn is_dehydrated(&self) -> bool {
        matches!(self, Payload::Dehydrated)
    }
}

/// A shared, mutable data slot.
///
/// Views share slots by reference count; materializing a proxy replaces the
/// `Rc` in the owning view only, while in-place edits through the `RefCell`
/// are visible to every view holding the slot.
pub type Slot = Rc<RefCell<Payload>>;

/// Wrap a payload in a fresh slot.
pub fn slot(payload: Payload) -> Slot {
    Rc::new(RefCell::new(payload))
}
