//! The shared read surface over full and filtered datapackages.

use std::rc::Rc;

use indexmap::IndexMap;
use matpack_types::{Manifest, Resource};
use serde_json::{Map, Value};

use crate::error::{PackageError, PackageResult};
use crate::filtered::FilteredDatapackage;
use crate::payload::{slot, Payload, Slot};

/// A resource reference: unique name or positional index.
#[derive(Clone, Copy, Debug)]
pub enum ResourceRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for ResourceRef<'a> {
    fn from(name: &'a str) -> Self {
        ResourceRef::Name(name)
    }
}

impl<'a> From<&'a String> for ResourceRef<'a> {
    fn from(name: &'a String) -> Self {
        ResourceRef::Name(name)
    }
}

impl From<usize> for ResourceRef<'static> {
    fn from(index: usize) -> Self {
        ResourceRef::Index(index)
    }
}

/// Read operations shared by [`crate::Datapackage`] and
/// [`FilteredDatapackage`].
///
/// Every view keeps its own materialization cache: realizing a proxy
/// replaces the slot `Rc` in the view it was realized through, so caches
/// across views may diverge. Views are cheap to build and do not need to
/// agree on cache state.
pub trait PackageView {
    /// The header metadata plus the resource records of this view.
    fn manifest(&self) -> &Manifest;

    /// The data slots, parallel to `manifest().resources`.
    fn slots(&self) -> &[Slot];

    /// Mutable access to the data slots, for cache replacement.
    fn slots_mut(&mut self) -> &mut [Slot];

    /// The ordered resource records.
    fn resources(&self) -> &[Resource] {
        &self.manifest().resources
    }

    /// Number of resources in this view.
    fn len(&self) -> usize {
        self.slots().len()
    }

    fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Resolve a reference to a position in the resource list.
    fn resource_index(&self, reference: ResourceRef<'_>) -> PackageResult<usize> {
        match reference {
            ResourceRef::Index(index) => {
                let len = self.slots().len();
                if index >= len {
                    Err(PackageError::IndexOutOfRange { index, len })
                } else {
                    Ok(index)
                }
            }
            ResourceRef::Name(name) => {
                let positions: Vec<usize> = self
                    .resources()
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.name == name)
                    .map(|(i, _)| i)
                    .collect();
                match positions.as_slice() {
                    [] => Err(PackageError::MissingResource(name.to_string())),
                    [index] => Ok(*index),
                    many => Err(PackageError::NonUnique(format!(
                        "name {name:?} present at indices {many:?}"
                    ))),
                }
            }
        }
    }

    /// Return the data slot and record for a resource.
    ///
    /// If the slot holds a proxy it is invoked once and replaced in place
    /// with the realized value; subsequent calls are free.
    fn get_resource<'a>(
        &mut self,
        reference: impl Into<ResourceRef<'a>>,
    ) -> PackageResult<(Slot, Resource)> {
        let index = self.resource_index(reference.into())?;
        let realized = {
            let current = self.slots()[index].borrow();
            match &*current {
                Payload::Proxy(proxy) => Some(proxy.invoke()?),
                _ => None,
            }
        };
        if let Some(value) = realized {
            self.slots_mut()[index] = slot(value);
        }
        Ok((
            Rc::clone(&self.slots()[index]),
            self.resources()[index].clone(),
        ))
    }

    /// Build a filtered view of the records matching a predicate.
    ///
    /// Underlying payloads are shared, never copied; header metadata other
    /// than `resources` is deep-copied.
    fn select_where(&self, mut predicate: impl FnMut(&Resource) -> bool) -> FilteredDatapackage {
        let mut resources = Vec::new();
        let mut data = Vec::new();
        for (record, payload) in self.resources().iter().zip(self.slots()) {
            if predicate(record) {
                resources.push(record.clone());
                data.push(Rc::clone(payload));
            }
        }
        let mut manifest = self.manifest().clone();
        manifest.resources = resources;
        FilteredDatapackage::new(manifest, data)
    }

    /// Keep records whose attribute `key` equals `value`.
    fn filter_by_attribute(&self, key: &str, value: &Value) -> FilteredDatapackage {
        self.select_where(|record| record.attribute(key).as_ref() == Some(value))
    }

    /// Drop only records matching every given key/value pair; keep records
    /// that differ on at least one key.
    fn exclude(&self, filters: &Map<String, Value>) -> FilteredDatapackage {
        self.select_where(|record| {
            !filters
                .iter()
                .all(|(key, value)| record.attribute(key).as_ref() == Some(value))
        })
    }

    /// Group-label map, ordered by first appearance in the resource list.
    ///
    /// Records without a `group` are ignored.
    fn groups(&self) -> IndexMap<String, FilteredDatapackage> {
        let mut labels: IndexMap<String, ()> = IndexMap::new();
        for record in self.resources() {
            if let Some(group) = &record.group {
                labels.entry(group.clone()).or_insert(());
            }
        }
        labels
            .into_keys()
            .map(|label| {
                let view = self.select_where(|record| record.group.as_deref() == Some(&label));
                (label, view)
            })
            .collect()
    }
}
