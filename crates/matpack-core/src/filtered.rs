//! Read-only, non-owning views over a subset of a datapackage.

use matpack_types::Manifest;

use crate::payload::Slot;
use crate::view::PackageView;

/// An immutable view selecting some resources of a source package.
///
/// Shares every selected data slot with its source (no payload copies) and
/// carries a deep-independent copy of the header metadata with a rebuilt
/// `resources` list. There is no structural mutation API: views cannot add,
/// delete, or finalize. The materialization cache is the view's own, so
/// realizing a proxy here does not update the source's slot.
pub struct FilteredDatapackage {
    manifest: Manifest,
    data: Vec<Slot>,
}

impl FilteredDatapackage {
    pub(crate) fn new(manifest: Manifest, data: Vec<Slot>) -> Self {
        debug_assert_eq!(manifest.resources.len(), data.len());
        Self { manifest, data }
    }
}

impl PackageView for FilteredDatapackage {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn slots(&self) -> &[Slot] {
        &self.data
    }

    fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.data
    }
}

impl std::fmt::Debug for FilteredDatapackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredDatapackage")
            .field("name", &self.manifest.name)
            .field("resources", &self.data.len())
            .finish()
    }
}
