//! Mask-based merging of resource groups from two datapackages.
//!
//! [`merge_with_mask`] builds a new datapackage from two same-length
//! resource groups and a boolean mask: rows of the first group where the
//! mask is true, rows of the second group where it is false. Array members
//! are filtered row-wise; table and JSON metadata members are carried over
//! unchanged. Interface groups cannot be merged, as a live source has no
//! row selection.
//!
//! When both groups carry the same label the merged members are renamed
//! with `_true` and `_false` suffixes, inserted between the group stem and
//! the kind token (`vec.indices` becomes `vec_true.indices`).

use matpack_core::{
    Datapackage, FilteredDatapackage, PackageError, PackageOptions, PackageView, Payload,
};
use matpack_store::{InMemoryBackend, StorageBackend, StoreError};
use matpack_types::{member_name, member_path, split_kind_suffix, Mediatype, Profile};
use tracing::{debug, warn};

/// Errors from group merging.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The named resource group is absent from its datapackage.
    #[error("resource group {0:?} not found")]
    MissingGroup(String),

    /// The group contains an interface resource.
    #[error("interface resource {0:?} cannot be merged")]
    Interface(String),

    /// A group member and the mask disagree on row count.
    #[error("group member has {rows} rows but the mask has {mask}")]
    LengthMismatch { rows: usize, mask: usize },

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Merge two resource groups through a boolean mask.
///
/// Takes rows from `first`'s group where `mask` is true and rows from
/// `second`'s group where it is false. The merged package is written to
/// `output_backend` (default: in-memory) with the header settings from
/// `options`, and finalized when the backend supports serialization.
pub fn merge_with_mask(
    first: &impl PackageView,
    first_label: &str,
    second: &impl PackageView,
    second_label: &str,
    mask: &[bool],
    output_backend: Option<Box<dyn StorageBackend>>,
    options: Option<PackageOptions>,
) -> MergeResult<Datapackage> {
    let add_suffix = first_label == second_label;
    if add_suffix {
        warn!(
            label = first_label,
            "identical group labels; adding _true/_false suffixes"
        );
    }

    let mut first_group = first
        .groups()
        .swap_remove(first_label)
        .ok_or_else(|| MergeError::MissingGroup(first_label.to_string()))?;
    let mut second_group = second
        .groups()
        .swap_remove(second_label)
        .ok_or_else(|| MergeError::MissingGroup(second_label.to_string()))?;

    for group in [&first_group, &second_group] {
        for record in group.resources() {
            if record.profile == Profile::Interface {
                return Err(MergeError::Interface(record.name.clone()));
            }
            // Only array members are row-filtered, so only they must
            // agree with the mask.
            if record.mediatype == Some(Mediatype::Binary) {
                if let Some(rows) = record.nrows {
                    if rows != mask.len() {
                        return Err(MergeError::LengthMismatch {
                            rows,
                            mask: mask.len(),
                        });
                    }
                }
            }
        }
    }

    let backend = output_backend.unwrap_or_else(|| Box::new(InMemoryBackend::new()));
    let mut out = Datapackage::create(backend, options.unwrap_or_default())?;

    let inverted: Vec<bool> = mask.iter().map(|flag| !flag).collect();
    append_group(&mut out, &mut first_group, mask, if add_suffix { "_true" } else { "" })?;
    append_group(
        &mut out,
        &mut second_group,
        &inverted,
        if add_suffix { "_false" } else { "" },
    )?;

    match out.finalize_serialization() {
        Ok(()) => {}
        Err(PackageError::Store(StoreError::NotSerializable)) => {
            debug!("in-memory output; merged package not serialized");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(out)
}

fn append_group(
    out: &mut Datapackage,
    group: &mut FilteredDatapackage,
    mask: &[bool],
    suffix: &str,
) -> MergeResult<()> {
    for index in 0..group.len() {
        let (slot, mut record) = group.get_resource(index)?;
        let filtered = {
            let payload = slot.borrow();
            match &*payload {
                Payload::Array(array) => {
                    if array.len() != mask.len() {
                        return Err(MergeError::LengthMismatch {
                            rows: array.len(),
                            mask: mask.len(),
                        });
                    }
                    let kept = array.filter_rows(mask);
                    record.nrows = Some(kept.len());
                    Payload::Array(kept)
                }
                // Table and JSON metadata are passed through unfiltered.
                Payload::Table(table) => Payload::Table(table.clone()),
                Payload::Json(value) => Payload::Json(value.clone()),
                _ => return Err(MergeError::Interface(record.name.clone())),
            }
        };

        // Names without a recognized kind suffix have no insertion point
        // and keep their labels.
        if !suffix.is_empty() {
            if let Ok((stem, kind)) = split_kind_suffix(&record.name) {
                let relabeled = format!("{stem}{suffix}");
                record.name = member_name(&relabeled, kind);
                if let Some(mediatype) = record.mediatype {
                    record.path = Some(member_path(&relabeled, kind, mediatype));
                }
                record.group = Some(relabeled);
            }
        }
        // push_resource re-encodes and stamps a fresh checksum.
        record.hash = None;
        out.push_resource(record, filtered)?;
    }
    Ok(())
}
