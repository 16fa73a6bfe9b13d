//! Index reconciliation: rewriting the integer references in indices arrays.
//!
//! The integers in a package's indices arrays belong to the producer's id
//! space and mean nothing to a consumer. A tabular metadata resource bridges
//! the two: its `valid_for` declaration names the indices arrays (and the
//! axis of each) that its id column describes, and its remaining columns
//! identify entities independently of any id space.
//!
//! Two operations use that bridge:
//!
//! - [`reset_index`] renumbers the referenced columns to dense sequential
//!   integers starting at zero.
//! - [`reindex`] rewrites the referenced columns to the ids used by a
//!   destination database, matching records on their identifying fields.
//!
//! Both edit payloads in place through the shared data slots and register
//! the touched resources in the package's dirty-set; call
//! `write_modified()` afterwards to persist.

use std::collections::BTreeMap;

use matpack_core::{Datapackage, PackageError, PackageView, Payload, Slot};
use matpack_types::{member_name, ArrayData, Axis, ResourceKind, Scalar, TypeError};
use tracing::debug;

/// Errors from index reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    /// The named metadata resource does not hold a table.
    #[error("resource {0:?} is not tabular metadata")]
    NotTabular(String),

    /// A `valid_for` target does not hold an indices array.
    #[error("resource {0:?} does not hold an indices array")]
    NotIndices(String),

    /// A required column is absent.
    #[error("{resource} is missing column {column:?}")]
    MissingColumn { resource: String, column: String },

    /// A metadata row has no destination match, or an index value has no
    /// metadata row.
    #[error("no matching record: {0}")]
    NoMatch(String),

    /// Multiple destination records share identifying fields.
    #[error("non-unique: {0}")]
    NonUnique(String),

    /// A destination id does not fit in an index column.
    #[error("id {0} does not fit in an index column")]
    IdOutOfRange(i64),

    /// An id cell holds something other than an integer.
    #[error("id cell is not an integer: {0:?}")]
    NonIntegerId(String),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Types(#[from] TypeError),
}

/// Result alias for reconciliation operations.
pub type ReindexResult<T> = Result<T, ReindexError>;

/// The metadata table plus the indices-array columns it is valid for.
struct CsvReferences {
    table_index: usize,
    table_slot: Slot,
    /// Resource position, shared slot, and referenced axis per target.
    columns: Vec<(usize, Slot, Axis)>,
}

fn csv_references(dp: &mut Datapackage, metadata_name: &str) -> ReindexResult<CsvReferences> {
    let table_index = dp.resource_index(metadata_name.into())?;
    let (table_slot, record) = dp.get_resource(table_index)?;
    if table_slot.borrow().as_table().is_none() {
        return Err(ReindexError::NotTabular(metadata_name.to_string()));
    }
    let valid_for = record
        .valid_for
        .ok_or_else(|| PackageError::MissingField("valid_for".to_string()))?;

    let mut columns: Vec<(usize, Slot, Axis)> = Vec::new();
    for (group, axis) in valid_for {
        let name = member_name(&group, ResourceKind::Indices);
        let index = dp.resource_index(name.as_str().into())?;
        if columns.iter().any(|(i, _, a)| *i == index && *a == axis) {
            continue;
        }
        let (slot, _) = dp.get_resource(index)?;
        if !matches!(&*slot.borrow(), Payload::Array(ArrayData::Indices(_))) {
            return Err(ReindexError::NotIndices(name));
        }
        columns.push((index, slot, axis));
    }
    Ok(CsvReferences {
        table_index,
        table_slot,
        columns,
    })
}

fn column_values(slot: &Slot, axis: Axis) -> Vec<i32> {
    match &*slot.borrow() {
        Payload::Array(ArrayData::Indices(pairs)) => pairs
            .iter()
            .map(|pair| match axis {
                Axis::Row => pair.row,
                Axis::Col => pair.col,
            })
            .collect(),
        // Checked when the reference set was built.
        _ => unreachable!("reference target is an indices array"),
    }
}

fn remap_column(slot: &Slot, axis: Axis, mapper: &BTreeMap<i32, i32>) -> ReindexResult<()> {
    if let Payload::Array(ArrayData::Indices(pairs)) = &mut *slot.borrow_mut() {
        for pair in pairs.iter_mut() {
            let cell = match axis {
                Axis::Row => &mut pair.row,
                Axis::Col => &mut pair.col,
            };
            *cell = *mapper.get(cell).ok_or_else(|| {
                ReindexError::NoMatch(format!("index value {cell} has no metadata row"))
            })?;
        }
    }
    Ok(())
}

/// Renumber the referenced index columns to `0..n`, in place.
///
/// The distinct values across every referenced column are collected, sorted
/// ascending, and mapped to sequential integers starting at zero. Returns
/// the applied old-to-new mapping.
pub fn reset_index(
    dp: &mut Datapackage,
    metadata_name: &str,
) -> ReindexResult<BTreeMap<i32, i32>> {
    let refs = csv_references(dp, metadata_name)?;

    let mut mapper: BTreeMap<i32, i32> = BTreeMap::new();
    for (_, slot, axis) in &refs.columns {
        for value in column_values(slot, *axis) {
            let next = mapper.len() as i32;
            mapper.entry(value).or_insert(next);
        }
    }
    // BTreeMap iteration is value-ordered, so reassign densely in that order.
    let ordered: Vec<i32> = mapper.keys().copied().collect();
    for (position, value) in ordered.into_iter().enumerate() {
        mapper.insert(value, position as i32);
    }

    for (index, slot, axis) in &refs.columns {
        remap_column(slot, *axis, &mapper)?;
        dp.mark_modified(*index)?;
    }
    debug!(metadata_name, distinct = mapper.len(), "reset index columns");
    Ok(mapper)
}

/// Rewrite the referenced index columns to a destination's id space.
///
/// Each metadata row is matched against `destination` on `fields` (default:
/// every table column except the package id column, sorted); the match's
/// destination id replaces the row's package id wherever it occurs in the
/// referenced columns, and the table's id column is updated to match.
pub fn reindex(
    dp: &mut Datapackage,
    metadata_name: &str,
    destination: &[BTreeMap<String, Scalar>],
    fields: Option<Vec<String>>,
    id_field_datapackage: &str,
    id_field_destination: &str,
) -> ReindexResult<()> {
    let refs = csv_references(dp, metadata_name)?;

    let mapper = {
        let payload = refs.table_slot.borrow();
        let table = payload
            .as_table()
            .ok_or_else(|| ReindexError::NotTabular(metadata_name.to_string()))?;
        let id_column = table.column_index(id_field_datapackage).map_err(|_| {
            ReindexError::MissingColumn {
                resource: format!("resource {metadata_name:?}"),
                column: id_field_datapackage.to_string(),
            }
        })?;
        let fields = fields.unwrap_or_else(|| {
            let mut names: Vec<String> = table
                .columns()
                .iter()
                .filter(|c| c.as_str() != id_field_datapackage)
                .cloned()
                .collect();
            names.sort();
            names
        });

        // Destination key -> id; a duplicate key poisons its entry.
        let mut dest_mapper: BTreeMap<Vec<Scalar>, Option<i64>> = BTreeMap::new();
        for record in destination {
            let key: Vec<Scalar> = fields
                .iter()
                .map(|field| record.get(field).cloned().unwrap_or(Scalar::Null))
                .collect();
            let id = record
                .get(id_field_destination)
                .ok_or_else(|| ReindexError::MissingColumn {
                    resource: "destination record".to_string(),
                    column: id_field_destination.to_string(),
                })?;
            let id = id
                .as_int()
                .ok_or_else(|| ReindexError::NonIntegerId(id.to_cell()))?;
            match dest_mapper.entry(key) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(Some(id));
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    slot.insert(None);
                }
            }
        }

        let mut mapper: BTreeMap<i32, i32> = BTreeMap::new();
        for row in 0..table.len() {
            let key: Vec<Scalar> = fields
                .iter()
                .map(|field| {
                    table
                        .column_index(field)
                        .map(|c| table.cell(row, c).clone())
                        .unwrap_or(Scalar::Null)
                })
                .collect();
            let old = table
                .cell(row, id_column)
                .as_int()
                .ok_or_else(|| ReindexError::NonIntegerId(table.cell(row, id_column).to_cell()))?;
            let old = i32::try_from(old).map_err(|_| ReindexError::IdOutOfRange(old))?;
            let new = match dest_mapper.get(&key) {
                None => {
                    return Err(ReindexError::NoMatch(format!(
                        "destination records have no match for key {key:?}"
                    )))
                }
                Some(None) => {
                    return Err(ReindexError::NonUnique(format!(
                        "multiple destination records match {key:?}"
                    )))
                }
                Some(Some(id)) => i32::try_from(*id).map_err(|_| ReindexError::IdOutOfRange(*id))?,
            };
            mapper.insert(old, new);
        }
        mapper
    };

    for (index, slot, axis) in &refs.columns {
        remap_column(slot, *axis, &mapper)?;
        dp.mark_modified(*index)?;
    }

    // The table's own id column moves to the destination id space too.
    {
        let mut payload = refs.table_slot.borrow_mut();
        if let Payload::Table(table) = &mut *payload {
            let id_column = table.column_index(id_field_datapackage)?;
            for row in 0..table.len() {
                if let Some(old) = table.cell(row, id_column).as_int() {
                    if let Some(new) = i32::try_from(old).ok().and_then(|o| mapper.get(&o)) {
                        table.set_cell(row, id_column, Scalar::Int(i64::from(*new)));
                    }
                }
            }
        }
    }
    dp.mark_modified(refs.table_index)?;
    debug!(metadata_name, remapped = mapper.len(), "reindexed to destination ids");
    Ok(())
}
