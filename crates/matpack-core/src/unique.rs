//! Minimal identifying field sets for metadata records.

use std::collections::{BTreeMap, BTreeSet};

use matpack_types::Scalar;
use tracing::debug;

use crate::error::{PackageError, PackageResult};

/// Find a small set of fields whose combined values distinguish every record.
///
/// Greedy: each round adds the candidate field whose inclusion yields the
/// most distinct value tuples so far, breaking ties toward the
/// lexicographically later field name. The `id` field is always excluded, in
/// addition to anything in `exclude`.
///
/// When no field combination can tell all records apart the result depends
/// on `raise_error`: `true` fails with a uniqueness error, `false` returns
/// the exhausted (non-identifying) field set.
pub fn greedy_set_cover(
    records: &[BTreeMap<String, Scalar>],
    exclude: &[&str],
    raise_error: bool,
) -> PackageResult<BTreeSet<String>> {
    let mut chosen: BTreeSet<String> = BTreeSet::new();
    if records.is_empty() {
        return Ok(chosen);
    }

    let mut candidates: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .filter(|field| *field != "id" && !exclude.contains(field))
        .collect();

    while distinct_tuples(records, &chosen) < records.len() {
        let best = candidates
            .iter()
            .copied()
            .map(|field| {
                let mut trial: BTreeSet<String> = chosen.clone();
                trial.insert(field.to_string());
                (distinct_tuples(records, &trial), field)
            })
            // On a distinct-count tie, max_by picks the later element in
            // iteration order, which is the lexicographically later name.
            .max_by(|a, b| a.cmp(b));
        match best {
            Some((_, field)) => {
                debug!(field, "adding field to identifying set");
                candidates.remove(field);
                chosen.insert(field.to_string());
            }
            None => {
                if raise_error {
                    return Err(PackageError::NonUnique(
                        "no field combination distinguishes all records".to_string(),
                    ));
                }
                return Ok(chosen);
            }
        }
    }
    Ok(chosen)
}

fn distinct_tuples(records: &[BTreeMap<String, Scalar>], fields: &BTreeSet<String>) -> usize {
    if fields.is_empty() {
        return usize::from(records.len() == 1);
    }
    let tuples: BTreeSet<Vec<Option<&Scalar>>> = records
        .iter()
        .map(|record| fields.iter().map(|field| record.get(field)).collect())
        .collect();
    tuples.len()
}
