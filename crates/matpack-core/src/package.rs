//! The datapackage: ordered resource records plus parallel data objects.

use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use matpack_store::{codec, StorageBackend, StoreError};
use matpack_types::{
    check_name, clean_name, member_name, member_path, ArrayData, Axis, DataSource, Distribution,
    IndexPair, License, Manifest, Matrix, Mediatype, Profile, Resource, ResourceKind, Table,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PackageError, PackageResult};
use crate::payload::{slot, Payload, Slot};
use crate::proxy::ReadProxy;
use crate::view::{PackageView, ResourceRef};

/// Backend-relative path of the manifest.
pub const MANIFEST_PATH: &str = "datapackage.json";

/// Header settings for a fresh datapackage.
///
/// `name` and `id` default to fresh UUIDs; the policy flags default to
/// `combinatorial = false`, `sequential = false`, no `seed`,
/// `sum_intra_duplicates = true`, `sum_inter_duplicates = false`.
#[derive(Debug)]
pub struct PackageOptions {
    pub name: Option<String>,
    pub id: Option<String>,
    pub licenses: Option<Vec<License>>,
    pub combinatorial: bool,
    pub sequential: bool,
    pub seed: Option<i64>,
    pub sum_intra_duplicates: bool,
    pub sum_inter_duplicates: bool,
    pub extra: Map<String, Value>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            name: None,
            id: None,
            licenses: None,
            combinatorial: false,
            sequential: false,
            seed: None,
            sum_intra_duplicates: true,
            sum_inter_duplicates: false,
            extra: Map::new(),
        }
    }
}

/// A datapackage: manifest, data objects, and the backend that owns both.
///
/// Create one with [`Datapackage::create`] or reconstruct one with
/// [`Datapackage::load`]. The resource list and the data list always have
/// the same length; this arity is checked before every mutating or
/// finalizing operation. After [`finalize_serialization`] the list shape is
/// sealed, though in-place value edits can still be flushed with
/// [`write_modified`].
///
/// [`finalize_serialization`]: Datapackage::finalize_serialization
/// [`write_modified`]: Datapackage::write_modified
pub struct Datapackage {
    backend: Box<dyn StorageBackend>,
    manifest: Manifest,
    data: Vec<Slot>,
    modified: BTreeSet<usize>,
    finalized: bool,
    check_integrity: bool,
}

impl Datapackage {
    /// Start a fresh datapackage on the given backend.
    pub fn create(
        backend: Box<dyn StorageBackend>,
        options: PackageOptions,
    ) -> PackageResult<Self> {
        let name = clean_name(
            &options
                .name
                .unwrap_or_else(|| Uuid::now_v7().simple().to_string()),
        );
        check_name(&name)?;
        let id = options
            .id
            .unwrap_or_else(|| Uuid::now_v7().simple().to_string());
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let mut manifest = Manifest::new(name, id, created);
        if let Some(licenses) = options.licenses {
            manifest.licenses = licenses;
        }
        manifest.combinatorial = options.combinatorial;
        manifest.sequential = options.sequential;
        manifest.seed = options.seed;
        manifest.sum_intra_duplicates = options.sum_intra_duplicates;
        manifest.sum_inter_duplicates = options.sum_inter_duplicates;
        for (key, value) in options.extra {
            manifest.extra.entry(key).or_insert(value);
        }

        debug!(name = %manifest.name, "created datapackage");
        Ok(Self {
            backend,
            manifest,
            data: Vec::new(),
            modified: BTreeSet::new(),
            finalized: false,
            check_integrity: false,
        })
    }

    /// A fresh scratch package on an in-memory backend.
    pub fn in_memory() -> PackageResult<Self> {
        Self::create(
            Box::new(matpack_store::InMemoryBackend::new()),
            PackageOptions::default(),
        )
    }

    /// Reconstruct a datapackage from a backend holding a manifest.
    ///
    /// Every persisted resource is realized as a lazy [`ReadProxy`] over an
    /// open stream; interface resources load as dehydrated placeholders and
    /// must be rehydrated before use. With `check_integrity`, stored
    /// checksums are verified when each proxy materializes.
    pub fn load(backend: Box<dyn StorageBackend>, check_integrity: bool) -> PackageResult<Self> {
        use std::io::Read;

        let mut stream = backend.open_for_read(MANIFEST_PATH)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).map_err(StoreError::from)?;
        let mut raw: Value =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;

        let raw_resources = match raw.get_mut("resources") {
            Some(value) => std::mem::replace(value, Value::Array(Vec::new())),
            None => Value::Array(Vec::new()),
        };
        let mut manifest: Manifest =
            serde_json::from_value(raw).map_err(|e| StoreError::Codec(e.to_string()))?;
        manifest.resources = parse_resources(raw_resources)?;

        let mut data = Vec::with_capacity(manifest.resources.len());
        for resource in &manifest.resources {
            data.push(slot(load_slot(backend.as_ref(), resource, check_integrity)?));
        }

        debug!(name = %manifest.name, resources = manifest.resources.len(), "loaded datapackage");
        Ok(Self {
            backend,
            manifest,
            data,
            modified: BTreeSet::new(),
            finalized: false,
            check_integrity,
        })
    }

    // -----------------------------------------------------------------
    // Invariant checks
    // -----------------------------------------------------------------

    fn check_arity(&self) -> PackageResult<()> {
        if self.manifest.resources.len() != self.data.len() {
            return Err(PackageError::LengthMismatch {
                resources: self.manifest.resources.len(),
                data: self.data.len(),
            });
        }
        Ok(())
    }

    fn check_mutable(&self) -> PackageResult<()> {
        if self.finalized {
            return Err(PackageError::Closed);
        }
        self.check_arity()
    }

    fn ensure_name_free(&self, name: &str) -> PackageResult<()> {
        for record in &self.manifest.resources {
            if record.name == name {
                return Err(PackageError::NonUnique(format!(
                    "resource name {name:?} already used"
                )));
            }
            if record.group.as_deref() == Some(name) {
                return Err(PackageError::NonUnique(format!(
                    "name {name:?} collides with an existing group label"
                )));
            }
        }
        Ok(())
    }

    fn ensure_group_free(&self, group: &str) -> PackageResult<()> {
        for record in &self.manifest.resources {
            if record.name == group {
                return Err(PackageError::NonUnique(format!(
                    "group label {group:?} collides with an existing resource name"
                )));
            }
            if record.group.as_deref() == Some(group) {
                return Err(PackageError::NonUnique(format!(
                    "group label {group:?} already used"
                )));
            }
        }
        Ok(())
    }

    fn check_rows(member: &'static str, expected: usize, got: usize) -> PackageResult<()> {
        if expected != got {
            return Err(PackageError::ShapeMismatch {
                member,
                expected,
                got,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Adding resources
    // -----------------------------------------------------------------

    /// Low-level append of one record and its payload.
    ///
    /// Validates name uniqueness and, for persisted records, encodes the
    /// payload to the backend and stamps the checksum. Higher-level `add_*`
    /// operations and the merge engine are built on this.
    pub fn push_resource(&mut self, mut resource: Resource, payload: Payload) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(&resource.name)?;
        self.ensure_name_free(&resource.name)?;
        if let Some(group) = &resource.group {
            for record in &self.manifest.resources {
                if &record.name == group {
                    return Err(PackageError::NonUnique(format!(
                        "group label {group:?} collides with an existing resource name"
                    )));
                }
            }
        }

        if resource.profile == Profile::DataResource {
            let path = resource
                .path
                .clone()
                .ok_or_else(|| PackageError::MissingField("path".to_string()))?;
            let mediatype = resource
                .mediatype
                .ok_or_else(|| PackageError::MissingField("mediatype".to_string()))?;
            let bytes = match (&payload, mediatype) {
                (Payload::Array(array), Mediatype::Binary) => codec::encode_array(array)?,
                (Payload::Table(table), Mediatype::Csv) => codec::encode_table(table)?,
                (Payload::Json(value), Mediatype::Json) => codec::encode_json(value)?,
                (payload, mediatype) => {
                    return Err(PackageError::WrongDatatype(format!(
                        "payload {payload:?} cannot be encoded as {mediatype:?}"
                    )))
                }
            };
            codec::write_resource(self.backend.as_mut(), &path, &bytes)?;
            resource.hash = Some(codec::checksum(&bytes));
        }

        self.manifest.resources.push(resource);
        self.data.push(slot(payload));
        Ok(())
    }

    fn push_array_member(
        &mut self,
        group: &str,
        kind: ResourceKind,
        array: ArrayData,
        extra: &Map<String, Value>,
    ) -> PackageResult<()> {
        let nrows = array.len();
        let resource = Resource {
            name: member_name(group, kind),
            profile: Profile::DataResource,
            mediatype: Some(Mediatype::Binary),
            format: Some(Mediatype::Binary.format_label().to_string()),
            path: Some(member_path(group, kind, Mediatype::Binary)),
            group: Some(group.to_string()),
            kind: Some(kind),
            nrows: Some(nrows),
            valid_for: None,
            data_array: None,
            config: None,
            hash: None,
            extra: extra.clone(),
        };
        self.push_resource(resource, Payload::Array(array))
    }

    /// Add a logical persistent vector as one resource group.
    ///
    /// `data`, `flip`, and `distributions` must be row-count-equal to
    /// `indices`. An all-false `flip` is silently skipped, as is a
    /// `distributions` member in which no row states a real uncertainty
    /// distribution (discriminator `>= 2`); both are storage optimizations,
    /// not errors.
    pub fn add_persistent_vector(
        &mut self,
        group: &str,
        indices: Vec<IndexPair>,
        data: Option<Vec<f64>>,
        flip: Option<Vec<bool>>,
        distributions: Option<Vec<Distribution>>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(group)?;
        self.ensure_group_free(group)?;
        let nrows = indices.len();
        if let Some(data) = &data {
            Self::check_rows("data", nrows, data.len())?;
        }
        if let Some(flip) = &flip {
            Self::check_rows("flip", nrows, flip.len())?;
        }
        if let Some(distributions) = &distributions {
            Self::check_rows("distributions", nrows, distributions.len())?;
        }

        let extra = extra.unwrap_or_default();
        self.push_array_member(group, ResourceKind::Indices, ArrayData::Indices(indices), &extra)?;
        if let Some(data) = data {
            self.push_array_member(group, ResourceKind::Data, ArrayData::Vector(data), &extra)?;
        }
        self.maybe_push_flip(group, flip, &extra)?;
        if let Some(distributions) = distributions {
            if distributions.iter().any(Distribution::is_stated) {
                self.push_array_member(
                    group,
                    ResourceKind::Distributions,
                    ArrayData::Distributions(distributions),
                    &extra,
                )?;
            } else {
                debug!(group, "no stated uncertainty; skipping distributions member");
            }
        }
        Ok(())
    }

    /// Add a logical persistent array (2-D data) as one resource group.
    pub fn add_persistent_array(
        &mut self,
        group: &str,
        indices: Vec<IndexPair>,
        data: Matrix,
        flip: Option<Vec<bool>>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(group)?;
        self.ensure_group_free(group)?;
        let nrows = indices.len();
        Self::check_rows("data", nrows, data.nrows())?;
        if let Some(flip) = &flip {
            Self::check_rows("flip", nrows, flip.len())?;
        }

        let extra = extra.unwrap_or_default();
        self.push_array_member(group, ResourceKind::Indices, ArrayData::Indices(indices), &extra)?;
        self.push_array_member(group, ResourceKind::Data, ArrayData::Array(data), &extra)?;
        self.maybe_push_flip(group, flip, &extra)
    }

    fn maybe_push_flip(
        &mut self,
        group: &str,
        flip: Option<Vec<bool>>,
        extra: &Map<String, Value>,
    ) -> PackageResult<()> {
        if let Some(flip) = flip {
            if flip.iter().any(|&flipped| flipped) {
                self.push_array_member(group, ResourceKind::Flip, ArrayData::Flip(flip), extra)?;
            } else {
                debug!(group, "all-false flip; skipping member");
            }
        }
        Ok(())
    }

    fn add_dynamic(
        &mut self,
        group: &str,
        source: Box<dyn DataSource>,
        indices: Vec<IndexPair>,
        flip: Option<Vec<bool>>,
        config: Option<Map<String, Value>>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(group)?;
        self.ensure_group_free(group)?;
        let nrows = indices.len();
        Self::check_rows("interface", nrows, source.len())?;
        if let Some(flip) = &flip {
            Self::check_rows("flip", nrows, flip.len())?;
        }

        let extra = extra.unwrap_or_default();
        self.push_array_member(group, ResourceKind::Indices, ArrayData::Indices(indices), &extra)?;
        self.maybe_push_flip(group, flip, &extra)?;

        let resource = Resource {
            name: member_name(group, ResourceKind::Data),
            profile: Profile::Interface,
            mediatype: None,
            format: None,
            path: None,
            group: Some(group.to_string()),
            kind: Some(ResourceKind::Data),
            nrows: Some(nrows),
            valid_for: None,
            data_array: None,
            config,
            hash: None,
            extra,
        };
        self.push_resource(resource, Payload::Interface(source))
    }

    /// Add a vector group whose data member is a live external source.
    ///
    /// The indices (and any flip) persist as usual; the data slot holds the
    /// source object directly and is never serialized.
    pub fn add_dynamic_vector(
        &mut self,
        group: &str,
        source: Box<dyn DataSource>,
        indices: Vec<IndexPair>,
        flip: Option<Vec<bool>>,
        config: Option<Map<String, Value>>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.add_dynamic(group, source, indices, flip, config, extra)
    }

    /// Add an array group whose data member is a live external source.
    pub fn add_dynamic_array(
        &mut self,
        group: &str,
        source: Box<dyn DataSource>,
        indices: Vec<IndexPair>,
        flip: Option<Vec<bool>>,
        config: Option<Map<String, Value>>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.add_dynamic(group, source, indices, flip, config, extra)
    }

    /// Add a tabular metadata resource persisted as CSV.
    ///
    /// `valid_for` declares which indices arrays the table's id column maps
    /// to: `(resource_group_name, Row | Col)` per entry. Every referenced
    /// group must already have an indices member in this package.
    pub fn add_csv_metadata(
        &mut self,
        name: &str,
        table: Table,
        valid_for: Vec<(String, Axis)>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(name)?;
        self.ensure_name_free(name)?;
        for (group, _) in &valid_for {
            let indices = member_name(group, ResourceKind::Indices);
            if !self.manifest.resources.iter().any(|r| r.name == indices) {
                return Err(PackageError::MissingResource(indices));
            }
        }

        let resource = Resource {
            name: name.to_string(),
            profile: Profile::DataResource,
            mediatype: Some(Mediatype::Csv),
            format: Some(Mediatype::Csv.format_label().to_string()),
            path: Some(format!("{name}.csv")),
            group: None,
            kind: None,
            nrows: Some(table.len()),
            valid_for: Some(valid_for),
            data_array: None,
            config: None,
            hash: None,
            extra: extra.unwrap_or_default(),
        };
        self.push_resource(resource, Payload::Table(table))
    }

    /// Add a free-form JSON metadata resource.
    ///
    /// `data_array` optionally names the resource this metadata annotates.
    pub fn add_json_metadata(
        &mut self,
        name: &str,
        value: Value,
        data_array: Option<String>,
        extra: Option<Map<String, Value>>,
    ) -> PackageResult<()> {
        self.check_mutable()?;
        check_name(name)?;
        self.ensure_name_free(name)?;
        if let Some(target) = &data_array {
            if !self.manifest.resources.iter().any(|r| &r.name == target) {
                return Err(PackageError::MissingResource(target.clone()));
            }
        }

        let resource = Resource {
            name: name.to_string(),
            profile: Profile::DataResource,
            mediatype: Some(Mediatype::Json),
            format: Some(Mediatype::Json.format_label().to_string()),
            path: Some(format!("{name}.json")),
            group: None,
            kind: None,
            nrows: None,
            valid_for: None,
            data_array,
            config: None,
            hash: None,
            extra: extra.unwrap_or_default(),
        };
        self.push_resource(resource, Payload::Json(value))
    }

    // -----------------------------------------------------------------
    // Deleting resources
    // -----------------------------------------------------------------

    fn check_deletable(&self) -> PackageResult<()> {
        self.check_mutable()?;
        if !self.modified.is_empty() {
            return Err(PackageError::PotentialInconsistency);
        }
        Ok(())
    }

    /// Delete one resource and its backend file.
    pub fn del_resource<'a>(
        &mut self,
        reference: impl Into<ResourceRef<'a>>,
    ) -> PackageResult<()> {
        self.check_deletable()?;
        let index = self.resource_index(reference.into())?;
        self.remove_at(index)
    }

    /// Delete every resource in a group, with backend files.
    pub fn del_resource_group(&mut self, group: &str) -> PackageResult<()> {
        self.check_deletable()?;
        let members: Vec<usize> = self
            .manifest
            .resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.group.as_deref() == Some(group))
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            return Err(PackageError::MissingResource(group.to_string()));
        }
        for index in members.into_iter().rev() {
            self.remove_at(index)?;
        }
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> PackageResult<()> {
        if let Some(path) = self.manifest.resources[index].path.clone() {
            if self.backend.exists(&path) {
                self.backend.remove(&path)?;
            }
        }
        self.manifest.resources.remove(index);
        self.data.remove(index);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Finalization and modification flushing
    // -----------------------------------------------------------------

    /// Seal the package: dehydrate interfaces, persist the manifest, close
    /// the backend.
    ///
    /// Fails with `Closed` when called twice and with `NotSerializable` on
    /// a backend that cannot persist a manifest (pure memory backend).
    pub fn finalize_serialization(&mut self) -> PackageResult<()> {
        if self.finalized {
            return Err(PackageError::Closed);
        }
        for (record, payload) in self.manifest.resources.iter().zip(&self.data) {
            if record.profile == Profile::Interface {
                *payload.borrow_mut() = Payload::Dehydrated;
            }
        }
        self.check_arity()?;
        if !self.backend.serializable() {
            return Err(StoreError::NotSerializable.into());
        }

        let bytes = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        codec::write_resource(self.backend.as_mut(), MANIFEST_PATH, &bytes)?;
        self.backend.close()?;
        self.finalized = true;
        debug!(name = %self.manifest.name, "finalized datapackage");
        Ok(())
    }

    /// Whether the package has been sealed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Record an in-place edit so `write_modified` persists it later.
    pub fn mark_modified<'a>(
        &mut self,
        reference: impl Into<ResourceRef<'a>>,
    ) -> PackageResult<()> {
        let index = self.resource_index(reference.into())?;
        self.modified.insert(index);
        Ok(())
    }

    /// Indices of resources with unpersisted in-place edits.
    pub fn modified(&self) -> &BTreeSet<usize> {
        &self.modified
    }

    /// Persist every resource in the dirty-set, then clear it.
    ///
    /// Works on finalized packages too: payload rewrites change stored
    /// hashes, so the persisted manifest is refreshed alongside them.
    pub fn write_modified(&mut self) -> PackageResult<()> {
        self.check_arity()?;
        let pending: Vec<usize> = self.modified.iter().copied().collect();
        let flushed = !pending.is_empty();
        for index in pending {
            let record = &self.manifest.resources[index];
            let path = record
                .path
                .clone()
                .ok_or_else(|| PackageError::MissingField("path".to_string()))?;
            let bytes = {
                let payload = self.data[index].borrow();
                match &*payload {
                    Payload::Array(array) => codec::encode_array(array)?,
                    Payload::Table(table) => codec::encode_table(table)?,
                    Payload::Json(value) => codec::encode_json(value)?,
                    other => {
                        return Err(PackageError::WrongDatatype(format!(
                            "cannot persist unmaterialized slot {other:?}"
                        )))
                    }
                }
            };
            codec::write_resource(self.backend.as_mut(), &path, &bytes)?;
            self.manifest.resources[index].hash = Some(codec::checksum(&bytes));
            debug!(path, "rewrote modified resource");
        }
        if flushed && self.finalized {
            let bytes = serde_json::to_vec_pretty(&self.manifest)
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            codec::write_resource(self.backend.as_mut(), MANIFEST_PATH, &bytes)?;
        }
        self.modified.clear();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Interfaces
    // -----------------------------------------------------------------

    /// Group labels whose data slots still hold dehydrated placeholders.
    pub fn dehydrated_interfaces(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for (record, payload) in self.manifest.resources.iter().zip(&self.data) {
            if payload.borrow().is_dehydrated() {
                let label = record.group.clone().unwrap_or_else(|| record.name.clone());
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
        labels
    }

    /// Substitute a concrete source for a dehydrated interface slot.
    pub fn rehydrate_interface<'a>(
        &mut self,
        reference: impl Into<ResourceRef<'a>>,
        source: Box<dyn DataSource>,
    ) -> PackageResult<()> {
        let index = self.resource_index(reference.into())?;
        let record = &self.manifest.resources[index];
        if record.profile != Profile::Interface {
            return Err(PackageError::NotInterface(record.name.clone()));
        }
        *self.data[index].borrow_mut() = Payload::Interface(source);
        Ok(())
    }

    /// Rehydrate by constructing the source from the record's `config`.
    ///
    /// Fails with `MissingField("config")` when the record has none.
    pub fn rehydrate_interface_with_config<'a>(
        &mut self,
        reference: impl Into<ResourceRef<'a>>,
        factory: impl FnOnce(&Map<String, Value>) -> PackageResult<Box<dyn DataSource>>,
    ) -> PackageResult<()> {
        let index = self.resource_index(reference.into())?;
        let record = &self.manifest.resources[index];
        if record.profile != Profile::Interface {
            return Err(PackageError::NotInterface(record.name.clone()));
        }
        let config = record
            .config
            .as_ref()
            .ok_or_else(|| PackageError::MissingField("config".to_string()))?;
        let source = factory(config)?;
        *self.data[index].borrow_mut() = Payload::Interface(source);
        Ok(())
    }

    /// Whether checksums are verified as proxies materialize.
    pub fn checks_integrity(&self) -> bool {
        self.check_integrity
    }
}

impl PackageView for Datapackage {
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

impl std::fmt::Debug for Datapackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datapackage")
            .field("name", &self.manifest.name)
            .field("resources", &self.data.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

fn parse_resources(raw: Value) -> PackageResult<Vec<Resource>> {
    let entries = match raw {
        Value::Array(entries) => entries,
        _ => {
            return Err(StoreError::Codec("manifest `resources` is not an array".into()).into());
        }
    };
    let mut resources = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let profile = entry.get("profile").and_then(Value::as_str);
        if profile == Some("data-resource") {
            let mime = entry
                .get("mediatype")
                .and_then(Value::as_str)
                .ok_or_else(|| PackageError::MissingField("mediatype".to_string()))?;
            if Mediatype::from_mime(mime).is_err() {
                return Err(PackageError::InvalidMimetype {
                    resource: name,
                    mediatype: mime.to_string(),
                });
            }
        }
        resources.push(
            serde_json::from_value(entry).map_err(|e| StoreError::Codec(e.to_string()))?,
        );
    }
    Ok(resources)
}

fn load_slot(
    backend: &dyn StorageBackend,
    resource: &Resource,
    check_integrity: bool,
) -> PackageResult<Payload> {
    match resource.profile {
        Profile::Interface => {
            warn!(name = %resource.name, "interface resource loads dehydrated");
            Ok(Payload::Dehydrated)
        }
        Profile::DataResource => {
            let path = resource
                .path
                .as_ref()
                .ok_or_else(|| PackageError::MissingField("path".to_string()))?;
            let mediatype = resource
                .mediatype
                .ok_or_else(|| PackageError::MissingField("mediatype".to_string()))?;
            let stream = backend.open_for_read(path)?;
            let expected = if check_integrity {
                resource.hash.clone()
            } else {
                None
            };
            Ok(Payload::Proxy(ReadProxy::new(
                stream,
                mediatype,
                path.clone(),
                expected,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matpack_store::{DirectoryBackend, InMemoryBackend};
    use serde_json::json;
    use std::rc::Rc;

    fn indices3() -> Vec<IndexPair> {
        vec![
            IndexPair::new(1, 4),
            IndexPair::new(2, 5),
            IndexPair::new(3, 6),
        ]
    }

    fn stated() -> Distribution {
        Distribution {
            uncertainty_type: 3,
            loc: 1.0,
            scale: 0.5,
            ..Distribution::undefined()
        }
    }

    #[derive(Debug)]
    struct ConstantSource(Vec<f64>);

    impl DataSource for ConstantSource {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn sample(&mut self) -> ArrayData {
            ArrayData::Vector(self.0.clone())
        }
    }

    fn resource_names(dp: &Datapackage) -> Vec<String> {
        dp.resources().iter().map(|r| r.name.clone()).collect()
    }

    // -----------------------------------------------------------------
    // Adding vectors and arrays
    // -----------------------------------------------------------------

    #[test]
    fn vector_group_members_follow_naming_convention() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector(
            "veg",
            indices3(),
            Some(vec![2.0, 7.0, 12.0]),
            Some(vec![true, false, false]),
            None,
            None,
        )
        .unwrap();

        assert_eq!(
            resource_names(&dp),
            vec!["veg.indices", "veg.data", "veg.flip"]
        );
        let record = &dp.resources()[0];
        assert_eq!(record.group.as_deref(), Some("veg"));
        assert_eq!(record.nrows, Some(3));
        assert_eq!(record.path.as_deref(), Some("veg.indices.bin"));
        assert!(record.hash.as_deref().unwrap().starts_with("crc32:"));
    }

    #[test]
    fn all_false_flip_is_skipped() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector(
            "g",
            indices3(),
            Some(vec![1.0, 2.0, 3.0]),
            Some(vec![false, false, false]),
            None,
            None,
        )
        .unwrap();
        assert_eq!(resource_names(&dp), vec!["g.indices", "g.data"]);
    }

    #[test]
    fn unstated_distributions_are_skipped() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector(
            "g",
            indices3(),
            None,
            None,
            Some(vec![Distribution::undefined(); 3]),
            None,
        )
        .unwrap();
        assert_eq!(resource_names(&dp), vec!["g.indices"]);
    }

    #[test]
    fn one_stated_row_keeps_distributions() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector(
            "g",
            indices3(),
            None,
            None,
            Some(vec![Distribution::undefined(), stated(), Distribution::undefined()]),
            None,
        )
        .unwrap();
        assert_eq!(resource_names(&dp), vec!["g.indices", "g.distributions"]);
    }

    #[test]
    fn data_row_count_must_match_indices() {
        let mut dp = Datapackage::in_memory().unwrap();
        let err = dp
            .add_persistent_vector("g", indices3(), Some(vec![1.0]), None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PackageError::ShapeMismatch {
                member: "data",
                expected: 3,
                got: 1
            }
        ));
    }

    #[test]
    fn array_group_requires_matching_rows() {
        let mut dp = Datapackage::in_memory().unwrap();
        let data = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = dp
            .add_persistent_array("g", indices3(), data, None, None)
            .unwrap_err();
        assert!(matches!(err, PackageError::ShapeMismatch { .. }));

        let data = Matrix::new(3, 2, vec![1.0; 6]).unwrap();
        dp.add_persistent_array("g", indices3(), data, None, None)
            .unwrap();
        assert_eq!(resource_names(&dp), vec!["g.indices", "g.data"]);
    }

    #[test]
    fn duplicate_group_label_rejected() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap();
        let err = dp
            .add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, PackageError::NonUnique(_)));
    }

    #[test]
    fn group_label_may_not_collide_with_resource_name() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_json_metadata("g", json!({"note": "taken"}), None, None)
            .unwrap();
        let err = dp
            .add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, PackageError::NonUnique(_)));
    }

    #[test]
    fn invalid_group_name_rejected() {
        let mut dp = Datapackage::in_memory().unwrap();
        let err = dp
            .add_persistent_vector("bad name", indices3(), None, None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PackageError::Types(matpack_types::TypeError::InvalidName(_))
        ));
    }

    // -----------------------------------------------------------------
    // Metadata resources
    // -----------------------------------------------------------------

    fn id_table() -> Table {
        Table::new(
            vec!["id".into(), "label".into()],
            vec![
                vec![matpack_types::Scalar::Int(1), "a".into()],
                vec![matpack_types::Scalar::Int(2), "b".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_metadata_validates_referenced_groups() {
        let mut dp = Datapackage::in_memory().unwrap();
        let err = dp
            .add_csv_metadata(
                "xref",
                id_table(),
                vec![("missing".to_string(), Axis::Row)],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PackageError::MissingResource(name) if name == "missing.indices"));

        dp.add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap();
        dp.add_csv_metadata("xref", id_table(), vec![("g".to_string(), Axis::Row)], None)
            .unwrap();
        let record = dp.resources().last().unwrap();
        assert_eq!(record.path.as_deref(), Some("xref.csv"));
        assert_eq!(record.nrows, Some(2));
    }

    #[test]
    fn json_metadata_validates_data_array() {
        let mut dp = Datapackage::in_memory().unwrap();
        let err = dp
            .add_json_metadata("labels", json!(["x"]), Some("g.data".into()), None)
            .unwrap_err();
        assert!(matches!(err, PackageError::MissingResource(_)));

        dp.add_persistent_vector("g", indices3(), Some(vec![1.0, 2.0, 3.0]), None, None, None)
            .unwrap();
        dp.add_json_metadata("labels", json!(["x", "y", "z"]), Some("g.data".into()), None)
            .unwrap();
    }

    // -----------------------------------------------------------------
    // Resolution and materialization
    // -----------------------------------------------------------------

    #[test]
    fn get_resource_by_name_and_index() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector("g", indices3(), Some(vec![1.0, 2.0, 3.0]), None, None, None)
            .unwrap();

        let (by_name, record) = dp.get_resource("g.data").unwrap();
        assert_eq!(record.kind, Some(ResourceKind::Data));
        let (by_index, _) = dp.get_resource(1).unwrap();
        assert!(Rc::ptr_eq(&by_name, &by_index));

        assert!(matches!(
            dp.get_resource(9).unwrap_err(),
            PackageError::IndexOutOfRange { index: 9, len: 2 }
        ));
        assert!(matches!(
            dp.get_resource("nope").unwrap_err(),
            PackageError::MissingResource(_)
        ));
    }

    #[test]
    fn round_trip_through_directory_backend() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");

        let backend = DirectoryBackend::create(&root).unwrap();
        let mut dp = Datapackage::create(
            Box::new(backend),
            PackageOptions {
                name: Some("round-trip".into()),
                ..PackageOptions::default()
            },
        )
        .unwrap();
        dp.add_persistent_vector(
            "x",
            indices3(),
            Some(vec![2.0, 7.0, 12.0]),
            Some(vec![true, false, false]),
            None,
            None,
        )
        .unwrap();
        dp.finalize_serialization().unwrap();

        let mut loaded =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), true).unwrap();
        assert_eq!(loaded.manifest().name, "round-trip");

        let (data, _) = loaded.get_resource("x.data").unwrap();
        assert_eq!(
            data.borrow().as_array(),
            Some(&ArrayData::Vector(vec![2.0, 7.0, 12.0]))
        );
        let (flip, _) = loaded.get_resource("x.flip").unwrap();
        assert_eq!(
            flip.borrow().as_array(),
            Some(&ArrayData::Flip(vec![true, false, false]))
        );
        let (indices, _) = loaded.get_resource("x.indices").unwrap();
        assert_eq!(indices.borrow().as_array(), Some(&ArrayData::Indices(indices3())));
    }

    #[test]
    fn proxies_materialize_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            dp.add_persistent_vector("g", indices3(), None, None, None, None)
                .unwrap();
            dp.finalize_serialization().unwrap();
        }

        let mut loaded =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), false).unwrap();
        assert!(loaded.slots()[0].borrow().is_proxy());

        let (first, _) = loaded.get_resource("g.indices").unwrap();
        assert!(!loaded.slots()[0].borrow().is_proxy());
        let (second, _) = loaded.get_resource("g.indices").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn integrity_failure_detected_on_materialization() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            dp.add_persistent_vector("g", indices3(), None, None, None, None)
                .unwrap();
            dp.finalize_serialization().unwrap();
        }
        // Corrupt the payload behind the manifest's back.
        let corrupted = codec::encode_array(&ArrayData::Indices(vec![IndexPair::new(9, 9)])).unwrap();
        std::fs::write(root.join("g.indices.bin"), corrupted).unwrap();

        let mut checked =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), true).unwrap();
        assert!(matches!(
            checked.get_resource("g.indices").unwrap_err(),
            PackageError::FileIntegrity { .. }
        ));

        let mut unchecked =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), false).unwrap();
        assert!(unchecked.get_resource("g.indices").is_ok());
    }

    // -----------------------------------------------------------------
    // Finalization, deletion, dirty-set
    // -----------------------------------------------------------------

    #[test]
    fn finalize_twice_is_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut dp = Datapackage::create(
            Box::new(DirectoryBackend::create(dir.path().join("pkg")).unwrap()),
            PackageOptions::default(),
        )
        .unwrap();
        dp.finalize_serialization().unwrap();
        assert!(matches!(
            dp.finalize_serialization().unwrap_err(),
            PackageError::Closed
        ));
    }

    #[test]
    fn memory_backend_cannot_finalize() {
        let mut dp = Datapackage::in_memory().unwrap();
        assert!(matches!(
            dp.finalize_serialization().unwrap_err(),
            PackageError::Store(StoreError::NotSerializable)
        ));
        // The failure does not seal the package.
        assert!(!dp.is_finalized());
    }

    #[test]
    fn structural_mutation_after_finalize_is_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut dp = Datapackage::create(
            Box::new(DirectoryBackend::create(dir.path().join("pkg")).unwrap()),
            PackageOptions::default(),
        )
        .unwrap();
        dp.add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap();
        dp.finalize_serialization().unwrap();

        assert!(matches!(
            dp.add_persistent_vector("h", indices3(), None, None, None, None)
                .unwrap_err(),
            PackageError::Closed
        ));
        assert!(matches!(
            dp.del_resource("g.indices").unwrap_err(),
            PackageError::Closed
        ));
    }

    #[test]
    fn delete_with_pending_edits_is_inconsistent() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap();
        dp.mark_modified("g.indices").unwrap();
        assert!(matches!(
            dp.del_resource("g.indices").unwrap_err(),
            PackageError::PotentialInconsistency
        ));
        dp.write_modified().unwrap();
        dp.del_resource("g.indices").unwrap();
        assert!(dp.is_empty());
    }

    #[test]
    fn delete_group_removes_members_and_files() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector("g", indices3(), Some(vec![1.0, 2.0, 3.0]), None, None, None)
            .unwrap();
        dp.add_json_metadata("note", json!({"keep": true}), None, None)
            .unwrap();
        dp.del_resource_group("g").unwrap();
        assert_eq!(resource_names(&dp), vec!["note"]);
        assert!(matches!(
            dp.del_resource_group("g").unwrap_err(),
            PackageError::MissingResource(_)
        ));
    }

    #[test]
    fn write_modified_persists_in_place_edits() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            dp.add_persistent_vector("g", indices3(), None, None, None, None)
                .unwrap();

            let (slot, _) = dp.get_resource("g.indices").unwrap();
            if let Payload::Array(ArrayData::Indices(pairs)) = &mut *slot.borrow_mut() {
                pairs[0].row = 99;
            }
            dp.mark_modified("g.indices").unwrap();
            dp.write_modified().unwrap();
            assert!(dp.modified().is_empty());
            dp.finalize_serialization().unwrap();
        }

        let mut loaded =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), true).unwrap();
        let (slot, _) = loaded.get_resource("g.indices").unwrap();
        match &*slot.borrow() {
            Payload::Array(ArrayData::Indices(pairs)) => assert_eq!(pairs[0].row, 99),
            other => panic!("unexpected payload {other:?}"),
        };
    }

    #[test]
    fn write_modified_works_after_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            dp.add_persistent_vector("g", indices3(), None, None, None, None)
                .unwrap();
            dp.finalize_serialization().unwrap();
            assert!(dp.is_finalized());

            let (slot, _) = dp.get_resource("g.indices").unwrap();
            if let Payload::Array(ArrayData::Indices(pairs)) = &mut *slot.borrow_mut() {
                pairs[0].row = 42;
            }
            dp.mark_modified("g.indices").unwrap();
            dp.write_modified().unwrap();
        }

        // The refreshed manifest carries the new hash, so an
        // integrity-checked reload sees the edit.
        let mut loaded =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), true).unwrap();
        let (slot, _) = loaded.get_resource("g.indices").unwrap();
        match &*slot.borrow() {
            Payload::Array(ArrayData::Indices(pairs)) => assert_eq!(pairs[0].row, 42),
            other => panic!("unexpected payload {other:?}"),
        };
    }

    // -----------------------------------------------------------------
    // Interfaces
    // -----------------------------------------------------------------

    #[test]
    fn dynamic_vector_dehydrates_and_rehydrates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            let mut config = Map::new();
            config.insert("scale".into(), json!(2.0));
            dp.add_dynamic_vector(
                "live",
                Box::new(ConstantSource(vec![1.0, 2.0, 3.0])),
                indices3(),
                None,
                Some(config),
                None,
            )
            .unwrap();
            assert!(dp.slots()[1].borrow().is_interface());
            dp.finalize_serialization().unwrap();
            // Finalize replaces the live object with a placeholder.
            assert!(dp.slots()[1].borrow().is_dehydrated());
        }

        let mut loaded =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), false).unwrap();
        assert_eq!(loaded.dehydrated_interfaces(), vec!["live".to_string()]);

        loaded
            .rehydrate_interface_with_config("live.data", |config| {
                let scale = config["scale"].as_f64().unwrap();
                Ok(Box::new(ConstantSource(vec![scale; 3])))
            })
            .unwrap();
        assert!(loaded.dehydrated_interfaces().is_empty());
        let (slot, record) = loaded.get_resource("live.data").unwrap();
        assert_eq!(record.profile, Profile::Interface);
        assert!(slot.borrow().is_interface());
    }

    #[test]
    fn rehydrate_requires_interface_profile_and_config() {
        let mut dp = Datapackage::in_memory().unwrap();
        dp.add_persistent_vector("g", indices3(), None, None, None, None)
            .unwrap();
        assert!(matches!(
            dp.rehydrate_interface("g.indices", Box::new(ConstantSource(vec![]))),
            Err(PackageError::NotInterface(_))
        ));

        dp.add_dynamic_vector(
            "live",
            Box::new(ConstantSource(vec![0.0; 3])),
            indices3(),
            None,
            None,
            None,
        )
        .unwrap();
        assert!(matches!(
            dp.rehydrate_interface_with_config("live.data", |_| unreachable!()),
            Err(PackageError::MissingField(field)) if field == "config"
        ));
    }

    #[test]
    fn interface_source_row_count_must_match() {
        let mut dp = Datapackage::in_memory().unwrap();
        let err = dp
            .add_dynamic_vector(
                "live",
                Box::new(ConstantSource(vec![1.0])),
                indices3(),
                None,
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PackageError::ShapeMismatch { .. }));
    }

    // -----------------------------------------------------------------
    // Loading edge cases
    // -----------------------------------------------------------------

    #[test]
    fn unknown_mediatype_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        {
            let mut dp =
                Datapackage::create(Box::new(DirectoryBackend::create(&root).unwrap()), PackageOptions::default())
                    .unwrap();
            dp.add_persistent_vector("g", indices3(), None, None, None, None)
                .unwrap();
            dp.finalize_serialization().unwrap();
        }
        // Rewrite the manifest with a mediatype outside the closed set.
        let manifest_path = root.join(MANIFEST_PATH);
        let text = std::fs::read_to_string(&manifest_path)
            .unwrap()
            .replace("application/octet-stream", "application/x-parquet");
        std::fs::write(&manifest_path, text).unwrap();

        let err =
            Datapackage::load(Box::new(DirectoryBackend::open(&root).unwrap()), false).unwrap_err();
        assert!(matches!(
            err,
            PackageError::InvalidMimetype { resource, mediatype }
                if resource == "g.indices" && mediatype == "application/x-parquet"
        ));
    }
}
