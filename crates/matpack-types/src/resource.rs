//! Resource records: the metadata entries describing each payload.
//!
//! A resource record is a mapping with a handful of recognized keys plus
//! caller-supplied extras. Resources sharing a `group` label form one
//! logical persistent vector or array; member names follow the dotted
//! convention `{group}.{kind}` that the merge and reindex logic rely on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};

/// Whether a resource is a persisted payload or a live external source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Profile {
    /// Persisted payload with a backend-relative `path`.
    #[serde(rename = "data-resource")]
    DataResource,
    /// Live external data source; never serialized.
    #[serde(rename = "interface")]
    Interface,
}

/// The role a resource plays within its group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "indices")]
    Indices,
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "distributions")]
    Distributions,
    #[serde(rename = "flip")]
    Flip,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indices => "indices",
            Self::Data => "data",
            Self::Distributions => "distributions",
            Self::Flip => "flip",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "indices" => Some(Self::Indices),
            "data" => Some(Self::Data),
            "distributions" => Some(Self::Distributions),
            "flip" => Some(Self::Flip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The encoding of a persisted resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mediatype {
    /// Binary numeric arrays.
    #[serde(rename = "application/octet-stream")]
    Binary,
    /// Tabular metadata.
    #[serde(rename = "text/csv")]
    Csv,
    /// Free-form JSON metadata.
    #[serde(rename = "application/json")]
    Json,
}

impl Mediatype {
    /// The `format` discriminator stored next to the mediatype.
    pub fn format_label(&self) -> &'static str {
        match self {
            Self::Binary => "bin",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Binary => "application/octet-stream",
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }

    /// Parse a mime string, rejecting anything outside the closed set.
    pub fn from_mime(mime: &str) -> TypeResult<Self> {
        match mime {
            "application/octet-stream" => Ok(Self::Binary),
            "text/csv" => Ok(Self::Csv),
            "application/json" => Ok(Self::Json),
            other => Err(TypeError::UnknownMediatype(other.to_string())),
        }
    }
}

/// Which axis of an indices array a metadata table's id column maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "row")]
    Row,
    #[serde(rename = "col")]
    Col,
}

/// One resource record.
///
/// Serializes to the manifest's `resources` array. Unrecognized keys are
/// preserved in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<Mediatype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Backend-relative location; absent for interfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrows: Option<usize>,
    /// Cross-reference declaration for tabular metadata resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<Vec<(String, Axis)>>,
    /// Name of the data resource a JSON metadata resource annotates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_array: Option<String>,
    /// Constructor configuration for rehydrating an interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    /// `crc32:XXXXXXXX` checksum of the persisted bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    /// Resolve an attribute by key: recognized fields first, then `extra`.
    ///
    /// Used by attribute filtering; a missing attribute resolves to `None`,
    /// never to `Value::Null`.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        let known = match key {
            "name" => Some(Value::String(self.name.clone())),
            "profile" => serde_json::to_value(self.profile).ok(),
            "mediatype" => self.mediatype.map(|m| Value::String(m.as_mime().into())),
            "format" => self.format.clone().map(Value::String),
            "path" => self.path.clone().map(Value::String),
            "group" => self.group.clone().map(Value::String),
            "kind" => self.kind.map(|k| Value::String(k.as_str().into())),
            "nrows" => self.nrows.map(|n| Value::Number(n.into())),
            "data_array" => self.data_array.clone().map(Value::String),
            "hash" => self.hash.clone().map(Value::String),
            _ => None,
        };
        known.or_else(|| self.extra.get(key).cloned())
    }
}

/// Concrete resource name for a group member: `{group}.{kind}`.
pub fn member_name(group: &str, kind: ResourceKind) -> String {
    format!("{group}.{kind}")
}

/// Backend-relative path for a group member: `{group}.{kind}.{format}`.
pub fn member_path(group: &str, kind: ResourceKind, mediatype: Mediatype) -> String {
    format!("{group}.{kind}.{}", mediatype.format_label())
}

/// Split a member name into its stem and kind suffix.
///
/// `"foo.indices"` yields `("foo", Indices)`. Names without a recognized
/// trailing kind token are rejected; merge-suffix insertion depends on the
/// stem being well defined.
pub fn split_kind_suffix(name: &str) -> TypeResult<(&str, ResourceKind)> {
    let (stem, last) = name
        .rsplit_once('.')
        .ok_or_else(|| TypeError::UnknownKindSuffix(name.to_string()))?;
    let kind = ResourceKind::from_suffix(last)
        .ok_or_else(|| TypeError::UnknownKindSuffix(name.to_string()))?;
    Ok((stem, kind))
}
