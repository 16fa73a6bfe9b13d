//! The datapackage manifest: header metadata plus the ordered resource list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::Resource;

/// Profile string identifying a datapackage manifest.
pub const PACKAGE_PROFILE: &str = "data-package";

/// A license descriptor in the manifest header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub path: String,
    pub title: String,
}

/// The default license set: a single public-domain dedication.
pub fn default_licenses() -> Vec<License> {
    vec![License {
        name: "ODC-PDDL-1.0".to_string(),
        path: "http://opendatacommons.org/licenses/pddl/".to_string(),
        title: "Open Data Commons Public Domain Dedication and License v1.0".to_string(),
    }]
}

fn default_true() -> bool {
    true
}

/// The persisted manifest: header object plus resource records.
///
/// Policy flags steer downstream matrix construction; they default to
/// `combinatorial = false`, `sequential = false`, no `seed`,
/// `sum_intra_duplicates = true`, `sum_inter_duplicates = false`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub profile: String,
    pub name: String,
    pub id: String,
    pub licenses: Vec<License>,
    /// UTC creation timestamp, `T`-separated and `Z`-suffixed.
    pub created: String,
    #[serde(default)]
    pub combinatorial: bool,
    #[serde(default)]
    pub sequential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default = "default_true")]
    pub sum_intra_duplicates: bool,
    #[serde(default)]
    pub sum_inter_duplicates: bool,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// A fresh header with default policy flags and no resources.
    pub fn new(name: String, id: String, created: String) -> Self {
        Self {
            profile: PACKAGE_PROFILE.to_string(),
            name,
            id,
            licenses: default_licenses(),
            created,
            combinatorial: false,
            sequential: false,
            seed: None,
            sum_intra_duplicates: true,
            sum_inter_duplicates: false,
            resources: Vec::new(),
            extra: Map::new(),
        }
    }
}
