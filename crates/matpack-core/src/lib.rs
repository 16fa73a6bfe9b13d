//! The matpack datapackage engine.
//!
//! A [`Datapackage`] is an ordered list of resource records plus a parallel,
//! same-length list of data objects, persisted through a pluggable storage
//! backend. Resources sharing a `group` label form one logical persistent
//! vector or array (indices plus optional data/flip/distributions members).
//!
//! # Entry points
//!
//! - [`Datapackage::create`] -- start a fresh package on a backend
//! - [`Datapackage::load`] -- reconstruct a package, realizing each resource
//!   as a lazy [`ReadProxy`]
//! - [`PackageView`] -- shared read surface: resolution by name or index,
//!   attribute filtering, exclusion, and the group map, all yielding
//!   non-copying [`FilteredDatapackage`] views
//!
//! The engine is single-threaded by design: data slots are
//! `Rc<RefCell<Payload>>`, proxies hold a mutable stream cursor, and each
//! view keeps its own materialization cache.

pub mod error;
pub mod filtered;
pub mod package;
pub mod payload;
pub mod proxy;
pub mod unique;
pub mod view;

pub use error::{PackageError, PackageResult};
pub use filtered::FilteredDatapackage;
pub use package::{Datapackage, PackageOptions, MANIFEST_PATH};
pub use payload::{slot, Payload, Slot};
pub use proxy::ReadProxy;
pub use unique::greedy_set_cover;
pub use view::{PackageView, ResourceRef};
