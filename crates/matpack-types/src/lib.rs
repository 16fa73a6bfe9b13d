//! Foundation types for matpack datapackages.
//!
//! This crate provides the resource-record model, manifest header, array and
//! table payload types, and naming rules used throughout matpack. Every other
//! matpack crate depends on `matpack-types`.
//!
//! # Key Types
//!
//! - [`Resource`] — one metadata entry describing a persisted or live payload
//! - [`Manifest`] — the datapackage header plus its ordered resource list
//! - [`ArrayData`] — closed enum of numeric payloads (indices, vectors,
//!   matrices, flip flags, uncertainty distributions)
//! - [`Table`] / [`Scalar`] — tabular metadata with hashable cell values
//! - [`DataSource`] — live external data source behind an interface resource

pub mod array;
pub mod error;
pub mod manifest;
pub mod naming;
pub mod resource;
pub mod source;
pub mod table;

pub use array::{ArrayData, Distribution, IndexPair, Matrix};
pub use error::TypeError;
pub use manifest::{default_licenses, License, Manifest, PACKAGE_PROFILE};
pub use naming::{check_name, clean_name};
pub use resource::{
    member_name, member_path, split_kind_suffix, Axis, Mediatype, Profile, Resource, ResourceKind,
};
pub use source::DataSource;
pub use table::{Scalar, Table};
