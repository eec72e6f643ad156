#![deny(missing_docs)]
//! Flat encoding and diffing of fluxion models.
//!
//! [`flatten`] turns a nested `serde_json::Value` into a [`FlatModel`]:
//! one entry per leaf, keyed by slash-separated [`FlatKeyPath`]s with
//! arrays indexed by position. [`diff`] compares two flat encodings and
//! produces per-path [`PropertyDiff`] entries.
//!
//! This crate is the pure algorithm. Dispatch — whether a diff runs
//! synchronously after a mutation or on a store's serial diff queue — is
//! the engine's concern.
//!
//! [`FlatModel`]: fluxion_core::FlatModel
//! [`FlatKeyPath`]: fluxion_core::FlatKeyPath
//! [`PropertyDiff`]: fluxion_core::PropertyDiff

mod diff;
mod flatten;

pub use diff::{diff, values_equal};
pub use flatten::flatten;
