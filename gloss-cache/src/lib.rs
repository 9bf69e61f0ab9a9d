#![deny(missing_docs)]
//! Versioned per-term cache for gloss dictionary entries.
//!
//! [`registry`] holds the pure version-collection arithmetic;
//! [`store::VersionStore`] composes it into a shared cache whose
//! mutators each compute the full next record before taking a single
//! write, so readers never observe partial state.

pub mod registry;
pub mod store;

pub use store::{SetVersionsOptions, VersionStore};
