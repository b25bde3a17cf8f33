//! # apc-merge
//!
//! Reconciles per-institution article processing charge (APC) reports into
//! a single DOI-keyed master dataset, including:
//! - Row cleaning and publisher name normalization
//! - Field-level conflict resolution with memoized operator decisions
//! - Crossref lookup for publisher name disambiguation
//! - Atomic serialization of the merged master file

pub mod config;
pub mod crossref;
pub mod decision;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod publisher;
pub mod reconciler;
pub mod record;
pub mod store;

pub use error::{Error, Result};
