//! # TDS Common Library
//!
//! Temporal dominance curve engine shared by the TDS tools:
//! - Attribute vocabularies (interned label registries)
//! - Curve construction from raw trial records
//! - Trial-weighted aggregation and per-curve transforms
//! - Curve collections with identity set algebra, grouping and bootstrap
//! - Record loading, table export and feature tables for PCA
//! - Configuration loading

pub mod collection;
pub mod config;
pub mod curve;
pub mod error;
pub mod features;
pub mod labels;
pub mod loader;
pub mod meta;
pub mod record;

pub use collection::{CurveCollection, CurveRef, KeySelector};
pub use curve::{CurveSnapshot, DominanceCurve, DominanceMatrix, TableOptions, DELAY_KEY};
pub use error::{Error, Result};
pub use features::FeatureTable;
pub use labels::Labels;
pub use meta::{MetaKey, Metadata};
pub use record::TrialRecord;
