//! # reportsync-schema
//!
//! Tiered validation of structured records.
//!
//! Field paths are parsed once into [`FieldPath`] (typed segments) and then
//! resolved against any number of records. A [`Schema`] groups paths into
//! the Required, Structural and Recommended tiers plus `YYYY-MM-DD` format
//! checks; [`Schema::validate`] is pure and deterministic.

pub mod error;
pub mod path;
pub mod validator;

pub use error::SchemaError;
pub use path::{FieldPath, Resolved, Segment};
pub use validator::{Finding, Schema, StructuralRule, Tier, ValidationReport};
