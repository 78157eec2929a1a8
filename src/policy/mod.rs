//! Load policy
//!
//! Chooses the load configuration for a destination table.
//!
//! # Overview
//!
//! - `LoadPolicy` - defaults plus per-table schema overrides
//! - `LoadConfiguration` - the options for one load job
//! - YAML loading with validation, and an embedded default policy

mod loader;
mod types;

pub use loader::{builtin_policy, load_policy, load_policy_from_str, BUILTIN_POLICY};
pub use types::{
    FieldMode, FieldType, LoadConfiguration, LoadDefaults, LoadPolicy, SchemaField, SourceFormat,
    TableOverride, WriteDisposition,
};

#[cfg(test)]
mod tests;
