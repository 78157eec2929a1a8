//! YAML loader for load policies
//!
//! The built-in policy is embedded in the binary; operators can replace it
//! with their own file.

use super::types::LoadPolicy;
use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Built-in policy YAML
pub const BUILTIN_POLICY: &str = include_str!("../../policies/default.yaml");

static COLUMN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("column name pattern is valid")
});

/// The embedded default policy
pub fn builtin_policy() -> Result<LoadPolicy> {
    load_policy_from_str(BUILTIN_POLICY)
}

/// Load a policy from a YAML file
pub fn load_policy(path: impl AsRef<Path>) -> Result<LoadPolicy> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read load policy '{}': {}",
                path.display(),
                e
            ))
        }
    })?;

    load_policy_from_str(&content)
}

/// Parse and validate a policy from YAML text
pub fn load_policy_from_str(yaml: &str) -> Result<LoadPolicy> {
    let policy: LoadPolicy = serde_yaml::from_str(yaml)?;
    validate_policy(&policy)?;
    Ok(policy)
}

/// Check the policy for values the warehouse would reject
fn validate_policy(policy: &LoadPolicy) -> Result<()> {
    let d = &policy.defaults;

    if d.field_delimiter.is_empty() {
        return Err(Error::invalid_value(
            "defaults.field_delimiter",
            "must not be empty",
        ));
    }
    if d.field_delimiter.chars().count() > 1 && d.field_delimiter != "\\t" {
        return Err(Error::invalid_value(
            "defaults.field_delimiter",
            format!("expected a single character, got '{}'", d.field_delimiter),
        ));
    }
    if d.quote.chars().count() > 1 {
        return Err(Error::invalid_value(
            "defaults.quote",
            format!("expected at most one character, got '{}'", d.quote),
        ));
    }

    for (table, table_override) in &policy.overrides {
        if table.trim().is_empty() {
            return Err(Error::invalid_value("overrides", "table name is empty"));
        }
        if table_override.schema.is_empty() {
            return Err(Error::invalid_value(
                format!("overrides.{table}.schema"),
                "must list at least one column",
            ));
        }
        for field in &table_override.schema {
            if !COLUMN_NAME.is_match(&field.name) {
                return Err(Error::invalid_value(
                    format!("overrides.{table}.schema"),
                    format!("invalid column name '{}'", field.name),
                ));
            }
        }
    }

    Ok(())
}
