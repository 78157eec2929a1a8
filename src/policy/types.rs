//! Load configuration and policy types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Column Schema
// ============================================================================

/// Column type in a warehouse table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Numeric,
    Boolean,
    Timestamp,
    Date,
    Datetime,
}

/// Column nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
}

/// One column of an explicit schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Nullability (warehouse default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FieldMode>,
}

impl SchemaField {
    /// Nullable column of the given type
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: None,
        }
    }

    /// Text column
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Mark the column as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.mode = Some(FieldMode::Required);
        self
    }
}

// ============================================================================
// Load Options
// ============================================================================

/// Format of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Delimited text
    #[default]
    #[serde(rename = "CSV")]
    Csv,
}

impl SourceFormat {
    /// Name used by the warehouse API
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV",
        }
    }
}

/// What a load does to existing table contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Replace the table contents
    #[default]
    WriteTruncate,
    /// Append to the table
    WriteAppend,
    /// Fail unless the table is empty
    WriteEmpty,
}

impl WriteDisposition {
    /// Name used by the warehouse API
    pub fn as_str(self) -> &'static str {
        match self {
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

/// Fully resolved options for one load job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfiguration {
    pub source_format: SourceFormat,
    /// Header rows to skip
    pub skip_leading_rows: u32,
    pub field_delimiter: String,
    pub allow_quoted_newlines: bool,
    /// Quote character
    pub quote: String,
    pub write_disposition: WriteDisposition,
    /// Let the warehouse infer column names and types
    pub autodetect: bool,
    /// Explicit columns; `None` whenever `autodetect` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<SchemaField>>,
}

// ============================================================================
// Policy
// ============================================================================

/// Options shared by every load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDefaults {
    #[serde(default)]
    pub source_format: SourceFormat,
    #[serde(default = "default_skip_leading_rows")]
    pub skip_leading_rows: u32,
    #[serde(default = "default_field_delimiter")]
    pub field_delimiter: String,
    #[serde(default = "default_true")]
    pub allow_quoted_newlines: bool,
    #[serde(default = "default_quote")]
    pub quote: String,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl Default for LoadDefaults {
    fn default() -> Self {
        Self {
            source_format: SourceFormat::Csv,
            skip_leading_rows: default_skip_leading_rows(),
            field_delimiter: default_field_delimiter(),
            allow_quoted_newlines: true,
            quote: default_quote(),
            write_disposition: WriteDisposition::WriteTruncate,
        }
    }
}

fn default_skip_leading_rows() -> u32 {
    1
}

fn default_field_delimiter() -> String {
    ",".to_string()
}

fn default_quote() -> String {
    "\"".to_string()
}

fn default_true() -> bool {
    true
}

/// Fixed-schema handling for one destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOverride {
    /// Explicit columns, in file order
    pub schema: Vec<SchemaField>,
    /// Replaces the default write disposition for this table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
}

/// Table-name keyed load policy
///
/// Tables named in `overrides` get their explicit schema; every other table is
/// loaded with schema autodetection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPolicy {
    #[serde(default)]
    pub defaults: LoadDefaults,
    /// Keyed by derived table name (before the destination prefix)
    #[serde(default)]
    pub overrides: BTreeMap<String, TableOverride>,
}

impl LoadPolicy {
    /// Pick the load configuration for a derived table name
    ///
    /// Matching is exact and case-sensitive.
    pub fn select(&self, table_name: &str) -> LoadConfiguration {
        let d = &self.defaults;
        let base = |autodetect: bool,
                    schema: Option<Vec<SchemaField>>,
                    write_disposition: WriteDisposition| LoadConfiguration {
            source_format: d.source_format,
            skip_leading_rows: d.skip_leading_rows,
            field_delimiter: d.field_delimiter.clone(),
            allow_quoted_newlines: d.allow_quoted_newlines,
            quote: d.quote.clone(),
            write_disposition,
            autodetect,
            schema,
        };

        match self.overrides.get(table_name) {
            Some(table) => base(
                false,
                Some(table.schema.clone()),
                table.write_disposition.unwrap_or(d.write_disposition),
            ),
            None => base(true, None, d.write_disposition),
        }
    }

    /// Whether a table name has a fixed schema
    pub fn has_override(&self, table_name: &str) -> bool {
        self.overrides.contains_key(table_name)
    }
}
