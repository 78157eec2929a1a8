//! Destination table naming

/// Prefix of every destination table
pub const TABLE_PREFIX: &str = "100_";

/// Table name for an uploaded file: everything before the first `.`,
/// with spaces replaced by underscores.
///
/// `"Vehicle Line Mapping.csv"` becomes `"Vehicle_Line_Mapping"`, and
/// `"v1.2.data.csv"` becomes `"v1"`.
pub fn derive_table_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or_default();
    stem.replace(' ', "_")
}

/// Destination table id for a table name
pub fn destination_table_id(table_name: &str) -> String {
    format!("{TABLE_PREFIX}{table_name}")
}
