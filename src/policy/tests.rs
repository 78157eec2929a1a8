//! Tests for load policy selection and loading

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use std::io::Write;

fn vehicle_line_mapping_schema() -> Vec<SchemaField> {
    vec![
        SchemaField::string("nameplate_code"),
        SchemaField::string("brand"),
        SchemaField::string("platform"),
        SchemaField::string("nameplate_display"),
    ]
}

#[test]
fn test_builtin_policy_parses() {
    let policy = builtin_policy().unwrap();

    assert_eq!(policy.defaults, LoadDefaults::default());
    assert_eq!(policy.overrides.len(), 1);
    assert!(policy.has_override("vehicle_line_mapping"));
}

#[test]
fn test_known_table_gets_fixed_schema() {
    let config = builtin_policy().unwrap().select("vehicle_line_mapping");

    assert_eq!(
        config,
        LoadConfiguration {
            source_format: SourceFormat::Csv,
            skip_leading_rows: 1,
            field_delimiter: ",".to_string(),
            allow_quoted_newlines: true,
            quote: "\"".to_string(),
            write_disposition: WriteDisposition::WriteTruncate,
            autodetect: false,
            schema: Some(vehicle_line_mapping_schema()),
        }
    );
}

#[test]
fn test_other_tables_autodetect() {
    let policy = builtin_policy().unwrap();

    for table in ["sales", "Vehicle_Line_Mapping", "vehicle_line_mapping_v2", ""] {
        let config = policy.select(table);
        assert!(config.autodetect, "{table} should autodetect");
        assert!(config.schema.is_none());
        assert_eq!(config.write_disposition, WriteDisposition::WriteTruncate);
        assert_eq!(config.field_delimiter, ",");
        assert_eq!(config.quote, "\"");
        assert_eq!(config.skip_leading_rows, 1);
        assert!(config.allow_quoted_newlines);
    }
}

#[test]
fn test_default_policy_matches_builtin() {
    // An empty policy file still yields the CSV defaults, just without overrides
    let empty = load_policy_from_str("{}").unwrap();
    assert_eq!(empty.defaults, builtin_policy().unwrap().defaults);
    assert!(empty.overrides.is_empty());
}

#[test]
fn test_override_write_disposition() {
    let yaml = r"
overrides:
  dealers:
    write_disposition: WRITE_APPEND
    schema:
      - name: dealer_id
        type: INTEGER
        mode: REQUIRED
      - name: dealer_name
";
    let policy = load_policy_from_str(yaml).unwrap();

    let config = policy.select("dealers");
    assert_eq!(config.write_disposition, WriteDisposition::WriteAppend);
    assert_eq!(
        config.schema,
        Some(vec![
            SchemaField::new("dealer_id", FieldType::Integer).required(),
            SchemaField::string("dealer_name"),
        ])
    );

    assert_eq!(
        policy.select("sales").write_disposition,
        WriteDisposition::WriteTruncate
    );
}

#[test]
fn test_custom_defaults() {
    let yaml = r#"
defaults:
  field_delimiter: ";"
  skip_leading_rows: 0
  quote: ""
"#;
    let config = load_policy_from_str(yaml).unwrap().select("anything");

    assert_eq!(config.field_delimiter, ";");
    assert_eq!(config.skip_leading_rows, 0);
    assert_eq!(config.quote, "");
    assert!(config.allow_quoted_newlines);
}

#[test]
fn test_rejects_empty_override_schema() {
    let yaml = "overrides:\n  dealers:\n    schema: []\n";
    let err = load_policy_from_str(yaml).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
    assert!(err.to_string().contains("overrides.dealers.schema"));
}

#[test]
fn test_rejects_bad_column_name() {
    let yaml = "overrides:\n  dealers:\n    schema:\n      - name: dealer id\n";
    let err = load_policy_from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("invalid column name 'dealer id'"));
}

#[test]
fn test_rejects_multi_char_delimiter() {
    let err = load_policy_from_str("defaults:\n  field_delimiter: '||'\n").unwrap_err();
    assert!(err.to_string().contains("single character"));
}

#[test]
fn test_rejects_unknown_field_type() {
    let yaml = "overrides:\n  t:\n    schema:\n      - name: a\n        type: BLOB\n";
    let err = load_policy_from_str(yaml).unwrap_err();
    assert!(matches!(err, Error::YamlParse(_)));
}

#[test]
fn test_load_policy_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "overrides:\n  parts:\n    schema:\n      - name: part_no\n"
    )
    .unwrap();

    let policy = load_policy(file.path()).unwrap();
    assert!(policy.has_override("parts"));
    assert!(!policy.has_override("vehicle_line_mapping"));
}

#[test]
fn test_load_policy_missing_file() {
    let err = load_policy("/nonexistent/policy.yaml").unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[test]
fn test_configuration_serializes_for_display() {
    let config = builtin_policy().unwrap().select("sales");
    let json = serde_json::to_value(&config).unwrap();

    assert_eq!(json["source_format"], "CSV");
    assert_eq!(json["write_disposition"], "WRITE_TRUNCATE");
    assert_eq!(json["autodetect"], true);
    assert!(json.get("schema").is_none());
}
