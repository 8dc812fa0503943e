//! Descriptions of the target table: its identity, its schema, and how files are loaded into it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::{Error, LoadResult};

/// Fully qualified name of the table that receives the import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableIdentity {
    project_id: String,
    dataset_id: String,
    table_id: String,
}

impl TableIdentity {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Whether a column may hold nulls or repeated values.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// One column of a [`TableSchema`]. `RECORD` columns carry their nested `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FieldMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: None,
            fields: vec![],
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = TableFieldSchema>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

/// Ordered column definitions of the target table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

// The schema is accepted either as a bare array of fields or wrapped in `{"fields": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaRepr {
    Fields(Vec<TableFieldSchema>),
    Wrapped { fields: Vec<TableFieldSchema> },
}

impl TableSchema {
    pub fn new(fields: impl IntoIterator<Item = TableFieldSchema>) -> LoadResult<Self> {
        let schema = Self {
            fields: fields.into_iter().collect(),
        };
        validate_fields(&schema.fields)?;
        Ok(schema)
    }

    /// Parse a JSON schema, e.g. `[{"name": "id", "type": "INTEGER", "mode": "REQUIRED"}]`.
    pub fn from_json(json: &str) -> LoadResult<Self> {
        let fields = match serde_json::from_str(json)? {
            SchemaRepr::Fields(fields) | SchemaRepr::Wrapped { fields } => fields,
        };
        Self::new(fields)
    }

    pub fn to_json(&self) -> LoadResult<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_fields(fields: &[TableFieldSchema]) -> LoadResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(Error::invalid_schema("field names must not be empty"));
        }
        if field.field_type.trim().is_empty() {
            return Err(Error::invalid_schema(format!(
                "field '{}' has no type",
                field.name
            )));
        }
        // column names are case-insensitive in the target table
        if !seen.insert(field.name.to_ascii_lowercase()) {
            return Err(Error::invalid_schema(format!(
                "duplicate field '{}'",
                field.name
            )));
        }
        validate_fields(&field.fields)?;
    }
    Ok(())
}

/// File formats the import service can read staged output in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    Avro,
    Csv,
    #[default]
    NewlineDelimitedJson,
    Parquet,
    Orc,
}

/// How an import treats rows already in the target table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Add the imported rows to the existing ones.
    #[default]
    WriteAppend,
    /// Replace the table contents with the imported rows.
    WriteTruncate,
    /// Fail the import unless the table is empty.
    WriteEmpty,
}
