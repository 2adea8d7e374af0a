//! Collections: named remote destinations files are uploaded into.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kind of remote destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Object-storage bucket; files land under the collection path.
    Bucket,
    /// Database table with a declared schema.
    Table,
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket => f.write_str("bucket"),
            Self::Table => f.write_str("table"),
        }
    }
}

impl FromStr for CollectionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(Self::Bucket),
            "table" => Ok(Self::Table),
            other => Err(ValidationError::InvalidType(other.to_string())),
        }
    }
}

/// Open key-value bag used for collection metadata and column defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

/// A column of a table collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<MetadataValue>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            nullable: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered column list of a table collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Parse a compact column list: `name:type[:pk][:null],...`.
    ///
    /// ```
    /// # use hhx_index::Schema;
    /// let schema = Schema::parse_columns("id:string:pk,value:float:null").unwrap();
    /// assert_eq!(schema.columns.len(), 2);
    /// assert!(schema.columns[0].primary_key);
    /// assert!(schema.columns[1].nullable);
    /// ```
    pub fn parse_columns(list: &str) -> Result<Self, ValidationError> {
        let mut columns = Vec::new();
        for def in list.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let mut parts = def.split(':').map(str::trim);
            let name = parts.next().unwrap_or_default();
            let data_type = parts
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ValidationError::InvalidColumn(def.to_string()))?;
            let mut column = Column::new(name, data_type);
            for flag in parts {
                match flag {
                    "pk" => column.primary_key = true,
                    "null" => column.nullable = true,
                    _ => return Err(ValidationError::InvalidColumn(def.to_string())),
                }
            }
            columns.push(column);
        }
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    /// Column names must be non-empty and unique.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() || column.data_type.is_empty() {
                return Err(ValidationError::InvalidColumn(format!(
                    "{}:{}",
                    column.name, column.data_type
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::InvalidColumn(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// A named upload destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CollectionType,
    /// Destination path or prefix on the remote (e.g. `models/`, or a table name).
    pub path: String,
    /// Required for tables, forbidden for buckets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Collection {
    /// A bucket collection.
    pub fn bucket(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionType::Bucket,
            path: path.into(),
            schema: None,
            metadata: BTreeMap::new(),
        }
    }

    /// A table collection with its schema.
    pub fn table(name: impl Into<String>, path: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            kind: CollectionType::Table,
            path: path.into(),
            schema: Some(schema),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the definition before it enters the registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.path.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        match (self.kind, &self.schema) {
            (CollectionType::Table, None) => Err(ValidationError::SchemaRequired(self.name.clone())),
            (CollectionType::Bucket, Some(_)) => {
                Err(ValidationError::SchemaForbidden(self.name.clone()))
            }
            (CollectionType::Table, Some(schema)) => schema.validate(),
            (CollectionType::Bucket, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_valid() {
        assert_eq!(Collection::bucket("models", "models/").validate(), Ok(()));
    }

    #[test]
    fn empty_name_and_path_rejected() {
        assert_eq!(
            Collection::bucket("", "p").validate(),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            Collection::bucket("n", "").validate(),
            Err(ValidationError::EmptyPath)
        );
    }

    #[test]
    fn table_requires_schema() {
        let mut table = Collection::bucket("results", "results");
        table.kind = CollectionType::Table;
        assert_eq!(
            table.validate(),
            Err(ValidationError::SchemaRequired("results".into()))
        );
    }

    #[test]
    fn bucket_forbids_schema() {
        let mut bucket = Collection::bucket("raw", "raw/");
        bucket.schema = Some(Schema::default());
        assert_eq!(
            bucket.validate(),
            Err(ValidationError::SchemaForbidden("raw".into()))
        );
    }

    #[test]
    fn parse_type() {
        assert_eq!("bucket".parse::<CollectionType>(), Ok(CollectionType::Bucket));
        assert_eq!("table".parse::<CollectionType>(), Ok(CollectionType::Table));
        assert_eq!(
            "queue".parse::<CollectionType>(),
            Err(ValidationError::InvalidType("queue".into()))
        );
    }

    #[test]
    fn parse_columns_with_flags() {
        let schema = Schema::parse_columns("id:string:pk, timestamp:datetime ,value:float:null")
            .unwrap();
        assert_eq!(schema.columns.len(), 3);
        assert_eq!(schema.columns[0], Column::new("id", "string").primary_key());
        assert_eq!(schema.columns[1], Column::new("timestamp", "datetime"));
        assert_eq!(schema.columns[2], Column::new("value", "float").nullable());
    }

    #[test]
    fn parse_columns_rejects_bad_definitions() {
        assert!(Schema::parse_columns("id").is_err());
        assert!(Schema::parse_columns("id:int:unique").is_err());
        assert!(Schema::parse_columns(":int").is_err());
        assert!(Schema::parse_columns("a:int,a:text").is_err());
    }

    #[test]
    fn json_shape_uses_type_key() {
        let table = Collection::table(
            "metrics",
            "metrics",
            Schema::new(vec![Column::new("id", "string").primary_key()]),
        )
        .with_metadata("owner", "ml-team")
        .with_metadata("retention_days", 30i64);

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["schema"]["columns"][0]["type"], "string");
        assert_eq!(json["schema"]["columns"][0]["primary_key"], true);
        assert!(json["schema"]["columns"][0].get("nullable").is_none());

        let back: Collection = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn metadata_keeps_value_kinds() {
        let raw = r#"{"a": 1, "b": 1.5, "c": true, "d": "x", "e": {"f": [1, null]}}"#;
        let parsed: BTreeMap<String, MetadataValue> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed["a"], MetadataValue::Integer(1));
        assert_eq!(parsed["b"], MetadataValue::Float(1.5));
        assert_eq!(parsed["c"], MetadataValue::Bool(true));
        assert_eq!(parsed["d"], MetadataValue::String("x".into()));
        let MetadataValue::Map(inner) = &parsed["e"] else {
            panic!("expected nested map");
        };
        assert_eq!(
            inner["f"],
            MetadataValue::List(vec![MetadataValue::Integer(1), MetadataValue::Null])
        );
    }
}
