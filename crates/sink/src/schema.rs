//! Submission schemas and the registry that names them.
//!
//! A schema fixes the destination layout: field order is column order, and
//! each field carries its header label and a column class that drives styling.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SchemaError, SinkError};

/// Longest tab title the Sheets UI accepts.
pub const MAX_TABLE_NAME_CHARS: usize = 100;

/// Styling category of a column, independent of what the field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnClass {
    /// Narrow column, text overflows into neighbours.
    #[default]
    Compact,
    /// Wide column, text wraps inside the cell.
    Wrapped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub class: ColumnClass,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn new(key: &str, label: &str, class: ColumnClass) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            class,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSchema {
    pub name: String,
    /// Field whose value names the destination table.
    #[serde(default = "default_table_key")]
    pub table_key: String,
    pub fields: Vec<FieldSpec>,
}

fn default_table_key() -> String {
    "username".to_string()
}

impl SubmissionSchema {
    pub fn new(name: &str, table_key: &str, fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let schema = Self {
            name: name.to_string(),
            table_key: table_key.to_string(),
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// The original export layout: username, email and two free-form values.
    pub fn user_export() -> Self {
        Self {
            name: "user-export".to_string(),
            table_key: "username".to_string(),
            fields: vec![
                FieldSpec::new("username", "Username", ColumnClass::Compact),
                FieldSpec::new("email", "Email", ColumnClass::Compact),
                FieldSpec::new("value1", "Value1", ColumnClass::Wrapped),
                FieldSpec::new("value2", "Value2", ColumnClass::Wrapped),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name.clone()));
        }
        if self.table_key.trim().is_empty() {
            return Err(SchemaError::EmptyTableKey(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.key.is_empty() {
                return Err(SchemaError::EmptyFieldKey { schema: self.name.clone() });
            }
            if !seen.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name.clone(),
                    key: field.key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.fields.len() as u32
    }

    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.label.clone()).collect()
    }

    pub fn column_classes(&self) -> Vec<ColumnClass> {
        self.fields.iter().map(|f| f.class).collect()
    }

    /// Turn named scalar fields into a row in field order.
    ///
    /// Strings pass through, numbers and booleans are stringified, `null` and
    /// absent optional fields become empty cells. Unknown keys are ignored.
    pub fn align(&self, fields: &Map<String, Value>) -> Result<Vec<String>, SinkError> {
        let mut row = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            match fields.get(&spec.key) {
                Some(value) => row.push(self.scalar_cell(&spec.key, value)?),
                None if spec.required => {
                    return Err(SinkError::mismatch(
                        &self.name,
                        format!("missing required field '{}'", spec.key),
                    ));
                }
                None => row.push(String::new()),
            }
        }

        let unknown: Vec<&str> = fields
            .keys()
            .filter(|k| !self.fields.iter().any(|f| &f.key == *k))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            log::debug!("schema '{}': ignoring unknown fields {:?}", self.name, unknown);
        }

        Ok(row)
    }

    /// Destination table name: the trimmed value of `table_key`.
    pub fn table_name_for(&self, fields: &Map<String, Value>) -> Result<String, SinkError> {
        let value = fields.get(&self.table_key).ok_or_else(|| {
            SinkError::mismatch(&self.name, format!("missing table key '{}'", self.table_key))
        })?;
        let Value::String(raw) = value else {
            return Err(SinkError::mismatch(
                &self.name,
                format!("table key '{}' must be a string", self.table_key),
            ));
        };
        validate_table_name(&self.name, raw)
    }

    fn scalar_cell(&self, key: &str, value: &Value) -> Result<String, SinkError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            Value::Array(_) | Value::Object(_) => Err(SinkError::mismatch(
                &self.name,
                format!("field '{}' must be a scalar", key),
            )),
        }
    }
}

/// Trim and bound-check a table name.
pub fn validate_table_name(schema: &str, raw: &str) -> Result<String, SinkError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SinkError::mismatch(schema, "table name is empty"));
    }
    if name.chars().count() > MAX_TABLE_NAME_CHARS {
        return Err(SinkError::mismatch(
            schema,
            format!("table name longer than {} characters", MAX_TABLE_NAME_CHARS),
        ));
    }
    Ok(name.to_string())
}

/// Named, shareable schemas with one default.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SubmissionSchema>>,
    default_name: String,
}

impl SchemaRegistry {
    pub fn new(default: SubmissionSchema) -> Result<Self, SchemaError> {
        default.validate()?;
        let default_name = default.name.clone();
        let mut schemas = HashMap::new();
        schemas.insert(default_name.clone(), Arc::new(default));
        Ok(Self { schemas, default_name })
    }

    pub fn register(&mut self, schema: SubmissionSchema) -> Result<(), SchemaError> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateSchema(schema.name));
        }
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), SchemaError> {
        if !self.schemas.contains_key(name) {
            return Err(SchemaError::UnknownSchema(name.to_string()));
        }
        self.default_name = name.to_string();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<SubmissionSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn default_schema(&self) -> Arc<SubmissionSchema> {
        // `new` and `set_default` keep default_name registered
        Arc::clone(&self.schemas[&self.default_name])
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let default_name = "user-export".to_string();
        let mut schemas = HashMap::new();
        schemas.insert(default_name.clone(), Arc::new(SubmissionSchema::user_export()));
        Self { schemas, default_name }
    }
}
