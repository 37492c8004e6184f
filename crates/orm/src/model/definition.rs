//! Model Definitions - static, declarative metadata for entity types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbor_dao::Record;

use crate::error::{OrmError, OrmResult};

/// Semantic type of a declared property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    /// RFC 3339 date-time strings
    Date,
    Object,
    Array,
    /// Accepts anything
    Any,
}

impl PropertyType {
    /// Whether a non-null value is acceptable for this type
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Date => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
            PropertyType::Any => true,
        }
    }
}

/// One declared property of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub property_type: PropertyType,
    pub required: bool,
    pub id: bool,
}

impl PropertyDefinition {
    /// Optional property
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: false,
            id: false,
        }
    }

    /// Required property
    pub fn required(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: true,
            id: false,
        }
    }

    /// Identifier property (not required on create; backends may generate it)
    pub fn id(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: false,
            id: true,
        }
    }
}

/// Static definition of a named record type.
///
/// Property order is declaration order; the first declared identifier is
/// the model's primary identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub properties: IndexMap<String, PropertyDefinition>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        definition: PropertyDefinition,
    ) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }

    /// Shorthand for an identifier property
    pub fn with_id_property(self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.with_property(name, PropertyDefinition::id(property_type))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Identifier property names, in declaration order
    pub fn id_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, def)| def.id)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Validate a record against this definition.
    ///
    /// Required properties must be present and non-null; present non-null
    /// values must be acceptable for their declared type. Properties the
    /// definition does not declare are tolerated (navigational data from
    /// eager loading lands there).
    pub fn validate_record(&self, record: &Record) -> OrmResult<()> {
        for (name, definition) in &self.properties {
            let value = record.get(name);
            match value {
                None | Some(Value::Null) => {
                    if definition.required {
                        return Err(OrmError::Validation {
                            model: self.name.clone(),
                            message: format!("required property \"{}\" is missing", name),
                        });
                    }
                }
                Some(value) => {
                    if !definition.property_type.accepts(value) {
                        return Err(OrmError::Validation {
                            model: self.name.clone(),
                            message: format!(
                                "property \"{}\" does not accept value {}",
                                name, value
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
