//! Entity trait - typed value holders bridged through loosely-typed records

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use arbor_dao::Record;

use crate::error::{OrmError, OrmResult};
use crate::model::definition::ModelDefinition;

/// A typed record with a static model definition.
///
/// Entities are stateless value holders: one instance is created per CRUD
/// call and discarded afterwards. No identity map is maintained. Serde
/// bridges them to connector records, so navigational properties merged in
/// by eager loading deserialize into optional fields and unknown properties
/// are ignored.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The one static definition for this type
    fn definition() -> &'static ModelDefinition;

    /// Model name as declared in the definition
    fn model_name() -> &'static str {
        &Self::definition().name
    }

    /// The entity as a connector record
    fn to_record(&self) -> OrmResult<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(OrmError::Serialization(format!(
                "entity {} serialized to non-object value {}",
                Self::model_name(),
                other
            ))),
        }
    }

    /// Build an entity from a connector record
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(serde_json::from_value(Value::Object(record.clone()))?)
    }

    /// The identifier value derived from the declared id properties.
    ///
    /// A single id property yields its value (null when unset); a composite
    /// key yields an object of the id values. A model that declares no id
    /// property has no identity, which is an error.
    fn get_id(&self) -> OrmResult<Value> {
        let definition = Self::definition();
        let id_properties = definition.id_properties();
        if id_properties.is_empty() {
            return Err(OrmError::MissingId {
                model: definition.name.clone(),
            });
        }

        let record = self.to_record()?;
        if let [single] = id_properties.as_slice() {
            return Ok(record.get(*single).cloned().unwrap_or(Value::Null));
        }

        let mut id = Record::new();
        for property in id_properties {
            id.insert(
                property.to_string(),
                record.get(property).cloned().unwrap_or(Value::Null),
            );
        }
        Ok(Value::Object(id))
    }

    /// Identifier properties as a record, usable as a where constraint
    fn get_id_record(&self) -> OrmResult<Record> {
        let definition = Self::definition();
        let id_properties = definition.id_properties();
        if id_properties.is_empty() {
            return Err(OrmError::MissingId {
                model: definition.name.clone(),
            });
        }

        let record = self.to_record()?;
        let mut id = Record::new();
        for property in id_properties {
            id.insert(
                property.to_string(),
                record.get(property).cloned().unwrap_or(Value::Null),
            );
        }
        Ok(id)
    }
}

/// Entities as connector records, in order
pub fn records_of<E: Entity>(entities: &[E]) -> OrmResult<Vec<Record>> {
    entities.iter().map(Entity::to_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::{PropertyDefinition, PropertyType};
    use once_cell::sync::Lazy;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Customer {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        name: String,
    }

    static CUSTOMER_DEFINITION: Lazy<ModelDefinition> = Lazy::new(|| {
        ModelDefinition::new("Customer")
            .with_id_property("id", PropertyType::Number)
            .with_property("name", PropertyDefinition::required(PropertyType::String))
    });

    impl Entity for Customer {
        fn definition() -> &'static ModelDefinition {
            &CUSTOMER_DEFINITION
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct AccountEntry {
        ledger: String,
        sequence: i64,
        amount: i64,
    }

    static ACCOUNT_ENTRY_DEFINITION: Lazy<ModelDefinition> = Lazy::new(|| {
        ModelDefinition::new("AccountEntry")
            .with_id_property("ledger", PropertyType::String)
            .with_id_property("sequence", PropertyType::Number)
            .with_property("amount", PropertyDefinition::required(PropertyType::Number))
    });

    impl Entity for AccountEntry {
        fn definition() -> &'static ModelDefinition {
            &ACCOUNT_ENTRY_DEFINITION
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        body: String,
    }

    static NOTE_DEFINITION: Lazy<ModelDefinition> = Lazy::new(|| {
        ModelDefinition::new("Note")
            .with_property("body", PropertyDefinition::required(PropertyType::String))
    });

    impl Entity for Note {
        fn definition() -> &'static ModelDefinition {
            &NOTE_DEFINITION
        }
    }

    #[test]
    fn single_id_yields_value() {
        let customer = Customer {
            id: Some(7),
            name: "Ada".to_string(),
        };
        assert_eq!(customer.get_id().unwrap(), json!(7));
    }

    #[test]
    fn unset_id_yields_null() {
        let customer = Customer {
            id: None,
            name: "Ada".to_string(),
        };
        assert_eq!(customer.get_id().unwrap(), json!(null));
    }

    #[test]
    fn composite_id_yields_object() {
        let entry = AccountEntry {
            ledger: "cash".to_string(),
            sequence: 3,
            amount: 100,
        };
        assert_eq!(
            entry.get_id().unwrap(),
            json!({"ledger": "cash", "sequence": 3})
        );
        assert_eq!(
            entry.get_id_record().unwrap(),
            serde_json::from_value::<Record>(json!({"ledger": "cash", "sequence": 3})).unwrap()
        );
    }

    #[test]
    fn model_without_id_property_has_no_identity() {
        let note = Note {
            body: "hi".to_string(),
        };
        let err = note.get_id().unwrap_err();
        assert_eq!(err.code(), "MISSING_ID");
        assert!(note.get_id_record().is_err());
    }

    #[test]
    fn from_record_ignores_navigational_properties() {
        let record: Record = serde_json::from_value(json!({
            "id": 1,
            "name": "Ada",
            "orders": [{"id": 10}]
        }))
        .unwrap();
        let customer = Customer::from_record(&record).unwrap();
        assert_eq!(customer.id, Some(1));
        assert_eq!(customer.name, "Ada");
    }
}
