//! Error types for the repository layer.
//!
//! Every failure here is a deterministic input-shape problem: a bad relation
//! declaration, a conflicting constraint value, a missing row. Nothing is
//! retried and nothing is swallowed; errors surface to the immediate caller.

use std::fmt;

use arbor_dao::DaoError;

/// Result type alias for repository operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error type for model, relation and repository operations
#[derive(Debug, Clone, PartialEq)]
pub enum OrmError {
    /// A single-row lookup by id matched nothing
    EntityNotFound {
        entity_name: String,
        entity_id: String,
    },
    /// A relation declaration is unusable as authored
    InvalidRelation {
        source_model: String,
        relation: String,
        reason: String,
    },
    /// A caller-supplied value conflicts with an enforced relation constraint
    PropertyConstrained { property: String },
    /// `filter.include` referenced relations with no registered resolver
    InvalidInclusion { relations: Vec<String> },
    /// A record failed validation against its model definition
    Validation { model: String, message: String },
    /// The operation cannot be expressed at this layer
    Unsupported(String),
    /// Identity was requested from a model without a usable id
    MissingId { model: String },
    /// Record (de)serialization failed
    Serialization(String),
    /// The backing store reported a failure
    Database(String),
}

impl OrmError {
    /// Stable machine-readable code for the error class
    pub fn code(&self) -> &'static str {
        match self {
            OrmError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            OrmError::InvalidRelation { .. } => "INVALID_RELATION_DEFINITION",
            OrmError::PropertyConstrained { .. } => "CONSTRAINT_VIOLATION",
            OrmError::InvalidInclusion { .. } => "INVALID_INCLUSION",
            OrmError::Validation { .. } => "VALIDATION_FAILED",
            OrmError::Unsupported(_) => "UNSUPPORTED",
            OrmError::MissingId { .. } => "MISSING_ID",
            OrmError::Serialization(_) => "SERIALIZATION_ERROR",
            OrmError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Not-found error for an entity name and id value
    pub fn entity_not_found(
        entity_name: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        OrmError::EntityNotFound {
            entity_name: entity_name.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Definition error for a relation on a source model
    pub fn invalid_relation(
        source_model: impl Into<String>,
        relation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        OrmError::InvalidRelation {
            source_model: source_model.into(),
            relation: relation.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::EntityNotFound {
                entity_name,
                entity_id,
            } => write!(f, "Entity not found: {} with id \"{}\"", entity_name, entity_id),
            OrmError::InvalidRelation {
                source_model,
                relation,
                reason,
            } => write!(
                f,
                "Invalid relation definition for {}#{}: {}",
                source_model, relation, reason
            ),
            OrmError::PropertyConstrained { property } => {
                write!(f, "Property \"{}\" cannot be changed!", property)
            }
            OrmError::InvalidInclusion { relations } => write!(
                f,
                "Invalid \"filter.include\" entries: {}",
                relations.join(", ")
            ),
            OrmError::Validation { model, message } => {
                write!(f, "Validation failed for {}: {}", model, message)
            }
            OrmError::Unsupported(msg) => write!(f, "{}", msg),
            OrmError::MissingId { model } => {
                write!(f, "Model {} does not declare a usable id property", model)
            }
            OrmError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OrmError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for OrmError {}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

// Backend errors pass through unmodified except for the error class; typed
// mappings (e.g. not-found) happen in the repository bridge where the
// context is known.
impl From<DaoError> for OrmError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::Unsupported(msg) => OrmError::Unsupported(msg),
            DaoError::Serialization(msg) => OrmError::Serialization(msg),
            DaoError::Backend(msg) => OrmError::Database(msg),
        }
    }
}
