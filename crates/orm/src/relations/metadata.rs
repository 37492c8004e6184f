//! Relation Metadata - authored relation declarations and their resolved,
//! immutable counterparts

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{Entity, ModelDefinition};

/// The kind of a relation between two models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// The source carries a foreign key to one target (many-to-one)
    BelongsTo,
    /// One target carries a foreign key back to the source
    HasOne,
    /// Many targets carry a foreign key back to the source
    HasMany,
    /// Many targets reached through a junction model
    HasManyThrough,
    /// Symmetric many-to-many through a junction model
    HasAndBelongsToMany,
}

impl RelationKind {
    /// Whether the relation yields a collection of targets
    pub fn targets_many(self) -> bool {
        matches!(
            self,
            Self::HasMany | Self::HasManyThrough | Self::HasAndBelongsToMany
        )
    }

    /// Whether the relation routes through a junction model
    pub fn has_junction(self) -> bool {
        matches!(self, Self::HasManyThrough | Self::HasAndBelongsToMany)
    }
}

/// Lazy handle to a model definition.
///
/// Relations reference their target (and junction) models through resolvers
/// rather than concrete definitions so that mutually-referencing models can
/// be declared in any order.
#[derive(Clone)]
pub struct ModelResolver(Arc<dyn Fn() -> ModelDefinition + Send + Sync>);

impl ModelResolver {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn() -> ModelDefinition + Send + Sync + 'static,
    {
        Self(Arc::new(resolve))
    }

    /// Resolver for an entity type's static definition
    pub fn entity<E: Entity>() -> Self {
        Self::new(|| E::definition().clone())
    }

    pub fn resolve(&self) -> ModelDefinition {
        (self.0)()
    }
}

impl fmt::Debug for ModelResolver {
    // debug-print the resolved model name instead of the closure
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelResolver({})", self.resolve().name)
    }
}

/// Junction-side keys of a through relation, as authored
#[derive(Debug, Clone, Default)]
pub struct ThroughDefinition {
    /// Resolver for the junction model
    pub model: Option<ModelResolver>,
    /// Junction property holding the source key
    pub source_key: Option<String>,
    /// Junction property holding the target key
    pub target_key: Option<String>,
}

/// A relation declaration as authored by application code.
///
/// Key fields may be omitted; resolution (see `resolution`) fills defaults
/// or fails with a descriptive definition error.
#[derive(Debug, Clone)]
pub struct RelationDefinition {
    pub kind: RelationKind,
    /// Relation name, also the property related data is merged under
    pub name: String,
    /// The owning model
    pub source: ModelDefinition,
    /// Lazy handle to the related model
    pub target: Option<ModelResolver>,
    /// Key on the source side
    pub key_from: Option<String>,
    /// Key on the target side
    pub key_to: Option<String>,
    /// Junction configuration for through relations
    pub through: Option<ThroughDefinition>,
}

impl RelationDefinition {
    fn new(
        kind: RelationKind,
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            source,
            target: Some(target),
            key_from: None,
            key_to: None,
            through: kind.has_junction().then(ThroughDefinition::default),
        }
    }

    pub fn belongs_to(
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
    ) -> Self {
        Self::new(RelationKind::BelongsTo, name, source, target)
    }

    pub fn has_one(
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
    ) -> Self {
        Self::new(RelationKind::HasOne, name, source, target)
    }

    pub fn has_many(
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
    ) -> Self {
        Self::new(RelationKind::HasMany, name, source, target)
    }

    pub fn has_many_through(
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
        through: ModelResolver,
    ) -> Self {
        let mut definition = Self::new(RelationKind::HasManyThrough, name, source, target);
        definition.through = Some(ThroughDefinition {
            model: Some(through),
            ..ThroughDefinition::default()
        });
        definition
    }

    pub fn has_and_belongs_to_many(
        name: impl Into<String>,
        source: ModelDefinition,
        target: ModelResolver,
        through: ModelResolver,
    ) -> Self {
        let mut definition = Self::new(RelationKind::HasAndBelongsToMany, name, source, target);
        definition.through = Some(ThroughDefinition {
            model: Some(through),
            ..ThroughDefinition::default()
        });
        definition
    }

    pub fn with_key_from(mut self, key_from: impl Into<String>) -> Self {
        self.key_from = Some(key_from.into());
        self
    }

    pub fn with_key_to(mut self, key_to: impl Into<String>) -> Self {
        self.key_to = Some(key_to.into());
        self
    }

    /// Set the junction-side keys of a through relation
    pub fn with_through_keys(
        mut self,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        let through = self.through.get_or_insert_with(ThroughDefinition::default);
        through.source_key = Some(source_key.into());
        through.target_key = Some(target_key.into());
        self
    }
}

/// Resolved junction metadata: every key populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedThrough {
    pub model: String,
    pub source_key: String,
    pub target_key: String,
}

/// A fully-resolved relation: an immutable value object with every key
/// populated, compared structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRelation {
    pub kind: RelationKind,
    pub name: String,
    pub source_model: String,
    pub target_model: String,
    /// Key on the source side
    pub key_from: String,
    /// Key on the target side
    pub key_to: String,
    pub targets_many: bool,
    /// Always normalized; polymorphic targets are not supported
    pub polymorphic: bool,
    pub through: Option<ResolvedThrough>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyType;

    fn customer() -> ModelDefinition {
        ModelDefinition::new("Customer").with_id_property("id", PropertyType::Number)
    }

    fn order() -> ModelDefinition {
        ModelDefinition::new("Order").with_id_property("id", PropertyType::Number)
    }

    #[test]
    fn kinds_classify_cardinality_and_junction() {
        assert!(!RelationKind::BelongsTo.targets_many());
        assert!(!RelationKind::HasOne.targets_many());
        assert!(RelationKind::HasMany.targets_many());
        assert!(RelationKind::HasManyThrough.targets_many());
        assert!(RelationKind::HasAndBelongsToMany.targets_many());

        assert!(RelationKind::HasManyThrough.has_junction());
        assert!(RelationKind::HasAndBelongsToMany.has_junction());
        assert!(!RelationKind::HasMany.has_junction());
    }

    #[test]
    fn builders_seed_through_config_for_junction_kinds() {
        let definition = RelationDefinition::has_many(
            "orders",
            customer(),
            ModelResolver::new(order),
        );
        assert!(definition.through.is_none());

        let definition = RelationDefinition::has_many_through(
            "orders",
            customer(),
            ModelResolver::new(order),
            ModelResolver::new(|| ModelDefinition::new("CustomerOrder")),
        );
        let through = definition.through.unwrap();
        assert!(through.model.is_some());
        assert!(through.source_key.is_none());
    }

    #[test]
    fn model_resolver_resolves_lazily() {
        let resolver = ModelResolver::new(order);
        assert_eq!(resolver.resolve().name, "Order");
        assert_eq!(format!("{:?}", resolver), "ModelResolver(Order)");
    }
}
