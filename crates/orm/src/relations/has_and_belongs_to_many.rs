//! HasAndBelongsToMany Relation - symmetric many-to-many through a junction
//! model whose keys follow the naming convention
//!
//! Once resolved, the scoped behavior is exactly the through-repository
//! behavior; only the metadata resolution differs (junction keys default to
//! `camelCase(<Model>_id)` on both sides).

use std::marker::PhantomData;

use serde_json::Value;

use crate::error::OrmResult;
use crate::model::Entity;
use crate::relations::has_many_through::{
    HasManyThroughRepository, HasManyThroughRepositoryFactory,
};
use crate::relations::include::InclusionResolverFn;
use crate::relations::metadata::{RelationDefinition, ResolvedRelation};
use crate::relations::resolution::resolve_has_and_belongs_to_many_metadata;
use crate::repository::{EntityRepository, Getter};

/// Validates a hasAndBelongsToMany declaration once and hands out
/// junction-scoped repositories per owning instance.
pub struct HasAndBelongsToManyRepositoryFactory<E, R, J, JR> {
    inner: HasManyThroughRepositoryFactory<E, R, J, JR>,
    _marker: PhantomData<fn() -> (E, J)>,
}

impl<E, R, J, JR> HasAndBelongsToManyRepositoryFactory<E, R, J, JR>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
    J: Entity,
    JR: EntityRepository<J> + 'static,
{
    pub fn new(
        definition: &RelationDefinition,
        target: Getter<R>,
        through: Getter<JR>,
    ) -> OrmResult<Self> {
        let relation = resolve_has_and_belongs_to_many_metadata(definition)?;
        Ok(Self {
            inner: HasManyThroughRepositoryFactory::from_resolved(relation, target, through)?,
            _marker: PhantomData,
        })
    }

    pub fn relation(&self) -> &ResolvedRelation {
        self.inner.relation()
    }

    /// Repository restricted to the targets linked to one source instance
    pub fn scoped(&self, source_id: Value) -> HasManyThroughRepository<E, R, J, JR> {
        self.inner.scoped(source_id)
    }

    /// Inclusion resolver eager-loading this relation
    pub fn inclusion_resolver(&self) -> InclusionResolverFn {
        self.inner.inclusion_resolver()
    }
}

/// Inclusion resolver for a hasAndBelongsToMany declaration, validating it
/// up front
pub fn create_has_and_belongs_to_many_inclusion_resolver<E, R, J, JR>(
    definition: &RelationDefinition,
    target: Getter<R>,
    through: Getter<JR>,
) -> OrmResult<InclusionResolverFn>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
    J: Entity,
    JR: EntityRepository<J> + 'static,
{
    let relation = resolve_has_and_belongs_to_many_metadata(definition)?;
    let factory = HasManyThroughRepositoryFactory::<E, R, J, JR>::from_resolved(
        relation, target, through,
    )?;
    Ok(factory.inclusion_resolver())
}
