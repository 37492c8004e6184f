//! HasMany Relation - constrained repository and inclusion resolver for
//! one-to-many relations where the targets carry the foreign key

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use arbor_dao::{Filter, Record, Where};

use crate::error::OrmResult;
use crate::model::{records_of, Entity};
use crate::relations::constraint::{merge_data, merge_filter, merge_where, source_constraint};
use crate::relations::include::InclusionResolverFn;
use crate::relations::lookup::{find_by_foreign_keys, flatten_targets_of_one_to_many, key_values};
use crate::relations::metadata::{RelationDefinition, ResolvedRelation};
use crate::relations::resolution::resolve_has_many_metadata;
use crate::repository::{EntityRepository, Getter};

/// Validates a hasMany declaration once and hands out repositories scoped
/// to one owning instance at a time.
pub struct HasManyRepositoryFactory<E, R> {
    relation: ResolvedRelation,
    target: Getter<R>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> HasManyRepositoryFactory<E, R>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    pub fn new(definition: &RelationDefinition, target: Getter<R>) -> OrmResult<Self> {
        Ok(Self {
            relation: resolve_has_many_metadata(definition)?,
            target,
            _entity: PhantomData,
        })
    }

    pub fn relation(&self) -> &ResolvedRelation {
        &self.relation
    }

    /// Repository restricted to the targets owned by one source instance.
    ///
    /// Built fresh per access; it owns nothing beyond the constraint record
    /// and a cloned repository handle.
    pub fn scoped(&self, source_id: Value) -> HasManyRepository<E, R> {
        HasManyRepository {
            target: self.target.clone(),
            constraint: source_constraint(&self.relation.key_to, source_id),
            _entity: PhantomData,
        }
    }

    /// Inclusion resolver eager-loading this relation
    pub fn inclusion_resolver(&self) -> InclusionResolverFn {
        has_many_resolver(self.relation.clone(), self.target.clone())
    }
}

/// A target repository constrained to rows belonging to one source instance
pub struct HasManyRepository<E, R> {
    target: Getter<R>,
    constraint: Record,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> HasManyRepository<E, R>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    /// The enforced field values
    pub fn constraint(&self) -> &Record {
        &self.constraint
    }

    /// Create a target owned by the source instance.
    ///
    /// Caller data disagreeing with the constraint fails before anything is
    /// persisted.
    pub async fn create(&self, entity: &E) -> OrmResult<E> {
        let data = merge_data(entity.to_record()?, &self.constraint)?;
        let entity = E::from_record(&data)?;
        self.target.get().await?.create(&entity).await
    }

    /// Find targets of the source instance
    pub async fn find(&self, filter: Option<Filter>) -> OrmResult<Vec<E>> {
        let filter = merge_filter(filter, &self.constraint)?;
        self.target.get().await?.find(Some(filter)).await
    }

    /// Patch the source instance's targets matching the clause
    pub async fn patch(&self, data: Record, where_clause: Option<Where>) -> OrmResult<u64> {
        let data = merge_data(data, &self.constraint)?;
        let where_clause = merge_where(where_clause, &self.constraint);
        self.target
            .get()
            .await?
            .update_all(data, Some(where_clause))
            .await
    }

    /// Delete the source instance's targets matching the clause
    pub async fn delete(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        let where_clause = merge_where(where_clause, &self.constraint);
        self.target.get().await?.delete_all(Some(where_clause)).await
    }

    /// Count the source instance's targets matching the clause
    pub async fn count(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        let where_clause = merge_where(where_clause, &self.constraint);
        self.target.get().await?.count(Some(where_clause)).await
    }
}

fn has_many_resolver<E, R>(relation: ResolvedRelation, target: Getter<R>) -> InclusionResolverFn
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    Arc::new(move |sources, inclusion| {
        let relation = relation.clone();
        let target = target.clone();
        Box::pin(async move {
            let rows = sources().await?;
            let source_ids = key_values(&rows, &relation.key_from);
            let lookup_ids: Vec<Value> = source_ids
                .iter()
                .filter(|id| !id.is_null())
                .cloned()
                .collect();

            let repository = target.get().await?;
            let targets: Vec<E> = find_by_foreign_keys(
                repository.as_ref(),
                &relation.key_to,
                &lookup_ids,
                inclusion.scope.as_ref(),
            )
            .await?;
            let target_records = records_of(&targets)?;

            let buckets =
                flatten_targets_of_one_to_many(&source_ids, &target_records, &relation.key_to);
            let related: Vec<Value> = buckets
                .into_iter()
                .map(|bucket| Value::Array(bucket.into_iter().map(Value::Object).collect()))
                .collect();
            Ok(related)
        })
    })
}

/// Inclusion resolver for a hasMany declaration, validating it up front
pub fn create_has_many_inclusion_resolver<E, R>(
    definition: &RelationDefinition,
    target: Getter<R>,
) -> OrmResult<InclusionResolverFn>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    Ok(has_many_resolver::<E, R>(
        resolve_has_many_metadata(definition)?,
        target,
    ))
}
