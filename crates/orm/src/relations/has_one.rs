//! HasOne Relation - constrained repository and inclusion resolver for
//! one-to-one relations where the single target carries the foreign key

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use arbor_dao::{id_display, Filter, Record};

use crate::error::{OrmError, OrmResult};
use crate::model::{records_of, Entity};
use crate::relations::constraint::{merge_data, merge_filter, merge_where, source_constraint};
use crate::relations::include::InclusionResolverFn;
use crate::relations::lookup::{find_by_foreign_keys, flatten_targets_of_one_to_one, key_values};
use crate::relations::metadata::{RelationDefinition, ResolvedRelation};
use crate::relations::resolution::resolve_has_one_metadata;
use crate::repository::{EntityRepository, Getter};

/// Validates a hasOne declaration once and hands out repositories scoped to
/// one owning instance at a time.
pub struct HasOneRepositoryFactory<E, R> {
    relation: ResolvedRelation,
    target: Getter<R>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> HasOneRepositoryFactory<E, R>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    pub fn new(definition: &RelationDefinition, target: Getter<R>) -> OrmResult<Self> {
        Ok(Self {
            relation: resolve_has_one_metadata(definition)?,
            target,
            _entity: PhantomData,
        })
    }

    pub fn relation(&self) -> &ResolvedRelation {
        &self.relation
    }

    /// Repository restricted to the single target owned by one source
    /// instance
    pub fn scoped(&self, source_id: Value) -> HasOneRepository<E, R> {
        HasOneRepository {
            target: self.target.clone(),
            target_model: self.relation.target_model.clone(),
            source_id: source_id.clone(),
            constraint: source_constraint(&self.relation.key_to, source_id),
            _entity: PhantomData,
        }
    }

    /// Inclusion resolver eager-loading this relation
    pub fn inclusion_resolver(&self) -> InclusionResolverFn {
        has_one_resolver(self.relation.clone(), self.target.clone())
    }
}

/// A target repository constrained to the one row belonging to a source
/// instance
pub struct HasOneRepository<E, R> {
    target: Getter<R>,
    target_model: String,
    source_id: Value,
    constraint: Record,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> HasOneRepository<E, R>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    pub fn constraint(&self) -> &Record {
        &self.constraint
    }

    /// Create the target owned by the source instance.
    ///
    /// Uniqueness of the target is not enforced here; that is the
    /// database's job.
    pub async fn create(&self, entity: &E) -> OrmResult<E> {
        let data = merge_data(entity.to_record()?, &self.constraint)?;
        let entity = E::from_record(&data)?;
        self.target.get().await?.create(&entity).await
    }

    /// Fetch the target, failing with a not-found error when none exists
    pub async fn get(&self, filter: Option<Filter>) -> OrmResult<E> {
        let filter = merge_filter(filter, &self.constraint)?.with_limit(1);
        let found = self.target.get().await?.find(Some(filter)).await?;
        found.into_iter().next().ok_or_else(|| {
            OrmError::entity_not_found(self.target_model.clone(), id_display(&self.source_id))
        })
    }

    /// Patch the target's properties
    pub async fn update(&self, data: Record) -> OrmResult<u64> {
        let data = merge_data(data, &self.constraint)?;
        let where_clause = merge_where(None, &self.constraint);
        self.target
            .get()
            .await?
            .update_all(data, Some(where_clause))
            .await
    }

    /// Delete the target
    pub async fn delete(&self) -> OrmResult<u64> {
        let where_clause = merge_where(None, &self.constraint);
        self.target.get().await?.delete_all(Some(where_clause)).await
    }
}

fn has_one_resolver<E, R>(relation: ResolvedRelation, target: Getter<R>) -> InclusionResolverFn
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

            let matches =
                flatten_targets_of_one_to_one(&source_ids, &target_records, &relation.key_to);
            let related: Vec<Value> = matches
                .into_iter()
                .map(|row| row.map(Value::Object).unwrap_or(Value::Null))
                .collect();
            Ok(related)
        })
    })
}

/// Inclusion resolver for a hasOne declaration, validating it up front
pub fn create_has_one_inclusion_resolver<E, R>(
    definition: &RelationDefinition,
    target: Getter<R>,
) -> OrmResult<InclusionResolverFn>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    Ok(has_one_resolver::<E, R>(
        resolve_has_one_metadata(definition)?,
        target,
    ))
}
