//! HasManyThrough Relation - constrained repository and inclusion resolver
//! for many-to-many relations routed through a junction model
//!
//! Every operation is two-phase: junction rows are consulted (or written)
//! first, target rows second. Constraint conflicts are detected before
//! either phase runs.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use arbor_dao::{Filter, Record, Where};

use crate::error::{OrmError, OrmResult};
use crate::model::{records_of, Entity};
use crate::relations::constraint::{
    combine_where, dedupe_values, merge_data, merge_filter_where, source_constraint,
    target_ids_constraint,
};
use crate::relations::include::InclusionResolverFn;
use crate::relations::lookup::{
    build_lookup_map, find_by_foreign_keys, flatten_targets_of_one_to_many, key_values, Bucket,
    Reduction,
};
use crate::relations::metadata::{RelationDefinition, ResolvedRelation, ResolvedThrough};
use crate::relations::resolution::resolve_has_many_through_metadata;
use crate::repository::{EntityRepository, Getter};

/// Validates a hasManyThrough declaration once and hands out repositories
/// scoped to one owning instance at a time.
pub struct HasManyThroughRepositoryFactory<E, R, J, JR> {
    relation: ResolvedRelation,
    through_keys: ResolvedThrough,
    target: Getter<R>,
    through: Getter<JR>,
    _marker: PhantomData<fn() -> (E, J)>,
}

impl<E, R, J, JR> HasManyThroughRepositoryFactory<E, R, J, JR>
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
        Self::from_resolved(resolve_has_many_through_metadata(definition)?, target, through)
    }

    /// Build from already-resolved metadata (shared with the
    /// hasAndBelongsToMany factory).
    pub(crate) fn from_resolved(
        relation: ResolvedRelation,
        target: Getter<R>,
        through: Getter<JR>,
    ) -> OrmResult<Self> {
        let through_keys = relation.through.clone().ok_or_else(|| {
            OrmError::invalid_relation(
                relation.source_model.clone(),
                relation.name.clone(),
                "through configuration is missing",
            )
        })?;
        Ok(Self {
            relation,
            through_keys,
            target,
            through,
            _marker: PhantomData,
        })
    }

    pub fn relation(&self) -> &ResolvedRelation {
        &self.relation
    }

    /// Repository restricted to the targets linked to one source instance
    pub fn scoped(&self, source_id: Value) -> HasManyThroughRepository<E, R, J, JR> {
        HasManyThroughRepository {
            relation: self.relation.clone(),
            through_keys: self.through_keys.clone(),
            target: self.target.clone(),
            through: self.through.clone(),
            source_id,
            _marker: PhantomData,
        }
    }

    /// Inclusion resolver eager-loading this relation
    pub fn inclusion_resolver(&self) -> InclusionResolverFn {
        has_many_through_resolver::<E, R, J, JR>(
            self.relation.clone(),
            self.through_keys.clone(),
            self.target.clone(),
            self.through.clone(),
        )
    }
}

/// A target repository constrained to the rows linked to one source
/// instance through junction rows
pub struct HasManyThroughRepository<E, R, J, JR> {
    relation: ResolvedRelation,
    through_keys: ResolvedThrough,
    target: Getter<R>,
    through: Getter<JR>,
    source_id: Value,
    _marker: PhantomData<fn() -> (E, J)>,
}

impl<E, R, J, JR> HasManyThroughRepository<E, R, J, JR>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
    J: Entity,
    JR: EntityRepository<J> + 'static,
{
    /// The enforced junction-side field values
    pub fn through_constraint(&self) -> Record {
        source_constraint(&self.through_keys.source_key, self.source_id.clone())
    }

    fn through_clause(&self) -> Where {
        Where::eq(self.through_keys.source_key.as_str(), self.source_id.clone())
    }

    /// Junction rows linking the source instance
    async fn junction_records(&self) -> OrmResult<Vec<Record>> {
        let filter = Filter::from_where(self.through_clause());
        let junctions = self.through.get().await?.find(Some(filter)).await?;
        records_of(&junctions)
    }

    /// Deduplicated target key values carried by junction rows
    fn target_ids(&self, junctions: &[Record]) -> Vec<Value> {
        let values: Vec<Value> = key_values(junctions, &self.through_keys.target_key)
            .into_iter()
            .filter(|value| !value.is_null())
            .collect();
        dedupe_values(&values)
    }

    /// Find targets linked to the source instance.
    ///
    /// Queries the junction first; a source with no junction rows resolves
    /// to an empty result without querying the target.
    pub async fn find(&self, filter: Option<Filter>) -> OrmResult<Vec<E>> {
        let junctions = self.junction_records().await?;
        let ids = self.target_ids(&junctions);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let constraint = target_ids_constraint(&self.relation.key_to, &ids);
        let filter = merge_filter_where(filter, constraint)?;
        self.target.get().await?.find(Some(filter)).await
    }

    /// Create a target and one junction row linking it to the source.
    ///
    /// Caller-supplied junction data disagreeing with the link keys fails
    /// before anything is persisted.
    pub async fn create(&self, entity: &E, through_data: Option<Record>) -> OrmResult<E> {
        let junction_seed = through_data.unwrap_or_default();
        // validate what we can before touching the backend
        let junction_seed = merge_data(junction_seed, &self.through_constraint())?;

        let created = self.target.get().await?.create(entity).await?;
        let created_record = created.to_record()?;
        let target_key_value = created_record
            .get(&self.relation.key_to)
            .cloned()
            .filter(|value| !value.is_null())
            .ok_or_else(|| OrmError::MissingId {
                model: self.relation.target_model.clone(),
            })?;

        let link = source_constraint(&self.through_keys.target_key, target_key_value);
        let junction_data = merge_data(junction_seed, &link)?;
        let junction = J::from_record(&junction_data)?;
        self.through.get().await?.create(&junction).await?;

        Ok(created)
    }

    /// Patch the targets linked to the source instance matching the clause
    pub async fn patch(&self, data: Record, where_clause: Option<Where>) -> OrmResult<u64> {
        let junctions = self.junction_records().await?;
        let ids = self.target_ids(&junctions);
        if ids.is_empty() {
            return Ok(0);
        }

        let scoped = combine_where(
            where_clause,
            target_ids_constraint(&self.relation.key_to, &ids),
        );
        self.target.get().await?.update_all(data, Some(scoped)).await
    }

    /// Delete targets linked to the source instance.
    ///
    /// Without a clause: every junction row of the source is removed, then
    /// the now-orphaned targets. With a clause: the matching targets are
    /// fetched first, only the junction rows linking the source to those
    /// targets are removed, then those targets.
    pub async fn delete(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        match where_clause {
            None => {
                let junctions = self.junction_records().await?;
                let ids = self.target_ids(&junctions);
                self.through
                    .get()
                    .await?
                    .delete_all(Some(self.through_clause()))
                    .await?;
                if ids.is_empty() {
                    return Ok(0);
                }
                let targets = target_ids_constraint(&self.relation.key_to, &ids);
                self.target.get().await?.delete_all(Some(targets)).await
            }
            Some(clause) => {
                // fetch-then-intersect: the matching targets are read with
                // an unscoped query before junction rows narrow them down
                let matching = self
                    .target
                    .get()
                    .await?
                    .find(Some(Filter::from_where(clause)))
                    .await?;
                let matching_records = records_of(&matching)?;
                let ids = self.target_ids_from_targets(&matching_records);
                if ids.is_empty() {
                    return Ok(0);
                }

                let junction_clause = combine_where(
                    Some(self.through_clause()),
                    target_ids_constraint(&self.through_keys.target_key, &ids),
                );
                self.through
                    .get()
                    .await?
                    .delete_all(Some(junction_clause))
                    .await?;

                let targets = target_ids_constraint(&self.relation.key_to, &ids);
                self.target.get().await?.delete_all(Some(targets)).await
            }
        }
    }

    fn target_ids_from_targets(&self, targets: &[Record]) -> Vec<Value> {
        let values: Vec<Value> = key_values(targets, &self.relation.key_to)
            .into_iter()
            .filter(|value| !value.is_null())
            .collect();
        dedupe_values(&values)
    }

    /// Link an existing target to the source with one junction row
    pub async fn link(&self, target_id: Value, through_data: Option<Record>) -> OrmResult<J> {
        let mut link = self.through_constraint();
        link.insert(self.through_keys.target_key.clone(), target_id);
        let junction_data = merge_data(through_data.unwrap_or_default(), &link)?;
        let junction = J::from_record(&junction_data)?;
        self.through.get().await?.create(&junction).await
    }

    /// Remove the junction row linking a target to the source; the target
    /// itself is untouched
    pub async fn unlink(&self, target_id: Value) -> OrmResult<u64> {
        let clause = self
            .through_clause()
            .with_eq(self.through_keys.target_key.as_str(), target_id);
        self.through.get().await?.delete_all(Some(clause)).await
    }
}

fn has_many_through_resolver<E, R, J, JR>(
    relation: ResolvedRelation,
    through_keys: ResolvedThrough,
    target: Getter<R>,
    through: Getter<JR>,
) -> InclusionResolverFn
where
    E: Entity,
    R: EntityRepository<E> + 'static,
    J: Entity,
    JR: EntityRepository<J> + 'static,
{
    Arc::new(move |sources, inclusion| {
        let relation = relation.clone();
        let through_keys = through_keys.clone();
        let target = target.clone();
        let through = through.clone();
        Box::pin(async move {
            let rows = sources().await?;
            let source_ids = key_values(&rows, &relation.key_from);
            let lookup_ids: Vec<Value> = source_ids
                .iter()
                .filter(|id| !id.is_null())
                .cloned()
                .collect();

            let through_repository = through.get().await?;
            let junctions: Vec<J> = find_by_foreign_keys(
                through_repository.as_ref(),
                &through_keys.source_key,
                &lookup_ids,
                None,
            )
            .await?;
            let junction_records = records_of(&junctions)?;

            let target_ids: Vec<Value> = key_values(&junction_records, &through_keys.target_key)
                .into_iter()
                .filter(|value| !value.is_null())
                .collect();
            let repository = target.get().await?;
            let targets: Vec<E> = find_by_foreign_keys(
                repository.as_ref(),
                &relation.key_to,
                &target_ids,
                inclusion.scope.as_ref(),
            )
            .await?;
            let target_records = records_of(&targets)?;
            let target_map =
                build_lookup_map(&target_records, &relation.key_to, Reduction::AsSingleItem);

            let junction_buckets = flatten_targets_of_one_to_many(
                &source_ids,
                &junction_records,
                &through_keys.source_key,
            );
            let related: Vec<Value> = junction_buckets
                .into_iter()
                .map(|bucket| {
                    let targets: Vec<Value> = bucket
                        .iter()
                        .filter_map(|junction| junction.get(&through_keys.target_key))
                        .filter_map(|target_id| match target_map.get(target_id) {
                            Some(Bucket::One(row)) => Some(Value::Object(row.clone())),
                            _ => None,
                        })
                        .collect();
                    Value::Array(targets)
                })
                .collect();
            Ok(related)
        })
    })
}

/// Inclusion resolver for a hasManyThrough declaration, validating it up
/// front
pub fn create_has_many_through_inclusion_resolver<E, R, J, JR>(
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
    let relation = resolve_has_many_through_metadata(definition)?;
    let through_keys = relation.through.clone().ok_or_else(|| {
        OrmError::invalid_relation(
            relation.source_model.clone(),
            relation.name.clone(),
            "through configuration is missing",
        )
    })?;
    Ok(has_many_through_resolver::<E, R, J, JR>(
        relation,
        through_keys,
        target,
        through,
    ))
}
