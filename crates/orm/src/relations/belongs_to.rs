//! BelongsTo Relation - accessor and inclusion resolver for many-to-one
//! relations where the source carries the foreign key

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use arbor_dao::{id_display, Filter, Where};

use crate::error::{OrmError, OrmResult};
use crate::model::{records_of, Entity};
use crate::relations::include::InclusionResolverFn;
use crate::relations::lookup::{find_by_foreign_keys, flatten_targets_of_one_to_one, key_values};
use crate::relations::metadata::{RelationDefinition, ResolvedRelation};
use crate::relations::resolution::resolve_belongs_to_metadata;
use crate::repository::{EntityRepository, Getter};

/// Validates a belongsTo declaration once and resolves the owner of any
/// source instance on demand.
pub struct BelongsToAccessor<S, E, R> {
    relation: ResolvedRelation,
    target: Getter<R>,
    _marker: PhantomData<fn(&S) -> E>,
}

impl<S, E, R> BelongsToAccessor<S, E, R>
where
    S: Entity,
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    pub fn new(definition: &RelationDefinition, target: Getter<R>) -> OrmResult<Self> {
        Ok(Self {
            relation: resolve_belongs_to_metadata(definition)?,
            target,
            _marker: PhantomData,
        })
    }

    pub fn relation(&self) -> &ResolvedRelation {
        &self.relation
    }

    /// Fetch the target the source instance points at.
    ///
    /// A missing or dangling foreign key fails with a not-found error
    /// naming the target model and the key value.
    pub async fn get(&self, source: &S) -> OrmResult<E> {
        let record = source.to_record()?;
        let fk_value = record
            .get(&self.relation.key_from)
            .cloned()
            .unwrap_or(Value::Null);
        if fk_value.is_null() {
            return Err(OrmError::entity_not_found(
                self.relation.target_model.clone(),
                id_display(&fk_value),
            ));
        }

        let filter = Filter::from_where(Where::eq(self.relation.key_to.as_str(), fk_value.clone()))
            .with_limit(1);
        let found = self.target.get().await?.find(Some(filter)).await?;
        found.into_iter().next().ok_or_else(|| {
            OrmError::entity_not_found(self.relation.target_model.clone(), id_display(&fk_value))
        })
    }

    /// Inclusion resolver eager-loading this relation
    pub fn inclusion_resolver(&self) -> InclusionResolverFn {
        belongs_to_resolver(self.relation.clone(), self.target.clone())
    }
}

fn belongs_to_resolver<E, R>(relation: ResolvedRelation, target: Getter<R>) -> InclusionResolverFn
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    Arc::new(move |sources, inclusion| {
        let relation = relation.clone();
        let target = target.clone();
        Box::pin(async move {
            let rows = sources().await?;
            // fan-in: the source side carries the key, the target key is
            // the lookup key
            let fk_values = key_values(&rows, &relation.key_from);
            let lookup_ids: Vec<Value> = fk_values
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
                flatten_targets_of_one_to_one(&fk_values, &target_records, &relation.key_to);
            let related: Vec<Value> = matches
                .into_iter()
                .map(|row| row.map(Value::Object).unwrap_or(Value::Null))
                .collect();
            Ok(related)
        })
    })
}

/// Inclusion resolver for a belongsTo declaration, validating it up front
pub fn create_belongs_to_inclusion_resolver<E, R>(
    definition: &RelationDefinition,
    target: Getter<R>,
) -> OrmResult<InclusionResolverFn>
where
    E: Entity,
    R: EntityRepository<E> + 'static,
{
    Ok(belongs_to_resolver::<E, R>(
        resolve_belongs_to_metadata(definition)?,
        target,
    ))
}
