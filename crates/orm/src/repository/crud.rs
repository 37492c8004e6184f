//! Default CRUD Repository - bridges typed entities onto a datasource
//!
//! Translates between strict entity types and the connector's loosely-typed
//! records, maps "nothing matched" on by-id operations into typed not-found
//! errors, and runs the inclusion engine over fetched rows when a filter
//! asks for eager loading.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use arbor_dao::{id_display, Connector, DataSource, Filter, Record, Transaction, Where};

use crate::error::{OrmError, OrmResult};
use crate::model::Entity;
use crate::relations::include::{
    include_related_models, InclusionResolverFn, InclusionResolverRegistry,
};

/// Repository over one entity type, backed by a datasource connector.
pub struct DefaultCrudRepository<E: Entity> {
    connector: Arc<dyn Connector>,
    inclusion_resolvers: InclusionResolverRegistry,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> std::fmt::Debug for DefaultCrudRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCrudRepository")
            .field("model", &Self::model_name())
            .field("connector", &self.connector.name())
            .finish()
    }
}

impl<E: Entity> DefaultCrudRepository<E> {
    pub fn new(datasource: &DataSource) -> Self {
        Self {
            connector: datasource.connector(),
            inclusion_resolvers: InclusionResolverRegistry::new(),
            _entity: PhantomData,
        }
    }

    fn model_name() -> &'static str {
        E::model_name()
    }

    /// The registry of relations this repository can eager-load.
    ///
    /// Populate it right after construction; it is consulted read-only at
    /// query time.
    pub fn inclusion_resolvers(&self) -> &InclusionResolverRegistry {
        &self.inclusion_resolvers
    }

    /// Register an inclusion resolver under a relation name
    pub fn register_inclusion(&self, relation: impl Into<String>, resolver: InclusionResolverFn) {
        self.inclusion_resolvers.register(relation, resolver);
    }

    fn primary_id_property() -> OrmResult<&'static str> {
        E::definition()
            .id_properties()
            .first()
            .copied()
            .ok_or_else(|| OrmError::MissingId {
                model: E::definition().name.clone(),
            })
    }

    fn by_id_clause(id: &Value) -> OrmResult<Where> {
        Ok(Where::eq(Self::primary_id_property()?, id.clone()))
    }

    /// Persist a new entity after validating it against the model definition
    pub async fn create(&self, entity: &E) -> OrmResult<E> {
        let record = entity.to_record()?;
        E::definition().validate_record(&record)?;

        debug!(model = Self::model_name(), "create");
        let created = self.connector.create(Self::model_name(), record).await?;
        E::from_record(&created)
    }

    /// Persist several entities in declaration order
    pub async fn create_all(&self, entities: &[E]) -> OrmResult<Vec<E>> {
        let mut created = Vec::with_capacity(entities.len());
        for entity in entities {
            created.push(self.create(entity).await?);
        }
        Ok(created)
    }

    /// Return the entities matching the filter, eager-loading any included
    /// relations
    pub async fn find(&self, filter: Option<Filter>) -> OrmResult<Vec<E>> {
        let mut filter = filter.unwrap_or_default();
        let inclusions = std::mem::take(&mut filter.include);

        let rows = self.connector.find(Self::model_name(), &filter).await?;
        let rows = if inclusions.is_empty() {
            rows
        } else {
            include_related_models(&self.inclusion_resolvers, rows, &inclusions).await?
        };

        rows.iter().map(E::from_record).collect()
    }

    /// First entity matching the filter, if any
    pub async fn find_one(&self, filter: Option<Filter>) -> OrmResult<Option<E>> {
        let filter = filter.unwrap_or_default().with_limit(1);
        Ok(self.find(Some(filter)).await?.into_iter().next())
    }

    /// Fetch one entity by id or fail with a not-found error
    pub async fn find_by_id(&self, id: &Value) -> OrmResult<E> {
        let filter = Filter::from_where(Self::by_id_clause(id)?);
        self.find_one(Some(filter))
            .await?
            .ok_or_else(|| OrmError::entity_not_found(Self::model_name(), id_display(id)))
    }

    /// Merge `data` into every matching row
    pub async fn update_all(&self, data: Record, where_clause: Option<Where>) -> OrmResult<u64> {
        debug!(model = Self::model_name(), "update_all");
        Ok(self
            .connector
            .update_all(Self::model_name(), &data, where_clause.as_ref())
            .await?)
    }

    /// Merge `data` into the row with the given id
    pub async fn update_by_id(&self, id: &Value, data: Record) -> OrmResult<()> {
        let count = self.update_all(data, Some(Self::by_id_clause(id)?)).await?;
        if count == 0 {
            return Err(OrmError::entity_not_found(Self::model_name(), id_display(id)));
        }
        Ok(())
    }

    /// Replace the row with the given id by the full entity state.
    ///
    /// Properties the entity leaves unset are written as null; this is a
    /// replace, not a patch.
    pub async fn replace_by_id(&self, id: &Value, entity: &E) -> OrmResult<()> {
        let record = entity.to_record()?;
        let mut replacement = Record::new();
        for (name, property) in &E::definition().properties {
            if property.id {
                continue;
            }
            replacement.insert(
                name.clone(),
                record.get(name).cloned().unwrap_or(Value::Null),
            );
        }

        let count = self
            .update_all(replacement, Some(Self::by_id_clause(id)?))
            .await?;
        if count == 0 {
            return Err(OrmError::entity_not_found(Self::model_name(), id_display(id)));
        }
        Ok(())
    }

    /// Delete every matching row
    pub async fn delete_all(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        debug!(model = Self::model_name(), "delete_all");
        Ok(self
            .connector
            .delete_all(Self::model_name(), where_clause.as_ref())
            .await?)
    }

    /// Delete the row with the given id
    pub async fn delete_by_id(&self, id: &Value) -> OrmResult<()> {
        let count = self.delete_all(Some(Self::by_id_clause(id)?)).await?;
        if count == 0 {
            return Err(OrmError::entity_not_found(Self::model_name(), id_display(id)));
        }
        Ok(())
    }

    /// Count the matching rows
    pub async fn count(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        Ok(self
            .connector
            .count(Self::model_name(), where_clause.as_ref())
            .await?)
    }

    /// Whether a row with the given id exists
    pub async fn exists(&self, id: &Value) -> OrmResult<bool> {
        Ok(self.count(Some(Self::by_id_clause(id)?)).await? > 0)
    }

    /// Create the entity when it has no id yet, replace it otherwise
    pub async fn save(&self, entity: &E) -> OrmResult<E> {
        let id = entity.get_id()?;
        if id.is_null() {
            return self.create(entity).await;
        }
        self.replace_by_id(&id, entity).await?;
        Ok(entity.clone())
    }

    /// Run a native backend command; fails when the connector has none
    pub async fn execute(&self, command: &str, params: &[Value]) -> OrmResult<Value> {
        Ok(self.connector.execute(command, params).await?)
    }

    /// Open a backend transaction; fails when the connector has none
    pub async fn begin_transaction(&self) -> OrmResult<Box<dyn Transaction>> {
        Ok(self.connector.begin_transaction().await?)
    }
}

#[async_trait]
impl<E: Entity> crate::repository::traits::EntityRepository<E> for DefaultCrudRepository<E> {
    async fn create(&self, entity: &E) -> OrmResult<E> {
        DefaultCrudRepository::create(self, entity).await
    }

    async fn find(&self, filter: Option<Filter>) -> OrmResult<Vec<E>> {
        DefaultCrudRepository::find(self, filter).await
    }

    async fn update_all(&self, data: Record, where_clause: Option<Where>) -> OrmResult<u64> {
        DefaultCrudRepository::update_all(self, data, where_clause).await
    }

    async fn delete_all(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        DefaultCrudRepository::delete_all(self, where_clause).await
    }

    async fn count(&self, where_clause: Option<Where>) -> OrmResult<u64> {
        DefaultCrudRepository::count(self, where_clause).await
    }

    async fn find_by_id(&self, id: &Value) -> OrmResult<E> {
        DefaultCrudRepository::find_by_id(self, id).await
    }
}
