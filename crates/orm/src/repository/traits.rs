//! The repository CRUD contract consumed by the relation machinery.

use async_trait::async_trait;
use serde_json::Value;

use arbor_dao::{Filter, Record, Where};

use crate::error::OrmResult;
use crate::model::Entity;

/// The boundary contract every relation factory and inclusion resolver
/// depends on. `DefaultCrudRepository` implements it over a datasource;
/// applications can substitute their own implementations (caching layers,
/// fakes, remote repositories) without touching the relation code.
#[async_trait]
pub trait EntityRepository<E: Entity>: Send + Sync {
    /// Persist a new entity, returning it with generated fields filled in
    async fn create(&self, entity: &E) -> OrmResult<E>;

    /// Return the entities matching the filter
    async fn find(&self, filter: Option<Filter>) -> OrmResult<Vec<E>>;

    /// Merge `data` into every matching row, returning the count
    async fn update_all(&self, data: Record, where_clause: Option<Where>) -> OrmResult<u64>;

    /// Delete every matching row, returning the count
    async fn delete_all(&self, where_clause: Option<Where>) -> OrmResult<u64>;

    /// Count the matching rows
    async fn count(&self, where_clause: Option<Where>) -> OrmResult<u64>;

    /// Fetch a single entity by id, failing with a not-found error
    async fn find_by_id(&self, id: &Value) -> OrmResult<E>;
}
