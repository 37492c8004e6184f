//! The opaque CRUD backend contract.
//!
//! A connector speaks in model names and loosely-typed records; it knows
//! nothing about entities, relations or constraints. The repository layer
//! above is responsible for translating typed entities in and out.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DaoError, DaoResult};
use crate::filter::{Filter, Where};
use crate::value::Record;

/// An in-flight backend transaction.
///
/// Only connectors that support transactions hand these out; the default
/// `Connector::begin_transaction` fails before one is ever created.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(self: Box<Self>) -> DaoResult<()>;
    async fn rollback(self: Box<Self>) -> DaoResult<()>;
}

/// The minimal CRUD contract every backing store must provide.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector implementation name (e.g. "memory")
    fn name(&self) -> &str;

    /// Persist one record, returning it with generated fields filled in
    async fn create(&self, model: &str, data: Record) -> DaoResult<Record>;

    /// Return the records matching the filter
    async fn find(&self, model: &str, filter: &Filter) -> DaoResult<Vec<Record>>;

    /// Merge `data` into every record matching the clause, returning the
    /// number of records touched
    async fn update_all(
        &self,
        model: &str,
        data: &Record,
        where_clause: Option<&Where>,
    ) -> DaoResult<u64>;

    /// Delete every record matching the clause, returning the count
    async fn delete_all(&self, model: &str, where_clause: Option<&Where>) -> DaoResult<u64>;

    /// Count the records matching the clause
    async fn count(&self, model: &str, where_clause: Option<&Where>) -> DaoResult<u64>;

    /// Run a native backend command. Connectors without a native command
    /// surface inherit this failing default.
    async fn execute(&self, _command: &str, _params: &[Value]) -> DaoResult<Value> {
        Err(DaoError::Unsupported(
            "execute() must be implemented by the connector".to_string(),
        ))
    }

    /// Open a backend transaction. Connectors without transaction support
    /// inherit this failing default.
    async fn begin_transaction(&self) -> DaoResult<Box<dyn Transaction>> {
        Err(DaoError::Unsupported(
            "beginTransaction() must be implemented by the connector".to_string(),
        ))
    }
}
