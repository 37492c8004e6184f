//! In-memory connector.
//!
//! Keeps every model's rows in process memory behind an async lock. Used by
//! the test suites and as the reference connector semantics: generated ids,
//! filter evaluation, ordering, pagination and field projection all behave
//! here the way a real backend is expected to behave.
//!
//! Referential integrity is NOT enforced: a row may carry a foreign-key
//! value that matches nothing. Enforcing that is the database's job, not
//! this layer's.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::connector::Connector;
use crate::error::DaoResult;
use crate::filter::{Direction, Filter, Where};
use crate::value::{compare_values, is_missing, Record};

/// How the connector generates identifiers for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Monotonically increasing integers starting at 1
    Number,
    /// Random v4 UUID strings
    Uuid,
}

#[derive(Debug)]
struct ModelStore {
    id_property: String,
    id_kind: IdKind,
    next_id: u64,
    rows: Vec<Record>,
}

impl ModelStore {
    fn new(id_property: String, id_kind: IdKind) -> Self {
        Self {
            id_property,
            id_kind,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    fn generate_id(&mut self) -> Value {
        match self.id_kind {
            IdKind::Number => {
                let id = self.next_id;
                self.next_id += 1;
                Value::from(id)
            }
            IdKind::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// In-memory CRUD backend
#[derive(Debug, Default)]
pub struct MemoryConnector {
    stores: RwLock<HashMap<String, ModelStore>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a model's id property and id generation strategy.
    ///
    /// Models that are never declared default to a numeric `id` property.
    pub async fn define(&self, model: &str, id_property: &str, id_kind: IdKind) {
        let mut stores = self.stores.write().await;
        stores.insert(
            model.to_string(),
            ModelStore::new(id_property.to_string(), id_kind),
        );
    }

    /// Drop every stored row (model declarations survive)
    pub async fn clear(&self) {
        let mut stores = self.stores.write().await;
        for store in stores.values_mut() {
            store.rows.clear();
        }
    }
}

fn matching_rows<'a>(rows: &'a [Record], where_clause: Option<&Where>) -> Vec<&'a Record> {
    rows.iter()
        .filter(|row| where_clause.map_or(true, |clause| clause.matches(row)))
        .collect()
}

fn apply_order(rows: &mut [&Record], filter: &Filter) {
    if filter.order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in &filter.order {
            let x = a.get(&order.field).unwrap_or(&Value::Null);
            let y = b.get(&order.field).unwrap_or(&Value::Null);
            let cmp = match order.direction {
                Direction::Asc => compare_values(x, y),
                Direction::Desc => compare_values(y, x),
            };
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn project(row: &Record, fields: Option<&Vec<String>>) -> Record {
    match fields {
        None => row.clone(),
        Some(fields) => row
            .iter()
            .filter(|(name, _)| fields.iter().any(|f| f == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, model: &str, mut data: Record) -> DaoResult<Record> {
        let mut stores = self.stores.write().await;
        let store = stores
            .entry(model.to_string())
            .or_insert_with(|| ModelStore::new("id".to_string(), IdKind::Number));

        if is_missing(data.get(&store.id_property)) {
            let id = store.generate_id();
            data.insert(store.id_property.clone(), id);
        }

        debug!(model, rows = store.rows.len() + 1, "memory connector create");
        store.rows.push(data.clone());
        Ok(data)
    }

    async fn find(&self, model: &str, filter: &Filter) -> DaoResult<Vec<Record>> {
        let stores = self.stores.read().await;
        let Some(store) = stores.get(model) else {
            return Ok(Vec::new());
        };

        let mut matched = matching_rows(&store.rows, filter.where_clause.as_ref());
        apply_order(&mut matched, filter);

        let skip = filter.skip.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let results: Vec<Record> = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| project(row, filter.fields.as_ref()))
            .collect();

        debug!(model, matched = results.len(), "memory connector find");
        Ok(results)
    }

    async fn update_all(
        &self,
        model: &str,
        data: &Record,
        where_clause: Option<&Where>,
    ) -> DaoResult<u64> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(model) else {
            return Ok(0);
        };

        let mut count = 0;
        for row in store.rows.iter_mut() {
            if where_clause.map_or(true, |clause| clause.matches(row)) {
                for (field, value) in data {
                    row.insert(field.clone(), value.clone());
                }
                count += 1;
            }
        }

        debug!(model, count, "memory connector update_all");
        Ok(count)
    }

    async fn delete_all(&self, model: &str, where_clause: Option<&Where>) -> DaoResult<u64> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(model) else {
            return Ok(0);
        };

        let before = store.rows.len();
        store
            .rows
            .retain(|row| !where_clause.map_or(true, |clause| clause.matches(row)));
        let count = (before - store.rows.len()) as u64;

        debug!(model, count, "memory connector delete_all");
        Ok(count)
    }

    async fn count(&self, model: &str, where_clause: Option<&Where>) -> DaoResult<u64> {
        let stores = self.stores.read().await;
        let Some(store) = stores.get(model) else {
            return Ok(0);
        };
        Ok(matching_rows(&store.rows, where_clause).len() as u64)
    }
}
