//! Lookup Maps and Fan-out - builds foreign-key lookup tables from flat row
//! lists and expands them back into position-aligned results per source id

use std::collections::HashMap;

use serde_json::Value;

use arbor_dao::{canonical_key, Filter, Record};

use crate::error::{OrmError, OrmResult};
use crate::model::Entity;
use crate::relations::constraint::{dedupe_values, target_ids_constraint};
use crate::repository::EntityRepository;

/// How rows sharing a key value are reduced into one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Append every row to an ordered bucket (one-to-many)
    AsArray,
    /// Keep a single row per key; a later row overwrites an earlier one
    /// (one-to-one, where duplicates are not expected)
    AsSingleItem,
}

/// One lookup-map bucket
#[derive(Debug, Clone, PartialEq)]
pub enum Bucket {
    One(Record),
    Many(Vec<Record>),
}

/// Mapping from foreign-key value to the row(s) carrying that value
#[derive(Debug, Default)]
pub struct LookupMap {
    buckets: HashMap<String, Bucket>,
}

impl LookupMap {
    pub fn get(&self, key: &Value) -> Option<&Bucket> {
        self.buckets.get(&canonical_key(key))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Build a lookup map from `rows` keyed by `key_field` in one linear pass.
///
/// Rows with an absent or null key are skipped. Under `AsArray` the bucket
/// preserves row encounter order.
pub fn build_lookup_map(rows: &[Record], key_field: &str, reduction: Reduction) -> LookupMap {
    let mut map = LookupMap::default();
    for row in rows {
        let Some(key) = row.get(key_field).filter(|value| !value.is_null()) else {
            continue;
        };
        let key = canonical_key(key);
        match reduction {
            Reduction::AsSingleItem => {
                map.buckets.insert(key, Bucket::One(row.clone()));
            }
            Reduction::AsArray => match map.buckets.entry(key).or_insert_with(|| Bucket::Many(Vec::new())) {
                Bucket::Many(bucket) => bucket.push(row.clone()),
                Bucket::One(_) => unreachable!("array reduction never stores single buckets"),
            },
        }
    }
    map
}

/// Expand target rows into one ordered bucket per source id.
///
/// The output is position-aligned with `source_ids`, repeats included; ids
/// with no matching rows get an empty bucket.
pub fn flatten_targets_of_one_to_many(
    source_ids: &[Value],
    target_rows: &[Record],
    key_field: &str,
) -> Vec<Vec<Record>> {
    let map = build_lookup_map(target_rows, key_field, Reduction::AsArray);
    source_ids
        .iter()
        .map(|id| match map.get(id) {
            Some(Bucket::Many(rows)) => rows.clone(),
            _ => Vec::new(),
        })
        .collect()
}

/// Expand target rows into at most one row per source id.
///
/// The output is position-aligned with `source_ids`; ids with no matching
/// row get `None`.
pub fn flatten_targets_of_one_to_one(
    source_ids: &[Value],
    target_rows: &[Record],
    key_field: &str,
) -> Vec<Option<Record>> {
    let map = build_lookup_map(target_rows, key_field, Reduction::AsSingleItem);
    source_ids
        .iter()
        .map(|id| match map.get(id) {
            Some(Bucket::One(row)) => Some(row.clone()),
            _ => None,
        })
        .collect()
}

/// Per-row values of `key_field`, position-aligned with `rows` (null when
/// the row has no value)
pub fn key_values(rows: &[Record], key_field: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(key_field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Fetch the target rows whose `key_field` matches any of `ids`.
///
/// An empty id list resolves to an empty result without touching the
/// backend. Per-relation scoping is not supported at this layer; a
/// non-empty `scope` is rejected rather than ignored.
pub async fn find_by_foreign_keys<E, R>(
    repository: &R,
    key_field: &str,
    ids: &[Value],
    scope: Option<&Filter>,
) -> OrmResult<Vec<E>>
where
    E: Entity,
    R: EntityRepository<E> + ?Sized,
{
    if scope.map_or(false, |filter| !filter.is_empty()) {
        return Err(OrmError::Unsupported(
            "scoped queries are not supported when fetching by foreign keys".to_string(),
        ));
    }

    let ids = dedupe_values(ids);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let filter = Filter::from_where(target_ids_constraint(key_field, &ids));
    repository.find(Some(filter)).await
}
