//! Inclusion Resolution - eager-loads related entities into query results
//!
//! A repository registers one resolver per relation it supports for eager
//! loading. At query time the engine validates the requested inclusions,
//! hands every resolver a shared source-row fetcher that evaluates at most
//! once, and merges each resolver's result onto the source rows under the
//! relation's name.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use arbor_dao::{Inclusion, Record};

use crate::error::{OrmError, OrmResult};
use crate::repository::BoxFuture;

/// Lazily-evaluated accessor to the already-fetched source rows.
///
/// However many resolvers share one fetcher, the underlying fetch runs at
/// most once.
pub type SourceFetcher = Arc<dyn Fn() -> BoxFuture<OrmResult<Arc<Vec<Record>>>> + Send + Sync>;

/// One registered inclusion resolver.
///
/// Contract: the returned vector is position-aligned with the source rows -
/// one related value (object, array or null) per source row. The engine
/// does not validate alignment; a misbehaving resolver produces wrong data,
/// not a crash.
pub type InclusionResolverFn =
    Arc<dyn Fn(SourceFetcher, Inclusion) -> BoxFuture<OrmResult<Vec<Value>>> + Send + Sync>;

/// Fetcher over rows that are already in hand
pub fn fetched_sources(rows: Vec<Record>) -> SourceFetcher {
    let rows = Arc::new(rows);
    Arc::new(move || {
        let rows = Arc::clone(&rows);
        Box::pin(async move { Ok(rows) })
    })
}

/// Fetcher that runs `fetch` on first use and caches the rows for every
/// later call
pub fn deferred_sources<F, Fut>(fetch: F) -> SourceFetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OrmResult<Vec<Record>>> + Send + 'static,
{
    let fetch = Arc::new(fetch);
    let cell: Arc<OnceCell<Arc<Vec<Record>>>> = Arc::new(OnceCell::new());
    Arc::new(move || {
        let fetch = Arc::clone(&fetch);
        let cell = Arc::clone(&cell);
        Box::pin(async move {
            cell.get_or_try_init(|| async move { Ok(Arc::new(fetch().await?)) })
                .await
                .map(Arc::clone)
        })
    })
}

/// Per-repository map of relation name to inclusion resolver.
///
/// Populated at repository construction time, read-only afterwards.
#[derive(Clone, Default)]
pub struct InclusionResolverRegistry {
    resolvers: Arc<DashMap<String, InclusionResolverFn>>,
}

impl InclusionResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the resolver for a relation name
    pub fn register(&self, relation: impl Into<String>, resolver: InclusionResolverFn) {
        let relation = relation.into();
        debug!(relation = %relation, "registering inclusion resolver");
        self.resolvers.insert(relation, resolver);
    }

    pub fn get(&self, relation: &str) -> Option<InclusionResolverFn> {
        self.resolvers.get(relation).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.resolvers.contains_key(relation)
    }

    /// Names of every relation with a registered resolver
    pub fn relation_names(&self) -> Vec<String> {
        self.resolvers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl std::fmt::Debug for InclusionResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InclusionResolverRegistry")
            .field("relations", &self.relation_names())
            .finish()
    }
}

/// Eager-load the requested relations into source rows supplied through a
/// fetcher.
///
/// Unknown relations are collected and reported in one batched error before
/// any resolver runs or any row is touched.
pub async fn include_related_models_deferred(
    registry: &InclusionResolverRegistry,
    sources: SourceFetcher,
    inclusions: &[Inclusion],
) -> OrmResult<Vec<Record>> {
    let mut resolvers = Vec::with_capacity(inclusions.len());
    let mut invalid = Vec::new();
    for inclusion in inclusions {
        match registry.get(&inclusion.relation) {
            Some(resolver) => resolvers.push((inclusion.clone(), resolver)),
            None => invalid.push(inclusion.relation.clone()),
        }
    }
    if !invalid.is_empty() {
        return Err(OrmError::InvalidInclusion { relations: invalid });
    }

    let rows = sources().await?;
    let mut enriched: Vec<Record> = rows.as_ref().clone();
    if resolvers.is_empty() {
        return Ok(enriched);
    }

    debug!(
        relations = resolvers.len(),
        rows = enriched.len(),
        "resolving inclusions"
    );
    for (inclusion, resolver) in resolvers {
        let related = resolver(Arc::clone(&sources), inclusion.clone()).await?;
        for (row, value) in enriched.iter_mut().zip(related) {
            if !value.is_null() {
                row.insert(inclusion.relation.clone(), value);
            }
        }
    }
    Ok(enriched)
}

/// Eager-load the requested relations into rows that are already in hand
pub async fn include_related_models(
    registry: &InclusionResolverRegistry,
    rows: Vec<Record>,
    inclusions: &[Inclusion],
) -> OrmResult<Vec<Record>> {
    include_related_models_deferred(registry, fetched_sources(rows), inclusions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Resolver returning a constant value per source row
    fn constant_resolver(value: Value) -> InclusionResolverFn {
        Arc::new(move |sources, _inclusion| {
            let value = value.clone();
            Box::pin(async move {
                let rows = sources().await?;
                Ok(vec![value; rows.len()])
            })
        })
    }

    #[tokio::test]
    async fn empty_include_returns_rows_unchanged() {
        let registry = InclusionResolverRegistry::new();
        let rows = vec![row(&[("id", json!(1))])];
        let result = include_related_models(&registry, rows.clone(), &[])
            .await
            .unwrap();
        assert_eq!(result, rows);
    }

    #[tokio::test]
    async fn unknown_relations_fail_in_one_batch_without_mutating_rows() {
        let registry = InclusionResolverRegistry::new();
        registry.register("orders", constant_resolver(json!([])));

        let rows = vec![row(&[("id", json!(1))])];
        let inclusions = vec![
            Inclusion::new("bogus"),
            Inclusion::new("orders"),
            Inclusion::new("missing"),
        ];
        let err = include_related_models(&registry, rows.clone(), &inclusions)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_INCLUSION");
        let message = err.to_string();
        assert!(message.contains("bogus"));
        assert!(message.contains("missing"));
        assert!(!message.contains("orders"));
        assert_eq!(rows, vec![row(&[("id", json!(1))])]);
    }

    #[tokio::test]
    async fn resolved_values_merge_under_the_relation_name() {
        let registry = InclusionResolverRegistry::new();
        registry.register("orders", constant_resolver(json!([{"id": 10}])));
        registry.register("profile", constant_resolver(json!(null)));

        let rows = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        let inclusions = vec![Inclusion::new("orders"), Inclusion::new("profile")];
        let result = include_related_models(&registry, rows, &inclusions)
            .await
            .unwrap();

        assert_eq!(result[0].get("orders"), Some(&json!([{"id": 10}])));
        assert_eq!(result[1].get("orders"), Some(&json!([{"id": 10}])));
        // null results leave the row untouched
        assert!(result[0].get("profile").is_none());
    }

    #[tokio::test]
    async fn deferred_sources_fetch_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sources = deferred_sources(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(vec![row(&[("id", json!(1))])])
            }
        });

        let registry = InclusionResolverRegistry::new();
        registry.register("orders", constant_resolver(json!([])));
        registry.register("invoices", constant_resolver(json!([])));

        let inclusions = vec![Inclusion::new("orders"), Inclusion::new("invoices")];
        let result = include_related_models_deferred(&registry, sources, &inclusions)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_resolver_results_do_not_crash() {
        let registry = InclusionResolverRegistry::new();
        registry.register(
            "orders",
            Arc::new(|_sources, _inclusion| Box::pin(async { Ok(vec![json!([1])]) })),
        );

        let rows = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        let result = include_related_models(&registry, rows, &[Inclusion::new("orders")])
            .await
            .unwrap();

        assert_eq!(result[0].get("orders"), Some(&json!([1])));
        assert!(result[1].get("orders").is_none());
    }
}
