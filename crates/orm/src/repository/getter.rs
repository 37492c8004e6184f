//! Lazy repository handles.
//!
//! Relations frequently form cycles (Customer -> Order -> Customer), so a
//! relation never holds its target repository directly. It holds a `Getter`:
//! a cloneable handle that resolves the repository on first use and caches
//! the resolved instance for every later call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::OrmResult;

/// Boxed future used by the dynamic callback types in this crate
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A lazily-resolved, cached handle to a repository
pub struct Getter<R> {
    init: Arc<dyn Fn() -> BoxFuture<OrmResult<Arc<R>>> + Send + Sync>,
    cell: Arc<OnceCell<Arc<R>>>,
}

impl<R> Clone for Getter<R> {
    fn clone(&self) -> Self {
        Self {
            init: Arc::clone(&self.init),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<R: Send + Sync + 'static> Getter<R> {
    /// Handle that resolves through an async factory on first use
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrmResult<Arc<R>>> + Send + 'static,
    {
        Self {
            init: Arc::new(move || Box::pin(factory())),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Handle to an already-constructed repository
    pub fn ready(repository: R) -> Self {
        Self::shared(Arc::new(repository))
    }

    /// Handle to an already-shared repository
    pub fn shared(repository: Arc<R>) -> Self {
        Self::new(move || {
            let repository = Arc::clone(&repository);
            async move { Ok(repository) }
        })
    }

    /// Resolve the repository, running the factory at most once
    pub async fn get(&self) -> OrmResult<Arc<R>> {
        let init = Arc::clone(&self.init);
        self.cell
            .get_or_try_init(move || init())
            .await
            .map(Arc::clone)
    }
}

impl<R> std::fmt::Debug for Getter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getter")
            .field("resolved", &self.cell.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn factory_runs_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let getter: Getter<String> = Getter::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("repo".to_string()))
            }
        });

        assert_eq!(*getter.get().await.unwrap(), "repo");
        assert_eq!(*getter.clone().get().await.unwrap(), "repo");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ready_handle_resolves_immediately() {
        let getter = Getter::ready(41usize);
        assert_eq!(*getter.get().await.unwrap(), 41);
    }
}
