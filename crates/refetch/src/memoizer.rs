use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::MemoizerConfig;

/// An operation whose result can be memoized by a [`GatedMemoizer`].
///
/// Both the value and the error are cached and handed out to any number of
/// callers, hence the `Clone` bounds on the associated types.
pub trait FetchOperation: Send + Sync {
    /// The type of value this operation produces.
    type Item: Clone + Send + Sync;

    /// The error this operation fails with.
    ///
    /// Errors are cached and returned verbatim; the memoizer neither
    /// inspects nor transforms them.
    type Error: Clone + Send + Sync;

    /// Runs one invocation of the operation.
    ///
    /// The `cancel` token belongs to the one caller on whose behalf this
    /// invocation runs. The operation may observe it or ignore it; an error
    /// returned after cancellation is cached like any other error.
    fn compute(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Self::Item, Self::Error>>;
}

/// Wraps an async closure as a [`FetchOperation`], see [`fetch_fn`].
pub struct FetchFn<F>(F);

/// Turns an async closure into a [`FetchOperation`].
///
/// ```
/// use refetch::{CancellationToken, GatedMemoizer, fetch_fn};
///
/// # async fn example() -> Result<(), std::convert::Infallible> {
/// let memoizer = GatedMemoizer::new(fetch_fn(|_cancel| async {
///     Ok::<_, std::convert::Infallible>("expensive result")
/// }));
/// let value = memoizer.fetch(CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub fn fetch_fn<F, Fut, T, E>(f: F) -> FetchFn<F>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    FetchFn(f)
}

impl<F, Fut, T, E> FetchOperation for FetchFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync,
    E: Clone + Send + Sync,
{
    type Item = T;
    type Error = E;

    fn compute(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<T, E>> {
        Box::pin((self.0)(cancel))
    }
}

/// The mutable state of a [`GatedMemoizer`]: the outcome of the most recent
/// invocation and the time at which it completed.
///
/// Value and error live in a single `Result` slot, so a reader can never
/// observe a value and an error coming from two different invocations.
pub(crate) struct CachedState<T, E> {
    /// Completion time of the invocation that produced `entry`.
    ///
    /// `None` until the first invocation completes, which makes a fresh
    /// memoizer unconditionally stale.
    refreshed_at: Option<Instant>,
    /// The memoized outcome, `None` until the first invocation completes.
    entry: Option<Result<T, E>>,
}

impl<T, E> Default for CachedState<T, E> {
    fn default() -> Self {
        Self {
            refreshed_at: None,
            entry: None,
        }
    }
}

impl<T, E> CachedState<T, E> {
    /// Whether the entry is older than the configured refresh interval.
    ///
    /// Without a completion timestamp this is vacuously true. With one, an
    /// absent interval means the entry never goes stale by elapsed time.
    pub(crate) fn is_stale(&self, refresh_interval: Option<Duration>) -> bool {
        match (self.refreshed_at, refresh_interval) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(refreshed_at), Some(interval)) => refreshed_at.elapsed() > interval,
        }
    }

    /// Whether a cached error must be recomputed regardless of its age.
    pub(crate) fn should_retry_on_failure(&self, retry_on_failure: bool) -> bool {
        retry_on_failure && matches!(self.entry, Some(Err(_)))
    }

    /// Stores the outcome of an invocation that completed now.
    pub(crate) fn store(&mut self, entry: Result<T, E>) {
        self.entry = Some(entry);
        self.refreshed_at = Some(Instant::now());
    }
}

/// Memoizes a [`FetchOperation`] behind a staleness gate.
///
/// [`fetch`](Self::fetch) returns the cached outcome while it is fresh and
/// recomputes it otherwise, guaranteeing that at most one invocation of the
/// wrapped operation is running at any instant. Concurrent callers that find
/// the cache stale share the winning caller's single recomputation instead
/// of lining up behind the write lock, see the [crate docs](crate) for the
/// full protocol.
pub struct GatedMemoizer<R: FetchOperation> {
    config: MemoizerConfig,
    operation: R,
    state: RwLock<CachedState<R::Item, R::Error>>,
}

impl<R: FetchOperation> GatedMemoizer<R> {
    /// Creates a memoizer with the default configuration, which caches the
    /// first outcome indefinitely.
    pub fn new(operation: R) -> Self {
        Self::with_config(operation, MemoizerConfig::default())
    }

    /// Creates a memoizer with an explicit configuration.
    pub fn with_config(operation: R, config: MemoizerConfig) -> Self {
        Self {
            config,
            operation,
            state: RwLock::new(CachedState::default()),
        }
    }

    /// The configuration this memoizer was created with.
    pub fn config(&self) -> &MemoizerConfig {
        &self.config
    }

    /// Returns the memoized outcome, recomputing it first if it is missing,
    /// stale, or a retryable error.
    ///
    /// Safe to call from any number of concurrent callers; per staleness
    /// window, exactly one of them invokes the wrapped operation while the
    /// others wait for its outcome. The `cancel` token is forwarded only to
    /// the invocation this call itself triggers.
    ///
    /// A cached error is returned as-is until it goes stale, unless
    /// [`retry_on_failure`](MemoizerConfig::retry_on_failure) is enabled.
    pub async fn fetch(&self, cancel: CancellationToken) -> Result<R::Item, R::Error> {
        loop {
            {
                let state = self.state.read().await;
                if let Some(entry) = self.fresh_entry(&state) {
                    return entry;
                }
            }

            // A blocking write acquisition here would hand the lock to every
            // contending caller in turn, and each of them would re-run the
            // operation. Let one caller win the write lock; everyone else
            // goes back to waiting for a read lock and re-checks the state
            // the winner left behind.
            let Ok(mut state) = self.state.try_write() else {
                continue;
            };

            tracing::trace!(refresh = state.entry.is_some(), "computing memoized value");
            let entry = self.operation.compute(cancel).await;
            state.store(entry.clone());

            return entry;
        }
    }

    /// Returns a clone of the cached entry without invoking the operation.
    ///
    /// `None` until the first invocation has completed. Staleness is not
    /// evaluated; an expired entry is still returned.
    pub async fn cached(&self) -> Option<Result<R::Item, R::Error>> {
        self.state.read().await.entry.clone()
    }

    /// The cached entry, cloned, if it needs no recomputation.
    fn fresh_entry(
        &self,
        state: &CachedState<R::Item, R::Error>,
    ) -> Option<Result<R::Item, R::Error>> {
        let entry = state.entry.as_ref()?;
        if state.is_stale(self.config.refresh_interval)
            || state.should_retry_on_failure(self.config.retry_on_failure)
        {
            return None;
        }
        Some(entry.clone())
    }
}

impl<R: FetchOperation> fmt::Debug for GatedMemoizer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated = self
            .state
            .try_read()
            .map(|state| state.entry.is_some())
            .unwrap_or_default();
        f.debug_struct("GatedMemoizer")
            .field("config", &self.config)
            .field("populated", &populated)
            .finish()
    }
}
