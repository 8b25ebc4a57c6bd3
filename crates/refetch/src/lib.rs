//! # Time-gated, single-flight memoization
//!
//! A [`GatedMemoizer`] wraps an expensive or side-effecting operation so that
//! concurrent callers share a single in-flight execution and a single cached
//! result. The result is recomputed only once it has gone stale, or
//! immediately if the previous attempt failed and
//! [`retry_on_failure`](MemoizerConfig::retry_on_failure) is enabled.
//!
//! Exactly one value is ever retained per memoizer. There is no keyed cache,
//! no background refresh task, and no cross-process coordination; the whole
//! point of this crate is the concurrency-correct invocation protocol around
//! that one cached slot.
//!
//! ## The single-flight protocol
//!
//! Every caller goes through [`GatedMemoizer::fetch`], which runs a
//! double-checked-lock protocol over one reader-writer lock:
//!
//! - The common path takes the lock for reading, finds the cached entry
//!   fresh, and returns a clone of it without blocking anyone.
//! - A caller that finds the entry missing, stale, or a retryable error
//!   releases its read lock and makes a *non-blocking* attempt to take the
//!   lock exclusively. The one caller that wins becomes the sole invoker for
//!   this staleness window: it runs the wrapped operation, stores the
//!   outcome and a completion timestamp, and returns.
//! - Everyone who loses the exclusive acquisition restarts the procedure
//!   instead of queueing for the exclusive lock. The restart's read
//!   acquisition blocks until the winner is done, after which the fresh
//!   entry is served through the fast path.
//!
//! A plain blocking write acquisition would hand the exclusive lock to every
//! contending caller in turn, and each of them would re-run the operation:
//! exactly the thundering herd this crate exists to avoid.
//!
//! ## Error caching
//!
//! The wrapped operation's error is cached exactly like a value and returned
//! verbatim to every caller, never wrapped, logged, or transformed. Unless
//! [`retry_on_failure`](MemoizerConfig::retry_on_failure) is enabled, a
//! single failure therefore poisons the cache until the refresh interval
//! elapses: all callers in that window get the same stale error rather than
//! a fresh attempt. This is a deliberate property of the primitive, not an
//! oversight; enable `retry_on_failure` to have every caller that observes a
//! cached error force its own recomputation instead.
//!
//! ## Cancellation
//!
//! [`fetch`](GatedMemoizer::fetch) takes a [`CancellationToken`] and forwards
//! it only to the invocation that this call itself triggers. The wrapped
//! operation may observe the token or ignore it; an error it returns after
//! cancellation is cached like any other error. Callers served from the
//! cache, or waiting on another caller's in-flight computation, are never
//! affected by someone else's token.

mod config;
mod memoizer;

pub use config::MemoizerConfig;
pub use memoizer::{FetchFn, FetchOperation, GatedMemoizer, fetch_fn};

pub use tokio_util::sync::CancellationToken;
