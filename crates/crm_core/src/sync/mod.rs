//! Daily-log reconciliation between a client-side cache and the log store.
//!
//! # Responsibility
//! - Define the gateway contract the cache talks through.
//! - Keep cached logs in step with the store after every mutation.
//!
//! # Invariants
//! - The store is authoritative; cached copies are replaced, never merged.
//! - Gateway calls are retried only for retryable failures, with bounded
//!   exponential backoff.

pub mod gateway;
pub mod reconcile;
