//! Internal error taxonomy shared across the dispatch pipeline.
//!
//! These are the "internal kinds, not wire names" of the design: each
//! component collapses its own failure modes into one of these before
//! handing control back up the call chain. Only [`RequestError`] maps to a
//! client-visible HTTP status (400/503); everything else is consumed
//! internally (logged, requeued, or swallowed).

use thiserror::Error;

/// C1 admission failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("ingest queue is full")]
pub struct QueueFull;

/// A single processor call that did not succeed (transport failure, timeout,
/// or a non-success status). Consumed entirely within C4; never surfaced
/// past the router.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Request(String),
    #[error("processor returned status {0}")]
    UnexpectedStatus(u16),
}

/// What the worker pool (C5) sees after C4 has exhausted its options for a
/// single payload.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("both gateways failed (default: {default_detail}, fallback: {fallback_detail})")]
    FallbackFailed {
        default_detail: String,
        fallback_detail: String,
    },
    #[error("no healthy gateway available")]
    GatewaysUnavailable,
}

/// C6 failure modes. `store_success` swallows [`StoreError`]; `summary`
/// propagates it to the HTTP layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Raised at the HTTP boundary only (C7); never produced deeper in the
/// pipeline.
#[derive(Debug, Error)]
pub enum InvalidRequest {
    #[error("{0}")]
    Malformed(String),
}
