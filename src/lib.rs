//! Ingress-plus-dispatcher for payment submissions.
//!
//! `http` is the thin adapter layer; `core` is the in-process dispatch
//! pipeline it drives (ingest buffer, health cache/poller, gateway router,
//! worker pool, transaction recorder).

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
