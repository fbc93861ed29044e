//! The in-process payment dispatch pipeline: ingest buffer, health cache
//! and poller, gateway router, worker pool, and transaction recorder.

pub mod health;
pub mod payload;
pub mod poller;
pub mod queue;
pub mod recorder;
pub mod router;
pub mod worker;
