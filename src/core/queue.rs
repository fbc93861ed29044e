//! C1 — Ingest Buffer.
//!
//! A bounded (or unbounded) lock-free FIFO MPSC queue. Built on
//! `crossbeam_queue`'s `ArrayQueue`/`SegQueue` rather than a channel behind
//! a mutex: both are CAS-based ring/segment structures that give
//! bounded-contention insert, O(1) take-next, and a size hint producers can
//! read without a full traversal — the property the design calls for.
//!
//! `sequence_key` is generated and carried on every [`QueueEntry`] even
//! though the underlying structure's own push/pop order is what decides
//! dequeue order; it gives callers a stable, comparable identity for a
//! queue entry across a requeue.

use crossbeam_queue::{ArrayQueue, SegQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::core::payload::{Payload, QueueEntry, SequenceKey};
use crate::error::QueueFull;

enum Backing {
    Bounded(ArrayQueue<QueueEntry>),
    Unbounded(SegQueue<QueueEntry>),
}

pub struct IngestBuffer {
    backing: Backing,
    in_flight: AtomicUsize,
    epoch: Instant,
}

impl IngestBuffer {
    pub fn bounded(capacity: usize) -> Self {
        IngestBuffer {
            backing: Backing::Bounded(ArrayQueue::new(capacity)),
            in_flight: AtomicUsize::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn unbounded() -> Self {
        IngestBuffer {
            backing: Backing::Unbounded(SegQueue::new()),
            in_flight: AtomicUsize::new(0),
            epoch: Instant::now(),
        }
    }

    /// Non-blocking. Admits iff there is room (bounded case) or always
    /// (unbounded case). Safe for unbounded concurrent callers.
    pub fn enqueue(&self, payload: Payload) -> Result<(), QueueFull> {
        let entry = QueueEntry {
            sequence_key: SequenceKey::next(self.epoch),
            payload,
            enqueued_at: Instant::now(),
        };
        match &self.backing {
            Backing::Bounded(q) => q.push(entry).map_err(|_| QueueFull),
            Backing::Unbounded(q) => {
                q.push(entry);
                Ok(())
            }
        }
    }

    /// Removes and returns the oldest entry. `wait_ms` is time spent on the
    /// buffer. Safe for multiple concurrent consumers — the ring/segment
    /// structure itself arbitrates the race for the head; there is no
    /// caller-visible retry here, it is internal to `crossbeam_queue`.
    pub fn dequeue(&self) -> Option<(Payload, u64)> {
        let entry = match &self.backing {
            Backing::Bounded(q) => q.pop(),
            Backing::Unbounded(q) => q.pop(),
        }?;
        let wait_ms = entry.enqueued_at.elapsed().as_millis() as u64;
        Some((entry.payload, wait_ms))
    }

    /// Lock-free read of the current buffer length.
    pub fn size(&self) -> usize {
        match &self.backing {
            Backing::Bounded(q) => q.len(),
            Backing::Unbounded(q) => q.len(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn worker_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Clamps at 0: a worker that finishes without a matching `started`
    /// call (shouldn't happen, but the invariant is non-negative) must not
    /// underflow the counter.
    pub fn worker_finished(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(n: u64) -> Payload {
        Payload::new(json!({"n": n}))
    }

    #[test]
    fn fifo_modulo_requeue() {
        let q = IngestBuffer::bounded(8);
        q.enqueue(payload(1)).unwrap();
        q.enqueue(payload(2)).unwrap();
        let (p1, _) = q.dequeue().unwrap();
        let (p2, _) = q.dequeue().unwrap();
        assert_eq!(p1.0["n"], 1);
        assert_eq!(p2.0["n"], 2);
    }

    #[test]
    fn admission_bound_is_exact_for_array_backing() {
        let q = IngestBuffer::bounded(2);
        assert!(q.enqueue(payload(1)).is_ok());
        assert!(q.enqueue(payload(2)).is_ok());
        assert!(q.enqueue(payload(3)).is_err());
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn counter_consistency_after_enqueues_and_dequeues() {
        let q = IngestBuffer::bounded(16);
        for i in 0..10 {
            q.enqueue(payload(i)).unwrap();
        }
        for _ in 0..4 {
            q.dequeue().unwrap();
        }
        assert_eq!(q.size(), 6);
    }

    #[test]
    fn in_flight_tracks_started_and_finished_and_clamps_at_zero() {
        let q = IngestBuffer::bounded(4);
        q.worker_finished(); // no matching start: must clamp, not underflow
        assert_eq!(q.in_flight(), 0);
        q.worker_started();
        q.worker_started();
        assert_eq!(q.in_flight(), 2);
        q.worker_finished();
        assert_eq!(q.in_flight(), 1);
    }

    #[test]
    fn unbounded_never_refuses_admission() {
        let q = IngestBuffer::unbounded();
        for i in 0..5000u64 {
            q.enqueue(payload(i)).unwrap();
        }
        assert_eq!(q.size(), 5000);
    }

    #[test]
    fn concurrent_producers_preserve_exactly_once_delivery() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(IngestBuffer::bounded(10_000));
        let mut handles = Vec::new();
        for t in 0..8 {
            let q = q.clone();
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    q.enqueue(payload(t * 1000 + i)).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.size(), 4000);
        let mut seen = 0;
        while q.dequeue().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 4000);
    }
}
