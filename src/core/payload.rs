//! The opaque payment payload and the queue entry it travels in.

use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide tiebreaker for entries whose monotonic timestamp collides.
/// `unique_tag` carries no semantic weight beyond uniqueness.
static UNIQUE_TAG: AtomicU64 = AtomicU64::new(0);

/// `(monotonic_nanos, unique_tag)`. Total order, collision-free even under
/// identical monotonic readings. The monotonic source is ordering truth —
/// consumers must not infer wall-clock order from it across time
/// discontinuities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceKey {
    monotonic_nanos: u128,
    unique_tag: u64,
}

impl SequenceKey {
    pub fn next(epoch: Instant) -> Self {
        SequenceKey {
            monotonic_nanos: epoch.elapsed().as_nanos(),
            unique_tag: UNIQUE_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// The opaque JSON body submitted by a client. The core only ever projects
/// two fields out of it and otherwise forwards it verbatim.
#[derive(Debug, Clone)]
pub struct Payload(pub Value);

impl Payload {
    pub fn new(body: Value) -> Self {
        Payload(body)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.0.get("correlationId").and_then(Value::as_str)
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self.0.get("amount")? {
            Value::Number(n) => n.to_string().parse().ok(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns a copy of this payload with `requestedAt` set, overwriting
    /// any prior value. Requeue must call this fresh on every dispatch
    /// attempt (property #7: re-stamp, never carry a stale timestamp).
    pub fn with_requested_at(&self, requested_at: chrono::DateTime<chrono::Utc>) -> Payload {
        let mut body = self.0.clone();
        if let Value::Object(map) = &mut body {
            map.insert(
                "requestedAt".to_string(),
                Value::String(requested_at.to_rfc3339()),
            );
        }
        Payload(body)
    }

    /// The payload as originally submitted, with any `requestedAt`
    /// augmentation stripped. Requeue puts this (not the augmented form)
    /// back on the buffer so the next dispatch attempt stamps a fresh one.
    pub fn without_requested_at(&self) -> Payload {
        let mut body = self.0.clone();
        if let Value::Object(map) = &mut body {
            map.remove("requestedAt");
        }
        Payload(body)
    }
}

/// Immutable tuple placed on the ingest buffer.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub sequence_key: SequenceKey,
    pub payload: Payload,
    pub enqueued_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_correlation_id_and_amount() {
        let p = Payload::new(json!({"correlationId": "abc-123", "amount": 19.9}));
        assert_eq!(p.correlation_id(), Some("abc-123"));
        assert_eq!(p.amount(), Some(Decimal::new(199, 1)));
    }

    #[test]
    fn missing_projected_fields_are_none_not_errors() {
        let p = Payload::new(json!({"other": "field"}));
        assert_eq!(p.correlation_id(), None);
        assert_eq!(p.amount(), None);
    }

    #[test]
    fn amount_accepts_string_encoded_decimals() {
        let p = Payload::new(json!({"amount": "42.00"}));
        assert_eq!(p.amount(), Some(Decimal::new(4200, 2)));
    }

    #[test]
    fn requeue_strips_then_requested_at_is_restamped() {
        let p = Payload::new(json!({"amount": 1}));
        let stamped = p.with_requested_at(chrono::Utc::now());
        assert!(stamped.0.get("requestedAt").is_some());
        let stripped = stamped.without_requested_at();
        assert!(stripped.0.get("requestedAt").is_none());
    }

    #[test]
    fn sequence_keys_are_strictly_increasing_under_contention() {
        let epoch = Instant::now();
        let mut keys: Vec<SequenceKey> = (0..1000).map(|_| SequenceKey::next(epoch)).collect();
        let sorted = {
            let mut k = keys.clone();
            k.sort();
            k
        };
        keys.dedup();
        assert_eq!(keys.len(), 1000, "unique_tag must break every tie");
        assert_eq!(sorted.len(), 1000);
    }
}
