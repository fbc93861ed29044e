//! C6 — Transaction Recorder.
//!
//! Best-effort writer: a store outage must never fail a dispatch that the
//! processor already accepted. `summary` is a plain read-only aggregation
//! and is allowed to propagate `StoreError` — the HTTP handler has a
//! static fallback body for that case.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::health::Route;
use crate::core::payload::Payload;
use crate::error::StoreError;

pub struct TransactionRecorder {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTotals {
    pub total_requests: i64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Summary {
    pub default: RouteTotals,
    pub fallback: RouteTotals,
}

impl TransactionRecorder {
    pub fn new(pool: PgPool) -> Self {
        TransactionRecorder { pool }
    }

    /// Builds a transaction row from a successfully-dispatched payload and
    /// persists it. `requested_at` is the timestamp stamped onto the winning
    /// attempt and becomes `inserted_at` — never propagates failure to the
    /// caller: a store outage or a payload that fails record validation is
    /// logged and treated as success-ish, since the processor has already
    /// accepted the payment.
    pub async fn store_success(&self, payload: &Payload, route: Route, requested_at: DateTime<Utc>) {
        let correlation_id = match payload.correlation_id().and_then(|s| Uuid::parse_str(s).ok())
        {
            Some(id) => id,
            None => {
                tracing::warn!(
                    route = route.as_str(),
                    "store_success: missing/invalid correlationId, generating surrogate id"
                );
                Uuid::new_v4()
            }
        };
        let amount = match payload.amount() {
            Some(a) => a,
            None => {
                tracing::warn!(
                    route = route.as_str(),
                    %correlation_id,
                    "store_success: payload missing amount, recording as zero"
                );
                Decimal::ZERO
            }
        };
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (correlation_id, amount, route, inserted_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(correlation_id)
        .bind(amount)
        .bind(route.as_str())
        .bind(requested_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(route = route.as_str(), %correlation_id, error = %e, "store_success: write failed, dispatch is unaffected");
        }
    }

    /// `[from, to)` on `inserted_at`, both routes always present.
    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Summary, StoreError> {
        use sqlx::Row;

        let rows = sqlx::query(
            r#"
            SELECT route, COUNT(*) AS total_requests, COALESCE(SUM(amount), 0) AS total_amount
            FROM transactions
            WHERE inserted_at >= $1 AND inserted_at < $2
            GROUP BY route
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut summary = Summary::default();
        for row in rows {
            let route: String = row.try_get("route").map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let total_requests: i64 = row
                .try_get("total_requests")
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let total_amount: Decimal = row
                .try_get("total_amount")
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let totals = RouteTotals {
                total_requests,
                total_amount: total_amount.to_string().parse().unwrap_or(0.0),
            };
            match route.as_str() {
                "default" => summary.default = totals,
                "fallback" => summary.fallback = totals,
                other => tracing::warn!(route = other, "summary: unknown route in store"),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_defaults_to_zero_for_both_routes_when_empty() {
        let summary = Summary::default();
        assert_eq!(summary.default.total_requests, 0);
        assert_eq!(summary.fallback.total_amount, 0.0);
    }
}
