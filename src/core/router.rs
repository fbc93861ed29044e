//! C4 — Gateway Router.
//!
//! Consults the health snapshot, attempts one or two outbound HTTP calls,
//! and persists exactly once, only after observing a success. Never
//! persists on a non-success response even if the body happened to be
//! parseable.

use std::sync::Arc;
use std::time::Duration;

use crate::core::health::{HealthCache, Route};
use crate::core::payload::Payload;
use crate::core::recorder::TransactionRecorder;
use crate::error::{AttemptError, DispatchError};

pub struct GatewayRouter {
    client: reqwest::Client,
    cache: Arc<HealthCache>,
    recorder: Arc<TransactionRecorder>,
    default_base_url: String,
    fallback_base_url: String,
    request_timeout: Duration,
    slow_threshold_ms: u64,
}

impl GatewayRouter {
    pub fn new(
        client: reqwest::Client,
        cache: Arc<HealthCache>,
        recorder: Arc<TransactionRecorder>,
        default_base_url: String,
        fallback_base_url: String,
        request_timeout: Duration,
        slow_threshold_ms: u64,
    ) -> Self {
        GatewayRouter {
            client,
            cache,
            recorder,
            default_base_url,
            fallback_base_url,
            request_timeout,
            slow_threshold_ms,
        }
    }

    fn base_url(&self, route: Route) -> &str {
        match route {
            Route::Default => &self.default_base_url,
            Route::Fallback => &self.fallback_base_url,
        }
    }

    /// A single `POST <base>/payments` attempt with a fresh `requestedAt`.
    /// Success is `{200-299} ∪ {409}` — 409 signals "already accepted" for
    /// idempotent retries from the processor's point of view. Returns the
    /// `requestedAt` stamped onto this attempt so the caller can record it
    /// as the transaction's `inserted_at` on success.
    async fn attempt(
        &self,
        route: Route,
        payload: &Payload,
    ) -> Result<chrono::DateTime<chrono::Utc>, AttemptError> {
        let requested_at = chrono::Utc::now();
        let url = format!("{}/payments", self.base_url(route).trim_end_matches('/'));
        let body = payload.with_requested_at(requested_at);

        let response = self
            .client
            .post(&url)
            .json(&body.0)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AttemptError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            Ok(requested_at)
        } else {
            Err(AttemptError::UnexpectedStatus(status.as_u16()))
        }
    }

    /// Given a payload, decides default vs. fallback per the health
    /// snapshot and attempts one or two calls, persisting once on success.
    pub async fn dispatch(&self, payload: &Payload) -> Result<(), DispatchError> {
        let snapshot = self.cache.snapshot();
        let default_healthy = snapshot.default.is_healthy(self.slow_threshold_ms);
        let fallback_healthy = snapshot.fallback.is_healthy(self.slow_threshold_ms);
        drop(snapshot);

        if !default_healthy && !fallback_healthy {
            return Err(DispatchError::GatewaysUnavailable);
        }

        let (primary, secondary) = if default_healthy {
            (Route::Default, fallback_healthy.then_some(Route::Fallback))
        } else {
            (Route::Fallback, None)
        };

        match self.attempt(primary, payload).await {
            Ok(requested_at) => {
                self.recorder
                    .store_success(payload, primary, requested_at)
                    .await;
                Ok(())
            }
            Err(primary_err) => match secondary {
                Some(secondary_route) => match self.attempt(secondary_route, payload).await {
                    Ok(requested_at) => {
                        self.recorder
                            .store_success(payload, secondary_route, requested_at)
                            .await;
                        Ok(())
                    }
                    Err(secondary_err) => Err(both_failed(
                        primary,
                        primary_err,
                        secondary_route,
                        Some(secondary_err),
                    )),
                },
                // The non-primary route is unhealthy, so no call was made
                // to it; still surfaced as FallbackFailed since that is
                // the only worker-visible "retryable, requeue" kind once a
                // route has actually failed — see DESIGN.md.
                None => {
                    let skipped_route = primary.other();
                    Err(both_failed(primary, primary_err, skipped_route, None))
                }
            },
        }
    }
}

impl Route {
    fn other(self) -> Route {
        match self {
            Route::Default => Route::Fallback,
            Route::Fallback => Route::Default,
        }
    }
}

fn both_failed(
    primary: Route,
    primary_err: AttemptError,
    secondary: Route,
    secondary_err: Option<AttemptError>,
) -> DispatchError {
    let secondary_detail = secondary_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "route unhealthy, not attempted".to_string());
    let (default_detail, fallback_detail) = match primary {
        Route::Default => (primary_err.to_string(), secondary_detail),
        Route::Fallback => (secondary_detail, primary_err.to_string()),
    };
    debug_assert_ne!(primary, secondary);
    DispatchError::FallbackFailed {
        default_detail,
        fallback_detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_failed_attributes_details_to_the_right_route() {
        let err = both_failed(
            Route::Fallback,
            AttemptError::UnexpectedStatus(500),
            Route::Default,
            None,
        );
        match err {
            DispatchError::FallbackFailed {
                default_detail,
                fallback_detail,
            } => {
                assert!(default_detail.contains("not attempted"));
                assert!(fallback_detail.contains("500"));
            }
            _ => panic!("expected FallbackFailed"),
        }
    }
}
