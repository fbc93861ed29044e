//! C3 — Health Poller.
//!
//! A single dedicated task ticks on a timer and mutates the shared
//! [`HealthCache`] snapshot cell — the "dedicated long-running task" shape
//! called for in place of a repeating self-send.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::core::health::{HealthCache, HealthRecord, HealthSource, Route};

/// `{"failing": bool, "minResponseTime": number|float|string}`.
#[derive(Debug, Deserialize)]
struct ServiceHealthBody {
    failing: bool,
    #[serde(rename = "minResponseTime")]
    min_response_time: Value,
}

fn parse_min_response_time(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.round() as u64)),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f.round() as u64),
        _ => None,
    }
}

pub struct HealthPoller {
    client: reqwest::Client,
    cache: Arc<HealthCache>,
    default_base_url: String,
    fallback_base_url: String,
    interval: Duration,
    request_timeout: Duration,
}

impl HealthPoller {
    pub fn new(
        client: reqwest::Client,
        cache: Arc<HealthCache>,
        default_base_url: String,
        fallback_base_url: String,
        interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        HealthPoller {
            client,
            cache,
            default_base_url,
            fallback_base_url,
            interval,
            request_timeout,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.poll_route(Route::Default, &self.default_base_url)
                .await;
            self.poll_route(Route::Fallback, &self.fallback_base_url)
                .await;
        }
    }

    async fn poll_route(&self, route: Route, base_url: &str) {
        let url = format!("{}/payments/service-health", base_url.trim_end_matches('/'));
        let now = chrono::Utc::now();
        let previous = self.cache.snapshot();
        let previous_record = previous.record(route);

        let record = match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                match resp.json::<ServiceHealthBody>().await {
                    Ok(body) => HealthRecord {
                        failing: body.failing,
                        min_response_time_ms: parse_min_response_time(&body.min_response_time),
                        checked_at: now,
                        source: HealthSource::Ok,
                    },
                    Err(e) => {
                        tracing::warn!(route = route.as_str(), error = %e, "health poll: decode failure");
                        HealthRecord::error(Some(previous_record), now)
                    }
                }
            }
            Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(route = route.as_str(), "health poll: rate limited (429)");
                HealthRecord::error(Some(previous_record), now)
            }
            Ok(resp) => {
                tracing::warn!(route = route.as_str(), status = %resp.status(), "health poll: unexpected status");
                HealthRecord::error(Some(previous_record), now)
            }
            Err(e) => {
                tracing::warn!(route = route.as_str(), error = %e, "health poll: transport error");
                HealthRecord::error(Some(previous_record), now)
            }
        };

        self.cache.update_route(route, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_float_and_string_response_times() {
        assert_eq!(parse_min_response_time(&Value::from(12)), Some(12));
        assert_eq!(parse_min_response_time(&Value::from(12.6)), Some(13));
        assert_eq!(
            parse_min_response_time(&Value::String("7".to_string())),
            Some(7)
        );
        assert_eq!(parse_min_response_time(&Value::Null), None);
    }
}
