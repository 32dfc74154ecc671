//! AuditAI Metrics - Request and LLM Telemetry
//!
//! A single [`MetricsRegistry`] is created at startup and injected (as an
//! `Arc`) into the HTTP layer and the LLM orchestrator. Counters are kept
//! per route (`"GET /anomalies"`) and per provider (`"azure"`, `"ollama"`),
//! and can be read either as a JSON snapshot or as Prometheus text.
//!
//! Nothing here is persisted; a restart starts every counter from zero.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use utoipa::ToSchema;

/// Prefix for every exported metric family
pub const METRIC_PREFIX: &str = "auditai";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    method: String,
    path: String,
}

#[derive(Debug, Clone, Default)]
struct RouteStats {
    count: u64,
    errors: u64,
    latency_ms_sum: f64,
}

#[derive(Debug, Clone, Default)]
struct ProviderStats {
    calls: u64,
    retries: u64,
    failures: u64,
}

#[derive(Debug, Default)]
struct MetricsInner {
    routes: BTreeMap<RouteKey, RouteStats>,
    providers: BTreeMap<String, ProviderStats>,
}

/// Thread-safe counter registry
#[derive(Debug)]
pub struct MetricsRegistry {
    inner: Mutex<MetricsInner>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::default()),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Record one completed HTTP request. Status codes >= 400 count as errors.
    pub fn record_request(&self, method: &str, path: &str, latency: Duration, status: u16) {
        let key = RouteKey {
            method: method.to_string(),
            path: path.to_string(),
        };
        let mut inner = self.inner.lock();
        let stats = inner.routes.entry(key).or_default();
        stats.count += 1;
        stats.latency_ms_sum += latency.as_secs_f64() * 1000.0;
        if status >= 400 {
            stats.errors += 1;
        }
    }

    /// Record one provider attempt
    pub fn record_llm_call(&self, provider: &str) {
        self.inner.lock().providers.entry(provider.to_string()).or_default().calls += 1;
    }

    /// Record one retry after a retryable provider failure
    pub fn record_llm_retry(&self, provider: &str) {
        self.inner.lock().providers.entry(provider.to_string()).or_default().retries += 1;
    }

    /// Record a request that failed after all attempts
    pub fn record_llm_failure(&self, provider: &str) {
        self.inner.lock().providers.entry(provider.to_string()).or_default().failures += 1;
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();

        let mut snapshot = MetricsSnapshot {
            started_at: self.started_at,
            uptime_seconds: self.started.elapsed().as_secs(),
            ..Default::default()
        };

        let mut latency_sum = 0.0;
        for (key, stats) in &inner.routes {
            snapshot.requests += stats.count;
            snapshot.errors += stats.errors;
            latency_sum += stats.latency_ms_sum;
            snapshot.routes.insert(
                format!("{} {}", key.method, key.path),
                RouteSnapshot {
                    count: stats.count,
                    errors: stats.errors,
                    avg_latency_ms: average(stats.latency_ms_sum, stats.count),
                },
            );
        }
        snapshot.avg_latency_ms = average(latency_sum, snapshot.requests);

        for (provider, stats) in &inner.providers {
            snapshot.llm_calls += stats.calls;
            snapshot.llm_retries += stats.retries;
            snapshot.llm_failures += stats.failures;
            snapshot.providers.insert(
                provider.clone(),
                ProviderSnapshot {
                    calls: stats.calls,
                    retries: stats.retries,
                    failures: stats.failures,
                },
            );
        }

        snapshot
    }

    /// Render every counter in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let inner = self.inner.lock();
        let mut out = String::new();

        family(&mut out, "http_requests_total", "Total HTTP requests by method and path", "counter");
        for (key, stats) in &inner.routes {
            route_sample(&mut out, "http_requests_total", key, stats.count.to_string());
        }

        family(&mut out, "http_errors_total", "Total HTTP error responses by method and path", "counter");
        for (key, stats) in &inner.routes {
            route_sample(&mut out, "http_errors_total", key, stats.errors.to_string());
        }

        family(&mut out, "http_latency_ms_avg", "Average request latency in milliseconds", "gauge");
        for (key, stats) in &inner.routes {
            let avg = if stats.count == 0 {
                0.0
            } else {
                stats.latency_ms_sum / stats.count as f64
            };
            route_sample(&mut out, "http_latency_ms_avg", key, format!("{:.2}", avg));
        }

        let provider_families: [(&str, &str, fn(&ProviderStats) -> u64); 3] = [
            ("llm_calls_total", "Total LLM calls by provider", |s: &ProviderStats| s.calls),
            ("llm_retries_total", "Total LLM retries by provider", |s: &ProviderStats| s.retries),
            ("llm_failures_total", "Total LLM failures by provider", |s: &ProviderStats| s.failures),
        ];
        for (name, help, value) in provider_families {
            family(&mut out, name, help, "counter");
            for (provider, stats) in &inner.providers {
                let _ = writeln!(
                    out,
                    "{}_{}{{provider=\"{}\"}} {}",
                    METRIC_PREFIX,
                    name,
                    escape_label(provider),
                    value(stats)
                );
            }
        }

        out
    }
}

fn average(sum: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    ((sum / count as f64) * 100.0).round() / 100.0
}

fn family(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {}_{} {}", METRIC_PREFIX, name, help);
    let _ = writeln!(out, "# TYPE {}_{} {}", METRIC_PREFIX, name, kind);
}

fn route_sample(out: &mut String, name: &str, key: &RouteKey, value: String) {
    let _ = writeln!(
        out,
        "{}_{}{{method=\"{}\",path=\"{}\"}} {}",
        METRIC_PREFIX,
        name,
        escape_label(&key.method),
        escape_label(&key.path),
        value
    );
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ============================================================================
// Snapshot types
// ============================================================================

/// JSON view of the registry, served by `GET /metrics`
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    pub llm_calls: u64,
    pub llm_retries: u64,
    pub llm_failures: u64,
    pub routes: BTreeMap<String, RouteSnapshot>,
    pub providers: BTreeMap<String, ProviderSnapshot>,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RouteSnapshot {
    pub count: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProviderSnapshot {
    pub calls: u64,
    pub retries: u64,
    pub failures: u64,
}
