//! Dependency health checks for the readiness probe
//!
//! The API is ready when it can reach both PostgreSQL (ownership lookups)
//! and Redis (the export queue).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use openmusic_export_queue::RedisStreamQueue;
use serde::Serialize;
use sqlx::PgPool;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Status of an individual service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Service is healthy and responding
    Healthy,
    /// Service is unhealthy or unreachable
    Unhealthy,
}

/// Result of a single service health check
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    /// Name of the service
    pub name: &'static str,
    /// Current status
    pub status: ServiceStatus,
    /// Response time in milliseconds
    pub response_time_ms: u64,
    /// Error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn healthy(name: &'static str, response_time: Duration) -> Self {
        Self {
            name,
            status: ServiceStatus::Healthy,
            response_time_ms: response_time.as_millis() as u64,
            error: None,
        }
    }

    pub fn unhealthy(name: &'static str, error: impl Into<String>, response_time: Duration) -> Self {
        Self {
            name,
            status: ServiceStatus::Unhealthy,
            response_time_ms: response_time.as_millis() as u64,
            error: Some(error.into()),
        }
    }
}

/// Aggregated health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    /// Healthy only if every service is healthy
    pub status: ServiceStatus,
    /// Individual service health results
    pub services: Vec<ServiceHealth>,
    /// Total time to complete all health checks
    pub total_time_ms: u64,
    /// API version
    pub version: &'static str,
}

impl HealthCheckResponse {
    pub fn new(services: Vec<ServiceHealth>, total_time: Duration) -> Self {
        let status = if services.iter().all(|s| s.status == ServiceStatus::Healthy) {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Unhealthy
        };

        Self {
            status,
            services,
            total_time_ms: total_time.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Check if overall health is good
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// One dependency the readiness probe checks
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` carries a short reason shown in the readiness response
    async fn check(&self) -> Result<(), String>;
}

/// `SELECT 1` against the shared pool
pub struct PostgresCheck {
    pool: PgPool,
}

impl PostgresCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PostgresCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| format!("Query failed: {}", e))
    }
}

/// `PING` over the export queue connection
pub struct RedisCheck {
    queue: Arc<RedisStreamQueue>,
}

impl RedisCheck {
    pub fn new(queue: Arc<RedisStreamQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl HealthCheck for RedisCheck {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        self.queue
            .ping()
            .await
            .map_err(|e| format!("PING failed: {}", e))
    }
}

/// Runs every registered [`HealthCheck`]
#[derive(Clone, Default)]
pub struct HealthService {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Run all checks, each bounded by a five second timeout
    pub async fn check_all(&self) -> HealthCheckResponse {
        let start = Instant::now();
        let mut services = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let check_start = Instant::now();
            let health = match tokio::time::timeout(CHECK_TIMEOUT, check.check()).await {
                Ok(Ok(())) => ServiceHealth::healthy(check.name(), check_start.elapsed()),
                Ok(Err(reason)) => {
                    ServiceHealth::unhealthy(check.name(), reason, check_start.elapsed())
                }
                Err(_) => ServiceHealth::unhealthy(
                    check.name(),
                    format!("timed out after {}s", CHECK_TIMEOUT.as_secs()),
                    check_start.elapsed(),
                ),
            };

            if health.status == ServiceStatus::Unhealthy {
                tracing::warn!(
                    service = health.name,
                    error = ?health.error,
                    "Health check failed"
                );
            }
            services.push(health);
        }

        HealthCheckResponse::new(services, start.elapsed())
    }
}
