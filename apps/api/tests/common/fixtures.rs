//! Test doubles for the export gate's collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use openmusic_api::repositories::PlaylistOwnershipVerifier;
use openmusic_api::services::{ExportService, HealthCheck, HealthService};
use openmusic_api::{build_router, ApiError, ApiResult, AuthConfig, AuthService};
use openmusic_export_queue::{
    Delivery, InMemoryQueue, MessageQueue, QueueError, QueueResult,
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Playlist id -> owner, counting lookups
#[derive(Default)]
pub struct InMemoryOwners {
    owners: Mutex<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl InMemoryOwners {
    pub fn insert(&self, playlist_id: &str, owner: &str) {
        self.owners
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), owner.to_string());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaylistOwnershipVerifier for InMemoryOwners {
    async fn verify_owner(&self, playlist_id: &str, requester_id: &str) -> ApiResult<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let owner = self
            .owners
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("playlist", playlist_id))?;

        if owner == requester_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "you are not the owner of this playlist".to_string(),
            ))
        }
    }
}

/// Queue whose broker is always unreachable
pub struct UnreachableQueue;

fn refused() -> QueueError {
    QueueError::Redis(redis::RedisError::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

#[async_trait]
impl MessageQueue for UnreachableQueue {
    async fn ensure_channel(&self, _channel: &str) -> QueueResult<()> {
        Err(refused())
    }

    async fn publish(&self, _channel: &str, _payload: &[u8]) -> QueueResult<()> {
        Err(refused())
    }

    async fn receive(&self, _channel: &str) -> QueueResult<Delivery> {
        Err(refused())
    }

    async fn ack(&self, _channel: &str, _delivery: &Delivery) -> QueueResult<()> {
        Err(refused())
    }

    async fn nack(&self, _channel: &str, _delivery: &Delivery, _requeue: bool) -> QueueResult<()> {
        Err(refused())
    }

    async fn release_unsettled(&self, _channel: &str) -> QueueResult<()> {
        Err(refused())
    }
}

/// Health check with a fixed answer
pub struct StaticCheck {
    pub name: &'static str,
    pub healthy: bool,
}

#[async_trait]
impl HealthCheck for StaticCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self) -> Result<(), String> {
        if self.healthy {
            Ok(())
        } else {
            Err("connection refused".to_string())
        }
    }
}

/// Router wired to in-memory collaborators
pub struct TestApp {
    pub router: Router,
    pub queue: Arc<InMemoryQueue>,
    pub owners: Arc<InMemoryOwners>,
    pub auth: AuthService,
}

impl TestApp {
    pub fn new() -> Self {
        let queue = Arc::new(InMemoryQueue::new());
        let owners = Arc::new(InMemoryOwners::default());
        let auth = AuthService::new(AuthConfig::new(TEST_JWT_SECRET));
        let export_service = ExportService::new(owners.clone(), queue.clone());

        Self {
            router: build_router(auth.clone(), export_service, healthy_checks()),
            queue,
            owners,
            auth,
        }
    }

    /// Valid bearer token for `user_id`
    pub fn token(&self, user_id: &str) -> String {
        self.auth.issue_access_token(user_id).unwrap()
    }
}

/// Router whose queue refuses every publish
pub fn app_with_unreachable_queue(owners: Arc<InMemoryOwners>) -> (Router, AuthService) {
    let auth = AuthService::new(AuthConfig::new(TEST_JWT_SECRET));
    let export_service = ExportService::new(owners, Arc::new(UnreachableQueue));
    (
        build_router(auth.clone(), export_service, healthy_checks()),
        auth,
    )
}

pub fn healthy_checks() -> HealthService {
    HealthService::new()
        .with_check(Arc::new(StaticCheck {
            name: "database",
            healthy: true,
        }))
        .with_check(Arc::new(StaticCheck {
            name: "redis",
            healthy: true,
        }))
}

pub fn fake_email() -> String {
    SafeEmail().fake()
}
