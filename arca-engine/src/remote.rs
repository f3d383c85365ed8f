//! Rate-limited deposition API adapter
//!
//! Wraps any `DepositionApi` so that every remote call first passes through
//! the durable rate limiter. The lifecycle manager only ever sees the trait,
//! so throttling stays a composition-root concern.

use arca_client::{DepositionApi, Result};
use arca_core::dto::deposition::{DepositionFile, DepositionRecord};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::ratelimit::RateLimiter;

/// Decorator gating every call on the rate limiter
pub struct RateLimitedApi<A> {
    inner: A,
    limiter: Arc<RateLimiter>,
}

impl<A: DepositionApi> RateLimitedApi<A> {
    pub fn new(inner: A, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<A: DepositionApi> DepositionApi for RateLimitedApi<A> {
    async fn create_draft(&self, metadata: &serde_json::Value) -> Result<DepositionRecord> {
        self.limiter.acquire().await;
        self.inner.create_draft(metadata).await
    }

    async fn update_draft(
        &self,
        link: &str,
        metadata: &serde_json::Value,
    ) -> Result<DepositionRecord> {
        self.limiter.acquire().await;
        self.inner.update_draft(link, metadata).await
    }

    async fn publish(&self, link: &str) -> Result<DepositionRecord> {
        self.limiter.acquire().await;
        self.inner.publish(link).await
    }

    async fn discard(&self, link: &str) -> Result<()> {
        self.limiter.acquire().await;
        self.inner.discard(link).await
    }

    async fn new_version(&self, link: &str) -> Result<DepositionRecord> {
        self.limiter.acquire().await;
        self.inner.new_version(link).await
    }

    async fn fetch_record(&self, record_id: &str) -> Result<DepositionRecord> {
        self.limiter.acquire().await;
        self.inner.fetch_record(record_id).await
    }

    async fn list_files(&self, link: &str) -> Result<Vec<DepositionFile>> {
        self.limiter.acquire().await;
        self.inner.list_files(link).await
    }

    async fn upload_file(
        &self,
        bucket_link: &str,
        name: &str,
        path: &Path,
    ) -> Result<DepositionFile> {
        self.limiter.acquire().await;
        self.inner.upload_file(bucket_link, name, path).await
    }

    async fn delete_file(&self, link: &str) -> Result<()> {
        self.limiter.acquire().await;
        self.inner.delete_file(link).await
    }
}
