//! Per-request control flow
//!
//! Fetch, validate, look up the cache under the full fingerprint, and on a miss
//! evict any stale variant recorded under the identity fingerprint before
//! transforming and storing the fresh result. Results are stored under the
//! full fingerprint with an alias record under the identity fingerprint.
//! Cache writes and evictions never block the response.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::state::{PipelineState, StateTracker};
use super::RequestContext;
use crate::auth::verify_purge_credential;
use crate::cache::{build_fingerprint, identity_fingerprint, CacheManager, CachedImage, Fingerprint};
use crate::config::Config;
use crate::constants::{DEFAULT_MAX_AGE_SECONDS, DEFAULT_QUALITY};
use crate::error::ServiceError;
use crate::image_optimizer::engine::plan_for;
use crate::image_optimizer::{
    resolve_format, validate_image, ImageError, OutputFormat, TransformEngine, TransformSpec, ValidationPolicy,
};
use crate::metrics::Metrics;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Image entity handed to the HTTP adapter
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub body: Bytes,
    pub content_type: String,
    pub cache_control: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub cache_status: CacheStatus,
}

impl PipelineResponse {
    fn from_entry(entry: CachedImage, cache_status: CacheStatus) -> Self {
        Self {
            body: entry.data,
            content_type: entry.content_type,
            cache_control: entry.cache_control,
            width: entry.width,
            height: entry.height,
            cache_status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub default_quality: u8,
    /// Cache-Control max-age and cache TTL
    pub max_age: Duration,
    pub purge_secret: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY,
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECONDS),
            purge_secret: None,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_quality: config.image.default_quality,
            max_age: Duration::from_secs(config.cache.max_age_seconds),
            purge_secret: config.auth.purge_secret.clone(),
        }
    }
}

pub struct ImagePipeline {
    store: Arc<dyn ObjectStore>,
    cache: CacheManager,
    engine: Arc<TransformEngine>,
    policy: ValidationPolicy,
    metrics: Arc<Metrics>,
    options: PipelineOptions,
}

impl ImagePipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: CacheManager,
        engine: Arc<TransformEngine>,
        policy: ValidationPolicy,
        metrics: Arc<Metrics>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            cache,
            engine,
            policy,
            metrics,
            options,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Serve one image request
    pub async fn handle(&self, ctx: &RequestContext) -> Result<PipelineResponse, ServiceError> {
        self.handle_traced(ctx).await.0
    }

    /// Serve one image request and return the states it passed through
    pub async fn handle_traced(
        &self,
        ctx: &RequestContext,
    ) -> (Result<PipelineResponse, ServiceError>, Vec<PipelineState>) {
        let mut tracker = StateTracker::new(ctx.request_id());
        let result = self.run(ctx, &mut tracker).await;

        match &result {
            Ok(response) => {
                tracker.transition(PipelineState::Responding);
                info!(
                    request_id = %ctx.request_id(),
                    key = %ctx.key(),
                    cache = response.cache_status.as_str(),
                    content_type = %response.content_type,
                    bytes = response.body.len(),
                    "Image served"
                );
            }
            Err(err) => {
                let terminal = match err {
                    ServiceError::NotFound => PipelineState::NotFound,
                    ServiceError::InputRejected { .. } | ServiceError::Unauthorized => {
                        self.metrics.increment_rejection();
                        PipelineState::Rejected
                    }
                    ServiceError::EngineFailure(_) | ServiceError::Internal(_) => {
                        self.metrics.increment_failure();
                        PipelineState::Failed
                    }
                };
                tracker.transition(terminal);
                if err.is_client_error() {
                    info!(request_id = %ctx.request_id(), key = %ctx.key(), error = %err, "Request not served");
                } else {
                    error!(request_id = %ctx.request_id(), key = %ctx.key(), error = %err, "Request failed");
                }
            }
        }

        (result, tracker.into_history())
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        tracker: &mut StateTracker,
    ) -> Result<PipelineResponse, ServiceError> {
        let key = ctx.key();
        let (spec, target) = self.request_spec(ctx);
        let identity = identity_fingerprint(key, &spec);

        if key.is_empty() {
            self.cache.spawn_evict(identity);
            return Err(ServiceError::NotFound);
        }

        tracker.transition(PipelineState::Fetching);
        let object = match self.store.get(key).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                debug!(key = %key, store = self.store.name(), "Object not found");
                self.cache.spawn_evict(identity);
                return Err(ServiceError::NotFound);
            }
            Err(e) => {
                warn!(key = %key, store = self.store.name(), error = %e, "Object fetch failed");
                return Err(e.into());
            }
        };

        tracker.transition(PipelineState::Validating);
        let validation = {
            let engine = self.engine.clone();
            let policy = self.policy.clone();
            let bytes = object.bytes.clone();
            tokio::task::spawn_blocking(move || validate_image(bytes, &policy, &engine))
                .await
                .map_err(|e| ImageError::TaskFailed {
                    message: e.to_string(),
                })?
        };
        let validation = validation.into_result()?;

        tracker.transition(PipelineState::CacheProbing);
        let full = build_fingerprint(key, &spec, Some(&validation), Some(&object.metadata));
        if let Some(hit) = self.cache.lookup(&full).await.filter(|entry| !entry.is_alias()) {
            self.metrics.increment_cache_hit();
            tracker.transition(PipelineState::Serving);
            return Ok(PipelineResponse::from_entry(hit, CacheStatus::Hit));
        }
        self.metrics.increment_cache_miss();

        // The identity record points at a result computed from older metadata
        if full != identity {
            let recorded = self.cache.lookup(&identity).await;
            // An alias naming `full` only lost its target, nothing is stale
            if let Some(stale) = recorded.filter(|entry| entry.alias_of.as_ref() != Some(&full)) {
                debug!(fingerprint = %identity, "Evicting stale identity entry");
                self.metrics.increment_stale_eviction();
                self.cache.spawn_evict_stale(identity.clone(), stale);
            }
        }

        tracker.transition(PipelineState::Negotiating);
        let plan = plan_for(target, spec.optimize);
        debug!(request_id = %ctx.request_id(), format = target.as_str(), plan = ?plan, "Output negotiated");

        tracker.transition(PipelineState::Transforming);
        let output = {
            let engine = self.engine.clone();
            tokio::task::spawn_blocking(move || engine.transform(&validation, &spec, target))
                .await
                .map_err(|e| ImageError::TaskFailed {
                    message: e.to_string(),
                })??
        };
        self.metrics
            .record_transform(output.format, output.plan, output.used_fallback);

        tracker.transition(PipelineState::Encoding);
        let entry = CachedImage::new(
            Bytes::from(output.data),
            output.format.content_type(),
            self.options.max_age,
        )
        .with_dimensions(output.width, output.height);

        tracker.transition(PipelineState::Storing);
        self.cache
            .spawn_store(full, identity, entry.clone(), self.options.max_age);

        Ok(PipelineResponse::from_entry(entry, CacheStatus::Miss))
    }

    /// Normalised parameters with the output format resolved
    ///
    /// The negotiated format is part of the spec so every fingerprint derived
    /// from it differs per output encoding.
    fn request_spec(&self, ctx: &RequestContext) -> (TransformSpec, OutputFormat) {
        let mut spec = TransformSpec::from_query(ctx.query_params(), self.options.default_quality);
        let target = resolve_format(spec.format, ctx.accept());
        spec.format = Some(target);
        (spec, target)
    }

    /// Remove the cached variant a GET with the same query and `Accept` produces
    pub async fn purge(&self, ctx: &RequestContext) -> Result<Fingerprint, ServiceError> {
        if let Err(e) = verify_purge_credential(
            self.options.purge_secret.as_deref(),
            ctx.header("Authorization"),
        ) {
            self.metrics.increment_rejection();
            warn!(request_id = %ctx.request_id(), key = %ctx.key(), reason = %e, "Purge refused");
            return Err(e.into());
        }

        let key = ctx.key();
        if key.is_empty() {
            return Err(ServiceError::NotFound);
        }

        let (spec, _) = self.request_spec(ctx);
        let removed = self
            .cache
            .invalidate(key, Some(&spec))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.metrics.increment_purge();
        info!(request_id = %ctx.request_id(), fingerprint = %removed, "Cache entry purged");
        Ok(removed)
    }

    /// Wait for background cache work to finish
    pub async fn flush(&self) {
        self.cache.tasks().flush().await;
        self.cache.backing_store().run_pending_tasks().await;
    }
}
