// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use osint_aggregator::domain::models::hit::RawHit;
use osint_aggregator::domain::models::query::Query;
use osint_aggregator::domain::search::errors::ProviderError;
use osint_aggregator::domain::search::provider::{
    ProviderAdapter, ProviderReply, ProviderSpec, SearchOptions,
};
use osint_aggregator::domain::services::normalizer::Normalizer;
use osint_aggregator::infrastructure::cache::cache_manager::CacheManager;
use osint_aggregator::infrastructure::search::{Dispatcher, ProviderRegistry};
use osint_aggregator::infrastructure::services::rate_limiter::RateLimiter;

/// 记录同时进行中的调用数及其峰值
#[derive(Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }
}

struct GaugeGuard(Arc<ConcurrencyGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 按脚本返回结果的测试适配器
pub struct ScriptedAdapter {
    name: String,
    delay: Duration,
    hits: Vec<RawHit>,
    error: Option<ProviderError>,
    panics: bool,
    calls: Arc<AtomicUsize>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl ScriptedAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            hits: Vec::new(),
            error: None,
            panics: false,
            calls: Arc::new(AtomicUsize::new(0)),
            gauge: None,
        }
    }

    pub fn with_hits(mut self, hits: Vec<RawHit>) -> Self {
        self.hits = hits;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: ProviderError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn tracked_by(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn into_spec(self, timeout: Duration) -> ProviderSpec {
        ProviderSpec::new(Arc::new(self), timeout)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &Query, _options: &SearchOptions) -> ProviderReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.gauge.as_ref().map(|g| g.enter());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("adapter exploded");
        }
        ProviderReply {
            hits: self.hits.clone(),
            error: self.error.clone(),
        }
    }
}

pub fn hit(title: &str, url: &str, relevance: i64) -> RawHit {
    RawHit::new(title, url).with_relevance(relevance)
}

pub fn registry(specs: Vec<ProviderSpec>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for spec in specs {
        registry.register(spec).unwrap();
    }
    registry
}

pub fn dispatcher_with(registry: ProviderRegistry, cache: Arc<CacheManager>, limiter: RateLimiter) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        Arc::new(registry),
        cache,
        Arc::new(limiter),
        Normalizer::new(25),
    ))
}

/// 不限流、带一小时缓存的分发器
pub fn dispatcher(specs: Vec<ProviderSpec>) -> Arc<Dispatcher> {
    dispatcher_with(
        registry(specs),
        Arc::new(CacheManager::new(Duration::from_secs(3600), 100)),
        RateLimiter::unlimited(),
    )
}

pub fn sources(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
