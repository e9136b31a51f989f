// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::aggregation::{AggregationResult, ProviderOutcome};
use crate::domain::models::query::Query;
use crate::domain::search::errors::{AggregateError, ProviderError};
use crate::domain::search::provider::{ProviderReply, ProviderSpec, SearchOptions};
use crate::domain::services::normalizer::{HitDefaults, Normalizer};
use crate::infrastructure::cache::cache_manager::CacheManager;
use crate::infrastructure::metrics::{record_aggregation, record_cache_lookup, record_provider_call};
use crate::infrastructure::search::registry::ProviderRegistry;
use crate::infrastructure::services::rate_limiter::RateLimiter;

/// 查询分发器
///
/// 一次查询的处理流程：
/// 1. 解析数据源（空集合使用基线集合）并计算指纹
/// 2. 查缓存，命中时直接返回，不调用任何数据源
/// 3. 每个已知且启用的数据源启动一个任务：先取令牌，再在超时内调用适配器
/// 4. 等待全部任务结束，单个数据源的失败只记录在它自己的结果中
/// 5. 归一化、去重、排序，组装结果；有数据时写入缓存
///
/// 分发器不做自动重试。
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    cache: Arc<CacheManager>,
    limiter: Arc<RateLimiter>,
    normalizer: Normalizer,
}

/// 分发器被取消或被丢弃时中止仍在运行的数据源任务
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            registry,
            cache,
            limiter,
            normalizer,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// 聚合入口：对文本和数据源名称执行一次聚合搜索
    pub async fn aggregate(
        &self,
        text: &str,
        sources: &[String],
        options: SearchOptions,
    ) -> Result<AggregationResult, AggregateError> {
        self.aggregate_with_cancel(text, sources, options, CancellationToken::new())
            .await
    }

    /// 可取消的聚合入口
    pub async fn aggregate_with_cancel(
        &self,
        text: &str,
        sources: &[String],
        options: SearchOptions,
        cancel: CancellationToken,
    ) -> Result<AggregationResult, AggregateError> {
        let query = Query::new(text, sources.iter().cloned());
        self.dispatch(query, options, cancel).await
    }

    /// 执行一次已构造好的查询
    #[instrument(skip(self, query, options, cancel), fields(query = %query.text()))]
    pub async fn dispatch(
        &self,
        query: Query,
        options: SearchOptions,
        cancel: CancellationToken,
    ) -> Result<AggregationResult, AggregateError> {
        let started = Instant::now();
        if query.is_blank() {
            return Err(AggregateError::EmptyQuery);
        }
        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        let query = query.with_sources(self.registry.resolve_sources(query.selected_sources()));
        let fingerprint = query.cache_key(options.digest().as_deref());

        match self.cache.get(&fingerprint).await {
            Ok(Some(cached)) => {
                record_cache_lookup(true);
                debug!("Cache hit for {}", fingerprint);
                return Ok(cached.with_query(query).with_search_time(started.elapsed()));
            }
            Ok(None) => record_cache_lookup(false),
            Err(e) => {
                record_cache_lookup(false);
                warn!("Result cache lookup failed, treating as miss: {}", e);
            }
        }

        debug!("Dispatching to {:?}", query.selected_sources());
        let outcomes = self.collect(&query, options, &cancel).await?;

        let hits = self.normalizer.merge(outcomes.values());
        let result = AggregationResult::assemble(query, outcomes, hits, started.elapsed());
        record_aggregation(result.search_time, result.failed_sources());

        if result.has_data {
            if let Err(e) = self.cache.set(&fingerprint, &result).await {
                warn!("Failed to store aggregation result in cache: {}", e);
            }
        }

        info!(
            "Aggregation finished: {} hits, {}/{} sources failed, {:?}",
            result.hits.len(),
            result.failed_sources(),
            result.results.len(),
            result.search_time
        );
        Ok(result)
    }

    async fn collect(
        &self,
        query: &Query,
        options: SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ProviderOutcome>, AggregateError> {
        let shared_query = Arc::new(query.clone());
        let options = Arc::new(options);
        let mut outcomes = BTreeMap::new();
        let mut names = Vec::new();
        let mut handles = Vec::new();

        for name in query.selected_sources() {
            let spec = match self.registry.get(name) {
                None => {
                    warn!("Requested unknown provider {}", name);
                    outcomes.insert(
                        name.clone(),
                        ProviderOutcome::rejected(name.as_str(), &ProviderError::UnknownProvider),
                    );
                    continue;
                }
                Some(spec) if !spec.enabled => {
                    debug!("Requested disabled provider {}", name);
                    outcomes.insert(
                        name.clone(),
                        ProviderOutcome::rejected(name.as_str(), &ProviderError::Disabled),
                    );
                    continue;
                }
                Some(spec) => spec.clone(),
            };

            names.push(spec.name.clone());
            handles.push(tokio::spawn(run_provider(
                spec,
                self.limiter.clone(),
                shared_query.clone(),
                options.clone(),
                cancel.child_token(),
                self.normalizer,
            )));
        }

        let guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());
        let joined = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Aggregation cancelled, aborting {} provider tasks", guard.0.len());
                return Err(AggregateError::Cancelled);
            }
            joined = join_all(handles) => joined,
        };
        drop(guard);

        for (name, joined) in names.into_iter().zip(joined) {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = if e.is_panic() {
                        ProviderError::Panicked(panic_message(e.into_panic().as_ref()))
                    } else {
                        ProviderError::Cancelled
                    };
                    ProviderOutcome::new(name.as_str(), Vec::new(), Some(&error), Duration::ZERO)
                }
            };
            outcomes.insert(name, outcome);
        }

        Ok(outcomes)
    }
}

/// 单个数据源任务：限流等待和适配器调用共用一个超时
async fn run_provider(
    spec: ProviderSpec,
    limiter: Arc<RateLimiter>,
    query: Arc<Query>,
    options: Arc<SearchOptions>,
    cancel: CancellationToken,
    normalizer: Normalizer,
) -> ProviderOutcome {
    let started = Instant::now();

    let work = async {
        if limiter.acquire_cancellable(&spec.name, &cancel).await.is_err() {
            return Err(ProviderError::Cancelled);
        }
        AssertUnwindSafe(spec.adapter.search(&query, &options))
            .catch_unwind()
            .await
            .map_err(|panic| ProviderError::Panicked(panic_message(panic.as_ref())))
    };

    let reply = match tokio::time::timeout(spec.timeout, work).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => ProviderReply::failed(e),
        Err(_) => ProviderReply::failed(ProviderError::Timeout),
    };
    let duration = started.elapsed();

    match &reply.error {
        Some(e) => warn!("Provider {} failed after {:?}: {}", spec.name, duration, e),
        None => debug!(
            "Provider {} returned {} hits in {:?}",
            spec.name,
            reply.hits.len(),
            duration
        ),
    }
    record_provider_call(&spec.name, reply.error.is_none(), duration);

    let hits = normalizer.coerce(&spec.name, &HitDefaults::from(&spec), reply.hits);
    ProviderOutcome::new(spec.name.as_str(), hits, reply.error.as_ref(), duration)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
