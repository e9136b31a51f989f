// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::models::aggregation::AggregationResult;
use crate::infrastructure::cache::cache_strategy::{
    CacheError, CacheStats, CacheStrategy, MemoryCacheStrategy,
};

/// 聚合结果缓存管理器
///
/// 以查询指纹为键缓存完整的聚合结果。缓存策略可以替换，
/// 便于接入外部存储或在测试中注入故障。
pub struct CacheManager {
    strategy: Arc<dyn CacheStrategy>,
    ttl: Duration,
}

impl CacheManager {
    /// 使用内存缓存策略创建缓存管理器
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        info!(
            "Result cache initialized: ttl={}s, max_entries={}",
            ttl.as_secs(),
            max_entries
        );
        Self::with_strategy(Arc::new(MemoryCacheStrategy::new(max_entries)), ttl)
    }

    pub fn with_strategy(strategy: Arc<dyn CacheStrategy>, ttl: Duration) -> Self {
        Self { strategy, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 获取缓存的聚合结果
    pub async fn get(&self, fingerprint: &str) -> Result<Option<AggregationResult>, CacheError> {
        self.strategy.get(fingerprint).await
    }

    /// 写入聚合结果，使用默认存活时间
    pub async fn set(&self, fingerprint: &str, value: &AggregationResult) -> Result<(), CacheError> {
        self.strategy.set(fingerprint, value, self.ttl).await
    }

    /// 删除单个指纹对应的结果
    pub async fn invalidate(&self, fingerprint: &str) -> Result<bool, CacheError> {
        let existed = self.strategy.delete(fingerprint).await?;
        debug!("Invalidated cache entry {} (existed: {})", fingerprint, existed);
        Ok(existed)
    }

    /// 清空缓存
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.strategy.clear().await
    }

    /// 清理过期条目
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.strategy.purge_expired().await
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.strategy.get_stats()
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }
}
