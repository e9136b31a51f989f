// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::models::aggregation::AggregationResult;

/// 缓存错误
///
/// 调用方把所有缓存错误都当作未命中处理，缓存故障不会让聚合请求失败。
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// 缓存条目，保存聚合结果的持久化字节
struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
    last_access_tick: u64,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration, tick: u64) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl,
            access_count: 0,
            last_access_tick: tick,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }

    fn touch(&mut self, tick: u64) {
        self.access_count += 1;
        self.last_access_tick = tick;
    }
}

/// 缓存策略接口
#[async_trait]
pub trait CacheStrategy: Send + Sync {
    /// 获取缓存值，过期条目视为不存在并被移除
    async fn get(&self, key: &str) -> Result<Option<AggregationResult>, CacheError>;

    /// 写入缓存值
    async fn set(&self, key: &str, value: &AggregationResult, ttl: Duration) -> Result<(), CacheError>;

    /// 删除缓存值，返回条目是否存在
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// 清空缓存
    async fn clear(&self) -> Result<(), CacheError>;

    /// 清理所有过期条目，返回清理数量
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    /// 获取缓存统计信息
    fn get_stats(&self) -> CacheStats;
}

/// 内存缓存策略
///
/// 超过容量时按最近访问顺序批量淘汰，一次多淘汰容量的 10%。
pub struct MemoryCacheStrategy {
    cache: DashMap<String, CacheEntry>,
    max_entries: usize,
    clock: AtomicU64,
    stats: Mutex<CacheStats>,
}

impl MemoryCacheStrategy {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: DashMap::new(),
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn next_tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_if_needed(&self) {
        let current_size = self.cache.len();
        if current_size <= self.max_entries {
            return;
        }

        let to_evict = current_size - self.max_entries + self.max_entries / 10;

        let mut entries: Vec<(String, u64)> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_access_tick))
            .collect();
        entries.sort_by_key(|(_, tick)| *tick);

        let mut evicted = 0u64;
        for (key, _) in entries.iter().take(to_evict) {
            if self.cache.remove(key).is_some() {
                evicted += 1;
            }
        }

        self.stats.lock().evictions += evicted;
        debug!("Evicted {} entries from result cache", evicted);
    }
}

#[async_trait]
impl CacheStrategy for MemoryCacheStrategy {
    async fn get(&self, key: &str) -> Result<Option<AggregationResult>, CacheError> {
        let now = Instant::now();
        let bytes = match self.cache.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.cache.remove(key);
                let mut stats = self.stats.lock();
                stats.expirations += 1;
                stats.misses += 1;
                return Ok(None);
            }
            Some(mut entry) => {
                entry.touch(self.next_tick());
                entry.data.clone()
            }
            None => {
                self.stats.lock().misses += 1;
                return Ok(None);
            }
        };

        let result = AggregationResult::from_bytes(&bytes)?;
        self.stats.lock().hits += 1;
        Ok(Some(result))
    }

    async fn set(&self, key: &str, value: &AggregationResult, ttl: Duration) -> Result<(), CacheError> {
        let data = value.to_bytes()?;
        let size = data.len();
        let entry = CacheEntry::new(data, ttl, self.next_tick());

        self.cache.insert(key.to_string(), entry);
        self.evict_if_needed();

        self.stats.lock().stores += 1;
        debug!("Stored {} bytes in result cache for key: {}", size, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.cache.remove(key).is_some();
        debug!("Deleted cache entry for key: {}", key);
        Ok(existed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.clear();
        info!("Cleared all result cache entries");
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let before = self.cache.len();
        self.cache.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.cache.len());
        if purged > 0 {
            self.stats.lock().expirations += purged as u64;
            debug!("Purged {} expired result cache entries", purged);
        }
        Ok(purged)
    }

    fn get_stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.cache.len();
        stats
    }
}
