// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infrastructure::cache::cache_manager::CacheManager;

/// 缓存过期清理工作器
///
/// 过期条目在读取时也会被移除，这里定期清理从未再被读取的条目，控制内存占用。
pub struct CachePurgeWorker {
    cache: Arc<CacheManager>,
    interval: Duration,
}

impl CachePurgeWorker {
    pub fn new(cache: Arc<CacheManager>, interval: Duration) -> Self {
        Self {
            cache,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// 运行工作器，直到取消
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Cache purge worker started (interval={:?})", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        // 第一次 tick 立即返回
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.cache.purge_expired().await {
                Ok(0) => debug!("No expired cache entries"),
                Ok(count) => info!("Purged {} expired cache entries", count),
                Err(e) => warn!("Failed to purge expired cache entries: {}", e),
            }
        }

        info!("Cache purge worker stopped");
    }

    /// 启动后台运行
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(cancel).await;
        })
    }
}
