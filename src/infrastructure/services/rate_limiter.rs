// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::settings::RateLimitingSettings;

const GLOBAL_BUCKET: &str = "__global__";
/// 非法速率（非正数或 NaN）被收紧到的最小速率
pub const MIN_RATE: f64 = 0.001;

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_nan() || rate <= 0.0 {
        MIN_RATE
    } else {
        rate
    }
}

/// 限流错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit wait cancelled")]
    Cancelled,
    #[error("rate limit wait would exceed the caller deadline")]
    DeadlineExceeded,
}

/// 令牌桶分桶方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// 所有数据源共享一个桶
    Global,
    /// 每个数据源一个桶
    PerProvider,
}

/// 令牌桶
///
/// 容量等于速率（至少为 1），初始为满，按经过的时间连续补充令牌。
/// 非正数或 NaN 的速率按 [`MIN_RATE`] 处理。
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64) -> Self {
        let rate = sanitize_rate(rate);
        let capacity = rate.max(1.0);
        Self {
            capacity,
            refill_rate: rate,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// 尝试取走一个令牌，令牌不足时返回需要等待的时长
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - self.tokens) / self.refill_rate;
            let wait = Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX);
            Err(wait.max(Duration::from_millis(1)))
        }
    }

    pub fn available(&self) -> f64 {
        self.tokens
    }
}

/// 出站请求限流器
///
/// 令牌的检查与扣减在锁内完成，等待在锁外进行，因此等待中的调用方
/// 不会阻塞其他桶或其他调用方的记账。多个调用方同时等待时，先醒来的先拿到令牌。
pub struct RateLimiter {
    rate: f64,
    scope: RateLimitScope,
    enabled: bool,
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(rate: f64, scope: RateLimitScope) -> Self {
        let sanitized = sanitize_rate(rate);
        if sanitized != rate {
            warn!("Invalid rate limit {}, falling back to {} req/s", rate, sanitized);
        }
        Self {
            rate: sanitized,
            scope,
            enabled: true,
            buckets: DashMap::new(),
        }
    }

    /// 不做任何限制的限流器
    pub fn unlimited() -> Self {
        Self {
            rate: f64::INFINITY,
            scope: RateLimitScope::Global,
            enabled: false,
            buckets: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &RateLimitingSettings) -> Self {
        if !settings.enabled {
            info!("Outbound rate limiting disabled");
            return Self::unlimited();
        }
        let scope = if settings.per_provider {
            RateLimitScope::PerProvider
        } else {
            RateLimitScope::Global
        };
        info!(
            "Outbound rate limiting: {} req/s ({:?})",
            settings.requests_per_second, scope
        );
        Self::new(settings.requests_per_second, scope)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn bucket(&self, provider: &str) -> Arc<Mutex<TokenBucket>> {
        let key = match self.scope {
            RateLimitScope::Global => GLOBAL_BUCKET,
            RateLimitScope::PerProvider => provider,
        };
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.clone();
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(self.rate))))
            .clone()
    }

    fn poll(&self, provider: &str) -> Result<(), Duration> {
        if !self.enabled {
            return Ok(());
        }
        let bucket = self.bucket(provider);
        let mut guard = bucket.lock();
        guard.try_take(Instant::now())
    }

    /// 不等待地尝试取令牌
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.poll(provider).is_ok()
    }

    /// 等待直到取得令牌
    pub async fn acquire(&self, provider: &str) {
        while let Err(wait) = self.poll(provider) {
            debug!("Rate limited on {}, waiting {:?}", provider, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// 同步阻塞版本，供非异步上下文使用
    pub fn acquire_blocking(&self, provider: &str) {
        while let Err(wait) = self.poll(provider) {
            std::thread::sleep(wait);
        }
    }

    /// 可取消的等待
    pub async fn acquire_cancellable(
        &self,
        provider: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
            match self.poll(provider) {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// 带截止时间的等待，确定会超过截止时间时立即返回错误
    pub async fn acquire_until(&self, provider: &str, deadline: Instant) -> Result<(), RateLimitError> {
        loop {
            match self.poll(provider) {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    if Instant::now() + wait > deadline {
                        return Err(RateLimitError::DeadlineExceeded);
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
