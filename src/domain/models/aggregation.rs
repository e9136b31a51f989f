// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hit::Hit;
use super::query::Query;
use crate::domain::search::errors::ProviderError;

/// 单个数据源的调用结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: String,
    /// 该数据源归一化后的命中记录
    pub hits: Vec<Hit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 调用耗时，精度为毫秒
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl ProviderOutcome {
    pub fn new(
        provider: impl Into<String>,
        hits: Vec<Hit>,
        error: Option<&ProviderError>,
        duration: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            hits,
            error: error.map(ToString::to_string),
            duration: truncate_to_millis(duration),
        }
    }

    /// 未实际调用就失败的数据源（未知或已禁用）
    pub fn rejected(provider: impl Into<String>, error: &ProviderError) -> Self {
        Self::new(provider, Vec::new(), Some(error), Duration::ZERO)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 一次聚合搜索的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub query: Query,
    /// 每个选中数据源的结果，按数据源名称排序
    pub results: BTreeMap<String, ProviderOutcome>,
    /// 合并、去重、排序后的命中记录
    pub hits: Vec<Hit>,
    /// `"{provider}: {error}"` 形式的错误描述，按数据源名称排序
    pub errors: Vec<String>,
    /// 是否至少有一条非人工核查的命中
    pub has_data: bool,
    #[serde(rename = "search_time_ms", with = "duration_ms")]
    pub search_time: Duration,
    pub timestamp: DateTime<Utc>,
}

impl AggregationResult {
    /// 由各数据源结果和已合并的命中记录组装聚合结果
    pub fn assemble(
        query: Query,
        results: BTreeMap<String, ProviderOutcome>,
        hits: Vec<Hit>,
        search_time: Duration,
    ) -> Self {
        let errors = results
            .values()
            .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {}", o.provider, e)))
            .collect();
        let has_data = hits.iter().any(|h| !h.manual);
        Self {
            query,
            results,
            hits,
            errors,
            has_data,
            search_time: truncate_to_millis(search_time),
            timestamp: Utc::now(),
        }
    }

    /// 替换为当前调用方的查询，缓存命中时使用
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// 替换耗时，缓存命中时使用
    pub fn with_search_time(mut self, search_time: Duration) -> Self {
        self.search_time = truncate_to_millis(search_time);
        self
    }

    pub fn failed_sources(&self) -> usize {
        self.results.values().filter(|o| !o.is_success()).count()
    }

    /// 序列化为持久化字节
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// 从持久化字节恢复
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
