// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::errors::ProviderError;
use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;

/// 基础置信度缺省值
pub const DEFAULT_BASE_CONFIDENCE: f64 = 0.5;

/// 传给适配器的附加搜索选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// 单个数据源最多返回的条目数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl SearchOptions {
    pub fn limit_or(&self, default: usize) -> usize {
        self.max_results.filter(|n| *n > 0).unwrap_or(default)
    }

    /// 会影响结果内容的选项摘要，选项全部为缺省值时返回 `None`
    ///
    /// `extra` 按键排序后参与计算，相同的选项总是得到相同的摘要。
    pub fn digest(&self) -> Option<String> {
        let max_results = self.max_results.filter(|n| *n > 0);
        if self.email.is_none() && self.username.is_none() && max_results.is_none() && self.extra.is_empty() {
            return None;
        }

        let mut hasher = Sha256::new();
        if let Some(email) = &self.email {
            hasher.update(format!("email={}\n", email));
        }
        if let Some(username) = &self.username {
            hasher.update(format!("username={}\n", username));
        }
        if let Some(n) = max_results {
            hasher.update(format!("max_results={}\n", n));
        }
        let extra: BTreeMap<&String, &Value> = self.extra.iter().collect();
        for (key, value) in extra {
            hasher.update(format!("extra.{}={}\n", key, value));
        }
        Some(hex::encode(hasher.finalize()))
    }
}

/// 适配器的一次调用结果
///
/// 即使调用失败也可以携带部分命中或人工核查链接。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderReply {
    pub hits: Vec<RawHit>,
    pub error: Option<ProviderError>,
}

impl ProviderReply {
    pub fn ok(hits: Vec<RawHit>) -> Self {
        Self { hits, error: None }
    }

    pub fn failed(error: ProviderError) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(error),
        }
    }

    pub fn partial(hits: Vec<RawHit>, error: ProviderError) -> Self {
        Self {
            hits,
            error: Some(error),
        }
    }
}

/// 数据源适配器
///
/// 每个外部数据源实现一次该接口。`search` 从不返回 `Err`，
/// 失败通过 `ProviderReply::error` 报告，超时、取消和 panic 由分发器统一处理。
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 数据源名称，在注册表中唯一
    fn name(&self) -> &str;

    /// 原始载荷未给出置信度时使用的基础置信度
    fn base_confidence(&self) -> f64 {
        DEFAULT_BASE_CONFIDENCE
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Generic
    }

    fn default_match_type(&self) -> MatchType {
        MatchType::Exact
    }

    /// 执行一次搜索
    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply;
}

/// 注册到注册表中的数据源规格
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub timeout: Duration,
    pub enabled: bool,
    /// 未指定数据源时是否属于基线集合
    pub required: bool,
    pub base_confidence: f64,
}

impl ProviderSpec {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, timeout: Duration) -> Self {
        Self {
            name: adapter.name().to_string(),
            base_confidence: adapter.base_confidence(),
            adapter,
            timeout,
            enabled: true,
            required: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_base_confidence(mut self, base_confidence: f64) -> Self {
        self.base_confidence = base_confidence;
        self
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .field("required", &self.required)
            .field("base_confidence", &self.base_confidence)
            .finish()
    }
}
