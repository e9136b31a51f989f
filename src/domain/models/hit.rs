// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 命中记录的实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Profile,
    Leak,
    Paste,
    Document,
    #[default]
    Generic,
}

/// 命中方式：精确匹配或上下文关联
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Exact,
    Contextual,
}

/// 风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// 由置信度推导风险等级
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            RiskLevel::High
        } else if confidence >= 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// 排序用的等级值，越大越靠前
    pub fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }
}

/// 适配器返回的原始命中载荷
///
/// 所有字段都可以缺省，由归一化服务补齐默认值。没有 `url` 的载荷会被丢弃。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub confidence: Option<f64>,
    pub relevance_score: Option<i64>,
    pub risk_level: Option<RiskLevel>,
    pub entity_type: Option<EntityType>,
    pub match_type: Option<MatchType>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl RawHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// 人工核查链接：数据源可达但没有产出，或者调用失败时给出的兜底条目
    pub fn manual_fallback(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            confidence: Some(0.3),
            match_type: Some(MatchType::Contextual),
            manual: true,
            ..Default::default()
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_relevance(mut self, relevance: i64) -> Self {
        self.relevance_score = Some(relevance);
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = Some(risk);
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// 归一化后的命中记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// 产出该记录的数据源名称
    pub source: String,
    pub confidence: f64,
    pub relevance_score: u8,
    pub risk_level: RiskLevel,
    pub entity_type: EntityType,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// 人工核查链接，不计入 `has_data`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Hit {
    /// 去重键
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.url, &self.title)
    }
}
