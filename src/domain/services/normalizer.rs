// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::models::aggregation::ProviderOutcome;
use crate::domain::models::hit::{EntityType, Hit, MatchType, RawHit, RiskLevel};
use crate::domain::search::provider::ProviderSpec;
use crate::utils::url_utils::domain_of;

/// 合并结果的默认条数上限
pub const DEFAULT_MAX_RESULTS: usize = 25;

/// 原始载荷缺省字段的补齐值，来自数据源规格
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitDefaults {
    pub base_confidence: f64,
    pub entity_type: EntityType,
    pub match_type: MatchType,
}

impl Default for HitDefaults {
    fn default() -> Self {
        Self {
            base_confidence: 0.5,
            entity_type: EntityType::Generic,
            match_type: MatchType::Exact,
        }
    }
}

impl From<&ProviderSpec> for HitDefaults {
    fn from(spec: &ProviderSpec) -> Self {
        Self {
            base_confidence: spec.base_confidence,
            entity_type: spec.adapter.default_entity_type(),
            match_type: spec.adapter.default_match_type(),
        }
    }
}

/// 命中记录归一化器
///
/// 负责三件事：
/// 1. 把原始载荷强制转换为 `Hit`，补齐缺省字段并把分数限制在合法范围内
/// 2. 以 `(url, title)` 精确去重，先出现的记录保留
/// 3. 按 (相关度, 风险等级, 置信度) 降序、域名升序稳定排序后截断
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_results: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

impl Normalizer {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// 转换单个数据源的原始载荷，没有 URL 的条目被丢弃
    pub fn coerce(&self, provider: &str, defaults: &HitDefaults, raw: Vec<RawHit>) -> Vec<Hit> {
        raw.into_iter()
            .filter_map(|r| coerce_one(provider, defaults, r))
            .collect()
    }

    /// 合并多个数据源的命中记录
    ///
    /// 调用方需要按确定的顺序（数据源名称升序）传入结果，
    /// 这样去重时"先出现"的记录与各数据源完成的先后无关。
    pub fn merge<'a, I>(&self, outcomes: I) -> Vec<Hit>
    where
        I: IntoIterator<Item = &'a ProviderOutcome>,
    {
        let combined = outcomes
            .into_iter()
            .flat_map(|o| o.hits.iter().cloned())
            .collect();
        let mut hits = dedup(combined);
        sort_hits(&mut hits);
        hits.truncate(self.max_results);
        hits
    }
}

fn coerce_one(provider: &str, defaults: &HitDefaults, raw: RawHit) -> Option<Hit> {
    let url = raw.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;

    let confidence = raw
        .confidence
        .filter(|c| !c.is_nan())
        .unwrap_or(defaults.base_confidence)
        .clamp(0.0, 1.0);

    let relevance_score = match raw.relevance_score {
        Some(score) => score.clamp(0, 100) as u8,
        None => (confidence * 100.0).round() as u8,
    };

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{} result", provider));

    Some(Hit {
        title,
        url,
        snippet: raw.snippet.unwrap_or_default(),
        source: provider.to_string(),
        confidence,
        relevance_score,
        risk_level: raw
            .risk_level
            .unwrap_or_else(|| RiskLevel::from_confidence(confidence)),
        entity_type: raw.entity_type.unwrap_or(defaults.entity_type),
        match_type: raw.match_type.unwrap_or(defaults.match_type),
        timestamp: raw.timestamp,
        manual: raw.manual,
        extra: raw.extra,
    })
}

/// 以 `(url, title)` 精确去重，保留第一次出现的记录
pub fn dedup(hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .filter(|h| seen.insert((h.url.clone(), h.title.clone())))
        .collect()
}

/// 稳定排序：相关度、风险等级、置信度降序，域名升序
pub fn sort_hits(hits: &mut Vec<Hit>) {
    let mut keyed: Vec<(String, Hit)> = hits.drain(..).map(|h| (domain_of(&h.url), h)).collect();
    keyed.sort_by(|(da, a), (db, b)| compare(a, b).then_with(|| da.cmp(db)));
    hits.extend(keyed.into_iter().map(|(_, h)| h));
}

fn compare(a: &Hit, b: &Hit) -> Ordering {
    b.relevance_score
        .cmp(&a.relevance_score)
        .then_with(|| b.risk_level.rank().cmp(&a.risk_level.rank()))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}
