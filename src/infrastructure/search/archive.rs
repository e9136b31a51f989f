// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::errors::ProviderError;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::infrastructure::search::build_client;
use crate::utils::time_utils::parse_timestamp;

const DEFAULT_BASE_URL: &str = "https://archive.org";
const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct AdvancedSearch {
    response: DocList,
}

#[derive(Debug, Deserialize)]
struct DocList {
    #[serde(default)]
    docs: Vec<ArchiveDoc>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDoc {
    identifier: String,
    title: Option<Value>,
    description: Option<Value>,
    date: Option<String>,
}

/// 网页存档数据源（名称 `archive`）
///
/// 对看起来像域名或 URL 的查询查找 Wayback Machine 最近的快照，
/// 同时在 archive.org 的馆藏中做全文检索。
pub struct ArchiveProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ArchiveProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn closest_snapshot(&self, target: &str) -> Result<Option<RawHit>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/wayback/available", self.base_url))
            .query(&[("url", target)])
            .send()
            .await?;
        debug!("[archive:wayback] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "wayback returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let availability: Availability =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(availability
            .archived_snapshots
            .closest
            .filter(|s| s.available)
            .map(|snapshot| {
                let mut hit = RawHit::new(
                    format!("Wayback Machine snapshot of {}", target),
                    snapshot.url,
                )
                .with_confidence(0.9)
                .with_match_type(MatchType::Exact)
                .with_extra("origin", "wayback")
                .with_extra("status", snapshot.status);
                if let Some(ts) = parse_timestamp(&snapshot.timestamp) {
                    hit = hit.with_timestamp(ts);
                }
                hit
            }))
    }

    async fn collection_search(&self, text: &str, limit: usize) -> Result<Vec<RawHit>, ProviderError> {
        let rows = limit.to_string();
        let response = self
            .client
            .get(format!("{}/advancedsearch.php", self.base_url))
            .query(&[
                ("q", text),
                ("fl[]", "identifier"),
                ("fl[]", "title"),
                ("fl[]", "description"),
                ("fl[]", "date"),
                ("rows", rows.as_str()),
                ("output", "json"),
            ])
            .send()
            .await?;
        debug!("[archive:collection] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "archive.org search returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let search: AdvancedSearch =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(search
            .response
            .docs
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, doc)| {
                let title = doc
                    .title
                    .as_ref()
                    .and_then(first_text)
                    .unwrap_or_else(|| doc.identifier.clone());
                let mut hit = RawHit::new(title, format!("https://archive.org/details/{}", doc.identifier))
                    .with_confidence((0.8 - i as f64 * 0.03).max(0.3))
                    .with_match_type(MatchType::Contextual)
                    .with_extra("origin", "archive.org");
                if let Some(description) = doc.description.as_ref().and_then(first_text) {
                    hit = hit.with_snippet(description);
                }
                if let Some(ts) = doc.date.as_deref().and_then(parse_timestamp) {
                    hit = hit.with_timestamp(ts);
                }
                hit
            })
            .collect())
    }
}

/// archive.org 的文本字段可能是字符串也可能是字符串数组
fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

/// 查询是否像一个可以存档的域名或 URL
fn looks_archivable(text: &str) -> bool {
    !text.contains(char::is_whitespace) && !text.contains('@') && text.contains('.')
}

#[async_trait]
impl ProviderAdapter for ArchiveProvider {
    fn name(&self) -> &str {
        "archive"
    }

    fn base_confidence(&self) -> f64 {
        0.6
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Document
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let text = query.text();
        let limit = options.limit_or(DEFAULT_LIMIT);

        let snapshot = async {
            if looks_archivable(text) {
                self.closest_snapshot(text).await
            } else {
                Ok(None)
            }
        };
        let (snapshot, documents) = tokio::join!(snapshot, self.collection_search(text, limit));

        let mut hits = Vec::new();
        let mut failures = Vec::new();
        match snapshot {
            Ok(found) => hits.extend(found),
            Err(e) => {
                warn!("[archive:wayback] {}", e);
                failures.push(format!("wayback: {}", e));
            }
        }
        match documents {
            Ok(found) => hits.extend(found),
            Err(e) => {
                warn!("[archive:collection] {}", e);
                failures.push(format!("archive.org: {}", e));
            }
        }

        if hits.is_empty() {
            hits.push(RawHit::manual_fallback(
                format!("Browse archived captures of {}", text),
                format!("https://web.archive.org/web/*/{}", urlencoding::encode(text)),
            ));
        }

        if failures.is_empty() {
            ProviderReply::ok(hits)
        } else {
            ProviderReply::partial(hits, ProviderError::Transport(failures.join("; ")))
        }
    }
}
