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

const PSBDMP_BASE_URL: &str = "https://psbdmp.ws";
const RANSOM_BASE_URL: &str = "https://haveibeenransom.com";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PsbdmpResponse {
    Wrapped {
        #[serde(default)]
        data: Vec<PasteItem>,
    },
    Bare(Vec<PasteItem>),
}

#[derive(Debug, Default, Deserialize)]
struct PasteItem {
    #[serde(alias = "_id")]
    id: Option<String>,
    title: Option<String>,
    text: Option<String>,
    email: Option<String>,
    line: Option<String>,
    #[serde(alias = "added")]
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RansomItem {
    #[serde(alias = "name")]
    title: Option<String>,
    link: Option<String>,
    #[serde(alias = "summary")]
    description: Option<String>,
    #[serde(alias = "updated_at")]
    date: Option<String>,
}

/// 泄露与粘贴板数据源（名称 `breach`）
///
/// 依次查询 psbdmp 粘贴板索引和 HaveIBeenRansom 勒索泄露索引，
/// 两者互不影响，任一失败都只作为部分错误报告。
pub struct BreachProvider {
    client: reqwest::Client,
    psbdmp_base: String,
    ransom_base: String,
}

impl Default for BreachProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BreachProvider {
    pub fn new() -> Self {
        Self::with_base_urls(PSBDMP_BASE_URL, RANSOM_BASE_URL)
    }

    pub fn with_base_urls(psbdmp: impl Into<String>, ransom: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            psbdmp_base: psbdmp.into().trim_end_matches('/').to_string(),
            ransom_base: ransom.into().trim_end_matches('/').to_string(),
        }
    }

    fn psbdmp_url(&self, text: &str) -> String {
        format!(
            "{}/api/v3/search/{}",
            self.psbdmp_base,
            urlencoding::encode(text)
        )
    }

    async fn search_psbdmp(&self, text: &str) -> Result<Vec<RawHit>, ProviderError> {
        let url = self.psbdmp_url(text);
        let response = self.client.get(&url).send().await?;
        debug!("[breach:psbdmp] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "psbdmp returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let parsed: PsbdmpResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let items = match parsed {
            PsbdmpResponse::Wrapped { data } => data,
            PsbdmpResponse::Bare(items) => items,
        };

        Ok(items
            .into_iter()
            .map(|item| paste_hit(item, &url))
            .collect())
    }

    async fn search_ransom(&self, text: &str) -> Result<Vec<RawHit>, ProviderError> {
        let manual_url = self.ransom_manual_url(text);
        let response = self
            .client
            .get(format!("{}/api/v1/search", self.ransom_base))
            .query(&[("query", text)])
            .send()
            .await?;
        debug!("[breach:haveibeenransom] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "haveibeenransom returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let items: Vec<RansomItem> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(items
            .into_iter()
            .map(|item| {
                let mut hit = RawHit::new(
                    item.title.unwrap_or_else(|| "HaveIBeenRansom hit".to_string()),
                    item.link.unwrap_or_else(|| manual_url.clone()),
                )
                .with_confidence(0.75)
                .with_entity_type(EntityType::Leak)
                .with_extra("origin", "haveibeenransom");
                if let Some(description) = item.description {
                    hit = hit.with_snippet(description);
                }
                if let Some(ts) = item.date.as_deref().and_then(parse_timestamp) {
                    hit = hit.with_timestamp(ts);
                }
                hit
            })
            .collect())
    }

    fn ransom_manual_url(&self, text: &str) -> String {
        format!("{}/?search={}", self.ransom_base, urlencoding::encode(text))
    }
}

fn paste_hit(item: PasteItem, search_url: &str) -> RawHit {
    let title = item.title.clone().unwrap_or_else(|| match &item.id {
        Some(id) => format!("psbdmp result {}", id),
        None => "psbdmp result".to_string(),
    });
    let url = match &item.id {
        Some(id) => format!("https://pastebin.com/{}", id),
        None => search_url.to_string(),
    };

    let mut hit = RawHit::new(title, url)
        .with_confidence(0.9)
        .with_entity_type(EntityType::Paste)
        .with_match_type(MatchType::Exact)
        .with_extra("origin", "psbdmp");
    if let Some(snippet) = item.text.or(item.email).or(item.line) {
        hit = hit.with_snippet(snippet);
    }
    if let Some(raw_date) = item.date {
        match parse_timestamp(&raw_date) {
            Some(ts) => hit = hit.with_timestamp(ts),
            None => hit = hit.with_extra("date", Value::String(raw_date)),
        }
    }
    hit
}

fn manual_leak(title: &str, url: String) -> RawHit {
    RawHit::manual_fallback(title, url).with_entity_type(EntityType::Leak)
}

#[async_trait]
impl ProviderAdapter for BreachProvider {
    fn name(&self) -> &str {
        "breach"
    }

    fn base_confidence(&self) -> f64 {
        0.7
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Leak
    }

    async fn search(&self, query: &Query, _options: &SearchOptions) -> ProviderReply {
        let text = query.text();
        let (pastes, ransom) = tokio::join!(self.search_psbdmp(text), self.search_ransom(text));

        let mut hits = Vec::new();
        let mut failures = Vec::new();

        match pastes {
            Ok(found) if found.is_empty() => {
                hits.push(manual_leak("Check psbdmp.ws manually", self.psbdmp_url(text)))
            }
            Ok(found) => hits.extend(found),
            Err(e) => {
                warn!("[breach:psbdmp] {}", e);
                hits.push(manual_leak("Check psbdmp.ws manually", self.psbdmp_url(text)));
                failures.push(format!("psbdmp: {}", e));
            }
        }

        match ransom {
            Ok(found) if found.is_empty() => hits.push(manual_leak(
                "Check HaveIBeenRansom manually",
                self.ransom_manual_url(text),
            )),
            Ok(found) => hits.extend(found),
            Err(e) => {
                warn!("[breach:haveibeenransom] {}", e);
                hits.push(manual_leak(
                    "Check HaveIBeenRansom manually",
                    self.ransom_manual_url(text),
                ));
                failures.push(format!("haveibeenransom: {}", e));
            }
        }

        if failures.is_empty() {
            ProviderReply::ok(hits)
        } else {
            ProviderReply::partial(hits, ProviderError::Transport(failures.join("; ")))
        }
    }
}
