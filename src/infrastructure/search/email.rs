// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::errors::ProviderError;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::infrastructure::search::build_client;
use crate::utils::time_utils::parse_timestamp;

const HIBP_BASE_URL: &str = "https://haveibeenpwned.com";
const SKYMEM_BASE_URL: &str = "https://api.skymem.info";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Breach {
    name: String,
    title: Option<String>,
    domain: Option<String>,
    breach_date: Option<String>,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    is_verified: bool,
}

#[derive(Debug, Deserialize)]
struct SkymemResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// 邮箱情报数据源（名称 `email`）
///
/// 查询 Have I Been Pwned 的泄露账户接口和 SkyMem 邮箱索引。两者都需要 API key，
/// 未配置 key 的来源只给出人工核查链接。查询文本不是邮箱且选项中也没有邮箱时不做任何请求。
pub struct EmailProvider {
    client: reqwest::Client,
    hibp_base: String,
    skymem_base: String,
    hibp_key: Option<String>,
    skymem_key: Option<String>,
}

impl Default for EmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailProvider {
    pub fn new() -> Self {
        Self::with_base_urls(HIBP_BASE_URL, SKYMEM_BASE_URL)
    }

    pub fn with_base_urls(hibp: impl Into<String>, skymem: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            hibp_base: hibp.into().trim_end_matches('/').to_string(),
            skymem_base: skymem.into().trim_end_matches('/').to_string(),
            hibp_key: None,
            skymem_key: None,
        }
    }

    pub fn with_api_keys(mut self, hibp: Option<String>, skymem: Option<String>) -> Self {
        self.hibp_key = hibp.filter(|k| !k.trim().is_empty());
        self.skymem_key = skymem.filter(|k| !k.trim().is_empty());
        self
    }

    async fn search_hibp(&self, email: &str, key: &str) -> Result<Vec<RawHit>, ProviderError> {
        let response = self
            .client
            .get(format!(
                "{}/api/v3/breachedaccount/{}",
                self.hibp_base,
                urlencoding::encode(email)
            ))
            .query(&[("truncateResponse", "false")])
            .header("hibp-api-key", key)
            .send()
            .await?;
        debug!("[email:hibp] http={}", response.status());

        // 404 表示该邮箱不在任何已知泄露中
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "hibp returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let breaches: Vec<Breach> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(breaches.into_iter().map(|b| breach_hit(email, b)).collect())
    }

    async fn search_skymem(&self, email: &str, key: &str) -> Result<Vec<RawHit>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/email", self.skymem_base))
            .query(&[("email", email)])
            .header("X-API-Key", key)
            .send()
            .await?;
        debug!("[email:skymem] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "skymem returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let parsed: SkymemResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let fallback_url = skymem_manual_url(email);
        Ok(parsed
            .data
            .into_iter()
            .enumerate()
            .map(|(i, record)| skymem_hit(i, record, &fallback_url))
            .collect())
    }
}

fn breach_hit(email: &str, breach: Breach) -> RawHit {
    let title = breach.title.unwrap_or_else(|| breach.name.clone());
    let mut hit = RawHit::new(
        format!("{} breach", title),
        format!("https://haveibeenpwned.com/PwnedWebsites#{}", breach.name),
    )
    .with_confidence(if breach.is_verified { 0.9 } else { 0.75 })
    .with_entity_type(EntityType::Leak)
    .with_match_type(MatchType::Exact)
    .with_extra("origin", "hibp")
    .with_extra("email", email);
    if !breach.data_classes.is_empty() {
        hit = hit.with_snippet(format!("Exposed: {}", breach.data_classes.join(", ")));
    }
    if let Some(domain) = breach.domain.filter(|d| !d.is_empty()) {
        hit = hit.with_extra("domain", domain);
    }
    if let Some(ts) = breach.breach_date.as_deref().and_then(parse_timestamp) {
        hit = hit.with_timestamp(ts);
    }
    hit
}

/// SkyMem 记录的字段不固定，只取常见的几个
fn skymem_hit(index: usize, record: Value, fallback_url: &str) -> RawHit {
    let field = |name: &str| record.get(name).and_then(Value::as_str).map(str::to_owned);
    let title = field("title")
        .or_else(|| field("source"))
        .unwrap_or_else(|| format!("SkyMem record {}", index + 1));
    let url = field("url").unwrap_or_else(|| fallback_url.to_string());

    let mut hit = RawHit::new(title, url)
        .with_confidence(0.7)
        .with_entity_type(EntityType::Leak)
        .with_extra("origin", "skymem");
    if let Some(snippet) = field("description").or_else(|| field("line")) {
        hit = hit.with_snippet(snippet);
    }
    if let Some(ts) = field("date").as_deref().and_then(parse_timestamp) {
        hit = hit.with_timestamp(ts);
    }
    hit
}

fn hibp_manual_url(email: &str) -> String {
    format!("https://haveibeenpwned.com/account/{}", urlencoding::encode(email))
}

fn skymem_manual_url(email: &str) -> String {
    format!("https://www.skymem.info/srch?q={}", urlencoding::encode(email))
}

fn manual_leak(title: &str, url: String) -> RawHit {
    RawHit::manual_fallback(title, url).with_entity_type(EntityType::Leak)
}

/// 从选项或查询文本中取出要查的邮箱
fn email_for(query: &Query, options: &SearchOptions) -> Option<String> {
    options
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| EMAIL_RE.is_match(e))
        .or_else(|| Some(query.text()).filter(|t| EMAIL_RE.is_match(t)))
        .map(str::to_lowercase)
}

#[async_trait]
impl ProviderAdapter for EmailProvider {
    fn name(&self) -> &str {
        "email"
    }

    fn base_confidence(&self) -> f64 {
        0.8
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Leak
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let Some(email) = email_for(query, options) else {
            debug!("[email] query is not an email address, skipping");
            return ProviderReply::ok(Vec::new());
        };

        let hibp = async {
            match &self.hibp_key {
                Some(key) => Some(self.search_hibp(&email, key).await),
                None => None,
            }
        };
        let skymem = async {
            match &self.skymem_key {
                Some(key) => Some(self.search_skymem(&email, key).await),
                None => None,
            }
        };
        let (hibp, skymem) = tokio::join!(hibp, skymem);

        let mut hits = Vec::new();
        let mut failures = Vec::new();
        let lookups = [
            ("hibp", "Check Have I Been Pwned manually", hibp_manual_url(&email), hibp),
            ("skymem", "Check SkyMem manually", skymem_manual_url(&email), skymem),
        ];
        for (origin, title, manual_url, outcome) in lookups {
            match outcome {
                Some(Ok(found)) if !found.is_empty() => hits.extend(found),
                Some(Ok(_)) => hits.push(manual_leak(title, manual_url)),
                Some(Err(e)) => {
                    warn!("[email:{}] {}", origin, e);
                    hits.push(manual_leak(title, manual_url));
                    failures.push(format!("{}: {}", origin, e));
                }
                None => {
                    debug!("[email:{}] no API key configured", origin);
                    hits.push(manual_leak(title, manual_url));
                }
            }
        }

        if failures.is_empty() {
            ProviderReply::ok(hits)
        } else {
            ProviderReply::partial(hits, ProviderError::Transport(failures.join("; ")))
        }
    }
}
