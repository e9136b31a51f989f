// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::errors::ProviderError;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::infrastructure::search::build_client;

const WIKIDATA_BASE_URL: &str = "https://www.wikidata.org";
const DEFAULT_LIMIT: usize = 10;

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@?\w{3,}$").unwrap());

#[derive(Debug, Deserialize)]
struct EntitySearch {
    #[serde(default)]
    search: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    id: String,
    label: Option<String>,
    description: Option<String>,
    concepturi: Option<String>,
}

/// 查询文本的人员检索方式
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// `@handle` 或单个标识符
    Handle(String),
    /// 姓名，邮箱按本地部分拆成姓名
    Name(String),
}

impl Target {
    fn classify(text: &str) -> Self {
        if HANDLE_RE.is_match(text) {
            return Target::Handle(text.trim_start_matches('@').to_string());
        }
        let name = match text.split_once('@') {
            Some((local, _)) => local
                .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            None => text.to_string(),
        };
        Target::Name(name)
    }
}

/// 人员目录数据源（名称 `people`）
///
/// 姓名类查询走 Wikidata 实体搜索，结果作为 `profile` 命中；
/// 另外总是附带公开人员目录的人工核查链接。用户名类查询只给出目录链接。
pub struct PeopleProvider {
    client: reqwest::Client,
    wikidata_base: String,
}

impl Default for PeopleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PeopleProvider {
    pub fn new() -> Self {
        Self::with_base_url(WIKIDATA_BASE_URL)
    }

    pub fn with_base_url(base: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            wikidata_base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn search_wikidata(&self, name: &str, limit: usize) -> Result<Vec<RawHit>, ProviderError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(format!("{}/w/api.php", self.wikidata_base))
            .query(&[
                ("action", "wbsearchentities"),
                ("search", name),
                ("language", "en"),
                ("type", "item"),
                ("format", "json"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        debug!("[people:wikidata] http={}", response.status());

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "wikidata returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let parsed: EntitySearch =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parsed.search.into_iter().map(entity_hit).collect())
    }
}

fn entity_hit(entity: Entity) -> RawHit {
    let url = entity
        .concepturi
        .unwrap_or_else(|| format!("https://www.wikidata.org/wiki/{}", entity.id));
    let mut hit = RawHit::new(entity.label.unwrap_or_else(|| entity.id.clone()), url)
        .with_match_type(MatchType::Contextual)
        .with_extra("origin", "wikidata")
        .with_extra("entity_id", entity.id);
    if let Some(description) = entity.description {
        hit = hit.with_snippet(description);
    }
    hit
}

/// 公开人员目录的检索链接
fn directory_links(target: &Target) -> Vec<RawHit> {
    let links: Vec<(&str, String)> = match target {
        Target::Handle(handle) => {
            let handle = urlencoding::encode(handle);
            vec![
                ("UserSearch.org", format!("https://usersearch.org/results/?q={}", handle)),
                ("InstantUsername", format!("https://instantusername.com/#/{}", handle)),
                ("DetectDee", format!("https://detectdee.com/search/{}", handle)),
            ]
        }
        Target::Name(name) => vec![
            (
                "SearchPeopleFree",
                format!(
                    "https://www.searchpeoplefree.com/find/{}",
                    urlencoding::encode(&name.replace(' ', "-"))
                ),
            ),
            (
                "Namint",
                format!("https://namint.com/search?name={}", urlencoding::encode(name)),
            ),
            (
                "SocialFinder",
                format!("https://socialfinder.io/?q={}", urlencoding::encode(name)),
            ),
        ],
    };
    links
        .into_iter()
        .map(|(directory, url)| {
            RawHit::manual_fallback(format!("Search {} manually", directory), url)
                .with_entity_type(EntityType::Profile)
                .with_extra("directory", directory)
        })
        .collect()
}

#[async_trait]
impl ProviderAdapter for PeopleProvider {
    fn name(&self) -> &str {
        "people"
    }

    fn base_confidence(&self) -> f64 {
        0.5
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Profile
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let target = Target::classify(query.text());
        let mut hits = Vec::new();
        let mut error = None;

        if let Target::Name(name) = &target {
            match self.search_wikidata(name, options.limit_or(DEFAULT_LIMIT)).await {
                Ok(found) => hits.extend(found),
                Err(e) => {
                    warn!("[people:wikidata] {}", e);
                    error = Some(e);
                }
            }
        }
        hits.extend(directory_links(&target));

        match error {
            None => ProviderReply::ok(hits),
            Some(e) => ProviderReply::partial(hits, e),
        }
    }
}
