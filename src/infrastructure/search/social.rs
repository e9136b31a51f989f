// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::errors::ProviderError;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::infrastructure::search::build_client;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]{1,38}$").unwrap());

const CATEGORIES: &[(&str, &[&str])] = &[
    ("social", &["twitter", "instagram", "facebook", "tiktok", "mastodon"]),
    ("professional", &["linkedin", "xing", "crunchbase"]),
    ("gaming", &["steam", "twitch", "chess"]),
    ("forum", &["reddit", "hackernews", "stackexchange"]),
    ("technology", &["github", "gitlab", "bitbucket", "keybase", "dockerhub"]),
];

/// 一个可以按用户名探测的平台
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub name: String,
    /// 资料页地址模板，`{}` 会被替换为用户名
    pub url_template: String,
}

impl Platform {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
        }
    }

    pub fn profile_url(&self, username: &str) -> String {
        self.url_template.replace("{}", username)
    }

    pub fn category(&self) -> &'static str {
        let lower = self.name.to_lowercase();
        CATEGORIES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or("other")
    }
}

fn default_platforms() -> Vec<Platform> {
    vec![
        Platform::new("github", "https://github.com/{}"),
        Platform::new("gitlab", "https://gitlab.com/{}"),
        Platform::new("keybase", "https://keybase.io/{}"),
        Platform::new("reddit", "https://www.reddit.com/user/{}/about.json"),
        Platform::new("hackernews", "https://news.ycombinator.com/user?id={}"),
        Platform::new("dockerhub", "https://hub.docker.com/v2/users/{}/"),
        Platform::new("chess", "https://api.chess.com/pub/player/{}"),
    ]
}

enum Probe {
    Found(RawHit),
    Missing,
    Failed(String),
}

/// 用户名资料页探测数据源（名称 `social`）
///
/// 在一组平台上并发请求资料页，HTTP 200 视为存在该用户。
pub struct SocialProvider {
    client: reqwest::Client,
    platforms: Vec<Platform>,
}

impl Default for SocialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialProvider {
    pub fn new() -> Self {
        Self::with_platforms(default_platforms())
    }

    pub fn with_platforms(platforms: Vec<Platform>) -> Self {
        Self {
            client: build_client(),
            platforms,
        }
    }

    async fn probe(&self, platform: &Platform, username: &str) -> Probe {
        let url = platform.profile_url(username);
        match self.client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => Probe::Found(
                RawHit::new(format!("{} profile: {}", platform.name, username), url)
                    .with_snippet(format!("Account \"{}\" exists on {}", username, platform.name))
                    .with_extra("platform", platform.name.clone())
                    .with_extra("category", platform.category()),
            ),
            Ok(response) if response.status() == StatusCode::NOT_FOUND => Probe::Missing,
            Ok(response) => Probe::Failed(format!("{}: HTTP {}", platform.name, response.status())),
            Err(e) => Probe::Failed(format!("{}: {}", platform.name, ProviderError::from(e))),
        }
    }
}

/// 从查询或选项中取出可探测的用户名
fn username_for(query: &Query, options: &SearchOptions) -> Option<String> {
    if let Some(username) = options.username.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return Some(username.to_string());
    }
    let text = query.text();
    if USERNAME_RE.is_match(text) {
        Some(text.to_string())
    } else {
        None
    }
}

#[async_trait]
impl ProviderAdapter for SocialProvider {
    fn name(&self) -> &str {
        "social"
    }

    fn base_confidence(&self) -> f64 {
        0.7
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Profile
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let Some(username) = username_for(query, options) else {
            debug!("[social] query is not a username, skipping probes");
            return ProviderReply::ok(Vec::new());
        };

        let probes = join_all(self.platforms.iter().map(|p| self.probe(p, &username))).await;

        let mut hits = Vec::new();
        let mut failures = Vec::new();
        for probe in probes {
            match probe {
                Probe::Found(hit) => hits.push(hit),
                Probe::Missing => {}
                Probe::Failed(reason) => failures.push(reason),
            }
        }
        debug!(
            "[social] {} found, {} failed out of {} platforms",
            hits.len(),
            failures.len(),
            self.platforms.len()
        );

        if hits.is_empty() {
            hits.push(
                RawHit::manual_fallback(
                    format!("Check username \"{}\" manually", username),
                    format!("https://whatsmyname.app/?q={}", urlencoding::encode(&username)),
                )
                .with_match_type(MatchType::Contextual),
            );
        }

        if failures.is_empty() {
            ProviderReply::ok(hits)
        } else {
            warn!("[social] platform probes failed: {}", failures.join("; "));
            ProviderReply::partial(
                hits,
                ProviderError::Transport(format!(
                    "{} of {} platform probes failed",
                    failures.len(),
                    self.platforms.len()
                )),
            )
        }
    }
}
