// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::models::hit::{EntityType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::errors::ProviderError;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::infrastructure::search::build_client;
use crate::utils::url_utils::search_link;

const DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com/";
const DEFAULT_LIMIT: usize = 10;

/// DuckDuckGo Instant Answer API 的响应
#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topic {
    Entry {
        #[serde(rename = "FirstURL")]
        first_url: String,
        #[serde(rename = "Text", default)]
        text: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
    Other(IgnoredAny),
}

/// 通用网页搜索数据源（名称 `web`）
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for DuckDuckGoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<RawHit>, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", text),
                ("format", "json"),
                ("no_redirect", "1"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "DuckDuckGo returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let answer: InstantAnswer =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_answer(answer, limit))
    }
}

fn parse_answer(answer: InstantAnswer, limit: usize) -> Vec<RawHit> {
    let mut hits = Vec::new();

    if !answer.abstract_url.is_empty() {
        let title = if answer.heading.is_empty() {
            "DuckDuckGo abstract".to_string()
        } else {
            answer.heading.clone()
        };
        hits.push(
            RawHit::new(title, answer.abstract_url)
                .with_snippet(answer.abstract_text)
                .with_confidence(0.65),
        );
    }

    let mut stack: Vec<Topic> = answer.related_topics.into_iter().rev().collect();
    while let Some(topic) = stack.pop() {
        if hits.len() >= limit {
            break;
        }
        match topic {
            Topic::Entry { first_url, text } => {
                let title = text.split(" - ").next().unwrap_or(&text).trim().to_string();
                hits.push(RawHit::new(title, first_url).with_snippet(text));
            }
            Topic::Group { topics } => stack.extend(topics.into_iter().rev()),
            Topic::Other(_) => {}
        }
    }

    hits.truncate(limit);
    hits
}

#[async_trait]
impl ProviderAdapter for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "web"
    }

    fn base_confidence(&self) -> f64 {
        0.6
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Generic
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let manual = || {
            RawHit::manual_fallback(
                format!("DuckDuckGo search for \"{}\"", query.text()),
                search_link("https://duckduckgo.com/", "q", query.text()),
            )
        };

        match self.fetch(query.text(), options.limit_or(DEFAULT_LIMIT)).await {
            Ok(hits) if hits.is_empty() => {
                debug!("DuckDuckGo returned no topics for {}", query.text());
                ProviderReply::ok(vec![manual()])
            }
            Ok(hits) => ProviderReply::ok(hits),
            Err(e) => {
                warn!("DuckDuckGo search failed: {}", e);
                ProviderReply::partial(vec![manual()], e)
            }
        }
    }
}
