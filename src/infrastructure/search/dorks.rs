// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::hit::{EntityType, MatchType, RawHit};
use crate::domain::models::query::Query;
use crate::domain::search::provider::{ProviderAdapter, ProviderReply, SearchOptions};
use crate::utils::url_utils::search_link;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.\-]+@[\w.\-]+\.\w+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{7,15}$").unwrap());
static IP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap());
static SUBNET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}/\d{1,2}$").unwrap());
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\-_]{3,32}$").unwrap());

/// 自定义模板通过 `SearchOptions::extra` 的这个键传入
pub const PATTERNS_OPTION: &str = "dork_patterns";

/// 查询文本的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Email,
    Phone,
    Ip,
    Subnet,
    Username,
    Domain,
    Url,
    Person,
}

impl QueryKind {
    pub fn classify(text: &str) -> Self {
        let text = text.trim();
        let digits: String = text.chars().filter(|c| *c != '+' && *c != ' ').collect();

        if EMAIL_RE.is_match(text) {
            QueryKind::Email
        } else if PHONE_RE.is_match(&digits) {
            QueryKind::Phone
        } else if IP_RE.is_match(text) {
            QueryKind::Ip
        } else if SUBNET_RE.is_match(text) {
            QueryKind::Subnet
        } else if USERNAME_RE.is_match(text) {
            QueryKind::Username
        } else if text.starts_with("http://") || text.starts_with("https://") {
            QueryKind::Url
        } else if text.contains('.') {
            QueryKind::Domain
        } else {
            QueryKind::Person
        }
    }

    fn templates(self) -> &'static [&'static str] {
        match self {
            QueryKind::Person => &[
                r#"intext:"{}" site:linkedin.com/in"#,
                r#"intext:"{}" site:facebook.com"#,
                r#"intext:"{}" site:instagram.com"#,
                r#"intext:"{}" "curriculum vitae""#,
                r#"intext:"{}" "phone number""#,
                r#"intext:"{}" "email""#,
            ],
            QueryKind::Username => &[
                r#"intext:"{}" site:github.com"#,
                r#"intext:"{}" site:gitlab.com"#,
                r#"intext:"{}" site:keybase.io"#,
                r#"intext:"{}" site:twitter.com"#,
                r#"intext:"{}" site:steamcommunity.com"#,
                r#"intext:"{}" "username" "profile""#,
            ],
            QueryKind::Email => &[
                r#"intext:"{}" site:pastebin.com"#,
                r#"intext:"{}" site:ghostbin.com"#,
                r#"intext:"{}" filetype:txt "password""#,
                r#"intext:"{}" "data breach""#,
                r#"intext:"{}" "leaked""#,
                r#"intext:"{}" "credential""#,
            ],
            QueryKind::Phone => &[
                r#"intext:"{}" "WhatsApp""#,
                r#"intext:"{}" "Telegram""#,
                r#"intext:"{}" "contact""#,
                r#"intext:"{}" "lookup""#,
                r#"intext:"{}" "reverse phone""#,
            ],
            QueryKind::Domain => &[
                "site:{}/wp-admin",
                "site:{}/wp-content",
                "site:{}/.git",
                r#"site:{} "index of""#,
                r#"site:pastebin.com "{}""#,
                r#"site:github.com "{}""#,
            ],
            QueryKind::Ip => &[
                r#"intext:"{}" "port""#,
                r#"intext:"{}" "open""#,
                r#"intext:"{}" "ssh""#,
                r#"intext:"{}" "vulnerable""#,
                r#"intext:"{}" "camera""#,
            ],
            QueryKind::Subnet => &[
                r#"intext:"{}" "IP range""#,
                r#"intext:"{}" "open services""#,
                r#"intext:"{}" "network""#,
            ],
            QueryKind::Url => &[
                r#"intext:"{}" "index of""#,
                r#"intext:"{}" "backup""#,
                r#"intext:"{}" "config""#,
                r#"intext:"{}" "credentials""#,
            ],
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryKind::Email => "email",
            QueryKind::Phone => "phone",
            QueryKind::Ip => "ip",
            QueryKind::Subnet => "subnet",
            QueryKind::Username => "username",
            QueryKind::Domain => "domain",
            QueryKind::Url => "url",
            QueryKind::Person => "person",
        };
        f.write_str(name)
    }
}

/// 一条生成好的搜索引擎 dork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dork {
    pub pattern: String,
    pub query: String,
    pub link: String,
}

/// 为查询生成 dork 列表
///
/// 给出自定义模板时只使用自定义模板，否则按查询类型选择内置模板。
/// 模板中的 `{}` 被替换为查询文本，结果去重且保持顺序。
pub fn build_dorks(text: &str, patterns: Option<&[String]>, max_patterns: Option<usize>) -> Vec<Dork> {
    let seeds: Vec<String> = match patterns {
        Some(custom) if !custom.is_empty() => custom.to_vec(),
        _ => QueryKind::classify(text)
            .templates()
            .iter()
            .map(|t| t.to_string())
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut dorks = Vec::new();
    for pattern in seeds {
        let pattern = pattern.trim().to_string();
        if pattern.is_empty() || !seen.insert(pattern.clone()) {
            continue;
        }
        let query = pattern.replace("{}", text).trim().to_string();
        dorks.push(Dork {
            link: search_link("https://www.google.com/search", "q", &query),
            pattern,
            query,
        });
        if max_patterns.is_some_and(|max| dorks.len() >= max) {
            break;
        }
    }
    dorks
}

/// 离线搜索引擎 dork 生成数据源（名称 `dorks`）
///
/// 不发起网络请求，只根据查询类型生成可以直接打开的搜索链接。
#[derive(Debug, Default)]
pub struct DorkProvider;

impl DorkProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for DorkProvider {
    fn name(&self) -> &str {
        "dorks"
    }

    fn base_confidence(&self) -> f64 {
        0.5
    }

    fn default_entity_type(&self) -> EntityType {
        EntityType::Document
    }

    fn default_match_type(&self) -> MatchType {
        MatchType::Contextual
    }

    async fn search(&self, query: &Query, options: &SearchOptions) -> ProviderReply {
        let custom: Option<Vec<String>> = options
            .extra
            .get(PATTERNS_OPTION)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            });
        let kind = QueryKind::classify(query.text());

        let hits = build_dorks(query.text(), custom.as_deref(), options.max_results)
            .into_iter()
            .map(|dork| {
                RawHit::new(format!("Dork: {}", dork.query), dork.link)
                    .with_snippet(format!("Search-engine dork for {} \"{}\"", kind, query.text()))
                    .with_extra("pattern", dork.pattern)
                    .with_extra("dork", dork.query)
                    .with_extra("query_type", kind.to_string())
            })
            .collect();

        ProviderReply::ok(hits)
    }
}
