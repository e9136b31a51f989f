// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// 一次聚合搜索的查询请求
///
/// 创建后不可变。数据源集合使用有序集合存储，保证指纹和结果合并顺序
/// 与调用方给出的顺序无关。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    selected_sources: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_context: Option<Value>,
}

impl Query {
    /// 创建查询，文本会去掉首尾空白，数据源名称会去重
    pub fn new<I, S>(text: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text: String = text.into();
        Self {
            text: text.trim().to_string(),
            selected_sources: sources
                .into_iter()
                .map(Into::into)
                .map(|s: String| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            user_context: None,
        }
    }

    /// 附加调用方上下文（例如邮箱、用户名等辅助信息）
    pub fn with_user_context(mut self, context: Value) -> Self {
        self.user_context = Some(context);
        self
    }

    /// 用新的数据源集合派生一个查询，其余字段保持不变
    pub fn with_sources(&self, sources: BTreeSet<String>) -> Self {
        Self {
            text: self.text.clone(),
            selected_sources: sources,
            user_context: self.user_context.clone(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selected_sources(&self) -> &BTreeSet<String> {
        &self.selected_sources
    }

    pub fn user_context(&self) -> Option<&Value> {
        self.user_context.as_ref()
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// 归一化后的查询文本：小写并把连续空白折叠为单个空格
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    /// 缓存指纹
    ///
    /// 只由归一化文本和有序数据源集合决定，大小写、首尾空白和数据源顺序
    /// 不同的查询得到相同指纹。
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.text, &self.selected_sources)
    }

    /// 带选项摘要的缓存键
    ///
    /// 没有摘要时与 [`Query::fingerprint`] 相同。
    pub fn cache_key(&self, options_digest: Option<&str>) -> String {
        match options_digest {
            None => self.fingerprint(),
            Some(digest) => {
                let mut hasher = Sha256::new();
                hasher.update(self.fingerprint().as_bytes());
                hasher.update(b"#");
                hasher.update(digest.as_bytes());
                hex::encode(hasher.finalize())
            }
        }
    }
}

/// 小写并折叠空白
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 计算查询文本与数据源集合的 SHA-256 指纹（十六进制）
pub fn fingerprint<'a, I>(text: &str, sources: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let mut sorted: Vec<&str> = sources.into_iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    for source in sorted {
        hasher.update(b"|");
        hasher.update(source.as_bytes());
    }
    hex::encode(hasher.finalize())
}
