// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 单个数据源调用失败的原因
///
/// 错误文本会以 `"{provider}: {error}"` 的形式出现在聚合结果的 `errors` 列表中，
/// 因此 `Display` 输出保持简短。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("timeout")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown provider")]
    UnknownProvider,
    #[error("provider disabled")]
    Disabled,
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// 整个聚合请求失败的原因
///
/// 单个数据源的失败不会变成这里的错误，只会记录在结果的 `errors` 中。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("query text must not be empty")]
    EmptyQuery,
    #[error("aggregation cancelled")]
    Cancelled,
}
