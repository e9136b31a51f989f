// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::domain::search::provider::SearchOptions;

/// 请求中的用户标识，数字和字符串两种写法都接受
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SearchRequestDto {
    #[validate(length(min = 1, max = 512, message = "Query cannot be empty"))]
    pub query: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub sources: Vec<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub max_results: Option<usize>,
    /// 未提供 `X-User-Id` 请求头时由认证中间件读取
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl SearchRequestDto {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            email: self.email.clone(),
            username: self.username.clone(),
            max_results: self.max_results,
            ..Default::default()
        }
    }

    /// 附加到查询上的调用方上下文，不参与缓存指纹
    ///
    /// `user_id` 取认证通过的用户，请求体中的值不使用。
    pub fn user_context(&self, authenticated_user: &str) -> serde_json::Value {
        json!({
            "user_id": authenticated_user,
            "email": self.email,
            "username": self.username,
        })
    }
}
