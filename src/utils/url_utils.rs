// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::Url;

/// 提取URL的主机名（小写），无法解析时返回空字符串
///
/// 用作排序键的最后一级，因此必须对任意输入都给出确定的结果
pub fn domain_of(raw: &str) -> String {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        .unwrap_or_default()
}

/// 构造带查询参数的搜索链接
pub fn search_link(base: &str, param: &str, value: &str) -> String {
    format!("{}?{}={}", base, param, urlencoding::encode(value))
}
