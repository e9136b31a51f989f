// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 出站请求令牌桶限流器
pub mod rate_limiter;
