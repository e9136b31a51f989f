// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据源错误与聚合错误
pub mod errors;
/// 数据源适配器契约与数据源规格
pub mod provider;
