// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 查询（query）：不可变的查询请求及其缓存指纹
/// - 命中记录（hit）：适配器原始载荷与归一化后的命中记录
/// - 聚合结果（aggregation）：单个数据源的结果与一次聚合的完整结果
pub mod aggregation;
pub mod hit;
pub mod query;
