// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含聚合搜索的核心业务逻辑，包括：
/// - 领域模型（models）：查询、命中记录和聚合结果
/// - 数据源接口（search）：适配器契约、数据源规格与错误分类
/// - 服务（services）：命中记录的归一化、去重与排序
///
/// 领域层不依赖任何外部实现，网络访问、缓存和限流都在基础设施层完成。
pub mod models;
pub mod search;
pub mod services;
