// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含与外部世界交互的实现：
/// - 认证（auth）：API 访问令牌存储
/// - 缓存（cache）：聚合结果的内存缓存
/// - 指标（metrics）：Prometheus 指标导出与记录
/// - 搜索（search）：数据源适配器、注册表、分发器和批量执行器
/// - 服务（services）：出站请求限流
///
/// 基础设施层依赖领域层定义的接口，领域层不依赖这里的任何实现。
pub mod auth;
pub mod cache;
pub mod metrics;
pub mod search;
pub mod services;
