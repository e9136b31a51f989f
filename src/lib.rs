// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用模块
///
/// 定义HTTP接口使用的请求与响应数据传输对象
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含查询、命中记录、聚合结果等核心模型，以及数据源接口和归一化服务
pub mod domain;

/// 基础设施模块
///
/// 提供结果缓存、限流器、数据源适配器、分发器和批量执行器
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由、处理器和中间件
pub mod presentation;

/// 后台工作器模块
///
/// 周期性清理过期缓存
pub mod workers;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
