// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 聚合结果缓存管理器
pub mod cache_manager;
/// 缓存策略接口与内存实现
pub mod cache_strategy;
