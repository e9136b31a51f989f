// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 归一化服务（normalizer）：把适配器原始载荷转换为统一的命中记录，
///   并完成跨数据源的去重、排序和截断
pub mod normalizer;
