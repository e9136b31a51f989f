// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台周期任务
pub mod cache_purge_worker;

pub use cache_purge_worker::CachePurgeWorker;
