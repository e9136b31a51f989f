// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// API 访问令牌存储
pub mod token_store;

pub use token_store::{ApiTokenStore, InMemoryTokenStore};
