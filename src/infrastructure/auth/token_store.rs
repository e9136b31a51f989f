// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// 按用户保存的 API 访问令牌
pub trait ApiTokenStore: Send + Sync {
    /// 校验用户提交的令牌，比较过程与令牌内容无关地耗时
    fn verify(&self, user_id: &str, token: &str) -> bool;
}

/// 内存令牌存储
///
/// 不保存令牌明文，只保存以进程内随机密钥计算的 HMAC-SHA256 标签，
/// 校验时用 `verify_slice` 做常量时间比较。
pub struct InMemoryTokenStore {
    key: [u8; 32],
    tags: HashMap<String, Vec<u8>>,
}

impl InMemoryTokenStore {
    pub fn new(tokens: &HashMap<String, String>) -> Self {
        let key: [u8; 32] = rand::random();
        let tags: HashMap<String, Vec<u8>> = tokens
            .iter()
            .filter(|(user_id, token)| {
                if token.is_empty() {
                    warn!("Ignoring empty API token for user {}", user_id);
                }
                !token.is_empty()
            })
            .filter_map(|(user_id, token)| tag(&key, token).map(|t| (user_id.clone(), t)))
            .collect();
        info!("Loaded API tokens for {} users", tags.len());
        Self { key, tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

fn tag(key: &[u8], token: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(token.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

impl ApiTokenStore for InMemoryTokenStore {
    fn verify(&self, user_id: &str, token: &str) -> bool {
        let Some(expected) = self.tags.get(user_id) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(token.as_bytes());
        mac.verify_slice(expected).is_ok()
    }
}
