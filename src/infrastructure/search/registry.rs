// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::settings::Settings;
use crate::domain::search::provider::{ProviderAdapter, ProviderSpec};

/// 注册表错误，只会在启动阶段出现
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider '{0}' is registered twice")]
    DuplicateProvider(String),
    #[error("unknown provider '{0}' in configuration")]
    UnknownProvider(String),
    #[error("provider '{0}' must have a non-zero timeout")]
    InvalidTimeout(String),
    #[error("provider '{0}' base confidence must be within [0, 1]")]
    InvalidConfidence(String),
}

/// 数据源注册表
///
/// 启动时构建，之后只读。未指定数据源的查询使用基线集合：
/// 配置的 `default_sources`，否则是所有启用的 required 数据源，
/// 再否则是所有启用的数据源。
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderSpec>,
    default_sources: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册数据源，名称重复或参数非法时返回错误
    pub fn register(&mut self, spec: ProviderSpec) -> Result<(), RegistryError> {
        if spec.timeout.is_zero() {
            return Err(RegistryError::InvalidTimeout(spec.name));
        }
        if !(0.0..=1.0).contains(&spec.base_confidence) {
            return Err(RegistryError::InvalidConfidence(spec.name));
        }
        if self.providers.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateProvider(spec.name));
        }
        info!(
            "Registered provider {} (timeout={:?}, enabled={}, required={})",
            spec.name, spec.timeout, spec.enabled, spec.required
        );
        self.providers.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// 设置基线数据源，所有名称都必须已经注册
    pub fn set_default_sources(&mut self, sources: Vec<String>) -> Result<(), RegistryError> {
        if let Some(unknown) = sources.iter().find(|s| !self.providers.contains_key(*s)) {
            return Err(RegistryError::UnknownProvider(unknown.clone()));
        }
        self.default_sources = sources;
        Ok(())
    }

    /// 按配置注册一组适配器
    ///
    /// 配置中出现但没有对应适配器的数据源名称会导致启动失败。
    pub fn from_settings(
        settings: &Settings,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Result<Self, RegistryError> {
        let known: BTreeSet<&str> = adapters.iter().map(|a| a.name()).collect();
        if let Some(unknown) = settings.providers.keys().find(|k| !known.contains(k.as_str())) {
            return Err(RegistryError::UnknownProvider(unknown.clone()));
        }

        let mut registry = Self::new();
        for adapter in adapters {
            let name = adapter.name().to_string();
            let overrides = settings.provider(&name);
            let mut spec = ProviderSpec::new(adapter, settings.provider_timeout(&name))
                .with_enabled(overrides.enabled)
                .with_required(overrides.required);
            if let Some(conf) = overrides.base_confidence {
                spec = spec.with_base_confidence(conf);
            }
            registry.register(spec)?;
        }
        registry.set_default_sources(settings.search.default_sources.clone())?;

        info!("Registered providers: {:?}", registry.names());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers.get(name)
    }

    /// 所有已注册的数据源名称（升序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 基线数据源集合
    pub fn baseline(&self) -> BTreeSet<String> {
        if !self.default_sources.is_empty() {
            return self.default_sources.iter().cloned().collect();
        }
        let required: BTreeSet<String> = self
            .providers
            .values()
            .filter(|s| s.enabled && s.required)
            .map(|s| s.name.clone())
            .collect();
        if !required.is_empty() {
            return required;
        }
        self.providers
            .values()
            .filter(|s| s.enabled)
            .map(|s| s.name.clone())
            .collect()
    }

    /// 解析查询要调用的数据源：未指定时使用基线集合
    pub fn resolve_sources(&self, requested: &BTreeSet<String>) -> BTreeSet<String> {
        if requested.is_empty() {
            self.baseline()
        } else {
            requested.clone()
        }
    }
}
