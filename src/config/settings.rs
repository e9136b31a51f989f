// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use config::builder::DefaultState;
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含服务器、聚合搜索、结果缓存、限流、数据源开关和API令牌等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 聚合搜索配置
    pub search: SearchSettings,
    /// 结果缓存配置
    pub cache: CacheSettings,
    /// 速率限制配置
    pub rate_limiting: RateLimitingSettings,
    /// 每个数据源的配置，键为数据源名称
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    /// API访问令牌配置
    #[serde(default)]
    pub api: ApiSettings,
    /// 指标导出配置
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 聚合搜索配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// 批量模式下同时进行的查询数上限
    pub max_workers: usize,
    /// 合并后结果列表的最大条数
    pub max_results: usize,
    /// 未单独配置时每个数据源的超时时间（毫秒）
    pub default_timeout_ms: u64,
    /// 未指定数据源时使用的基线数据源
    #[serde(default)]
    pub default_sources: Vec<String>,
}

/// 结果缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// 缓存条目存活时间（秒）
    pub ttl_seconds: u64,
    /// 最大缓存条目数
    pub max_size: usize,
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingSettings {
    /// 是否启用出站限流
    pub enabled: bool,
    /// 每秒允许的出站请求数，同时也是令牌桶容量
    pub requests_per_second: f64,
    /// true 时每个数据源拥有独立的令牌桶，否则全部共享一个
    pub per_provider: bool,
}

/// 单个数据源配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 超时时间（毫秒），缺省时使用 `search.default_timeout_ms`
    pub timeout_ms: Option<u64>,
    /// 是否属于基线数据源
    #[serde(default)]
    pub required: bool,
    /// 覆盖适配器声明的基础置信度
    pub base_confidence: Option<f64>,
    /// 适配器访问外部接口所需的 API key，键为接口名称
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: None,
            required: false,
            base_confidence: None,
            api_keys: HashMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// API访问令牌配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSettings {
    /// 用户ID到访问令牌的映射
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// 指标导出配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Prometheus 导出地址，未设置时不启动导出器
    pub listen_addr: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `OSINT__` 前缀的环境变量，并在返回前做合法性校验
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败或校验不通过
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("OSINT").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 从 TOML 文本加载配置（叠加在内置默认值之上）
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("search.max_workers", 10)?
            .set_default("search.max_results", 25)?
            .set_default("search.default_timeout_ms", 20_000)?
            .set_default("cache.ttl_seconds", 3600)?
            .set_default("cache.max_size", 1000)?
            .set_default("rate_limiting.enabled", true)?
            .set_default("rate_limiting.requests_per_second", 5.0)?
            .set_default("rate_limiting.per_provider", true)
    }

    /// 校验配置，非法配置只允许在启动阶段失败
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_workers == 0 {
            return Err(ConfigError::Message(
                "search.max_workers must be greater than zero".into(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::Message(
                "search.max_results must be greater than zero".into(),
            ));
        }
        if self.search.default_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "search.default_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.cache.max_size == 0 {
            return Err(ConfigError::Message(
                "cache.max_size must be greater than zero".into(),
            ));
        }
        let rps = self.rate_limiting.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError::Message(format!(
                "rate_limiting.requests_per_second must be a positive number, got {}",
                rps
            )));
        }
        for (name, provider) in &self.providers {
            if provider.timeout_ms == Some(0) {
                return Err(ConfigError::Message(format!(
                    "providers.{}.timeout_ms must be greater than zero",
                    name
                )));
            }
            if let Some(conf) = provider.base_confidence {
                if !(0.0..=1.0).contains(&conf) {
                    return Err(ConfigError::Message(format!(
                        "providers.{}.base_confidence must be within [0, 1]",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// 缓存条目存活时间
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    /// 获取数据源配置，未配置的数据源使用默认值
    pub fn provider(&self, name: &str) -> ProviderSettings {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// 数据源配置的 API key，空字符串视为未配置
    pub fn api_key(&self, provider: &str, service: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_keys.get(service))
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
    }

    /// 数据源的有效超时时间
    pub fn provider_timeout(&self, name: &str) -> Duration {
        let ms = self
            .providers
            .get(name)
            .and_then(|p| p.timeout_ms)
            .unwrap_or(self.search.default_timeout_ms);
        Duration::from_millis(ms)
    }
}
