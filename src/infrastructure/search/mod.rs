// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 搜索聚合模块
///
/// 提供各外部数据源的适配器实现、数据源注册表、
/// 单次查询分发器以及批量查询执行器
pub mod archive;
pub mod batch;
pub mod breach;
pub mod dispatcher;
pub mod dorks;
pub mod duckduckgo;
pub mod email;
pub mod people;
pub mod registry;
pub mod social;

use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::Settings;
use crate::domain::search::provider::ProviderAdapter;

pub use batch::{BatchQuery, BatchReport, BatchRunner};
pub use dispatcher::Dispatcher;
pub use registry::{ProviderRegistry, RegistryError};

const USER_AGENT: &str = concat!("osint-aggregator/", env!("CARGO_PKG_VERSION"));

/// 适配器共用的 HTTP 客户端配置
///
/// 整体超时由分发器控制，这里只限制建立连接的时间。
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// 内置的全部数据源适配器，需要 API key 的适配器从配置中读取
pub fn builtin_adapters(settings: &Settings) -> Vec<Arc<dyn ProviderAdapter>> {
    vec![
        Arc::new(duckduckgo::DuckDuckGoProvider::new()),
        Arc::new(breach::BreachProvider::new()),
        Arc::new(email::EmailProvider::new().with_api_keys(
            settings.api_key("email", "hibp"),
            settings.api_key("email", "skymem"),
        )),
        Arc::new(people::PeopleProvider::new()),
        Arc::new(archive::ArchiveProvider::new()),
        Arc::new(social::SocialProvider::new()),
        Arc::new(dorks::DorkProvider::new()),
    ]
}
