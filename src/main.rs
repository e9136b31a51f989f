// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use osint_aggregator::config::settings::Settings;
use osint_aggregator::domain::services::normalizer::Normalizer;
use osint_aggregator::infrastructure::auth::InMemoryTokenStore;
use osint_aggregator::infrastructure::cache::cache_manager::CacheManager;
use osint_aggregator::infrastructure::metrics::init_metrics;
use osint_aggregator::infrastructure::search::{
    builtin_adapters, BatchRunner, Dispatcher, ProviderRegistry,
};
use osint_aggregator::infrastructure::services::rate_limiter::RateLimiter;
use osint_aggregator::presentation::middleware::auth_middleware::AuthState;
use osint_aggregator::presentation::routes::{self, AppState};
use osint_aggregator::utils::telemetry;
use osint_aggregator::workers::CachePurgeWorker;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting osint-aggregator...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    init_metrics(&settings.metrics);

    // 3. Providers, cache and rate limiter
    let registry = Arc::new(ProviderRegistry::from_settings(
        &settings,
        builtin_adapters(&settings),
    )?);
    let cache = Arc::new(CacheManager::new(
        settings.cache_ttl(),
        settings.cache.max_size,
    ));
    let rate_limiter = Arc::new(RateLimiter::from_settings(&settings.rate_limiting));
    let normalizer = Normalizer::new(settings.search.max_results);

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        cache.clone(),
        rate_limiter,
        normalizer,
    ));
    let batch = Arc::new(BatchRunner::new(
        dispatcher.clone(),
        settings.search.max_workers,
    ));

    // 4. Start workers
    let shutdown = CancellationToken::new();
    let purge_interval = settings.cache_ttl().min(MAX_PURGE_INTERVAL);
    let purge_handle = CachePurgeWorker::new(cache, purge_interval).start(shutdown.child_token());

    // 5. Auth
    let tokens = InMemoryTokenStore::new(&settings.api.tokens);
    if tokens.is_empty() {
        warn!("No API tokens configured; every protected request will be rejected");
    }
    let auth_state = AuthState {
        tokens: Arc::new(tokens),
    };

    // 6. Start HTTP server
    let app = routes::routes(
        AppState {
            dispatcher,
            batch,
            shutdown: shutdown.clone(),
        },
        auth_state,
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = purge_handle.await {
        warn!("Cache purge worker ended abnormally: {}", e);
    }
    info!("Server stopped");
    Ok(())
}
