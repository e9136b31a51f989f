// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;

/// 安装 Prometheus 导出器，未配置监听地址时只记录不导出
pub fn init_metrics(settings: &MetricsSettings) {
    let Some(listen_addr) = settings.listen_addr.as_deref() else {
        info!("Metrics exporter disabled");
        return;
    };

    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    // 端口被占用时只告警，不影响主服务
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    info!("Metrics exporter listening on {}", addr);
}

/// 记录一次数据源调用
pub fn record_provider_call(provider: &str, success: bool, duration: Duration) {
    let status = if success { "ok" } else { "error" };
    counter!("osint_provider_requests_total", "provider" => provider.to_string(), "status" => status)
        .increment(1);
    histogram!("osint_provider_duration_seconds", "provider" => provider.to_string())
        .record(duration.as_secs_f64());
}

/// 记录一次缓存查找
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("osint_cache_lookups_total", "result" => result).increment(1);
}

/// 记录一次完成的聚合
pub fn record_aggregation(duration: Duration, failed_sources: usize) {
    counter!("osint_aggregations_total").increment(1);
    histogram!("osint_aggregation_duration_seconds").record(duration.as_secs_f64());
    if failed_sources > 0 {
        counter!("osint_provider_failures_total").increment(failed_sources as u64);
    }
}
