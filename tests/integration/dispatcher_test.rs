// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use osint_aggregator::domain::models::aggregation::AggregationResult;
use osint_aggregator::domain::models::hit::RawHit;
use osint_aggregator::domain::models::query::Query;
use osint_aggregator::domain::search::errors::{AggregateError, ProviderError};
use osint_aggregator::domain::search::provider::SearchOptions;
use osint_aggregator::infrastructure::cache::cache_manager::CacheManager;
use osint_aggregator::infrastructure::cache::cache_strategy::{CacheError, CacheStats, CacheStrategy};
use osint_aggregator::infrastructure::services::rate_limiter::{RateLimitScope, RateLimiter};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::helpers::{dispatcher, dispatcher_with, hit, registry, sources, ScriptedAdapter};

const SECOND: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out_without_failing_others() {
    // Given: people 立即返回两条记录，email 需要 5 秒但只有 1 秒超时
    let people = ScriptedAdapter::new("people").with_hits(vec![
        hit("Jane Doe - LinkedIn", "https://linkedin.example/jane.doe", 80),
        hit("Jane Doe - GitHub", "https://github.example/jane.doe", 70),
    ]);
    let email = ScriptedAdapter::new("email")
        .with_hits(vec![hit("never", "https://mail.example/x", 99)])
        .with_delay(Duration::from_secs(5));
    let dispatcher = dispatcher(vec![people.into_spec(SECOND * 10), email.into_spec(SECOND)]);

    // When
    let result = dispatcher
        .aggregate("jane.doe", &sources(&["people", "email"]), SearchOptions::default())
        .await
        .unwrap();

    // Then
    assert_eq!(result.errors, vec!["email: timeout".to_string()]);
    assert!(result.has_data);
    assert_eq!(result.hits.len(), 2);
    assert!(result.hits.iter().all(|h| h.source == "people"));
    assert!(result.results["email"].hits.is_empty());
    assert_eq!(result.results["email"].error.as_deref(), Some("timeout"));
    assert!(result.results["people"].is_success());
    assert!(result.search_time >= SECOND);
    assert!(result.search_time < SECOND * 5);
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let people = ScriptedAdapter::new("people")
        .with_hits(vec![hit("Jane", "https://people.example/jane", 60)]);
    let calls = people.calls();
    let dispatcher = dispatcher(vec![people.into_spec(SECOND)]);

    let first = dispatcher
        .aggregate("Jane Doe", &sources(&["people"]), SearchOptions::default())
        .await
        .unwrap();
    // 大小写和空白不同但归一化后相同
    let second = dispatcher
        .aggregate("  jane   DOE ", &sources(&["people"]), SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.hits, first.hits);
    assert_eq!(second.results, first.results);
    assert_eq!(second.errors, first.errors);
    assert_eq!(second.timestamp, first.timestamp);
    assert_eq!(dispatcher.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_cached_result_respects_options_and_caller() {
    let web = ScriptedAdapter::new("web")
        .with_hits(vec![hit("Jane", "https://people.example/jane", 60)]);
    let calls = web.calls();
    let dispatcher = dispatcher(vec![web.into_spec(SECOND)]);
    let limited = SearchOptions {
        max_results: Some(1),
        ..Default::default()
    };

    let alice = Query::new("Jane Doe", ["web"]).with_user_context(serde_json::json!({"user_id": 1}));
    let first = dispatcher
        .dispatch(alice, limited.clone(), CancellationToken::new())
        .await
        .unwrap();
    let bob = Query::new("jane doe", ["web"]).with_user_context(serde_json::json!({"user_id": 2}));
    let second = dispatcher
        .dispatch(bob, limited, CancellationToken::new())
        .await
        .unwrap();

    // 相同选项命中缓存，但结果里是当前调用方的查询
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.hits, first.hits);
    assert_eq!(first.query.user_context(), Some(&serde_json::json!({"user_id": 1})));
    assert_eq!(second.query.user_context(), Some(&serde_json::json!({"user_id": 2})));
    assert_eq!(second.query.text(), "jane doe");

    // 不同选项不复用缓存
    dispatcher
        .aggregate("Jane Doe", &sources(&["web"]), SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_source_order_does_not_change_fingerprint() {
    let a = ScriptedAdapter::new("a").with_hits(vec![hit("A", "https://a.example/", 50)]);
    let b = ScriptedAdapter::new("b").with_hits(vec![hit("B", "https://b.example/", 40)]);
    let (a_calls, b_calls) = (a.calls(), b.calls());
    let dispatcher = dispatcher(vec![a.into_spec(SECOND), b.into_spec(SECOND)]);

    let first = dispatcher
        .aggregate("acme", &sources(&["b", "a"]), SearchOptions::default())
        .await
        .unwrap();
    let second = dispatcher
        .aggregate("acme", &sources(&["a", "b", "a"]), SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.hits, first.hits);
}

#[tokio::test]
async fn test_result_without_data_is_not_cached() {
    let manual_only = ScriptedAdapter::new("web").with_hits(vec![RawHit::manual_fallback(
        "Search manually",
        "https://search.example/?q=acme",
    )]);
    let calls = manual_only.calls();
    let dispatcher = dispatcher(vec![manual_only.into_spec(SECOND)]);

    for _ in 0..2 {
        let result = dispatcher
            .aggregate("acme", &sources(&["web"]), SearchOptions::default())
            .await
            .unwrap();
        assert!(!result.has_data);
        assert_eq!(result.hits.len(), 1);
        assert!(result.hits[0].manual);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_sources_use_required_baseline() {
    let core = ScriptedAdapter::new("core").with_hits(vec![hit("C", "https://c.example/", 10)]);
    let extra = ScriptedAdapter::new("extra").with_hits(vec![hit("E", "https://e.example/", 10)]);
    let extra_calls = extra.calls();
    let dispatcher = dispatcher(vec![
        core.into_spec(SECOND).with_required(true),
        extra.into_spec(SECOND),
    ]);

    let result = dispatcher
        .aggregate("acme", &[], SearchOptions::default())
        .await
        .unwrap();

    let expected: BTreeSet<String> = ["core".to_string()].into_iter().collect();
    assert_eq!(result.query.selected_sources(), &expected);
    assert_eq!(result.results.keys().collect::<Vec<_>>(), vec!["core"]);
    assert_eq!(extra_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_and_disabled_providers_are_reported() {
    let people = ScriptedAdapter::new("people").with_hits(vec![hit("P", "https://p.example/", 10)]);
    let off = ScriptedAdapter::new("off").with_hits(vec![hit("O", "https://o.example/", 10)]);
    let off_calls = off.calls();
    let dispatcher = dispatcher(vec![
        people.into_spec(SECOND),
        off.into_spec(SECOND).with_enabled(false),
    ]);

    let result = dispatcher
        .aggregate("acme", &sources(&["people", "nope", "off"]), SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(
        result.errors,
        vec![
            "nope: unknown provider".to_string(),
            "off: provider disabled".to_string(),
        ]
    );
    assert!(result.has_data);
    assert_eq!(result.results.len(), 3);
    assert_eq!(off_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_provider_is_isolated() {
    let good = ScriptedAdapter::new("good").with_hits(vec![hit("G", "https://g.example/", 10)]);
    let bad = ScriptedAdapter::new("bad").panicking();
    let dispatcher = dispatcher(vec![good.into_spec(SECOND), bad.into_spec(SECOND)]);

    let result = dispatcher
        .aggregate("acme", &sources(&["good", "bad"]), SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.errors, vec!["bad: panicked: adapter exploded".to_string()]);
    assert_eq!(result.hits.len(), 1);
    assert!(result.has_data);
}

#[tokio::test]
async fn test_provider_error_keeps_partial_hits() {
    let flaky = ScriptedAdapter::new("flaky")
        .with_hits(vec![hit("F", "https://f.example/", 30)])
        .failing(ProviderError::Transport("HTTP 502".into()));
    let dispatcher = dispatcher(vec![flaky.into_spec(SECOND)]);

    let result = dispatcher
        .aggregate("acme", &sources(&["flaky"]), SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.errors, vec!["flaky: transport error: HTTP 502".to_string()]);
    assert_eq!(result.hits.len(), 1);
    assert!(!result.results["flaky"].is_success());
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let dispatcher = dispatcher(vec![ScriptedAdapter::new("a").into_spec(SECOND)]);
    for text in ["", "   \t"] {
        let err = dispatcher
            .aggregate(text, &sources(&["a"]), SearchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::EmptyQuery);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_in_flight_aggregation() {
    let slow = ScriptedAdapter::new("slow")
        .with_hits(vec![hit("S", "https://s.example/", 10)])
        .with_delay(Duration::from_secs(10));
    let dispatcher = dispatcher(vec![slow.into_spec(SECOND * 30)]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = dispatcher
        .aggregate_with_cancel("acme", &sources(&["slow"]), SearchOptions::default(), cancel)
        .await
        .unwrap_err();

    assert_eq!(err, AggregateError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(dispatcher.cache().stats().stores, 0);
}

#[tokio::test]
async fn test_already_cancelled_token_short_circuits() {
    let a = ScriptedAdapter::new("a");
    let calls = a.calls();
    let dispatcher = dispatcher(vec![a.into_spec(SECOND)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = dispatcher
        .aggregate_with_cancel("acme", &sources(&["a"]), SearchOptions::default(), cancel)
        .await
        .unwrap_err();

    assert_eq!(err, AggregateError::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hits_are_ranked_deterministically() {
    let a = ScriptedAdapter::new("a").with_hits(vec![
        hit("low", "https://a.example/low", 20),
        hit("top", "https://a.example/top", 90),
        RawHit::new("shared", "https://shared.example/"),
    ]);
    let b = ScriptedAdapter::new("b").with_hits(vec![
        hit("mid", "https://b.example/mid", 50),
        RawHit::new("shared", "https://shared.example/"),
    ]);
    let dispatcher = dispatcher(vec![a.into_spec(SECOND), b.into_spec(SECOND)]);

    let result = dispatcher
        .aggregate("acme", &sources(&["a", "b"]), SearchOptions::default())
        .await
        .unwrap();

    let titles: Vec<&str> = result.hits.iter().map(|h| h.title.as_str()).collect();
    // shared 没有给出相关度，取默认置信度 0.5 对应的 50 分；同分时风险等级和置信度相同，按域名升序
    assert_eq!(titles, vec!["top", "mid", "shared", "low"]);
    let shared: Vec<_> = result.hits.iter().filter(|h| h.title == "shared").collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].source, "a");

    dispatcher.cache().clear().await.unwrap();
    let again = dispatcher
        .aggregate("acme", &sources(&["b", "a"]), SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(again.hits, result.hits);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_wait_counts_toward_timeout() {
    // 每秒一个令牌，桶容量 1；第二次查询需要等 1 秒，但超时只有 500 毫秒
    let a = ScriptedAdapter::new("a").with_hits(vec![hit("A", "https://a.example/", 10)]);
    let dispatcher = dispatcher_with(
        registry(vec![a.into_spec(Duration::from_millis(500))]),
        Arc::new(CacheManager::new(Duration::from_secs(60), 10)),
        RateLimiter::new(1.0, RateLimitScope::PerProvider),
    );

    let first = dispatcher
        .aggregate("one", &sources(&["a"]), SearchOptions::default())
        .await
        .unwrap();
    let second = dispatcher
        .aggregate("two", &sources(&["a"]), SearchOptions::default())
        .await
        .unwrap();

    assert!(first.errors.is_empty());
    assert_eq!(second.errors, vec!["a: timeout".to_string()]);
    assert!(!second.has_data);
}

struct BrokenCache;

#[async_trait]
impl CacheStrategy for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<AggregationResult>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &AggregationResult, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn get_stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[tokio::test]
async fn test_cache_failure_degrades_to_miss() {
    let a = ScriptedAdapter::new("a").with_hits(vec![hit("A", "https://a.example/", 10)]);
    let calls = a.calls();
    let dispatcher = dispatcher_with(
        registry(vec![a.into_spec(SECOND)]),
        Arc::new(CacheManager::with_strategy(Arc::new(BrokenCache), SECOND * 60)),
        RateLimiter::unlimited(),
    );

    for _ in 0..2 {
        let result = dispatcher
            .aggregate("acme", &sources(&["a"]), SearchOptions::default())
            .await
            .unwrap();
        assert!(result.has_data);
        assert!(result.errors.is_empty());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
