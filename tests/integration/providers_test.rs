// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use osint_aggregator::domain::models::hit::EntityType;
use osint_aggregator::domain::models::query::Query;
use osint_aggregator::domain::search::errors::ProviderError;
use osint_aggregator::domain::search::provider::{ProviderAdapter, ProviderSpec, SearchOptions};
use osint_aggregator::infrastructure::search::archive::ArchiveProvider;
use osint_aggregator::infrastructure::search::breach::BreachProvider;
use osint_aggregator::infrastructure::search::duckduckgo::DuckDuckGoProvider;
use osint_aggregator::infrastructure::search::email::EmailProvider;
use osint_aggregator::infrastructure::search::people::PeopleProvider;
use osint_aggregator::infrastructure::search::social::{Platform, SocialProvider};
use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{dispatcher, sources};

fn query(text: &str) -> Query {
    Query::new(text, Vec::<String>::new())
}

#[tokio::test]
async fn test_web_provider_parses_instant_answer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "acme"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Heading": "Acme",
            "AbstractText": "Acme Corporation",
            "AbstractURL": "https://en.wikipedia.org/wiki/Acme",
            "RelatedTopics": [
                {"FirstURL": "https://duckduckgo.com/Acme_Tools", "Text": "Acme Tools - hardware"}
            ]
        })))
        .mount(&server)
        .await;

    let provider = DuckDuckGoProvider::with_base_url(server.uri());
    let reply = provider.search(&query("acme"), &SearchOptions::default()).await;

    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 2);
    assert_eq!(
        reply.hits[0].url.as_deref(),
        Some("https://en.wikipedia.org/wiki/Acme")
    );
    assert_eq!(reply.hits[1].title.as_deref(), Some("Acme Tools"));
}

#[tokio::test]
async fn test_web_provider_failure_keeps_manual_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = DuckDuckGoProvider::with_base_url(server.uri());
    let reply = provider.search(&query("acme"), &SearchOptions::default()).await;

    assert!(matches!(reply.error, Some(ProviderError::Transport(_))));
    assert_eq!(reply.hits.len(), 1);
    assert!(reply.hits[0].manual);
}

#[tokio::test]
async fn test_web_provider_through_dispatcher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RelatedTopics": [
                {"FirstURL": "https://duckduckgo.com/Jane_Doe", "Text": "Jane Doe - placeholder name"}
            ]
        })))
        .mount(&server)
        .await;

    let spec = ProviderSpec::new(
        Arc::new(DuckDuckGoProvider::with_base_url(server.uri())),
        Duration::from_secs(5),
    );
    let dispatcher = dispatcher(vec![spec]);
    let result = dispatcher
        .aggregate("jane doe", &sources(&["web"]), SearchOptions::default())
        .await
        .unwrap();

    assert!(result.has_data);
    assert_eq!(result.hits.len(), 1);
    let hit = &result.hits[0];
    assert_eq!(hit.source, "web");
    assert_eq!(hit.confidence, 0.6);
    assert_eq!(hit.relevance_score, 60);
}

#[tokio::test]
async fn test_breach_provider_combines_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/search/janedoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "Xy12", "text": "janedoe:hunter2", "time": "ignored"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .and(query_param("query", "janedoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let provider = BreachProvider::with_base_urls(server.uri(), server.uri());
    let reply = provider.search(&query("janedoe"), &SearchOptions::default()).await;

    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 2);
    assert_eq!(reply.hits[0].url.as_deref(), Some("https://pastebin.com/Xy12"));
    assert_eq!(reply.hits[0].entity_type, Some(EntityType::Paste));
    assert!(reply.hits[1].manual);
}

#[tokio::test]
async fn test_breach_provider_reports_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/search/janedoe"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Acme leak", "link": "https://leaks.example/acme", "summary": "2023 dump"}
        ])))
        .mount(&server)
        .await;

    let provider = BreachProvider::with_base_urls(server.uri(), server.uri());
    let reply = provider.search(&query("janedoe"), &SearchOptions::default()).await;

    match reply.error {
        Some(ProviderError::Transport(message)) => assert!(message.starts_with("psbdmp:")),
        other => panic!("unexpected error: {:?}", other),
    }
    let urls: Vec<&str> = reply.hits.iter().filter_map(|h| h.url.as_deref()).collect();
    assert!(urls.contains(&"https://leaks.example/acme"));
    assert!(reply.hits.iter().any(|h| h.manual));
}

#[tokio::test]
async fn test_archive_provider_returns_snapshot_and_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wayback/available"))
        .and(query_param("url", "example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "archived_snapshots": {
                "closest": {
                    "available": true,
                    "url": "http://web.archive.org/web/20240101000000/https://example.com/",
                    "timestamp": "20240101000000",
                    "status": "200"
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .and(query_param("output", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"docs": [
                {"identifier": "example-com-crawl", "title": ["Example crawl"], "date": "2020-05-01"},
                {"identifier": "example-misc"}
            ]}
        })))
        .mount(&server)
        .await;

    let provider = ArchiveProvider::with_base_url(server.uri());
    let reply = provider.search(&query("example.com"), &SearchOptions::default()).await;

    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 3);
    assert!(reply.hits[0].timestamp.is_some());
    assert_eq!(
        reply.hits[1].url.as_deref(),
        Some("https://archive.org/details/example-com-crawl")
    );
    assert_eq!(reply.hits[1].title.as_deref(), Some("Example crawl"));
    assert_eq!(reply.hits[2].title.as_deref(), Some("example-misc"));
}

#[tokio::test]
async fn test_social_provider_probes_platforms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gh/janedoe"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken/janedoe"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    // gitlab 没有挂载，wiremock 默认返回 404

    let uri = server.uri();
    let provider = SocialProvider::with_platforms(vec![
        Platform::new("github", format!("{}/gh/{{}}", uri)),
        Platform::new("gitlab", format!("{}/gl/{{}}", uri)),
        Platform::new("broken", format!("{}/broken/{{}}", uri)),
    ]);
    let reply = provider.search(&query("janedoe"), &SearchOptions::default()).await;

    assert_eq!(reply.hits.len(), 1);
    assert_eq!(reply.hits[0].url.as_deref(), Some(format!("{}/gh/janedoe", uri).as_str()));
    assert_eq!(
        reply.error,
        Some(ProviderError::Transport("1 of 3 platform probes failed".into()))
    );
}

#[tokio::test]
async fn test_social_provider_skips_non_usernames() {
    let provider = SocialProvider::with_platforms(vec![Platform::new(
        "github",
        "http://127.0.0.1:9/{}",
    )]);
    let reply = provider
        .search(&query("Jane Doe lives here"), &SearchOptions::default())
        .await;

    assert!(reply.hits.is_empty());
    assert!(reply.error.is_none());
}

#[tokio::test]
async fn test_email_provider_reports_breaches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v3/breachedaccount/jane\.doe(@|%40)example\.com$"))
        .and(header("hibp-api-key", "hibp-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Name": "Adobe",
                "Title": "Adobe",
                "Domain": "adobe.com",
                "BreachDate": "2013-10-04",
                "DataClasses": ["Email addresses", "Passwords"],
                "IsVerified": true
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/email"))
        .and(query_param("email", "jane.doe@example.com"))
        .and(header("X-API-Key", "skymem-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let provider = EmailProvider::with_base_urls(server.uri(), server.uri())
        .with_api_keys(Some("hibp-key".into()), Some("skymem-key".into()));
    let reply = provider
        .search(&query("jane.doe@example.com"), &SearchOptions::default())
        .await;

    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 2);
    assert_eq!(reply.hits[0].title.as_deref(), Some("Adobe breach"));
    assert_eq!(reply.hits[0].entity_type, Some(EntityType::Leak));
    assert!(!reply.hits[0].manual);
    assert!(reply.hits[1].manual);
}

#[tokio::test]
async fn test_email_provider_failure_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v3/breachedaccount/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = EmailProvider::with_base_urls(server.uri(), server.uri())
        .with_api_keys(Some("bad-key".into()), None);
    let reply = provider
        .search(&query("jane.doe@example.com"), &SearchOptions::default())
        .await;

    match reply.error {
        Some(ProviderError::Transport(message)) => assert!(message.starts_with("hibp:")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(reply.hits.len(), 2);
    assert!(reply.hits.iter().all(|h| h.manual));
}

#[tokio::test]
async fn test_email_provider_without_keys_links_manual_lookups() {
    let provider = EmailProvider::with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");

    let reply = provider
        .search(&query("jane.doe@example.com"), &SearchOptions::default())
        .await;
    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 2);
    assert!(reply.hits.iter().all(|h| h.manual));
    assert_eq!(
        reply.hits[0].url.as_deref(),
        Some("https://haveibeenpwned.com/account/jane.doe%40example.com")
    );

    let reply = provider.search(&query("Jane Doe"), &SearchOptions::default()).await;
    assert!(reply.hits.is_empty());
    assert!(reply.error.is_none());
}

#[tokio::test]
async fn test_people_provider_returns_profiles_and_directories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "jane doe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search": [
                {"id": "Q1", "label": "Jane Doe", "description": "placeholder name",
                 "concepturi": "http://www.wikidata.org/entity/Q1"},
                {"id": "Q2", "label": "Jane Doe (film)"}
            ]
        })))
        .mount(&server)
        .await;

    let provider = PeopleProvider::with_base_url(server.uri());
    let reply = provider
        .search(&query("jane.doe@example.com"), &SearchOptions::default())
        .await;

    assert!(reply.error.is_none());
    assert_eq!(reply.hits.len(), 5);
    assert_eq!(reply.hits[0].title.as_deref(), Some("Jane Doe"));
    assert_eq!(reply.hits[0].snippet.as_deref(), Some("placeholder name"));
    assert_eq!(
        reply.hits[1].url.as_deref(),
        Some("https://www.wikidata.org/wiki/Q2")
    );
    assert!(reply.hits[2..].iter().all(|h| h.manual));
}

#[tokio::test]
async fn test_people_provider_failure_keeps_directory_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = PeopleProvider::with_base_url(server.uri());
    let reply = provider.search(&query("Jane Doe"), &SearchOptions::default()).await;

    assert!(matches!(reply.error, Some(ProviderError::Transport(_))));
    assert_eq!(reply.hits.len(), 3);
    assert!(reply.hits.iter().all(|h| h.manual));
}

#[tokio::test]
async fn test_people_and_slow_email_through_dispatcher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search": [
                {"id": "Q1", "label": "Jane Doe"},
                {"id": "Q2", "label": "Jane Doe (film)"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v3/breachedaccount/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let people = ProviderSpec::new(
        Arc::new(PeopleProvider::with_base_url(server.uri())),
        Duration::from_secs(5),
    );
    let email = ProviderSpec::new(
        Arc::new(
            EmailProvider::with_base_urls(server.uri(), server.uri())
                .with_api_keys(Some("k".into()), None),
        ),
        Duration::from_millis(200),
    );
    let dispatcher = dispatcher(vec![people, email]);

    let result = dispatcher
        .aggregate(
            "jane.doe@example.com",
            &sources(&["people", "email"]),
            SearchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.errors, vec!["email: timeout".to_string()]);
    assert!(result.has_data);
    assert_eq!(result.hits[0].title, "Jane Doe");
    assert_eq!(result.hits[1].title, "Jane Doe (film)");
    assert!(result.hits.iter().all(|h| h.source == "people"));
}
