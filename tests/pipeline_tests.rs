//! Integration tests for the check pipeline
//!
//! These tests use wiremock to stand in for probe targets and callback
//! endpoints, and run the full check → store → notify → deliver cycle
//! against the in-memory storage backend.

use linkrot::config::{FetcherConfig, WebhookConfig};
use linkrot::crawler::{Coordinator, Fetcher, Scheduler};
use linkrot::hash::{group_key, url_key};
use linkrot::storage::{Frequency, MemoryStorage, Storage, UrlRecord};
use linkrot::webhook::WebhookDispatcher;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_coordinator(storage: Arc<MemoryStorage>) -> Arc<Coordinator<MemoryStorage>> {
    create_coordinator_with(storage, FetcherConfig::default())
}

fn create_coordinator_with(
    storage: Arc<MemoryStorage>,
    fetcher_config: FetcherConfig,
) -> Arc<Coordinator<MemoryStorage>> {
    let fetcher = Fetcher::new(&fetcher_config).expect("Failed to build fetcher");
    Arc::new(Coordinator::new(storage, fetcher, 5))
}

fn create_dispatcher(
    storage: Arc<MemoryStorage>,
    max_attempts: u32,
) -> Arc<WebhookDispatcher<MemoryStorage>> {
    let config = WebhookConfig {
        max_attempts,
        base_delay: 0,
        backoff_factor: 2,
        connect_timeout: 1,
        total_timeout: 2,
    };
    Arc::new(WebhookDispatcher::new(storage, &config).expect("Failed to build dispatcher"))
}

async fn receive_event(
    events: &mut tokio::sync::broadcast::Receiver<UrlRecord>,
) -> UrlRecord {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("No crawled event within 5s")
        .expect("Event channel closed")
}

#[tokio::test]
async fn test_check_stores_record_and_splits_charset() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/HTML; Charset=UTF-8")
                .insert_header("etag", "\"v1\"")
                .insert_header("last-modified", "Mon, 01 Jun 2026 08:00:00 GMT"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let mut events = coordinator.subscribe();

    let url = format!("{}/page", mock_server.uri());
    coordinator.check(&url, None, None).await.unwrap();

    let record = receive_event(&mut events).await;
    assert_eq!(record.checked_url, url);
    assert_eq!(record.final_url.as_deref(), Some(url.as_str()));
    assert_eq!(record.final_status_code, Some(200));
    assert!(record.redirect_url.is_none());
    assert!(record.redirect_status_code.is_none());
    assert!(record.updated.is_some());
    assert_eq!(
        record.headers.get("content-type").map(String::as_str),
        Some("text/html")
    );
    assert_eq!(
        record.headers.get("charset").map(String::as_str),
        Some("utf-8")
    );
    assert_eq!(record.headers.get("etag").map(String::as_str), Some("\"v1\""));

    // The event matches what storage holds
    let stored = storage.get_url(&url_key(&url)).await.unwrap().unwrap();
    assert_eq!(stored, record);

    // Exactly one record regardless of how the probe went
    assert_eq!(storage.get_all_urls().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_in_flight_flag_suppresses_probe() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let mut events = coordinator.subscribe();

    let url = format!("{}/guarded", mock_server.uri());

    // Another probe holds the flag: no HTTP traffic, no event
    assert!(storage.try_acquire_check_flag(&url).await.unwrap());
    coordinator.check(&url, None, None).await.unwrap();
    assert!(events.try_recv().is_err());

    // Flag released: the next submission probes normally
    storage.release_check_flag(&url).await.unwrap();
    coordinator.check(&url, None, None).await.unwrap();
    let record = receive_event(&mut events).await;
    assert_eq!(record.final_status_code, Some(200));
}

#[tokio::test]
async fn test_connection_error_stores_synthetic_503() {
    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let mut events = coordinator.subscribe();

    // Nothing listens on port 1
    let url = "http://127.0.0.1:1/unreachable";
    coordinator.check(url, None, None).await.unwrap();

    let record = receive_event(&mut events).await;
    assert_eq!(record.checked_url, url);
    assert_eq!(record.final_status_code, Some(503));
    assert_eq!(record.final_url.as_deref(), Some(url));
    assert!(record.headers.is_empty());
    assert!(record.redirect_url.is_none());
    assert!(record.updated.is_some());
}

#[tokio::test]
async fn test_head_fallback_to_get() {
    let mock_server = MockServer::start().await;
    // A server that mishandles HEAD
    Mock::given(method("HEAD"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let mut events = coordinator.subscribe();

    let url = format!("{}/doc", mock_server.uri());
    coordinator.check(&url, None, None).await.unwrap();

    let record = receive_event(&mut events).await;
    assert_eq!(record.final_status_code, Some(200));
    assert_eq!(
        record.headers.get("content-type").map(String::as_str),
        Some("application/pdf")
    );
}

#[tokio::test]
async fn test_get_only_domain_skips_head() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let fetcher_config = FetcherConfig {
        get_only_domains: vec!["127.0.0.1".to_string()],
        ..FetcherConfig::default()
    };
    let coordinator = create_coordinator_with(Arc::clone(&storage), fetcher_config);
    let mut events = coordinator.subscribe();

    let url = format!("{}/file", mock_server.uri());
    coordinator.check(&url, None, None).await.unwrap();

    let record = receive_event(&mut events).await;
    assert_eq!(record.final_status_code, Some(200));
}

#[tokio::test]
async fn test_redirect_first_hop_is_captured() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let mut events = coordinator.subscribe();

    let url = format!("{}/old", mock_server.uri());
    coordinator.check(&url, None, None).await.unwrap();

    let record = receive_event(&mut events).await;
    assert_eq!(record.redirect_url.as_deref(), Some(url.as_str()));
    assert_eq!(record.redirect_status_code, Some(301));
    assert_eq!(
        record.final_url.as_deref(),
        Some(format!("{}/new", mock_server.uri()).as_str())
    );
    assert_eq!(record.final_status_code, Some(200));
}

#[tokio::test]
async fn test_group_and_frequency_wiring() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));

    let url = format!("{}/a", mock_server.uri());
    // Submitted twice: associations must not duplicate
    for _ in 0..2 {
        coordinator
            .check(&url, Some("g1"), Some(Frequency::Hourly))
            .await
            .unwrap();
    }

    let group = storage
        .get_group(&group_key("g1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.name, "g1");
    assert_eq!(group.members.get(&url_key(&url)).unwrap(), &url);

    // The hourly list holds g1 exactly once
    assert_eq!(
        storage.get_frequency_urls(Frequency::Hourly).await.unwrap(),
        vec![url.clone()]
    );

    let record = storage.get_url(&url_key(&url)).await.unwrap().unwrap();
    assert_eq!(record.group.as_deref(), Some(group_key("g1").as_str()));
    assert_eq!(record.frequency, Some(Frequency::Hourly));
}

#[tokio::test]
async fn test_scheduler_resubmits_due_urls() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));

    for url_path in ["/a", "/b"] {
        let url = format!("{}{}", mock_server.uri(), url_path);
        coordinator
            .check(&url, Some("g1"), Some(Frequency::Hourly))
            .await
            .unwrap();
    }

    // The sweep re-checks both member URLs
    let scheduler = Scheduler::new(Arc::clone(&storage), Arc::clone(&coordinator));
    scheduler.run_due(Frequency::Hourly).await;

    // Daily sweep has nothing queued and probes nothing further
    scheduler.run_due(Frequency::Daily).await;
}

#[tokio::test]
async fn test_webhook_delivery_retries_then_succeeds() {
    let probe_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&probe_server)
        .await;

    let callback_server = MockServer::start().await;
    // Two failures, then acceptance
    Mock::given(method("POST"))
        .and(path("/cb"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .mount(&callback_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cb"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&callback_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let dispatcher = create_dispatcher(Arc::clone(&storage), 5);

    let url = format!("{}/watched", probe_server.uri());
    let callback_url = format!("{}/cb", callback_server.uri());
    coordinator.register_webhook(&url, &callback_url).await.unwrap();

    let mut events = coordinator.subscribe();
    coordinator.check(&url, None, None).await.unwrap();
    let record = receive_event(&mut events).await;

    dispatcher.dispatch(&record).await;

    let requests = callback_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    // The delivered payload is the crawled record, wrapped under "data"
    let body: serde_json::Value = serde_json::from_slice(&requests[2].body).unwrap();
    assert_eq!(body["data"], serde_json::to_value(&record).unwrap());
}

#[tokio::test]
async fn test_webhook_delivery_exhausts_after_max_attempts() {
    let callback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cb"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&callback_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let dispatcher = create_dispatcher(Arc::clone(&storage), 3);

    let url = "http://example.org/gone";
    let callback_url = format!("{}/cb", callback_server.uri());
    storage.store_webhook(url, &callback_url).await.unwrap();

    let record = UrlRecord {
        checked_url: url.to_string(),
        final_url: Some(url.to_string()),
        final_status_code: Some(503),
        ..Default::default()
    };

    // Exhaustion is logged and swallowed, never raised
    dispatcher.dispatch(&record).await;

    assert_eq!(callback_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_webhook_without_registration_is_noop() {
    let storage = Arc::new(MemoryStorage::default());
    let dispatcher = create_dispatcher(Arc::clone(&storage), 3);

    let record = UrlRecord {
        checked_url: "http://example.org/quiet".to_string(),
        ..Default::default()
    };
    dispatcher.dispatch(&record).await;
}

#[tokio::test]
async fn test_end_to_end_check_notifies_callback() {
    let probe_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"e2e\""))
        .mount(&probe_server)
        .await;

    let callback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&callback_server)
        .await;

    let storage = Arc::new(MemoryStorage::default());
    let coordinator = create_coordinator(Arc::clone(&storage));
    let dispatcher = create_dispatcher(Arc::clone(&storage), 3);

    // Wire the dispatcher to the coordinator's event stream, as serve does
    tokio::spawn(Arc::clone(&dispatcher).run(coordinator.subscribe()));

    let url = format!("{}/resource", probe_server.uri());
    let callback_url = format!("{}/hook", callback_server.uri());
    coordinator.register_webhook(&url, &callback_url).await.unwrap();
    coordinator.check(&url, None, None).await.unwrap();

    // Delivery happens asynchronously behind the event channel
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if !callback_server.received_requests().await.unwrap().is_empty() {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("Callback was never invoked");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let requests = callback_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["data"]["checked-url"], url);
    assert_eq!(body["data"]["etag"], "\"e2e\"");
    assert_eq!(body["data"]["final-status-code"], 200);
}
