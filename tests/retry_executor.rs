//! Retry, backoff and timeout behavior against a live mock backend.

use std::time::{Duration, Instant};

use workshop_client::http::{Endpoint, ErrorCode, RequestError, X_REQUEST_ID};

mod common;

#[tokio::test]
async fn test_persistent_503_exhausts_retries_with_exponential_delays() {
    let backend = common::start_mock_backend(503, r#"{"error":"maintenance"}"#).await;
    let (executor, sleeper) =
        common::test_executor(common::retries(3, 1000, 2.0, 10000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/api/orders")).unwrap();
    let err = executor.execute(&endpoint).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.code(), ErrorCode::Http(503));
    assert_eq!(err.code().to_string(), "HTTP_503");
    assert_eq!(backend.hits(), 4);
    assert_eq!(sleeper.delays(), common::millis(&[1000, 2000, 4000]));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let backend = common::start_mock_backend(404, r#"{"error":"no such order"}"#).await;
    let (executor, sleeper) =
        common::test_executor(common::retries(3, 1000, 2.0, 10000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/api/orders/999")).unwrap();
    let err = executor.execute(&endpoint).await.unwrap_err();

    match &err {
        RequestError::Http { status, body } => {
            assert_eq!(*status, 404);
            assert!(body.contains("no such order"));
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    assert_eq!(backend.hits(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let backend = common::start_programmable_backend(|hit, _| async move {
        if hit < 2 {
            (503, "Service Unavailable".into())
        } else {
            (200, r#"{"id":7,"status":"ready"}"#.into())
        }
    })
    .await;
    let (executor, sleeper) =
        common::test_executor(common::retries(3, 100, 2.0, 10000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/api/orders/7")).unwrap();
    let order: serde_json::Value = executor.execute_json(&endpoint).await.unwrap();

    assert_eq!(order["status"], "ready");
    assert_eq!(backend.hits(), 3);
    assert_eq!(sleeper.delays(), common::millis(&[100, 200]));
}

#[tokio::test]
async fn test_delays_capped_at_max() {
    let backend = common::start_mock_backend(500, "boom").await;
    let (executor, sleeper) =
        common::test_executor(common::retries(5, 1000, 3.0, 5000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/")).unwrap();
    assert!(executor.execute(&endpoint).await.is_err());

    assert_eq!(backend.hits(), 6);
    assert_eq!(
        sleeper.delays(),
        common::millis(&[1000, 3000, 5000, 5000, 5000])
    );
}

#[tokio::test]
async fn test_slow_backend_times_out_each_attempt() {
    let backend = common::start_programmable_backend(|_, _| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        (200, "{}".into())
    })
    .await;
    let (executor, sleeper) =
        common::test_executor(common::retries(1, 10, 2.0, 1000), common::timeouts(100));

    let started = Instant::now();
    let endpoint = Endpoint::get(&backend.url("/api/slow")).unwrap();
    let err = executor.execute(&endpoint).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(err.code().to_string(), "TIMEOUT");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(sleeper.delays(), common::millis(&[10]));
}

#[tokio::test]
async fn test_endpoint_timeout_overrides_default() {
    let backend = common::start_programmable_backend(|_, _| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        (200, "{}".into())
    })
    .await;
    let (executor, _) =
        common::test_executor(common::retries(0, 10, 2.0, 1000), common::timeouts(100));

    let endpoint = Endpoint::get(&backend.url("/api/slow"))
        .unwrap()
        .timeout(Duration::from_secs(5));
    let response = executor.execute(&endpoint).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_request_id_shared_across_attempts() {
    let backend = common::start_mock_backend(502, "bad gateway").await;
    let (executor, _) =
        common::test_executor(common::retries(2, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/api/inventory")).unwrap();
    let _ = executor.execute(&endpoint).await;
    let _ = executor.execute(&endpoint).await;

    let ids: Vec<String> = backend
        .requests()
        .iter()
        .map(|r| r.header(X_REQUEST_ID).unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 6);
    assert!(ids[..3].iter().all(|id| id == &ids[0]));
    assert!(ids[3..].iter().all(|id| id == &ids[3]));
    assert_ne!(ids[0], ids[3]);
}

#[tokio::test]
async fn test_body_and_headers_forwarded_on_every_attempt() {
    let backend = common::start_programmable_backend(|hit, _| async move {
        if hit == 0 {
            (503, "".into())
        } else {
            (200, r#"{"ok":true}"#.into())
        }
    })
    .await;
    let (executor, _) =
        common::test_executor(common::retries(1, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::post(&backend.url("/api/appointments"))
        .unwrap()
        .header("x-shop-id", "12")
        .unwrap()
        .json(&serde_json::json!({ "slot": "09:00" }))
        .unwrap();
    executor.execute(&endpoint).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/appointments");
        assert_eq!(request.header("x-shop-id"), Some("12"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, r#"{"slot":"09:00"}"#);
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let addr = common::unused_addr().await;
    let (executor, sleeper) =
        common::test_executor(common::retries(2, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::get(&format!("http://{}/api/orders", addr)).unwrap();
    let err = executor.execute(&endpoint).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert_eq!(sleeper.delays(), common::millis(&[10, 20]));
}

#[tokio::test]
async fn test_endpoint_retry_override_and_reload() {
    let backend = common::start_mock_backend(503, "").await;
    let (executor, _) =
        common::test_executor(common::retries(3, 10, 2.0, 1000), common::timeouts(5000));

    let once = Endpoint::get(&backend.url("/"))
        .unwrap()
        .retry(common::retries(0, 10, 2.0, 1000));
    let _ = executor.execute(&once).await;
    assert_eq!(backend.hits(), 1);

    executor.reload(common::retries(1, 10, 2.0, 1000), common::timeouts(5000));
    let endpoint = Endpoint::get(&backend.url("/")).unwrap();
    let _ = executor.execute(&endpoint).await;
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_invalid_json_is_invalid_response() {
    let backend = common::start_mock_backend(200, "not json").await;
    let (executor, _) =
        common::test_executor(common::retries(3, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/")).unwrap();
    let err = executor
        .execute_json::<serde_json::Value>(&endpoint)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidResponse);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_stalled_body_times_out_and_is_retried() {
    let backend = common::start_faulty_body_backend(common::BodyFault::Stall, u32::MAX, "{}").await;
    let (executor, sleeper) =
        common::test_executor(common::retries(2, 10, 2.0, 1000), common::timeouts(200));

    let endpoint = Endpoint::get(&backend.url("/api/orders")).unwrap();
    let err = tokio::time::timeout(
        Duration::from_secs(3),
        executor.execute_json::<serde_json::Value>(&endpoint),
    )
    .await
    .expect("body read must be bounded by the attempt deadline")
    .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(backend.hits(), 3);
    assert_eq!(sleeper.delays(), common::millis(&[10, 20]));
}

#[tokio::test]
async fn test_recovers_after_stalled_body() {
    let backend =
        common::start_faulty_body_backend(common::BodyFault::Stall, 1, r#"{"status":"ready"}"#).await;
    let (executor, sleeper) =
        common::test_executor(common::retries(2, 10, 2.0, 1000), common::timeouts(200));

    let endpoint = Endpoint::get(&backend.url("/api/orders/7")).unwrap();
    let order: serde_json::Value = executor.execute_json(&endpoint).await.unwrap();

    assert_eq!(order["status"], "ready");
    assert_eq!(backend.hits(), 2);
    assert_eq!(sleeper.delays(), common::millis(&[10]));
}

#[tokio::test]
async fn test_cut_off_body_is_retried_as_network_error() {
    let backend = common::start_faulty_body_backend(common::BodyFault::Cut, 1, "hello").await;
    let (executor, sleeper) =
        common::test_executor(common::retries(1, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/")).unwrap();
    let (status, body) = executor.execute_text(&endpoint).await.unwrap();
    assert_eq!(status.as_u16(), 200);
    assert_eq!(body, "hello");
    assert_eq!(backend.hits(), 2);
    assert_eq!(sleeper.delays(), common::millis(&[10]));

    let always_cut = common::start_faulty_body_backend(common::BodyFault::Cut, u32::MAX, "").await;
    let once = Endpoint::get(&always_cut.url("/"))
        .unwrap()
        .retry(common::retries(0, 10, 2.0, 1000));
    let err = executor.execute_text(&once).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetworkError);
}

#[tokio::test]
async fn test_invalid_retry_override_rejected_before_sending() {
    let backend = common::start_mock_backend(200, "{}").await;
    let (executor, _) =
        common::test_executor(common::retries(3, 10, 2.0, 1000), common::timeouts(5000));

    let endpoint = Endpoint::get(&backend.url("/"))
        .unwrap()
        .retry(common::retries(2, 0, f64::NAN, 1000));
    let err = executor.execute(&endpoint).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(err.to_string().contains("retries.base_delay_ms"));
    assert!(err.to_string().contains("retries.backoff_factor"));
    assert_eq!(backend.hits(), 0);
}
