//! Service regression tests.
//!
//! Drives the assembled service through its router: accept events, drain,
//! read back merged state, and reject intake once shutdown has begun.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use skuflow_core::ServiceConfig;
use skuflowd::{Service, serve};

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.http_addr = "127.0.0.1:0".to_string();
    config.shutdown_timeout_secs = 5;
    config.queue.ready_capacity = 16;
    config.workers.min = 2;
    config.workers.max = 4;
    config.workers.scale_interval_ms = 20;
    config
}

fn post_event(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn partial_updates_merge_after_drain() {
    let service = Service::new(test_config());
    service.start();
    let router = service.router();

    let resp = send(&router, post_event(r#"{"product_id":"a1","price":10.5}"#)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let resp = send(&router, post_event(r#"{"product_id":"a1","stock":7}"#)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(resp).await["sequence"], 2);

    assert!(service.drain().await);

    let resp = send(&router, get("/products/a1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"product_id": "a1", "price": 10.5, "stock": 7})
    );
    service.stop();
}

#[tokio::test]
async fn last_accepted_update_wins() {
    let service = Service::new(test_config());
    service.start();
    let router = service.router();

    for price in 1..=50 {
        let body = format!(r#"{{"product_id":"hot","price":{price}}}"#);
        let resp = send(&router, post_event(&body)).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }
    assert!(service.drain().await);

    let product = body_json(send(&router, get("/products/hot")).await).await;
    assert_eq!(product["price"], 50.0);
    service.stop();
}

#[tokio::test]
async fn shutdown_rejects_new_events_but_serves_reads() {
    let service = Service::new(test_config());
    service.start();
    let router = service.router();

    let resp = send(&router, post_event(r#"{"product_id":"kept","stock":3}"#)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    assert!(service.drain().await);

    let resp = send(&router, post_event(r#"{"product_id":"late","stock":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["error"], "shutting_down");

    let resp = send(&router, get("/products/kept")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send(&router, get("/products/late")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let metrics = body_json(send(&router, get("/debug/metrics")).await).await;
    assert_eq!(metrics["events_enqueued"], 1);
    assert_eq!(metrics["events_processed"], 1);
    service.stop();
}

#[tokio::test]
async fn concurrent_producers_are_all_applied() {
    let service = Service::new(test_config());
    service.start();
    let router = service.router();

    let producers: Vec<_> = (0..10)
        .map(|p| {
            let router = router.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let body = format!(r#"{{"product_id":"p{p}-{i}","stock":{i}}}"#);
                    let resp = router.clone().oneshot(post_event(&body)).await.unwrap();
                    assert_eq!(resp.status(), StatusCode::ACCEPTED);
                }
            })
        })
        .collect();
    for p in producers {
        p.await.unwrap();
    }

    assert!(service.drain().await);
    let m = service.manager().metrics();
    assert_eq!((m.enqueued, m.processed), (500, 500));

    for p in 0..10 {
        for i in 0..50 {
            let resp = send(&router, get(&format!("/products/p{p}-{i}"))).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await["stock"], i);
        }
    }
    service.stop();
}

#[tokio::test]
async fn prometheus_reflects_processed_events() {
    let service = Service::new(test_config());
    service.start();
    let router = service.router();

    for i in 0..3 {
        let body = format!(r#"{{"product_id":"m{i}","price":1}}"#);
        send(&router, post_event(&body)).await;
    }
    assert!(service.drain().await);

    let resp = send(&router, get("/metrics")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(
        to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(text.contains("skuflow_events_enqueued_total 3\n"));
    assert!(text.contains("skuflow_events_processed_total 3\n"));
    assert!(text.contains("skuflow_backlog_size 0\n"));
    service.stop();
}

#[tokio::test]
async fn serve_drains_and_stops_on_signal() {
    let service = Service::new(test_config());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(serve(service.clone(), listener, async move {
        let _ = rx.await;
    }));

    // Let serve start the workers before feeding them.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let router = service.router();
    for i in 0..20 {
        let body = format!(r#"{{"product_id":"s{i}","price":{i}}}"#);
        let resp = send(&router, post_event(&body)).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("serve should return after the signal")
        .unwrap()
        .unwrap();

    let manager = service.manager();
    assert!(manager.is_shutting_down());
    assert!(manager.is_stopped());
    assert_eq!(manager.worker_count(), 0);
    assert_eq!(manager.metrics().processed, 20);
    assert_eq!(manager.store().len(), 20);
}
