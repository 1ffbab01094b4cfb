//! The full server over TCP, with a mock origin behind it.

use axum::http::StatusCode;

use edge_router::config::{OriginConfig, RouterConfig};
use edge_router::middlewares::BODY_SCRIPT;

mod common;

const PUBLIC_HOST: &str = "www.comparethemarket.com.au";

fn config_for(upstream: String) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.observability.metrics_enabled = false;
    config.origins.push(OriginConfig {
        host: PUBLIC_HOST.to_string(),
        upstream,
    });
    config
}

#[tokio::test]
async fn html_pages_are_rewritten_end_to_end() {
    let origin = common::start_mock_origin(common::PAGE).await;
    let (addr, shutdown) = common::start_router(config_for(format!("http://{origin}"))).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/home-loans/"))
        .header("host", PUBLIC_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies: Vec<String> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("user_anonymous_id=")));

    let html = res.text().await.unwrap();
    assert!(html.contains("<main>content</main>"));
    assert!(html.contains(BODY_SCRIPT));

    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_origin_is_a_bad_gateway() {
    // Bind then drop so nothing listens on the port.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (addr, shutdown) = common::start_router(config_for(format!("http://127.0.0.1:{port}"))).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .header("host", PUBLIC_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    shutdown.trigger();
}
