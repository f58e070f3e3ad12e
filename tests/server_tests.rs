//! End-to-end HTTP tests against a server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use restcore::cog::{Cog, RouteDecl, StatusCog};
use restcore::config::ServerConfig;
use restcore::extensions::Heartbeat;
use restcore::{Context, HandlerResult, HttpServer, Method};

mod common;

struct Echo;

impl Echo {
    async fn whoami(self: Arc<Self>, ctx: Context) -> HandlerResult {
        Ok(Context::respond(json!({ "user": ctx.user_data, "sent": ctx.sent_data })))
    }

    async fn beats(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let beat = ctx
            .extension::<Heartbeat>("heartbeat")
            .ok_or("heartbeat extension missing")?;
        Ok(Context::respond(json!({ "beats": beat.beats() })))
    }

    async fn create(self: Arc<Self>, ctx: Context) -> HandlerResult {
        Ok(Context::respond(ctx.sent_data))
    }
}

impl Cog for Echo {
    const NAME: &'static str = "echo";

    fn routes() -> Vec<RouteDecl<Self>> {
        vec![
            RouteDecl::new("/whoami", Method::Get, "whoami", Self::whoami),
            RouteDecl::new("/beats", Method::Get, "beats", Self::beats),
            RouteDecl::new("/things", Method::Post, "create", Self::create),
        ]
    }
}

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.shutdown_grace_secs = 2;
    config
}

#[tokio::test]
async fn test_status_codes_over_http() {
    let server = Arc::new(HttpServer::builder(config()).build().unwrap());
    server.load_cog(Echo).unwrap();
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let res = client.get(format!("{base}/whoami?x=1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "user": null, "sent": { "x": "1" } }));

    let res = client.get(format!("{base}/things")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "POST");

    let res = client.get(format!("{base}/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Not Found");

    let res = client
        .post(format!("{base}/things"))
        .header("content-type", "application/json")
        .body("{broken")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{base}/things"))
        .json(&json!({ "n": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "n": 1 }));

    server.exit().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_token_backend_gates_requests() {
    let backend = common::start_token_backend().await;
    let mut config = config();
    config.security.token_url = Some(format!("http://{}/", backend));

    let server = Arc::new(HttpServer::builder(config).build().unwrap());
    server.load_cog(Echo).unwrap();
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/whoami", addr);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(&url)
        .header("authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(&url)
        .header("authorization", common::GOOD_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"], json!({ "id": 7, "name": "alice" }));

    server.exit().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cogs_load_and_unload_while_serving() {
    let server = Arc::new(HttpServer::builder(config()).build().unwrap());
    server.load_cog(StatusCog::new(server.router())).unwrap();
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let res = client.get(format!("{base}/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.load_cog(Echo).unwrap();
    let res = client.get(format!("{base}/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let routes: Value = client
        .get(format!("{base}/_status/routes"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let paths: Vec<&str> = routes["routes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["path"].as_str())
        .collect();
    assert!(paths.contains(&"/whoami"));
    assert!(paths.contains(&"/_status/routes"));

    assert!(server.unload_cog("echo"));
    let res = client.get(format!("{base}/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.cog_names(), vec!["status"]);

    server.exit().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_extensions_run_until_exit() {
    let server = HttpServer::builder(config())
        .extension("heartbeat", Heartbeat::new(Duration::from_millis(10)))
        .build()
        .unwrap();
    let server = Arc::new(server);
    server.load_cog(Echo).unwrap();
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    let body: Value = reqwest::get(format!("http://{}/beats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["beats"].as_u64().unwrap() > 0);

    server.exit().await;
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after exit")
        .unwrap()
        .unwrap();

    let beat = server.router().extensions().get::<Heartbeat>("heartbeat").unwrap();
    assert!(beat.is_stopped());
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_handle_stops_server_and_extensions() {
    let server = HttpServer::builder(config())
        .extension("heartbeat", Heartbeat::new(Duration::from_millis(10)))
        .build()
        .unwrap();
    let server = Arc::new(server);
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;

    server.shutdown_handle().trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops once the signal fires")
        .unwrap()
        .unwrap();

    let beat = server.router().extensions().get::<Heartbeat>("heartbeat").unwrap();
    assert!(beat.is_stopped());
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_declared_oversized_body_gets_json_error() {
    let mut config = config();
    config.limits.max_body_bytes = 8;
    let server = Arc::new(HttpServer::builder(config).build().unwrap());
    server.load_cog(Echo).unwrap();
    let (addr, handle) = common::spawn_server(Arc::clone(&server)).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}/things", addr))
        .header("content-type", "application/json")
        .body(r#"{"n": 1234567890}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Payload Too Large");

    server.exit().await;
    handle.await.unwrap().unwrap();
}
