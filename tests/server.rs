//! Tests of the proxy server end to end: client → proxy → mock backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use router_proxy::affinity::AffinityKey;
use router_proxy::config::TimeoutConfig;
use router_proxy::load_balancer::StaticBackends;
use router_proxy::{HttpServer, ProxyTransport, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

mod common;

/// Start a proxy over `backends`. Dropping the returned `Shutdown` leaves the
/// server running; triggering it stops the server.
async fn start_proxy(backends: Vec<String>, affinity: Option<AffinityKey>) -> (SocketAddr, Shutdown) {
    let transport = ProxyTransport::new(
        Arc::new(StaticBackends::new(backends)),
        &TimeoutConfig::default(),
        affinity,
    );
    let shutdown = Shutdown::new();
    let server = HttpServer::new(Arc::new(transport), shutdown.subscribe());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    (addr, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn forwards_to_backend() {
    let backend = common::start_mock_backend("alpha").await;
    let (proxy, _shutdown) = start_proxy(vec![backend.to_string()], None).await;

    let res = client()
        .get(format!("http://{}/hello", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert!(!res.headers().contains_key("set-cookie"));
    assert_eq!(res.text().await.unwrap(), "alpha");
}

#[tokio::test]
async fn no_backends_is_service_unavailable() {
    let down = common::unused_addr().await;
    let (proxy, _shutdown) = start_proxy(vec![down], None).await;

    let res = client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "router: no backends available");
}

#[tokio::test]
async fn sticky_cookie_round_trip() {
    let a = common::start_mock_backend("a").await.to_string();
    let b = common::start_mock_backend("b").await.to_string();
    let (proxy, _shutdown) = start_proxy(vec![a, b], Some(AffinityKey::generate())).await;
    let client = client();

    let first = client
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .unwrap();
    let cookie = first.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let pinned = first.text().await.unwrap();

    for _ in 0..10 {
        let res = client
            .get(format!("http://{}/", proxy))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert!(!res.headers().contains_key("set-cookie"));
        assert_eq!(res.text().await.unwrap(), pinned);
    }
}

#[tokio::test]
async fn upgrade_is_spliced_through_the_proxy() {
    let backend = common::start_upgrade_backend().await;
    let (proxy, _shutdown) = start_proxy(vec![backend.to_string()], None).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(b"GET /ws HTTP/1.1\r\nHost: service.test\r\nConnection: Upgrade\r\nUpgrade: echo\r\n\r\n")
        .await
        .unwrap();

    // read until the end of the response head
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    while !received.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "proxy closed before response head");
        received.extend_from_slice(&buf[..n]);
    }
    let text = String::from_utf8_lossy(&received).to_string();
    assert!(text.starts_with("HTTP/1.1 101"), "{text}");

    let head_end = received.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let mut tail = received[head_end..].to_vec();
    while tail.len() < b"welcome".len() {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0);
        tail.extend_from_slice(&buf[..n]);
    }
    assert_eq!(&tail, b"welcome");

    stream.write_all(b"over the tunnel").await.unwrap();
    let mut echo = [0u8; 15];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echo))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echo, b"over the tunnel");
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let backend = common::start_mock_backend("alpha").await;
    let (proxy, shutdown) = start_proxy(vec![backend.to_string()], None).await;

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(TcpStream::connect(proxy).await.is_err());
}
