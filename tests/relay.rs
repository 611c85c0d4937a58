use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::util::ServiceExt;

use hookrelay::error::ErrorCode;
use hookrelay::hookrelay::config::ServerConfig;
use hookrelay::hookrelay::consumer::spawn_consumers;
use hookrelay::hookrelay::net::server::bind;
use hookrelay::hookrelay::net::webhook::router;
use hookrelay::hookrelay::pubsub::PubSub;
use hookrelay::hookrelay::sink::MemorySink;
use hookrelay::hookrelay::{init, serve};

const WAIT: Duration = Duration::from_secs(5);

struct Relay {
    app: Router,
    sink: MemorySink,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Relay {
    fn start(topics: &[&str]) -> Self {
        let bus = Arc::new(PubSub::new());
        let sink = MemorySink::new();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let topics: Vec<String> = topics.iter().map(|t| t.to_string()).collect();

        spawn_consumers(&bus, &topics, Arc::new(sink.clone()), &cancel, &tracker);
        tracker.close();

        Self { app: router(bus), sink, cancel, tracker }
    }

    async fn send(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Bytes) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes)
    }

    /// Stops the consumers and returns everything they wrote
    async fn stop(self) -> Vec<u8> {
        self.cancel.cancel();
        timeout(WAIT, self.tracker.wait()).await.unwrap();
        self.sink.contents()
    }
}

#[tokio::test]
async fn post_to_configured_topic_reaches_sink() {
    let relay = Relay::start(&["orders"]);

    let (status, body) = relay.send("POST", "/orders", Body::from(r#"{"id":1}"#)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    assert_eq!(relay.stop().await, b"{\"id\":1}\n".to_vec());
}

#[tokio::test]
async fn post_to_unknown_topic_is_accepted_and_dropped() {
    let relay = Relay::start(&["orders"]);

    let (status, body) = timeout(WAIT, relay.send("POST", "/unknown", Body::from("anything")))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    assert!(relay.stop().await.is_empty());
}

#[tokio::test]
async fn body_read_failure_answers_500_without_publishing() {
    let relay = Relay::start(&["orders"]);

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"{\"id\"")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ];
    let failing = Body::from_stream(futures_util::stream::iter(chunks));

    let (status, body) = relay.send("POST", "/orders", failing).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.is_empty());

    assert!(relay.stop().await.is_empty());
}

#[tokio::test]
async fn method_is_not_checked() {
    let relay = Relay::start(&["orders"]);

    for method in ["GET", "PUT", "DELETE"] {
        let (status, _) = relay.send(method, "/orders", Body::from(method)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    assert_eq!(relay.stop().await, b"GET\nPUT\nDELETE\n".to_vec());
}

#[tokio::test]
async fn topics_are_case_sensitive_and_may_be_nested_or_empty() {
    let relay = Relay::start(&["", "a/b"]);

    relay.send("POST", "/Orders", Body::from("ignored")).await;
    relay.send("POST", "/a/b", Body::from("nested")).await;
    relay.send("POST", "/", Body::from("root")).await;

    let mut lines: Vec<Vec<u8>> = relay
        .stop()
        .await
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.to_vec())
        .collect();
    lines.sort();
    assert_eq!(lines, vec![b"nested".to_vec(), b"root".to_vec()]);
}

#[tokio::test]
async fn percent_encoded_paths_reach_decoded_topics() {
    let relay = Relay::start(&["a b", "café"]);

    for uri in ["/a%20b", "/caf%C3%A9"] {
        let (status, body) = relay.send("POST", uri, Body::from("x")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }
    let (status, _) = relay.send("POST", "/a%20b%FF", Body::from("y")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(relay.stop().await, b"x\nx\n".to_vec());
}

#[tokio::test]
async fn concurrent_posts_to_one_topic_all_arrive() {
    let relay = Relay::start(&["orders"]);

    let mut requests = Vec::new();
    for i in 0..8 {
        let app = relay.app.clone();
        requests.push(tokio::spawn(async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/orders")
                    .body(Body::from(format!("msg-{}", i)))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
        }));
    }
    for request in requests {
        assert_eq!(timeout(WAIT, request).await.unwrap().unwrap(), StatusCode::NO_CONTENT);
    }

    let output = relay.stop().await;
    let mut lines: Vec<&[u8]> = output.split(|b| *b == b'\n').filter(|l| !l.is_empty()).collect();
    lines.sort();
    let expected: Vec<String> = (0..8).map(|i| format!("msg-{}", i)).collect();
    let expected: Vec<&[u8]> = expected.iter().map(|s| s.as_bytes()).collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down() {
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = MemorySink::new();
    let shutdown = CancellationToken::new();

    let server = {
        let sink = Arc::new(sink.clone());
        let shutdown = shutdown.clone();
        let topics = vec!["orders".to_string()];
        tokio::spawn(async move { serve(listener, &topics, sink, shutdown).await })
    };

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = r#"{"id":1}"#;
    let request = format!(
        "POST /orders HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        addr,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut response)).await.unwrap().unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 204"), "unexpected response: {}", response);

    shutdown.cancel();
    timeout(WAIT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(sink.contents(), b"{\"id\":1}\n".to_vec());
}

#[tokio::test]
async fn occupied_address_fails_to_bind() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let err = bind(&addr).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::BindFailed));

    let config = ServerConfig { addr, topics: vec!["orders".to_string()] };
    let err = init(config, Arc::new(MemorySink::new()), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::BindFailed));
    assert!(err.code().is_some_and(|code| code.is_startup()));
}
