//! Black-box tests driving the HTTP and RESP front-ends over real sockets,
//! wired to an in-memory mock upstream instead of a live Redis. These cover
//! SPEC_FULL.md's concrete scenarios end-to-end rather than unit-by-unit.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use keyfront::presentation::http::{self, state::AppState};
use keyfront::presentation::resp;
use keyfront::proxy::cache::Cache;
use keyfront::proxy::job::Job;
use keyfront::proxy::upstream::{UpstreamClient, UpstreamError};
use keyfront::proxy::worker::Worker;

/// A canned upstream: looks keys up in a fixed map, never errors. Good
/// enough to exercise hit/miss without a running Redis.
struct MockUpstream {
    data: Mutex<HashMap<String, String>>,
}

impl MockUpstream {
    fn new(data: HashMap<String, String>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn get(&self, key: &str) -> Result<Option<String>, UpstreamError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }
}

/// Wires a cache and a small worker pool exactly the way `Dispatcher::run`
/// and `Dispatcher::dispatch` do, minus the upstream-ping startup step,
/// so the front-ends can be driven against a mock upstream.
fn spawn_backend(data: HashMap<String, String>, workers: usize) -> async_channel::Sender<Job> {
    let cache = Arc::new(Cache::new(100, Duration::from_secs(5), workers.max(1)));
    let (jobs_tx, jobs_rx) = async_channel::bounded::<Job>(30);
    let (idle_tx, idle_rx) = async_channel::bounded::<mpsc::Sender<Job>>(workers.max(1));

    for _ in 0..workers {
        let worker = Worker::new(MockUpstream::new(data.clone()), cache.clone(), idle_tx.clone());
        tokio::spawn(worker.run(CancellationToken::new()));
    }

    tokio::spawn(async move {
        loop {
            let Ok(job) = jobs_rx.recv().await else {
                return;
            };
            let idle_rx = idle_rx.clone();
            tokio::spawn(async move {
                if let Ok(inbox) = idle_rx.recv().await {
                    let _ = inbox.send(job).await;
                }
            });
        }
    });

    jobs_tx
}

async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    http_request(addr, "GET", path).await
}

async fn http_request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);

    let mut parts = text.splitn(2, "\r\n\r\n");
    let head = parts.next().unwrap_or_default();
    let body = parts.next().unwrap_or_default();
    let status_line = head.lines().next().unwrap_or_default();
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    (status, body.to_string())
}

async fn resp_roundtrip(addr: SocketAddr, command: &[&str]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut frame = format!("*{}\r\n", command.len());
    for arg in command {
        frame.push_str(&format!("${}\r\n{}\r\n", arg.len(), arg));
    }
    stream.write_all(frame.as_bytes()).await.unwrap();

    // RESP replies are self-delimiting; reading whatever arrives within a
    // short window is enough for these single-shot test commands.
    let mut buf = vec![0u8; 256];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("response timed out")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).to_string()
}

#[tokio::test]
async fn http_hit_returns_value_and_repeat_request_stays_cached() {
    let mut data = HashMap::new();
    data.insert("k00".to_string(), "v00".to_string());
    let jobs = spawn_backend(data, 2);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(http::server::serve(listener, AppState { jobs }, cancel));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = http_get(addr, "/?key=k00").await;
    assert_eq!(status, 200);
    assert_eq!(body, "v00");

    let (status, body) = http_get(addr, "/?key=k00").await;
    assert_eq!(status, 200);
    assert_eq!(body, "v00");
}

#[tokio::test]
async fn http_miss_returns_404_with_empty_body() {
    let jobs = spawn_backend(HashMap::new(), 1);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(http::server::serve(listener, AppState { jobs }, cancel));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = http_get(addr, "/?key=missing").await;
    assert_eq!(status, 404);
    assert_eq!(body, "");
}

#[tokio::test]
async fn http_post_is_rejected_before_any_job_is_built() {
    let jobs = spawn_backend(HashMap::new(), 1);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(http::server::serve(listener, AppState { jobs }, cancel));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, _) = http_request(addr, "POST", "/?key=k00").await;
    assert_eq!(status, 405);
}

#[tokio::test]
async fn resp_hit_miss_and_unknown_command() {
    let mut data = HashMap::new();
    data.insert("k00".to_string(), "v00".to_string());
    let jobs = spawn_backend(data, 2);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(resp::server::serve(listener, jobs, cancel));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(resp_roundtrip(addr, &["GET", "k00"]).await, "$3\r\nv00\r\n");
    assert_eq!(resp_roundtrip(addr, &["GET", "k01"]).await, "$-1\r\n");
    assert_eq!(
        resp_roundtrip(addr, &["SET", "k00", "v00"]).await,
        "-err unknown command 'set'\r\n"
    );
}
