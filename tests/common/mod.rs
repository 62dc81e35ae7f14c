//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use edge_tunnel::config::{EdgeConfig, ProxyConfig};
use edge_tunnel::doh::DohClient;
use edge_tunnel::protocol::Address;
use edge_tunnel::tunnel::{ChannelSink, ChunkStream, Dialer, TunnelContext};

/// Identity bytes of the default configuration.
pub fn identity() -> [u8; 16] {
    *uuid::Uuid::parse_str(edge_tunnel::config::schema::DEFAULT_UUID)
        .unwrap()
        .as_bytes()
}

/// Encode a request header followed by `payload`.
pub fn encode_header(command: u8, port: u16, address: &Address, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8];
    buf.extend_from_slice(&identity());
    buf.push(0);
    buf.push(command);
    buf.extend_from_slice(&port.to_be_bytes());
    match address {
        Address::Ipv4(ip) => {
            buf.push(1);
            buf.extend_from_slice(&ip.octets());
        }
        Address::Domain(domain) => {
            buf.push(2);
            buf.push(domain.len() as u8);
            buf.extend_from_slice(domain.as_bytes());
        }
        Address::Ipv6(ip) => {
            buf.push(3);
            buf.extend_from_slice(&ip.octets());
        }
    }
    buf.extend_from_slice(payload);
    buf
}

/// Start a TCP backend that echoes everything back.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Start a TCP backend that accepts and immediately hangs up.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    addr
}

/// Start a TCP backend that reads everything and never answers.
pub async fn start_mute_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// What the mock resolver has seen.
#[derive(Debug, Default)]
pub struct DohLog {
    pub lookups: Mutex<Vec<String>>,
    pub exchanges: Mutex<Vec<usize>>,
}

#[derive(Clone)]
struct DohState {
    answers: Arc<HashMap<String, Ipv4Addr>>,
    log: Arc<DohLog>,
}

#[derive(Deserialize)]
struct LookupParams {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
}

async fn doh_lookup(
    State(state): State<DohState>,
    Query(params): Query<LookupParams>,
) -> Json<serde_json::Value> {
    assert_eq!(params.record_type, "A");
    state.log.lookups.lock().unwrap().push(params.name.clone());

    let answer: Vec<serde_json::Value> = state
        .answers
        .get(&params.name)
        .map(|ip| {
            vec![serde_json::json!({
                "name": params.name,
                "type": 1,
                "TTL": 300,
                "data": ip.to_string(),
            })]
        })
        .unwrap_or_default();

    Json(serde_json::json!({ "Status": 0, "Answer": answer }))
}

/// Answers a DNS message with `b"answer:"` followed by the query.
async fn doh_exchange(State(state): State<DohState>, body: Bytes) -> Vec<u8> {
    state.log.exchanges.lock().unwrap().push(body.len());
    let mut answer = b"answer:".to_vec();
    answer.extend_from_slice(&body);
    answer
}

/// Start a DNS-over-HTTPS stand-in serving JSON lookups and message exchange.
pub async fn start_mock_doh(answers: &[(&str, Ipv4Addr)]) -> (String, Arc<DohLog>) {
    let log = Arc::new(DohLog::default());
    let state = DohState {
        answers: Arc::new(answers.iter().map(|(name, ip)| (name.to_string(), *ip)).collect()),
        log: Arc::clone(&log),
    };
    let app = Router::new()
        .route("/dns-query", get(doh_lookup).post(doh_exchange))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/dns-query", addr), log)
}

/// Events written to a `RecordingSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Data(Bytes),
    Close(u16, String),
}

/// In-memory channel sink.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn data(&self) -> Vec<Bytes> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Data(data) => Some(data),
                SinkEvent::Close(..) => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Close(code, reason) => Some((code, reason)),
                SinkEvent::Data(_) => None,
            })
            .collect()
    }

    /// Total bytes written to the channel.
    pub fn data_len(&self) -> usize {
        self.data().iter().map(Bytes::len).sum()
    }

    /// Wait until at least `count` data messages arrived.
    pub async fn wait_for_data(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.data().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("channel data did not arrive");
    }
}

impl ChannelSink for RecordingSink {
    async fn send(&mut self, data: Bytes) -> io::Result<()> {
        self.events.lock().unwrap().push(SinkEvent::Data(data));
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> io::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Close(code, reason.to_string()));
        Ok(())
    }
}

/// Client side of an in-memory channel.
pub type ChannelTx = mpsc::UnboundedSender<io::Result<Bytes>>;

/// In-memory inbound channel delivering `first` as the first chunk.
pub fn channel(first: Vec<u8>) -> (ChannelTx, ChunkStream<BoxStream<'static, io::Result<Bytes>>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(Ok(Bytes::from(first))).unwrap();
    let inner = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed();
    (tx, ChunkStream::new(inner, None))
}

/// In-memory inbound channel that has not delivered anything yet.
pub fn empty_channel() -> (ChannelTx, ChunkStream<BoxStream<'static, io::Result<Bytes>>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let inner = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed();
    (tx, ChunkStream::new(inner, None))
}

/// Dialer that refuses unknown hosts and redirects known ones to local backends.
#[derive(Clone, Default)]
pub struct MapDialer {
    routes: Arc<HashMap<String, SocketAddr>>,
    resetting: Arc<HashSet<String>>,
    attempts: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl MapDialer {
    pub fn new(routes: &[(&str, SocketAddr)]) -> Self {
        Self {
            routes: Arc::new(routes.iter().map(|(host, addr)| (host.to_string(), *addr)).collect()),
            ..Default::default()
        }
    }

    /// Streams dialed to `host` fail every read after the first reply.
    pub fn resetting_after_reply(mut self, host: &str) -> Self {
        let mut resetting = (*self.resetting).clone();
        resetting.insert(host.to_string());
        self.resetting = Arc::new(resetting);
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Number of outbound shutdowns observed across all dialed streams.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Dialer for MapDialer {
    type Stream = CountingStream;

    async fn dial(&self, host: &str, _port: u16) -> io::Result<CountingStream> {
        self.attempts.lock().unwrap().push(host.to_string());
        match self.routes.get(host) {
            Some(addr) => Ok(CountingStream {
                inner: TcpStream::connect(addr).await?,
                shutdowns: Arc::clone(&self.shutdowns),
                reset_after_reply: self.resetting.contains(host),
                replied: false,
            }),
            None => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused by test dialer")),
        }
    }
}

/// TCP stream that counts shutdown calls.
pub struct CountingStream {
    inner: TcpStream,
    shutdowns: Arc<AtomicUsize>,
    reset_after_reply: bool,
    replied: bool,
}

impl AsyncRead for CountingStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.reset_after_reply && self.replied {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by backend")));
        }
        let filled = buf.filled().len();
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);
        if matches!(result, Poll::Ready(Ok(()))) && buf.filled().len() > filled {
            self.replied = true;
        }
        result
    }
}

impl AsyncWrite for CountingStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = Pin::new(&mut self.inner).poll_shutdown(cx);
        if result.is_ready() {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

/// Session context wired to a mock resolver and a test dialer.
pub fn context(doh_url: &str, dialer: MapDialer) -> TunnelContext<MapDialer> {
    context_with(doh_url, dialer, |_| {})
}

/// Like `context`, with a hook to adjust the configuration.
pub fn context_with(
    doh_url: &str,
    dialer: MapDialer,
    configure: impl FnOnce(&mut ProxyConfig),
) -> TunnelContext<MapDialer> {
    let mut config = ProxyConfig::default();
    config.doh.url = doh_url.to_string();
    config.timeouts.idle_secs = 5;
    config.timeouts.first_chunk_secs = 5;
    configure(&mut config);
    let edge = Arc::new(EdgeConfig::from_proxy_config(&config).unwrap());
    let doh = DohClient::new(doh_url, Duration::from_secs(2)).unwrap();
    TunnelContext::new(edge, doh, dialer)
}
