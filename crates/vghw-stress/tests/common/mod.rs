#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vghw_stress::engine::transport::{Dialer, Transport};
use vghw_stress::error::TransportError;

pub enum Inbound {
    Frame(String),
    Fail(String),
}

/// In-memory connection. Frames pushed through the paired [`MockPeer`] are
/// received in order; everything sent is recorded.
pub struct MockTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: CancellationToken,
    fail_sends: bool,
    live: Arc<AtomicUsize>,
}

/// The server side of a [`MockTransport`].
#[derive(Clone)]
pub struct MockPeer {
    tx: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: CancellationToken,
}

pub fn mock_pair() -> (MockTransport, MockPeer) {
    mock_pair_with(Arc::new(AtomicUsize::new(0)), false)
}

pub fn mock_pair_with(live: Arc<AtomicUsize>, fail_sends: bool) -> (MockTransport, MockPeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let closed = CancellationToken::new();
    live.fetch_add(1, Ordering::SeqCst);

    let transport = MockTransport {
        inbound: tokio::sync::Mutex::new(rx),
        sent: Arc::clone(&sent),
        closed: closed.clone(),
        fail_sends,
        live,
    };
    let peer = MockPeer { tx, sent, closed };
    (transport, peer)
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends {
            return Err(TransportError::Io("broken pipe".to_string()));
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            msg = inbound.recv() => match msg {
                Some(Inbound::Frame(frame)) => Ok(Some(frame)),
                Some(Inbound::Fail(reason)) => Err(TransportError::Io(reason)),
                None => Ok(None),
            },
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

impl MockPeer {
    pub fn push(&self, frame: &str) {
        let _ = self.tx.send(Inbound::Frame(frame.to_string()));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Inbound::Fail(reason.to_string()));
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

pub enum DialBehavior {
    /// Connect, greet with the given frames, then stay silent.
    Accept(Vec<String>),
    Refuse,
}

/// Hands out mock transports and keeps their peers alive so reads block
/// until the driver closes them.
pub struct MockDialer {
    behavior: DialBehavior,
    pub live: Arc<AtomicUsize>,
    pub dials: AtomicUsize,
    peers: Mutex<Vec<MockPeer>>,
}

impl MockDialer {
    pub fn new(behavior: DialBehavior) -> Self {
        Self {
            behavior,
            live: Arc::new(AtomicUsize::new(0)),
            dials: AtomicUsize::new(0),
            peers: Mutex::new(Vec::new()),
        }
    }

    pub fn peers(&self) -> Vec<MockPeer> {
        self.peers.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Dialer for MockDialer {
    type Transport = MockTransport;

    async fn dial(&self) -> Result<MockTransport, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            DialBehavior::Refuse => Err(TransportError::Io("connection refused".to_string())),
            DialBehavior::Accept(greeting) => {
                let (transport, peer) = mock_pair_with(Arc::clone(&self.live), false);
                for frame in greeting {
                    peer.push(frame);
                }
                self.peers.lock().unwrap().push(peer);
                Ok(transport)
            }
        }
    }
}

pub const HELLO: &str = r#"{"type":"HELLO","d":{"username":"floodie","levels":[]}}"#;
pub const LEVEL_JOINED: &str = r#"{"type":"LEVEL_JOINED","d":{"level":1}}"#;
pub const LEVEL_FINISHED: &str =
    r#"{"type":"LEVEL_FINISHED","d":{"level":1,"won":true,"time":1234}}"#;
pub const ENTITY_MOVE: &str = r#"{"type":"ENTITY_MOVE","d":{"level":1,"entities":[{"initialPosition":{"x":1,"y":2},"position":{"x":3,"y":4}}]}}"#;

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually<F: Fn() -> bool>(within: Duration, cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
