//! In-process broker for driving links in tests
//!
//! Topics are broadcast channels. Taking the broker offline ends every open
//! session and refuses new connections until it comes back.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};

use super::error::{LinkError, LinkResult};
use super::session::{Connector, Delivery, Endpoint, Session};

const TOPIC_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    online: AtomicBool,
    connects: AtomicU64,
    topics: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    generation: watch::Sender<u64>,
}

impl BrokerInner {
    fn channel(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                online: AtomicBool::new(true),
                connects: AtomicU64::new(0),
                topics: Mutex::new(HashMap::new()),
                generation: watch::channel(0).0,
            }),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Publish as an external client
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        let _ = self.inner.channel(topic).send(payload.into());
    }

    /// Observe a topic as an external client
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Vec<u8>> {
        self.inner.channel(topic).subscribe()
    }

    /// Drop every session and refuse connections
    pub fn go_offline(&self) {
        self.inner.online.store(false, Ordering::SeqCst);
        self.inner.generation.send_modify(|g| *g += 1);
    }

    pub fn go_online(&self) {
        self.inner.online.store(true, Ordering::SeqCst);
    }

    /// Successful connections so far
    pub fn connects(&self) -> u64 {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryBroker {
    async fn connect(&self, endpoint: &Endpoint, _client_id: &str) -> LinkResult<Box<dyn Session>> {
        if !self.inner.online.load(Ordering::SeqCst) {
            return Err(LinkError::Refused(format!("{} is offline", endpoint.addr())));
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            broker: Arc::clone(&self.inner),
            generation: self.inner.generation.subscribe(),
            subscription: None,
        }))
    }
}

struct MemorySession {
    broker: Arc<BrokerInner>,
    generation: watch::Receiver<u64>,
    subscription: Option<(String, broadcast::Receiver<Vec<u8>>)>,
}

impl MemorySession {
    fn is_lost(&self) -> bool {
        self.generation.has_changed().unwrap_or(true)
    }
}

async fn next_message(
    subscription: &mut Option<(String, broadcast::Receiver<Vec<u8>>)>,
) -> Option<Delivery> {
    let Some((topic, rx)) = subscription else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(payload) => {
                return Some(Delivery {
                    topic: topic.clone(),
                    payload,
                })
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn subscribe(&mut self, topic: &str) -> LinkResult<()> {
        if self.is_lost() {
            return Err(LinkError::Closed);
        }
        let rx = self.broker.channel(topic).subscribe();
        self.subscription = Some((topic.to_string(), rx));
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> LinkResult<()> {
        if self.is_lost() {
            return Err(LinkError::Closed);
        }
        let _ = self.broker.channel(topic).send(payload);
        Ok(())
    }

    async fn poll(&mut self) -> LinkResult<Delivery> {
        if self.is_lost() {
            return Err(LinkError::Closed);
        }
        tokio::select! {
            _ = self.generation.changed() => Err(LinkError::Closed),
            delivery = next_message(&mut self.subscription) => delivery.ok_or(LinkError::Closed),
        }
    }

    async fn close(&mut self) {
        self.subscription = None;
    }
}
