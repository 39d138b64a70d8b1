//! In-process push channel
//!
//! [`PushConnector`] implements the session and channel collaborators for
//! deployments where the platform (or a relay in front of it) pushes events to
//! us, e.g. over an HTTP callback. Whatever receives those events calls
//! [`PushConnector::push`] and the envelope lands on the queue of the
//! currently subscribed channel. Tests use it as a loopback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::{MonitorError, Result};
use crate::monitor::EnvelopeSender;
use crate::setup::{EventChannel, SessionConnector, Subscription, XsiSession};

/// Connector whose channels are fed by [`PushConnector::push`]
#[derive(Debug, Clone, Default)]
pub struct PushConnector {
    inner: Arc<PushInner>,
}

#[derive(Debug, Default)]
struct PushInner {
    required_token: Option<String>,
    refuse_subscriptions: bool,
    active: RwLock<Option<ActiveChannel>>,
    connects: AtomicUsize,
    channels_opened: AtomicUsize,
}

#[derive(Debug)]
struct ActiveChannel {
    id: Uuid,
    sink: EnvelopeSender,
    subscribed: bool,
}

impl PushConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept sessions built with this token
    pub fn with_required_token(self, token: impl Into<String>) -> Self {
        self.rebuild(|inner| inner.required_token = Some(token.into()))
    }

    /// Answer every subscription with a refusal
    pub fn refusing_subscriptions(self) -> Self {
        self.rebuild(|inner| inner.refuse_subscriptions = true)
    }

    fn rebuild(self, apply: impl FnOnce(&mut PushInner)) -> Self {
        let mut inner = PushInner {
            required_token: self.inner.required_token.clone(),
            refuse_subscriptions: self.inner.refuse_subscriptions,
            ..Default::default()
        };
        apply(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Deliver an envelope to the subscribed channel
    pub fn push(&self, envelope: Envelope) -> Result<()> {
        let active = self.inner.active.read();
        match active.as_ref() {
            Some(channel) if channel.subscribed => channel
                .sink
                .send(envelope)
                .map_err(|_| MonitorError::ChannelClosed),
            _ => {
                debug!("Dropping pushed event: no subscribed channel");
                Err(MonitorError::ChannelClosed)
            }
        }
    }

    /// Whether a subscribed channel is accepting events
    pub fn has_active_channel(&self) -> bool {
        self.inner
            .active
            .read()
            .as_ref()
            .map(|channel| channel.subscribed && !channel.sink.is_closed())
            .unwrap_or(false)
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn channels_opened(&self) -> usize {
        self.inner.channels_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for PushConnector {
    async fn connect(&self, token: &str) -> Result<Arc<dyn XsiSession>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if token.is_empty() {
            return Err(MonitorError::credential("empty access token"));
        }
        if let Some(required) = &self.inner.required_token {
            if required != token {
                return Err(MonitorError::credential("access token not accepted"));
            }
        }
        Ok(Arc::new(PushSession {
            inner: self.inner.clone(),
        }))
    }
}

struct PushSession {
    inner: Arc<PushInner>,
}

#[async_trait]
impl XsiSession for PushSession {
    async fn open_channel(&self, sink: EnvelopeSender) -> Result<Box<dyn EventChannel>> {
        let id = Uuid::new_v4();
        let replaced = self.inner.active.write().replace(ActiveChannel {
            id,
            sink,
            subscribed: false,
        });
        if let Some(previous) = replaced {
            info!("Push channel {} replaced by {}", previous.id, id);
        }
        self.inner.channels_opened.fetch_add(1, Ordering::SeqCst);
        info!("Opened push channel {}", id);
        Ok(Box::new(PushChannel {
            id,
            inner: self.inner.clone(),
        }))
    }
}

struct PushChannel {
    id: Uuid,
    inner: Arc<PushInner>,
}

#[async_trait]
impl EventChannel for PushChannel {
    async fn subscribe(&self, package: &str) -> Result<Option<Subscription>> {
        if self.inner.refuse_subscriptions {
            return Ok(None);
        }
        let mut active = self.inner.active.write();
        match active.as_mut() {
            Some(channel) if channel.id == self.id => {
                channel.subscribed = true;
                Ok(Some(Subscription {
                    id: Uuid::new_v4().to_string(),
                    package: package.to_string(),
                }))
            }
            _ => Err(MonitorError::subscription(format!(
                "push channel {} is no longer open",
                self.id
            ))),
        }
    }

    async fn close(&self) {
        let mut active = self.inner.active.write();
        if active.as_ref().map(|channel| channel.id) == Some(self.id) {
            *active = None;
            info!("Closed push channel {}", self.id);
        }
    }
}
