//! # Channel Setup
//!
//! One-time initialization of a monitoring session:
//!
//! 1. fetch and validate the admin credential ([`TokenProvider`])
//! 2. build a session handle with it ([`SessionConnector`])
//! 3. open a push channel bound to a fresh event queue ([`XsiSession`])
//! 4. subscribe to the configured event package ([`EventChannel`])
//! 5. launch the monitoring loop as a background task
//!
//! [`MonitorSupervisor`] owns the running monitor and refuses to start a second
//! one while the first is alive. Every failure is logged and folded into a
//! [`StartOutcome`]; nothing propagates out of setup.
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use xsi_monitor_core::prelude::*;
//!
//! # async fn example() {
//! let connector = PushConnector::new();
//! let supervisor = MonitorSupervisor::new(
//!     Arc::new(StaticTokenProvider::valid("admin-token")),
//!     Arc::new(connector.clone()),
//!     EventDispatcher::new(),
//!     MonitorConfig::default(),
//! );
//!
//! assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);
//! assert_eq!(supervisor.start_monitoring().await, StartOutcome::AlreadyRunning);
//! supervisor.stop().await;
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::{MonitorError, Result};
use crate::dispatcher::panic_message;
use crate::monitor::{
    event_queue, EnvelopeSender, EventMonitor, MonitorExit, MonitorStats, MonitorStatsSnapshot,
};
use crate::registry::CallRegistry;

/// Result of checking the stored admin credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Token is present and neither it nor its refresh token has expired
    Valid(String),
    /// Token is missing, expired, or could not be read
    Invalid,
}

/// Source of the admin access token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn validate_and_fetch_token(&self) -> TokenStatus;
}

/// Token provider with a fixed answer
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    status: TokenStatus,
}

impl StaticTokenProvider {
    pub fn valid(token: impl Into<String>) -> Self {
        Self {
            status: TokenStatus::Valid(token.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: TokenStatus::Invalid,
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn validate_and_fetch_token(&self) -> TokenStatus {
        self.status.clone()
    }
}

/// Acknowledgement of an event package subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: String,
    pub package: String,
}

/// Builds an authenticated session against the telephony platform
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, token: &str) -> Result<Arc<dyn XsiSession>>;
}

/// An authenticated session able to open event channels
#[async_trait]
pub trait XsiSession: Send + Sync {
    /// Open a push channel that delivers envelopes into `sink`
    async fn open_channel(&self, sink: EnvelopeSender) -> Result<Box<dyn EventChannel>>;
}

/// An open push channel
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Subscribe to an event package; `None` means the platform refused
    async fn subscribe(&self, package: &str) -> Result<Option<Subscription>>;

    /// Stop delivering events
    async fn close(&self) {}
}

/// Outcome of [`MonitorSupervisor::start_monitoring`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new monitor is running
    Started,
    /// A monitor was already running; nothing was started
    AlreadyRunning,
    /// The credential was missing, invalid or expired
    InvalidCredential,
    /// Channel, subscription or worker start failed
    Failed(String),
}

impl StartOutcome {
    /// True when a monitor is running after the call
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Started | Self::AlreadyRunning)
    }
}

/// State owned by one running monitor
#[derive(Debug, Clone)]
pub struct MonitorSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub subscription: Subscription,
    pub registry: CallRegistry,
    pub stats: Arc<MonitorStats>,
}

impl MonitorSession {
    fn new(subscription: Subscription, config: &MonitorConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            subscription,
            registry: CallRegistry::new(config.registry_high_water),
            stats: Arc::new(MonitorStats::default()),
        }
    }
}

/// Status report for a running monitor
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub subscription: Subscription,
    pub active_calls: usize,
    pub stats: MonitorStatsSnapshot,
}

struct RunningMonitor {
    session: MonitorSession,
    channel: Box<dyn EventChannel>,
    shutdown: CancellationToken,
    handle: JoinHandle<MonitorExit>,
}

/// Starts, tracks and stops the single monitor of this process
pub struct MonitorSupervisor {
    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn SessionConnector>,
    dispatcher: EventDispatcher,
    config: MonitorConfig,
    running: Mutex<Option<RunningMonitor>>,
}

impl MonitorSupervisor {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn SessionConnector>,
        dispatcher: EventDispatcher,
        config: MonitorConfig,
    ) -> Self {
        Self {
            tokens,
            connector,
            dispatcher,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Validate the credential, subscribe and launch the monitoring loop
    pub async fn start_monitoring(&self) -> StartOutcome {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                info!("Agent monitor {} already running", current.session.id);
                return StartOutcome::AlreadyRunning;
            }
            warn!("Previous agent monitor {} has exited; starting a new one", current.session.id);
        }
        if let Some(stale) = running.take() {
            stale.channel.close().await;
        }

        let checked = AssertUnwindSafe(self.tokens.validate_and_fetch_token())
            .catch_unwind()
            .await;
        let token = match checked {
            Ok(TokenStatus::Valid(token)) => token,
            Ok(TokenStatus::Invalid) => {
                error!("Invalid or expired admin token.");
                return StartOutcome::InvalidCredential;
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("🚨 Token check panicked: {}", message);
                return StartOutcome::Failed(format!("token check panicked: {message}"));
            }
        };
        info!("Admin token is valid, starting agent monitoring");

        let launched = AssertUnwindSafe(self.launch(&token))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(MonitorError::internal(format!(
                    "setup panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        match launched {
            Ok(monitor) => {
                info!(
                    "✅ Agent Monitoring has been started for the organization (session {})",
                    monitor.session.id
                );
                *running = Some(monitor);
                StartOutcome::Started
            }
            Err(MonitorError::Credential { message }) => {
                error!("Session rejected the admin token: {}", message);
                StartOutcome::InvalidCredential
            }
            Err(e) => {
                error!("Failed to setup agent monitoring: {}", e);
                StartOutcome::Failed(e.to_string())
            }
        }
    }

    async fn launch(&self, token: &str) -> Result<RunningMonitor> {
        info!("Initializing Agent Monitor with provided access token.");
        self.config.validate()?;

        let session_handle = self.connector.connect(token).await?;
        let (sender, receiver) = event_queue();
        let channel = session_handle.open_channel(sender).await?;

        let package = self.config.event_package.as_str();
        let subscription = match channel.subscribe(package).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                channel.close().await;
                return Err(MonitorError::subscription(format!(
                    "Failed to subscribe to '{package}' event package."
                )));
            }
            Err(e) => {
                channel.close().await;
                return Err(e);
            }
        };
        info!(
            "Subscribed to '{}' event package (subscription {})",
            package, subscription.id
        );

        let session = MonitorSession::new(subscription, &self.config);
        let monitor = EventMonitor::new(
            self.dispatcher.clone(),
            session.registry.clone(),
            session.stats.clone(),
            self.config.pacing(),
        );
        let shutdown = CancellationToken::new();

        info!("Starting task to monitor agents...");
        let handle = tokio::spawn(monitor.run(receiver, shutdown.clone()));
        tokio::task::yield_now().await;

        if handle.is_finished() {
            channel.close().await;
            return Err(MonitorError::internal("Event monitoring task failed to start."));
        }
        info!("✅ Event monitoring task is running.");

        Ok(RunningMonitor {
            session,
            channel,
            shutdown,
            handle,
        })
    }

    /// Stop the running monitor; returns false when none was running
    pub async fn stop(&self) -> bool {
        let taken = {
            let mut running = self.running.lock().await;
            running.take()
        };
        let Some(monitor) = taken else {
            return false;
        };

        info!("🛑 Stopping agent monitor {}", monitor.session.id);
        monitor.shutdown.cancel();
        monitor.channel.close().await;
        match monitor.handle.await {
            Ok(exit) => info!("✅ Agent monitor stopped ({:?})", exit),
            Err(e) => error!("Agent monitor task ended abnormally: {}", e),
        }
        true
    }

    /// Whether a monitor task is alive
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|monitor| !monitor.handle.is_finished())
            .unwrap_or(false)
    }

    /// Session state of the running monitor, if any
    pub async fn session(&self) -> Option<MonitorSession> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|monitor| monitor.session.clone())
    }

    /// Status report of the running monitor, if any
    pub async fn status(&self) -> Option<MonitorStatus> {
        self.session().await.map(|session| MonitorStatus {
            session_id: session.id,
            started_at: session.started_at,
            active_calls: session.registry.len(),
            stats: session.stats.snapshot(),
            subscription: session.subscription,
        })
    }
}

impl std::fmt::Debug for MonitorSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSupervisor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::handlers::{CallAddedContext, CallDecision, CallRoutingPolicy};
    use crate::push::PushConnector;
    use serde_json::json;
    use std::time::Duration;

    struct PanickingConnector;

    #[async_trait]
    impl SessionConnector for PanickingConnector {
        async fn connect(&self, _token: &str) -> Result<Arc<dyn XsiSession>> {
            panic!("sdk blew up");
        }
    }

    struct PanickingTokens;

    #[async_trait]
    impl TokenProvider for PanickingTokens {
        async fn validate_and_fetch_token(&self) -> TokenStatus {
            panic!("token table unreadable");
        }
    }

    struct HangingPolicy;

    #[async_trait]
    impl CallRoutingPolicy for HangingPolicy {
        async fn decide(&self, _ctx: &CallAddedContext<'_>) -> Result<CallDecision> {
            futures::future::pending().await
        }
    }

    fn supervisor(tokens: StaticTokenProvider, connector: &PushConnector) -> MonitorSupervisor {
        MonitorSupervisor::new(
            Arc::new(tokens),
            Arc::new(connector.clone()),
            EventDispatcher::new(),
            MonitorConfig::default().with_pacing(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_invalid_credential_opens_nothing() {
        let connector = PushConnector::new();
        let supervisor = supervisor(StaticTokenProvider::invalid(), &connector);

        assert_eq!(supervisor.start_monitoring().await, StartOutcome::InvalidCredential);
        assert_eq!(connector.connect_count(), 0);
        assert_eq!(connector.channels_opened(), 0);
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn test_session_rejecting_token_is_credential_failure() {
        let connector = PushConnector::new().with_required_token("expected");
        let supervisor = supervisor(StaticTokenProvider::valid("other"), &connector);

        assert_eq!(supervisor.start_monitoring().await, StartOutcome::InvalidCredential);
        assert_eq!(connector.channels_opened(), 0);
    }

    #[tokio::test]
    async fn test_refused_subscription_starts_no_worker() {
        let connector = PushConnector::new().refusing_subscriptions();
        let supervisor = supervisor(StaticTokenProvider::valid("tok"), &connector);

        let outcome = supervisor.start_monitoring().await;
        assert!(matches!(outcome, StartOutcome::Failed(_)));
        assert!(!outcome.is_success());
        assert!(!supervisor.is_running().await);
        assert!(!connector.has_active_channel());
    }

    #[tokio::test]
    async fn test_second_start_is_refused_while_running() {
        let connector = PushConnector::new();
        let supervisor = supervisor(StaticTokenProvider::valid("tok"), &connector);

        assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);
        assert_eq!(supervisor.start_monitoring().await, StartOutcome::AlreadyRunning);
        assert_eq!(connector.channels_opened(), 1);

        assert!(supervisor.stop().await);
        assert!(!supervisor.stop().await);
        assert!(supervisor.status().await.is_none());
    }

    #[tokio::test]
    async fn test_status_reports_subscription() {
        let connector = PushConnector::new();
        let supervisor = supervisor(StaticTokenProvider::valid("tok"), &connector);
        supervisor.start_monitoring().await;

        let status = supervisor.status().await.expect("monitor should be running");
        assert_eq!(status.subscription.package, "Call Center Agent");
        assert_eq!(status.active_calls, 0);

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_connector_panic_is_a_failed_start() {
        let supervisor = MonitorSupervisor::new(
            Arc::new(StaticTokenProvider::valid("tok")),
            Arc::new(PanickingConnector),
            EventDispatcher::new(),
            MonitorConfig::default(),
        );

        match supervisor.start_monitoring().await {
            StartOutcome::Failed(reason) => assert!(reason.contains("sdk blew up")),
            other => panic!("expected failed start, got {other:?}"),
        }
        assert!(!supervisor.is_running().await);
    }

    #[tokio::test]
    async fn test_token_check_panic_is_a_failed_start() {
        let connector = PushConnector::new();
        let supervisor = MonitorSupervisor::new(
            Arc::new(PanickingTokens),
            Arc::new(connector.clone()),
            EventDispatcher::new(),
            MonitorConfig::default(),
        );

        match supervisor.start_monitoring().await {
            StartOutcome::Failed(reason) => assert!(reason.contains("token table unreadable")),
            other => panic!("expected failed start, got {other:?}"),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_hung_handler() {
        let connector = PushConnector::new();
        let supervisor = MonitorSupervisor::new(
            Arc::new(StaticTokenProvider::valid("tok")),
            Arc::new(connector.clone()),
            EventDispatcher::new().with_routing_policy(Arc::new(HangingPolicy)),
            MonitorConfig::default().with_pacing(Duration::ZERO),
        );
        assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);

        connector
            .push(Envelope::from_value(json!({
                "Event": {
                    "eventData": {"@type": "CallAddedEvent", "call": {"callId": "c1"}},
                    "targetId": "q1"
                }
            })))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let received = supervisor.status().await.map(|s| s.stats.received);
                if received == Some(1) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("event never reached the monitor");

        let stopped = tokio::time::timeout(Duration::from_secs(1), supervisor.stop())
            .await
            .expect("stop waited on the hung handler");
        assert!(stopped);
        let running = tokio::time::timeout(Duration::from_secs(1), supervisor.is_running())
            .await
            .expect("supervisor lock still held");
        assert!(!running);
    }
}
