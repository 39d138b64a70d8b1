//! # XSI Monitor Core - Call Center Event Ingestion
//!
//! This crate consumes the asynchronous call-center event stream of an XSI
//! telephony platform and turns it into call bookkeeping:
//! - **envelope**: namespace-tolerant access to decoded event documents
//! - **normalizer**: flattens an envelope into a [`NormalizedEvent`]
//! - **registry**: the live call-to-user association table
//! - **dispatcher**: routes each event to the handler for its class
//! - **monitor**: the serial, paced consumer of the event queue
//! - **setup**: credential check, subscription and monitor lifecycle
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use xsi_monitor_core::prelude::*;
//!
//! # async fn example() {
//! let registry = CallRegistry::default();
//! let dispatcher = EventDispatcher::new();
//! let envelope = Envelope::from_value(json!({
//!     "xsi:Event": {
//!         "xsi:eventData": {
//!             "@xsi1:type": "xsi:ACDCallAddedEvent",
//!             "xsi:queueEntry": {"xsi:callId": "c1"}
//!         },
//!         "xsi:targetId": "q1"
//!     }
//! }));
//!
//! let event = normalize_event(&envelope);
//! dispatcher.dispatch(&event, &envelope, &registry).await;
//! assert_eq!(registry.user_for("c1").as_deref(), Some("q1"));
//! # }
//! ```
//!
//! ## Architecture
//!
//! Channel callbacks only enqueue raw envelopes. A single [`EventMonitor`]
//! task dequeues them in arrival order, so handlers never run concurrently
//! and the registry sees every call's "added" event before later events for
//! the same call. Call control, routing and agent-state reactions are
//! injected through the traits in [`handlers`].

#![doc(html_root_url = "https://docs.rs/xsi-monitor-core/0.1.0")]

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod monitor;
pub mod normalizer;
pub mod prelude;
pub mod push;
pub mod registry;
pub mod routing;
pub mod setup;

// Re-export main types
pub use config::{MonitorConfig, RoutingConfig};
pub use dispatcher::{DispatchOutcome, EventClass, EventDispatcher};
pub use envelope::Envelope;
pub use error::{MonitorError, NormalizationFault, Result};
pub use handlers::{
    AgentStateObserver, AgentStateUpdate, CallAddedContext, CallControl, CallDecision,
    CallRoutingPolicy,
};
pub use monitor::{event_queue, EventMonitor, MonitorExit, MonitorStats, MonitorStatsSnapshot};
pub use normalizer::{normalize, normalize_event, Normalization, NormalizedEvent};
pub use push::PushConnector;
pub use registry::CallRegistry;
pub use routing::BlockedCallerPolicy;
pub use setup::{
    EventChannel, MonitorSession, MonitorStatus, MonitorSupervisor, SessionConnector,
    StartOutcome, StaticTokenProvider, Subscription, TokenProvider, TokenStatus, XsiSession,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
