//! # Prelude
//!
//! Brings the common monitor types and traits into scope with
//! `use xsi_monitor_core::prelude::*;`

pub use crate::config::{MonitorConfig, RoutingConfig};
pub use crate::dispatcher::{DispatchOutcome, EventDispatcher};
pub use crate::envelope::Envelope;
pub use crate::error::{MonitorError, Result};
pub use crate::handlers::{
    AgentStateObserver, AgentStateUpdate, CallAddedContext, CallControl, CallDecision,
    CallRoutingPolicy,
};
pub use crate::monitor::{event_queue, EventMonitor, MonitorExit, MonitorStats};
pub use crate::normalizer::{normalize, normalize_event, Normalization, NormalizedEvent};
pub use crate::push::PushConnector;
pub use crate::registry::CallRegistry;
pub use crate::routing::BlockedCallerPolicy;
pub use crate::setup::{
    MonitorSupervisor, SessionConnector, StartOutcome, StaticTokenProvider, TokenProvider,
    TokenStatus,
};
