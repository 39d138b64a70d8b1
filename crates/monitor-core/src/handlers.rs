//! # Handler Capabilities
//!
//! Extension points the dispatcher calls into. Each capability is injected
//! when the [`EventDispatcher`](crate::dispatcher::EventDispatcher) is built,
//! so routing rules and call-control backends can be swapped without touching
//! the dispatch core.
//!
//! - [`CallRoutingPolicy`] decides what happens to a newly added call
//! - [`CallControl`] carries out reject and transfer actions
//! - [`AgentStateObserver`] receives agent state changes
//!
//! ## Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use xsi_monitor_core::handlers::{CallAddedContext, CallDecision, CallRoutingPolicy};
//! use xsi_monitor_core::Result;
//!
//! struct RejectAnonymous;
//!
//! #[async_trait]
//! impl CallRoutingPolicy for RejectAnonymous {
//!     async fn decide(&self, ctx: &CallAddedContext<'_>) -> Result<CallDecision> {
//!         if ctx.event.source_user_id.is_empty() {
//!             Ok(CallDecision::Reject)
//!         } else {
//!             Ok(CallDecision::Register)
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::envelope::Envelope;
use crate::error::{MonitorError, Result};
use crate::normalizer::NormalizedEvent;

/// Everything a routing policy may look at for a call-added event
#[derive(Debug, Clone, Copy)]
pub struct CallAddedContext<'a> {
    /// The normalized record
    pub event: &'a NormalizedEvent,
    /// The raw envelope, for fields outside the canonical four
    pub envelope: &'a Envelope,
    /// Target if present, else source
    pub internal_party: &'a str,
}

impl<'a> CallAddedContext<'a> {
    /// Remote party address without its URI scheme (`tel:+1555` -> `+1555`)
    pub fn caller_number(&self) -> Option<&'a str> {
        let envelope: &'a Envelope = self.envelope;
        ["call", "queueEntry"]
            .iter()
            .find_map(|node| {
                envelope
                    .text(&["Event", "eventData", *node, "remoteParty", "address"])
            })
            .map(strip_uri_scheme)
            .filter(|number| !number.is_empty())
    }

    /// Remote party display name, lower-cased
    pub fn caller_name(&self) -> Option<String> {
        ["call", "queueEntry"]
            .iter()
            .find_map(|node| {
                self.envelope
                    .text(&["Event", "eventData", *node, "remoteParty", "name"])
            })
            .map(str::to_lowercase)
    }
}

/// What to do with a newly added call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallDecision {
    /// Associate the call with the internal party
    Register,
    /// Reject the call
    Reject,
    /// Transfer the call elsewhere
    Transfer { destination: String },
    /// Leave the call alone
    Ignore,
}

/// Decides the fate of call-added events
#[async_trait]
pub trait CallRoutingPolicy: Send + Sync {
    async fn decide(&self, ctx: &CallAddedContext<'_>) -> Result<CallDecision>;
}

/// Registers every call with its internal party
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterAllPolicy;

#[async_trait]
impl CallRoutingPolicy for RegisterAllPolicy {
    async fn decide(&self, _ctx: &CallAddedContext<'_>) -> Result<CallDecision> {
        Ok(CallDecision::Register)
    }
}

/// Call-control actions against the telephony platform
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Reject a call offered to `party`
    async fn reject(&self, call_id: &str, party: &str) -> Result<()>;

    /// Transfer a call held by `party` to `destination`
    async fn transfer(&self, call_id: &str, party: &str, destination: &str) -> Result<()>;
}

/// Placeholder until a call-control backend is wired in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCallControl;

#[async_trait]
impl CallControl for UnconfiguredCallControl {
    async fn reject(&self, call_id: &str, _party: &str) -> Result<()> {
        warn!("No call control configured; cannot reject call {}", call_id);
        Err(MonitorError::not_implemented("call reject"))
    }

    async fn transfer(&self, call_id: &str, _party: &str, _destination: &str) -> Result<()> {
        warn!("No call control configured; cannot transfer call {}", call_id);
        Err(MonitorError::not_implemented("call transfer"))
    }
}

/// Agent state as carried by an `AgentStateEvent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStateUpdate {
    /// Agent the event targets
    pub agent_id: String,
    /// New state, e.g. `Available` or `Wrap-Up`
    pub state: Option<String>,
    /// Call the agent is wrapping up, if any
    pub wrap_up_call_id: Option<String>,
}

impl AgentStateUpdate {
    /// Pull the agent state fields out of an envelope
    pub fn from_envelope(event: &NormalizedEvent, envelope: &Envelope) -> Self {
        let field = |name: &str| {
            envelope
                .text(&["Event", "eventData", "agentStateInfo", name])
                .map(str::to_string)
        };
        Self {
            agent_id: event.target_id.clone(),
            state: field("state"),
            wrap_up_call_id: field("wrapUpCallId"),
        }
    }
}

/// Receives agent state changes
#[async_trait]
pub trait AgentStateObserver: Send + Sync {
    async fn on_agent_state(&self, update: &AgentStateUpdate) -> Result<()>;
}

/// Logs agent state changes and nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAgentStateObserver;

#[async_trait]
impl AgentStateObserver for LoggingAgentStateObserver {
    async fn on_agent_state(&self, update: &AgentStateUpdate) -> Result<()> {
        info!(
            "👤 Agent {} is now {}",
            update.agent_id,
            update.state.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

fn strip_uri_scheme(address: &str) -> &str {
    address.rsplit(':').next().unwrap_or(address)
}
