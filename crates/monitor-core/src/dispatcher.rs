//! # Event Dispatcher
//!
//! Routes a [`NormalizedEvent`] to the handling logic for its class.
//!
//! The vendor's event vocabulary is much larger than what this system handles,
//! so unrecognized types are logged and dropped rather than treated as errors.
//! Every fault raised while handling one event, including a panic inside an
//! injected capability, stops at this boundary and comes back as
//! [`DispatchOutcome::Failed`].
//!
//! ## Call-added flow
//!
//! ```text
//! CallAdded ──► internal party = target_id || source_user_id
//!           ──► CallRoutingPolicy::decide
//!                 ├─ Register  ──► registry.register(call_id, party)
//!                 ├─ Reject    ──► CallControl::reject
//!                 ├─ Transfer  ──► CallControl::transfer
//!                 └─ Ignore
//! ```
//!
//! The association is only recorded once the policy has decided to keep the
//! call; rejected, transferred and ignored calls never enter the registry.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::envelope::{local_name, Envelope};
use crate::error::{MonitorError, Result};
use crate::handlers::{
    AgentStateObserver, AgentStateUpdate, CallAddedContext, CallControl, CallDecision,
    CallRoutingPolicy, LoggingAgentStateObserver, RegisterAllPolicy, UnconfiguredCallControl,
};
use crate::normalizer::NormalizedEvent;
use crate::registry::CallRegistry;

/// Event classes the dispatcher knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// A call was offered to a user or queue
    CallAdded,
    /// A call left the user or queue
    CallReleased,
    /// An agent changed ACD state
    AgentState,
    /// Anything else
    Unrecognized,
}

impl EventClass {
    /// Classify by the local name of the event type
    pub fn from_event_type(event_type: &str) -> Self {
        match local_name(event_type).as_ref() {
            "CallAddedEvent" | "ACDCallAddedEvent" => Self::CallAdded,
            "CallReleasedEvent" | "ACDCallReleasedEvent" | "ACDCallAbandonedEvent" => {
                Self::CallReleased
            }
            "AgentStateEvent" => Self::AgentState,
            _ => Self::Unrecognized,
        }
    }
}

/// What dispatching one event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Normalization produced nothing; no handler ran
    SkippedEmpty,
    /// Call associated with its internal party
    Registered { call_id: String, party: String },
    /// Call rejected through call control
    Rejected { call_id: String, party: String },
    /// Call transferred through call control
    Transferred {
        call_id: String,
        party: String,
        destination: String,
    },
    /// Policy chose to leave the call alone
    Ignored { call_id: String, party: String },
    /// Call finished; `user` is the association that was dropped
    Released {
        call_id: String,
        user: Option<String>,
    },
    /// Agent state change delivered to the observer
    AgentStateObserved { agent_id: String },
    /// No handler for this event type
    Unhandled { event_type: String },
    /// Handling failed; the error has been logged
    Failed { event_type: String, error: String },
}

impl DispatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Selects and invokes the handler for each event
#[derive(Clone)]
pub struct EventDispatcher {
    routing: Arc<dyn CallRoutingPolicy>,
    call_control: Arc<dyn CallControl>,
    agent_state: Arc<dyn AgentStateObserver>,
}

impl EventDispatcher {
    /// Dispatcher that registers every call and has no call control
    pub fn new() -> Self {
        Self {
            routing: Arc::new(RegisterAllPolicy),
            call_control: Arc::new(UnconfiguredCallControl),
            agent_state: Arc::new(LoggingAgentStateObserver),
        }
    }

    pub fn with_routing_policy(mut self, policy: Arc<dyn CallRoutingPolicy>) -> Self {
        self.routing = policy;
        self
    }

    pub fn with_call_control(mut self, call_control: Arc<dyn CallControl>) -> Self {
        self.call_control = call_control;
        self
    }

    pub fn with_agent_state_observer(mut self, observer: Arc<dyn AgentStateObserver>) -> Self {
        self.agent_state = observer;
        self
    }

    /// Dispatch one event; never fails and never panics outward
    pub async fn dispatch(
        &self,
        event: &NormalizedEvent,
        envelope: &Envelope,
        registry: &CallRegistry,
    ) -> DispatchOutcome {
        if event.is_empty() {
            info!("Event details could not be extracted.");
            return DispatchOutcome::SkippedEmpty;
        }

        let guarded = AssertUnwindSafe(self.try_dispatch(event, envelope, registry))
            .catch_unwind()
            .await;
        match guarded {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(
                    "❌ Error handling call event {}: {} ({:?})",
                    event.event_type, e, event
                );
                DispatchOutcome::Failed {
                    event_type: event.event_type.clone(),
                    error: e.to_string(),
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    "🚨 Handler panicked on {}: {} ({:?})",
                    event.event_type, message, event
                );
                DispatchOutcome::Failed {
                    event_type: event.event_type.clone(),
                    error: format!("handler panicked: {message}"),
                }
            }
        }
    }

    async fn try_dispatch(
        &self,
        event: &NormalizedEvent,
        envelope: &Envelope,
        registry: &CallRegistry,
    ) -> Result<DispatchOutcome> {
        match EventClass::from_event_type(&event.event_type) {
            EventClass::CallAdded => self.handle_call_added(event, envelope, registry).await,
            EventClass::CallReleased => Ok(self.handle_call_released(event, registry)),
            EventClass::AgentState => self.handle_agent_state(event, envelope).await,
            EventClass::Unrecognized => {
                info!("Unhandled event type {}", event.event_type);
                Ok(DispatchOutcome::Unhandled {
                    event_type: event.event_type.clone(),
                })
            }
        }
    }

    async fn handle_call_added(
        &self,
        event: &NormalizedEvent,
        envelope: &Envelope,
        registry: &CallRegistry,
    ) -> Result<DispatchOutcome> {
        let call_id = event.call_id.as_str();
        let party = event.internal_party();
        info!(
            "📞 Handling call event. Type: {}, Call ID: {}, Caller: {}, Call Receiver: {}",
            event.event_type, call_id, event.source_user_id, event.target_id
        );

        if call_id.is_empty() {
            return Err(MonitorError::dispatch(
                &event.event_type,
                "call-added event has no call id",
            ));
        }
        if party.is_empty() {
            return Err(MonitorError::dispatch(
                &event.event_type,
                "call-added event has neither target nor source party",
            ));
        }

        let ctx = CallAddedContext {
            event,
            envelope,
            internal_party: party,
        };
        let decision = self.routing.decide(&ctx).await?;
        debug!("Routing decision for call {}: {:?}", call_id, decision);

        let outcome = match decision {
            CallDecision::Register => {
                registry.register(call_id, party);
                DispatchOutcome::Registered {
                    call_id: call_id.to_string(),
                    party: party.to_string(),
                }
            }
            CallDecision::Reject => {
                self.call_control
                    .reject(call_id, party)
                    .await
                    .map_err(|e| call_control_fault(call_id, "reject", e))?;
                info!("Rejected call {} for {}", call_id, party);
                DispatchOutcome::Rejected {
                    call_id: call_id.to_string(),
                    party: party.to_string(),
                }
            }
            CallDecision::Transfer { destination } => {
                self.call_control
                    .transfer(call_id, party, &destination)
                    .await
                    .map_err(|e| call_control_fault(call_id, "transfer", e))?;
                info!("Transferred call {} from {} to {}", call_id, party, destination);
                DispatchOutcome::Transferred {
                    call_id: call_id.to_string(),
                    party: party.to_string(),
                    destination,
                }
            }
            CallDecision::Ignore => DispatchOutcome::Ignored {
                call_id: call_id.to_string(),
                party: party.to_string(),
            },
        };
        Ok(outcome)
    }

    fn handle_call_released(
        &self,
        event: &NormalizedEvent,
        registry: &CallRegistry,
    ) -> DispatchOutcome {
        let user = registry.release(&event.call_id);
        if user.is_none() {
            debug!("Release for unknown call {}", event.call_id);
        }
        DispatchOutcome::Released {
            call_id: event.call_id.clone(),
            user,
        }
    }

    async fn handle_agent_state(
        &self,
        event: &NormalizedEvent,
        envelope: &Envelope,
    ) -> Result<DispatchOutcome> {
        let update = AgentStateUpdate::from_envelope(event, envelope);
        if update.state.is_none() {
            warn!("Agent state event for {} carries no state", update.agent_id);
        }
        self.agent_state.on_agent_state(&update).await?;
        Ok(DispatchOutcome::AgentStateObserved {
            agent_id: update.agent_id,
        })
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

/// Attach the call id to a call-control failure
fn call_control_fault(call_id: &str, action: &str, error: MonitorError) -> MonitorError {
    match error {
        MonitorError::CallControl { .. } => error,
        other => MonitorError::call_control(call_id, format!("{action} failed: {other}")),
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
