//! Caller blocking for call-center queues
//!
//! Blocked callers are not rejected outright: they are transferred to an
//! unused extension so the queue never offers them to an agent.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;

use crate::config::RoutingConfig;
use crate::error::Result;
use crate::handlers::{CallAddedContext, CallDecision, CallRoutingPolicy};

/// Diverts a fixed list of caller numbers, registers everyone else
#[derive(Debug, Clone)]
pub struct BlockedCallerPolicy {
    blocked: HashSet<String>,
    destination: String,
}

impl BlockedCallerPolicy {
    pub fn new<I, S>(blocked: I, destination: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: blocked.into_iter().map(Into::into).collect(),
            destination: destination.into(),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.blocked_callers.iter().cloned(), config.block_destination.clone())
    }

    pub fn is_blocked(&self, number: &str) -> bool {
        self.blocked.contains(number)
    }
}

#[async_trait]
impl CallRoutingPolicy for BlockedCallerPolicy {
    async fn decide(&self, ctx: &CallAddedContext<'_>) -> Result<CallDecision> {
        match ctx.caller_number() {
            Some(number) if self.is_blocked(number) => {
                info!(
                    "🚫 Blocked caller {} on call {}; diverting to {}",
                    number, ctx.event.call_id, self.destination
                );
                Ok(CallDecision::Transfer {
                    destination: self.destination.clone(),
                })
            }
            _ => Ok(CallDecision::Register),
        }
    }
}
