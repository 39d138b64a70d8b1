//! # Monitoring Loop
//!
//! The single consumer of the event queue. Each iteration waits for one
//! envelope, normalizes it, dispatches it, then sleeps for the pacing delay
//! before taking the next one:
//!
//! ```text
//!   ┌──────────────────┐  envelope  ┌────────────┐  event  ┌────────────┐
//!   │ WAITING_FOR_EVENT│───────────►│ normalize  │────────►│  dispatch  │
//!   └──────────────────┘            └────────────┘         └─────┬──────┘
//!            ▲                                                   │
//!            └──────────────────── pacing delay ◄────────────────┘
//! ```
//!
//! Events are processed strictly in arrival order; nothing runs in parallel,
//! so a call's "added" event is always registered before any later event for
//! the same call is looked at. A bad envelope or a failing handler is logged
//! and counted, never allowed to end the loop. The loop only stops when its
//! cancellation token fires or every producer has gone away. Cancellation
//! also interrupts a handler that is still running.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::envelope::Envelope;
use crate::normalizer::normalize;
use crate::registry::CallRegistry;

/// Producer side of the event queue
pub type EnvelopeSender = mpsc::UnboundedSender<Envelope>;

/// Consumer side of the event queue
pub type EnvelopeReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Create a fresh unbounded event queue
pub fn event_queue() -> (EnvelopeSender, EnvelopeReceiver) {
    mpsc::unbounded_channel()
}

/// Counters kept by the monitoring loop
#[derive(Debug, Default)]
pub struct MonitorStats {
    received: AtomicU64,
    processed: AtomicU64,
    skipped_empty: AtomicU64,
    degraded: AtomicU64,
    unhandled: AtomicU64,
    dispatch_faults: AtomicU64,
}

/// Point-in-time copy of [`MonitorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub skipped_empty: u64,
    pub degraded: u64,
    pub unhandled: u64,
    pub dispatch_faults: u64,
}

impl MonitorStats {
    pub fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped_empty: self.skipped_empty.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            dispatch_faults: self.dispatch_faults.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Why the monitoring loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Shutdown was requested
    Cancelled,
    /// Every producer dropped its sender
    ChannelClosed,
}

/// Consumes envelopes and feeds them through normalize and dispatch
pub struct EventMonitor {
    dispatcher: EventDispatcher,
    registry: CallRegistry,
    stats: Arc<MonitorStats>,
    pacing: Duration,
}

impl EventMonitor {
    pub fn new(
        dispatcher: EventDispatcher,
        registry: CallRegistry,
        stats: Arc<MonitorStats>,
        pacing: Duration,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            stats,
            pacing,
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    /// Normalize and dispatch a single envelope
    pub async fn process(&self, envelope: &Envelope) -> DispatchOutcome {
        debug!("Event Received: {}", envelope.as_value());

        let normalization = normalize(envelope);
        if normalization.is_degraded() {
            MonitorStats::bump(&self.stats.degraded);
        }

        let outcome = self
            .dispatcher
            .dispatch(normalization.event(), envelope, &self.registry)
            .await;

        match &outcome {
            DispatchOutcome::Unhandled { .. } => MonitorStats::bump(&self.stats.unhandled),
            DispatchOutcome::Failed { .. } => MonitorStats::bump(&self.stats.dispatch_faults),
            _ => {}
        }
        MonitorStats::bump(&self.stats.processed);
        outcome
    }

    /// Run until cancelled or until the queue has no producers left
    pub async fn run(
        self,
        mut queue: EnvelopeReceiver,
        shutdown: CancellationToken,
    ) -> MonitorExit {
        info!("👀 Starting agent event monitor (pacing {:?})", self.pacing);
        let mut sequence: u64 = 0;

        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("🛑 Agent event monitor cancelled after {} events", sequence);
                    return MonitorExit::Cancelled;
                }
                next = queue.recv() => match next {
                    Some(envelope) => envelope,
                    None => {
                        warn!("Event queue closed after {} events; monitor exiting", sequence);
                        return MonitorExit::ChannelClosed;
                    }
                },
            };

            sequence += 1;
            MonitorStats::bump(&self.stats.received);

            if envelope.is_empty() {
                debug!("Skipping empty envelope #{}", sequence);
                MonitorStats::bump(&self.stats.skipped_empty);
                continue;
            }

            let span = info_span!("xsi_event", seq = sequence);
            let guarded =
                AssertUnwindSafe(self.process(&envelope).instrument(span)).catch_unwind();
            let processed = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    warn!("🛑 Agent event monitor cancelled while handling event #{}", sequence);
                    return MonitorExit::Cancelled;
                }
                processed = guarded => processed,
            };
            if processed.is_err() {
                error!("🚨 Error in the monitoring loop on event #{}; continuing", sequence);
                MonitorStats::bump(&self.stats.dispatch_faults);
            }

            if !self.pacing.is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!("🛑 Agent event monitor cancelled after {} events", sequence);
                        return MonitorExit::Cancelled;
                    }
                    _ = tokio::time::sleep(self.pacing) => {}
                }
            }
        }
    }
}
