//! # Event Normalizer
//!
//! Flattens a nested XSI envelope into a [`NormalizedEvent`]. The canonical
//! fields live on a fixed path:
//!
//! | field            | path                                        |
//! |------------------|---------------------------------------------|
//! | `event_type`     | `Event.eventData.@type`                     |
//! | `call_id`        | `Event.eventData.call.callId`               |
//! | `source_user_id` | `Event.eventData.call.remoteParty.userId`   |
//! | `target_id`      | `Event.targetId`                            |
//!
//! ACD queue events carry the call under `queueEntry` instead of `call`, so
//! when `call` is absent the call fields are read from there.
//!
//! A missing key only empties the field it feeds. A value of the wrong type
//! anywhere on the path degrades the whole record to empty and reports the
//! fault, so callers can tell "nothing there" from "could not read it".

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::envelope::{Envelope, Lookup};
use crate::error::NormalizationFault;

const EVENT: &str = "Event";
const EVENT_DATA: &str = "eventData";
const TYPE_ATTR: &str = "@type";
const TARGET_ID: &str = "targetId";
const CALL: &str = "call";
const QUEUE_ENTRY: &str = "queueEntry";
const CALL_ID: &str = "callId";
const REMOTE_PARTY: &str = "remoteParty";
const USER_ID: &str = "userId";

/// Canonical flat view of one XSI event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Semantic event class as sent, e.g. `xsi:ACDCallAddedEvent`
    pub event_type: String,
    /// Call leg identifier assigned by the platform
    pub call_id: String,
    /// Party that is the subject of the event
    pub source_user_id: String,
    /// Destination, queue or endpoint the event targets
    pub target_id: String,
}

impl NormalizedEvent {
    /// True when every field is empty
    pub fn is_empty(&self) -> bool {
        self.event_type.is_empty()
            && self.call_id.is_empty()
            && self.source_user_id.is_empty()
            && self.target_id.is_empty()
    }

    /// Target takes precedence; the source is the internal party otherwise
    pub fn internal_party(&self) -> &str {
        if self.target_id.is_empty() {
            &self.source_user_id
        } else {
            &self.target_id
        }
    }
}

/// Result of normalizing one envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Normalization {
    /// The canonical path was readable (fields may still be empty)
    Complete(NormalizedEvent),
    /// The envelope had an unexpected shape; `event` is all-empty
    Degraded {
        event: NormalizedEvent,
        fault: NormalizationFault,
    },
}

impl Normalization {
    /// The record, whichever way normalization went
    pub fn event(&self) -> &NormalizedEvent {
        match self {
            Self::Complete(event) => event,
            Self::Degraded { event, .. } => event,
        }
    }

    /// Consume into the record
    pub fn into_event(self) -> NormalizedEvent {
        match self {
            Self::Complete(event) => event,
            Self::Degraded { event, .. } => event,
        }
    }

    /// Whether the envelope was degraded
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Normalize an envelope; never fails
pub fn normalize(envelope: &Envelope) -> Normalization {
    match extract(envelope) {
        Ok(event) => {
            debug!(
                event_type = %event.event_type,
                call_id = %event.call_id,
                "Normalized event"
            );
            Normalization::Complete(event)
        }
        Err(fault) => {
            error!("❌ Error extracting event details: {}", fault);
            Normalization::Degraded {
                event: NormalizedEvent::default(),
                fault,
            }
        }
    }
}

/// Shorthand for callers that only want the record
pub fn normalize_event(envelope: &Envelope) -> NormalizedEvent {
    normalize(envelope).into_event()
}

fn extract(envelope: &Envelope) -> Result<NormalizedEvent, NormalizationFault> {
    if !envelope.as_value().is_object() {
        return Err(NormalizationFault::NotAnObject {
            found: crate::envelope::value_kind(envelope.as_value()),
        });
    }

    let event_type = envelope.string_at(&[EVENT, EVENT_DATA, TYPE_ATTR])?;
    let target_id = envelope.string_at(&[EVENT, TARGET_ID])?;

    // A present `call` is always read, so a malformed one is reported
    let call_node = match envelope.lookup(&[EVENT, EVENT_DATA, CALL]) {
        Lookup::Missing if envelope.has_object(&[EVENT, EVENT_DATA, QUEUE_ENTRY]) => QUEUE_ENTRY,
        _ => CALL,
    };
    let call_id = envelope.string_at(&[EVENT, EVENT_DATA, call_node, CALL_ID])?;
    let source_user_id =
        envelope.string_at(&[EVENT, EVENT_DATA, call_node, REMOTE_PARTY, USER_ID])?;

    Ok(NormalizedEvent {
        event_type: event_type.unwrap_or_default().to_string(),
        call_id: call_id.unwrap_or_default().to_string(),
        source_user_id: source_user_id.unwrap_or_default().to_string(),
        target_id: target_id.unwrap_or_default().to_string(),
    })
}
