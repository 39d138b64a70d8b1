//! Integration tests for the monitor core
//!
//! These drive envelopes through the public API the way a running service
//! does: supervisor start, push channel, serial monitoring loop, registry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use xsi_monitor_core::prelude::*;

fn call_added(event_type: &str, call_id: &str, source: &str, target: &str) -> Envelope {
    Envelope::from_value(json!({
        "xsi:Event": {
            "xsi:eventData": {
                "@xsi1:type": event_type,
                "xsi:call": {
                    "xsi:callId": call_id,
                    "xsi:remoteParty": {
                        "xsi:userId": source,
                        "xsi:address": "tel:+15551230000",
                        "xsi:name": "Pat Caller"
                    }
                }
            },
            "xsi:targetId": target
        }
    }))
}

fn call_released(call_id: &str, target: &str) -> Envelope {
    Envelope::from_value(json!({
        "xsi:Event": {
            "xsi:eventData": {
                "@xsi1:type": "xsi:CallReleasedEvent",
                "xsi:call": {"xsi:callId": call_id}
            },
            "xsi:targetId": target
        }
    }))
}

fn supervisor_with(connector: &PushConnector, dispatcher: EventDispatcher) -> MonitorSupervisor {
    MonitorSupervisor::new(
        Arc::new(StaticTokenProvider::valid("admin-token")),
        Arc::new(connector.clone()),
        dispatcher,
        MonitorConfig::default().with_pacing(Duration::ZERO),
    )
}

/// Poll until the running monitor has processed `count` envelopes
async fn wait_for_received(supervisor: &MonitorSupervisor, count: u64) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(status) = supervisor.status().await {
                let stats = status.stats;
                if stats.received >= count && stats.processed + stats.skipped_empty >= count {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[derive(Default)]
struct RecordingCallControl {
    transfers: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl CallControl for RecordingCallControl {
    async fn reject(&self, _call_id: &str, _party: &str) -> xsi_monitor_core::Result<()> {
        Ok(())
    }

    async fn transfer(
        &self,
        call_id: &str,
        party: &str,
        destination: &str,
    ) -> xsi_monitor_core::Result<()> {
        self.transfers
            .lock()
            .push((call_id.to_string(), party.to_string(), destination.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn test_loop_survives_malformed_and_unrecognized_events() -> Result<()> {
    let connector = PushConnector::new();
    let supervisor = supervisor_with(&connector, EventDispatcher::new());
    assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);

    assert_ok!(connector.push(call_added("xsi:CallAddedEvent", "c1", "u1", "")));
    assert_ok!(connector.push(Envelope::from_value(json!({
        "xsi:Event": {"xsi:eventData": ["not", "an", "object"]}
    }))));
    assert_ok!(connector.push(Envelope::from_value(json!({
        "xsi:Event": {
            "xsi:eventData": {"@xsi1:type": "xsi:SubscriptionTerminatedEvent"},
            "xsi:targetId": "q1"
        }
    }))));
    wait_for_received(&supervisor, 3).await?;

    let session = supervisor.session().await.expect("monitor should be running");
    assert_eq!(session.registry.user_for("c1").as_deref(), Some("u1"));
    assert_eq!(session.registry.len(), 1);

    let stats = session.stats.snapshot();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.unhandled, 1);
    assert!(supervisor.is_running().await);

    assert!(supervisor.stop().await);
    assert!(!connector.has_active_channel());
    Ok(())
}

#[tokio::test]
async fn test_plain_call_added_document_end_to_end() -> Result<()> {
    let envelope = Envelope::from_json_str(
        r#"{"Event":{"eventData":{"@type":"CallAddedEvent","call":{"callId":"c1","remoteParty":{"userId":"u1"}}},"targetId":"q1"}}"#,
    )?;

    let event = normalize_event(&envelope);
    assert_eq!(
        event,
        NormalizedEvent {
            event_type: "CallAddedEvent".to_string(),
            call_id: "c1".to_string(),
            source_user_id: "u1".to_string(),
            target_id: "q1".to_string(),
        }
    );

    let registry = CallRegistry::default();
    let monitor = EventMonitor::new(
        EventDispatcher::new(),
        registry.clone(),
        Arc::new(MonitorStats::default()),
        Duration::ZERO,
    );
    let outcome = monitor.process(&envelope).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Registered {
            call_id: "c1".to_string(),
            party: "q1".to_string(),
        }
    );
    assert_eq!(registry.user_for("c1").as_deref(), Some("q1"));
    Ok(())
}

#[tokio::test]
async fn test_target_party_wins_over_source() -> Result<()> {
    let connector = PushConnector::new();
    let supervisor = supervisor_with(&connector, EventDispatcher::new());
    supervisor.start_monitoring().await;

    connector.push(call_added("xsi:ACDCallAddedEvent", "c1", "u1", "q1"))?;
    wait_for_received(&supervisor, 1).await?;

    let session = supervisor.session().await.expect("monitor should be running");
    assert_eq!(session.registry.user_for("c1").as_deref(), Some("q1"));

    supervisor.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_release_drops_association() -> Result<()> {
    let connector = PushConnector::new();
    let supervisor = supervisor_with(&connector, EventDispatcher::new());
    supervisor.start_monitoring().await;

    connector.push(call_added("xsi:CallAddedEvent", "c1", "u1", "q1"))?;
    connector.push(call_added("xsi:CallAddedEvent", "c2", "u2", "q1"))?;
    connector.push(call_released("c1", "q1"))?;
    wait_for_received(&supervisor, 3).await?;

    let session = supervisor.session().await.expect("monitor should be running");
    assert_eq!(session.registry.user_for("c1"), None);
    assert_eq!(session.registry.user_for("c2").as_deref(), Some("q1"));

    supervisor.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_blocked_caller_is_transferred_not_registered() -> Result<()> {
    let call_control = Arc::new(RecordingCallControl::default());
    let dispatcher = EventDispatcher::new()
        .with_routing_policy(Arc::new(BlockedCallerPolicy::new(["+15551230000"], "8889")))
        .with_call_control(call_control.clone());
    let registry = CallRegistry::default();

    let envelope = call_added("xsi:ACDCallAddedEvent", "c9", "u1", "q1");
    let event = normalize_event(&envelope);
    let outcome = dispatcher.dispatch(&event, &envelope, &registry).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Transferred {
            call_id: "c9".to_string(),
            party: "q1".to_string(),
            destination: "8889".to_string(),
        }
    );
    assert!(registry.is_empty());
    assert_eq!(
        call_control.transfers.lock().as_slice(),
        &[("c9".to_string(), "q1".to_string(), "8889".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_push_without_monitor_is_refused() {
    let connector = PushConnector::new();
    assert_err!(connector.push(Envelope::from_value(Value::Null)));
}

#[tokio::test]
async fn test_restart_after_stop_opens_new_channel() -> Result<()> {
    let connector = PushConnector::new();
    let supervisor = supervisor_with(&connector, EventDispatcher::new());

    assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);
    let first = supervisor.session().await.expect("running").id;
    supervisor.stop().await;

    assert_eq!(supervisor.start_monitoring().await, StartOutcome::Started);
    let second = supervisor.session().await.expect("running").id;
    assert_ne!(first, second);
    assert_eq!(connector.channels_opened(), 2);

    supervisor.stop().await;
    Ok(())
}
