use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::SessionInfo;
use crate::guard::{AlertEvent, GuardTransition};
use crate::health::EyeHealthScore;

/// Everything a session reports to the outside: display, protect surface, alert sink and the
/// history view all listen on the same stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        session_id: String,
        started_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Score {
        session_id: String,
        score: EyeHealthScore,
    },
    #[serde(rename_all = "camelCase")]
    Guard {
        session_id: String,
        transition: GuardTransition,
    },
    #[serde(rename_all = "camelCase")]
    Alert {
        session_id: String,
        alert: AlertEvent,
    },
    #[serde(rename_all = "camelCase")]
    SessionPaused { session_id: String },
    #[serde(rename_all = "camelCase")]
    SessionResumed { session_id: String },
    SessionCompleted { session: SessionInfo },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Having no subscribers is not an error.
    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = MonitorEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}
