use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All observable workflow events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new run was created for a URL.
    #[serde(rename = "run.created")]
    RunCreated { run_id: Uuid, url: String },

    /// Run status changed.
    #[serde(rename = "run.status_changed")]
    RunStatusChanged {
        run_id: Uuid,
        from_status: String,
        to_status: String,
    },

    /// A phase started executing.
    #[serde(rename = "phase.started")]
    PhaseStarted { run_id: Uuid, phase: String },

    /// A phase finished and its update was applied.
    #[serde(rename = "phase.completed")]
    PhaseCompleted {
        run_id: Uuid,
        phase: String,
        success: bool,
    },

    /// The engine yielded at a human checkpoint.
    #[serde(rename = "run.suspended")]
    RunSuspended { run_id: Uuid, point: String },

    /// A suspended run was resumed, possibly with a human patch.
    #[serde(rename = "run.resumed")]
    RunResumed {
        run_id: Uuid,
        point: String,
        with_patch: bool,
    },

    /// A sandbox execution finished.
    #[serde(rename = "verification.completed")]
    VerificationCompleted {
        run_id: Uuid,
        passed: bool,
        attempt: u32,
    },

    /// The run reached a terminal state.
    #[serde(rename = "run.completed")]
    RunCompleted { run_id: Uuid, status: String },

    /// Generic error event.
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// The run this event belongs to, if any.
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Event::RunCreated { run_id, .. } => Some(*run_id),
            Event::RunStatusChanged { run_id, .. } => Some(*run_id),
            Event::PhaseStarted { run_id, .. } => Some(*run_id),
            Event::PhaseCompleted { run_id, .. } => Some(*run_id),
            Event::RunSuspended { run_id, .. } => Some(*run_id),
            Event::RunResumed { run_id, .. } => Some(*run_id),
            Event::VerificationCompleted { run_id, .. } => Some(*run_id),
            Event::RunCompleted { run_id, .. } => Some(*run_id),
            Event::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let event = Event::RunCreated {
            run_id: Uuid::new_v4(),
            url: "https://example.test".to_string(),
        };
        let envelope = EventEnvelope::new(event);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::RunStatusChanged {
            run_id: Uuid::new_v4(),
            from_status: "verifying".to_string(),
            to_status: "final_review".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("run.status_changed"));
        assert!(json.contains("final_review"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"verification.completed","run_id":"550e8400-e29b-41d4-a716-446655440000","passed":true,"attempt":2}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::VerificationCompleted {
                passed, attempt, ..
            } => {
                assert!(passed);
                assert_eq!(attempt, 2);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_run_id() {
        let run_id = Uuid::new_v4();
        let event = Event::RunSuspended {
            run_id,
            point: "plan_review".to_string(),
        };
        assert_eq!(event.run_id(), Some(run_id));

        let error = Event::Error {
            message: "boom".to_string(),
            context: None,
        };
        assert_eq!(error.run_id(), None);
    }
}
