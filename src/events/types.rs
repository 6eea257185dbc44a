use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::events;
use crate::models::{Record, RecordKind};
use crate::tracking::EntryChange;

/// Every event the relay publishes
///
/// ```rust
/// use relay_core::events::BridgeEvent;
/// use relay_core::models::Record;
/// use chrono::Utc;
///
/// let event = BridgeEvent::NewEntry(Record::message("m1", "SCOPE-1", "Hello", Utc::now()));
/// assert_eq!(event.name(), "new-entry");
///
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["event_type"], "new-entry");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub enum BridgeEvent {
    NewEntry(Record),
    UpdatedEntry(Record),
    MessageSendError(SendErrorEvent),
    MessageTimeout(TimeoutEvent),
    ParticipantAdded(StructuralChangeEvent),
    ParticipantRemoved(StructuralChangeEvent),
    ParticipantLeft(StructuralChangeEvent),
    NameChange(StructuralChangeEvent),
    GroupIconChanged(StructuralChangeEvent),
    GroupIconRemoved(StructuralChangeEvent),
    PollError(PollErrorEvent),
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::NewEntry(_) => events::NEW_ENTRY,
            BridgeEvent::UpdatedEntry(_) => events::UPDATED_ENTRY,
            BridgeEvent::MessageSendError(_) => events::MESSAGE_SEND_ERROR,
            BridgeEvent::MessageTimeout(_) => events::MESSAGE_TIMEOUT,
            BridgeEvent::ParticipantAdded(_) => events::PARTICIPANT_ADDED,
            BridgeEvent::ParticipantRemoved(_) => events::PARTICIPANT_REMOVED,
            BridgeEvent::ParticipantLeft(_) => events::PARTICIPANT_LEFT,
            BridgeEvent::NameChange(_) => events::NAME_CHANGE,
            BridgeEvent::GroupIconChanged(_) => events::GROUP_ICON_CHANGED,
            BridgeEvent::GroupIconRemoved(_) => events::GROUP_ICON_REMOVED,
            BridgeEvent::PollError(_) => events::POLL_ERROR,
        }
    }

    pub fn entry(change: EntryChange, record: Record) -> Self {
        match change {
            EntryChange::New => BridgeEvent::NewEntry(record),
            EntryChange::Updated => BridgeEvent::UpdatedEntry(record),
        }
    }

    /// Map a structural record to its event; `None` for plain messages
    pub fn structural(record: &Record) -> Option<Self> {
        let change = StructuralChangeEvent::from_record(record);
        let event = match &record.kind {
            RecordKind::Message => return None,
            RecordKind::ParticipantAdded { .. } => BridgeEvent::ParticipantAdded(change),
            RecordKind::ParticipantRemoved { .. } => BridgeEvent::ParticipantRemoved(change),
            RecordKind::ParticipantLeft => BridgeEvent::ParticipantLeft(change),
            RecordKind::NameChange { .. } => BridgeEvent::NameChange(change),
            RecordKind::GroupIconChanged => BridgeEvent::GroupIconChanged(change),
            RecordKind::GroupIconRemoved => BridgeEvent::GroupIconRemoved(change),
        };
        Some(event)
    }

    /// Record carried by entry and send-error events
    pub fn record(&self) -> Option<&Record> {
        match self {
            BridgeEvent::NewEntry(record) | BridgeEvent::UpdatedEntry(record) => Some(record),
            BridgeEvent::MessageSendError(event) => Some(&event.record),
            _ => None,
        }
    }
}

/// A self-authored record the foreign writer failed to commit, with no caller waiting on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendErrorEvent {
    pub record: Record,
    pub error_code: i64,
}

/// A correlation that expired before any matching record was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutEvent {
    pub correlation_id: Uuid,
    pub chat_scope: String,
    pub is_attachment: bool,
    pub waited_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChangeEvent {
    pub record_identity: String,
    pub chat_scope: String,
    /// Handle that performed the change, `None` when it was this account
    pub actor: Option<String>,
    pub participant: Option<String>,
    pub new_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StructuralChangeEvent {
    pub fn from_record(record: &Record) -> Self {
        let (participant, new_name) = match &record.kind {
            RecordKind::ParticipantAdded { participant }
            | RecordKind::ParticipantRemoved { participant } => (Some(participant.clone()), None),
            RecordKind::NameChange { new_name } => (None, new_name.clone()),
            _ => (None, None),
        };
        Self {
            record_identity: record.identity.clone(),
            chat_scope: record.chat_scope.clone(),
            actor: if record.is_from_me {
                None
            } else {
                record.handle.clone()
            },
            participant,
            new_name,
            occurred_at: record.created_at,
        }
    }
}

/// Diagnostic emitted when a listener's retrieval fails; the listener keeps running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollErrorEvent {
    pub listener: String,
    pub error: String,
    pub window_after: DateTime<Utc>,
    pub window_before: DateTime<Utc>,
}
