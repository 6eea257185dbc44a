use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a row in the foreign store represents.
///
/// Structural kinds carry the minimal payload needed to describe the change; the chat and
/// handle entities they refer to are resolved by identity, never owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKind {
    Message,
    ParticipantAdded { participant: String },
    ParticipantRemoved { participant: String },
    ParticipantLeft,
    NameChange { new_name: Option<String> },
    GroupIconChanged,
    GroupIconRemoved,
}

impl RecordKind {
    pub fn is_structural(&self) -> bool {
        !matches!(self, RecordKind::Message)
    }
}

/// Attachment transfer reference as stored by the foreign server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub identity: String,
    pub transfer_name: String,
    pub mime_type: Option<String>,
}

/// Immutable, identity-keyed projection of one foreign-store row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque, stable identity assigned by the foreign store
    pub identity: String,
    /// Chat the record belongs to, possibly carrying a service prefix
    pub chat_scope: String,
    /// Handle of the other party for incoming records, `None` for self-authored ones
    pub handle: Option<String>,
    pub is_from_me: bool,
    pub kind: RecordKind,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub retracted_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
    /// Non-zero when the foreign writer failed to commit the record
    pub error_code: i64,
    pub did_notify_recipient: bool,
}

impl Record {
    /// Plain text message with every lifecycle field unset
    pub fn message(
        identity: impl Into<String>,
        chat_scope: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            chat_scope: chat_scope.into(),
            handle: None,
            is_from_me: false,
            kind: RecordKind::Message,
            text: Some(text.into()),
            attachments: Vec::new(),
            created_at,
            delivered_at: None,
            read_at: None,
            edited_at: None,
            retracted_at: None,
            is_sent: false,
            error_code: 0,
            did_notify_recipient: false,
        }
    }

    /// Structural change row
    pub fn structural(
        identity: impl Into<String>,
        chat_scope: impl Into<String>,
        kind: RecordKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            text: None,
            is_sent: true,
            ..Self::message(identity, chat_scope, "", created_at)
        }
    }

    pub fn from_me(mut self, is_from_me: bool) -> Self {
        self.is_from_me = is_from_me;
        self
    }

    pub fn sent(mut self, is_sent: bool) -> Self {
        self.is_sent = is_sent;
        self
    }

    pub fn with_error(mut self, error_code: i64) -> Self {
        self.error_code = error_code;
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_attachment(mut self, transfer_name: impl Into<String>) -> Self {
        let transfer_name = transfer_name.into();
        self.attachments.push(AttachmentRef {
            identity: format!("{}-att-{}", self.identity, self.attachments.len()),
            transfer_name,
            mime_type: None,
        });
        self
    }

    pub fn delivered(mut self, at: DateTime<Utc>) -> Self {
        self.delivered_at = Some(at);
        self
    }

    pub fn read(mut self, at: DateTime<Utc>) -> Self {
        self.read_at = Some(at);
        self
    }

    pub fn edited(mut self, at: DateTime<Utc>) -> Self {
        self.edited_at = Some(at);
        self
    }

    pub fn retracted(mut self, at: DateTime<Utc>) -> Self {
        self.retracted_at = Some(at);
        self
    }

    pub fn notified(mut self, did_notify: bool) -> Self {
        self.did_notify_recipient = did_notify;
        self
    }

    pub fn is_errored(&self) -> bool {
        self.error_code != 0
    }

    /// Latest lifecycle timestamp, used for "changed since" windowing
    pub fn last_changed_at(&self) -> DateTime<Utc> {
        [
            self.delivered_at,
            self.read_at,
            self.edited_at,
            self.retracted_at,
        ]
        .into_iter()
        .flatten()
        .fold(self.created_at, std::cmp::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_millis;

    #[test]
    fn test_last_changed_at_takes_latest_timestamp() {
        let record = Record::message("m1", "chat-1", "hi", from_millis(1_000))
            .delivered(from_millis(2_000))
            .read(from_millis(5_000));
        assert_eq!(record.last_changed_at(), from_millis(5_000));

        let untouched = Record::message("m2", "chat-1", "hi", from_millis(1_000));
        assert_eq!(untouched.last_changed_at(), from_millis(1_000));
    }

    #[test]
    fn test_structural_records_are_committed() {
        let record = Record::structural(
            "s1",
            "chat-1",
            RecordKind::NameChange {
                new_name: Some("Climbing".to_string()),
            },
            from_millis(1_000),
        );
        assert!(record.kind.is_structural());
        assert!(record.is_sent);
        assert!(record.text.is_none());
    }

    #[test]
    fn test_record_kind_serializes_tagged() {
        let kind = RecordKind::ParticipantAdded {
            participant: "+15550100".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "participant_added");
        assert_eq!(json["participant"], "+15550100");
    }
}
