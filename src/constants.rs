//! # System Constants
//!
//! Event names, listener names and the operational defaults of the relay core.

/// Event names published on the [`EventBus`](crate::events::EventBus)
pub mod events {
    // Entry lifecycle events
    pub const NEW_ENTRY: &str = "new-entry";
    pub const UPDATED_ENTRY: &str = "updated-entry";

    // Correlation outcomes without a waiting caller or with a timed out caller
    pub const MESSAGE_SEND_ERROR: &str = "message-send-error";
    pub const MESSAGE_TIMEOUT: &str = "message-timeout";

    // Structural changes to a chat
    pub const PARTICIPANT_ADDED: &str = "participant-added";
    pub const PARTICIPANT_REMOVED: &str = "participant-removed";
    pub const PARTICIPANT_LEFT: &str = "participant-left";
    pub const NAME_CHANGE: &str = "name-change";
    pub const GROUP_ICON_CHANGED: &str = "group-icon-changed";
    pub const GROUP_ICON_REMOVED: &str = "group-icon-removed";

    // Diagnostics
    pub const POLL_ERROR: &str = "poll-error";
}

/// Listener names used for logging, statistics and poll-error events
pub mod listeners {
    pub const INCOMING: &str = "incoming";
    pub const OUTGOING: &str = "outgoing";
    pub const STRUCTURAL: &str = "structural";
}

/// Default operational values
pub mod defaults {
    pub const POLL_INTERVAL_MS: u64 = 1_000;
    pub const LOOKBACK_MARGIN_MS: u64 = 15_000;
    pub const DEDUP_MAX_ENTRIES: usize = 1_000;
    pub const SNAPSHOT_RETENTION_SECONDS: u64 = 300;
    pub const TEXT_CORRELATION_TIMEOUT_MS: u64 = 30_000;
    pub const ATTACHMENT_CORRELATION_TIMEOUT_MS: u64 = 180_000;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1_000;
}

/// Attachment extensions the foreign server may substitute for the one that was sent.
///
/// Each pair is `(sent, stored)`.
pub const TRANSCODE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("jpeg", "jpg"),
    ("jpg", "jpeg"),
    ("heic", "jpeg"),
    ("heic", "jpg"),
];

/// Stored extensions that replace whatever extension was sent, regardless of source format.
///
/// Anything routed through the audio-message path is re-encoded to Core Audio Format.
pub const WILDCARD_TRANSCODE_TARGETS: &[&str] = &["caf"];
