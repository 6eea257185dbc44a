//! # Automation Commands
//!
//! The OS-level automation that actually sends a message lives outside this crate behind
//! [`AutomationTrigger`]. A trigger only acknowledges that the command was issued; whether
//! the foreign store ever committed the result is learned by correlation, see
//! [`MessageSender`].

pub mod sender;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AutomationError;

pub use sender::MessageSender;

/// Fire-and-forget command handed to the automation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AutomationCommand {
    SendText {
        chat_scope: String,
        text: String,
    },
    SendAttachment {
        chat_scope: String,
        transfer_name: String,
    },
}

impl AutomationCommand {
    pub fn chat_scope(&self) -> &str {
        match self {
            AutomationCommand::SendText { chat_scope, .. }
            | AutomationCommand::SendAttachment { chat_scope, .. } => chat_scope,
        }
    }

    /// Text, or transfer name for attachments
    pub fn content(&self) -> &str {
        match self {
            AutomationCommand::SendText { text, .. } => text,
            AutomationCommand::SendAttachment { transfer_name, .. } => transfer_name,
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, AutomationCommand::SendAttachment { .. })
    }
}

/// Issues commands to the external automation layer
#[async_trait]
pub trait AutomationTrigger: Send + Sync + std::fmt::Debug {
    /// Resolves once the command was accepted; says nothing about the foreign store
    async fn issue(&self, command: &AutomationCommand) -> Result<(), AutomationError>;
}
