use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AutomationCommand, AutomationTrigger};
use crate::clock::Clock;
use crate::config::CorrelationConfig;
use crate::correlation::{CorrelationHandle, PendingRequestRegistry};
use crate::error::{AutomationError, RelayError, Result};
use crate::models::Record;

/// Issues automation commands and registers the correlation that confirms them
///
/// The issue timestamp is captured before the trigger runs so a record the foreign writer
/// commits while the trigger is still returning is not rejected as too old.
#[derive(Debug, Clone)]
pub struct MessageSender {
    trigger: Arc<dyn AutomationTrigger>,
    registry: PendingRequestRegistry,
    clock: Arc<dyn Clock>,
    config: CorrelationConfig,
    trigger_timeout: Option<Duration>,
}

impl MessageSender {
    pub fn new(
        trigger: Arc<dyn AutomationTrigger>,
        registry: PendingRequestRegistry,
        clock: Arc<dyn Clock>,
        config: CorrelationConfig,
    ) -> Self {
        Self {
            trigger,
            registry,
            clock,
            config,
            trigger_timeout: None,
        }
    }

    /// Bound how long the trigger itself may take to acknowledge
    pub fn with_trigger_timeout(mut self, timeout: Duration) -> Self {
        self.trigger_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &PendingRequestRegistry {
        &self.registry
    }

    pub async fn send_text(&self, chat_scope: &str, text: &str) -> Result<CorrelationHandle> {
        if text.trim().is_empty() {
            return Err(RelayError::InvalidParameter(
                "message text must not be empty".to_string(),
            ));
        }
        let command = AutomationCommand::SendText {
            chat_scope: chat_scope.to_string(),
            text: text.to_string(),
        };
        self.dispatch(command, self.config.text_timeout()).await
    }

    pub async fn send_attachment(
        &self,
        chat_scope: &str,
        transfer_name: &str,
    ) -> Result<CorrelationHandle> {
        if transfer_name.trim().is_empty() {
            return Err(RelayError::InvalidParameter(
                "attachment transfer name must not be empty".to_string(),
            ));
        }
        let command = AutomationCommand::SendAttachment {
            chat_scope: chat_scope.to_string(),
            transfer_name: transfer_name.to_string(),
        };
        self.dispatch(command, self.config.attachment_timeout())
            .await
    }

    /// Send and wait for the foreign store to confirm the message
    pub async fn send_text_and_wait(&self, chat_scope: &str, text: &str) -> Result<Record> {
        let handle = self.send_text(chat_scope, text).await?;
        Ok(handle.await?)
    }

    async fn dispatch(
        &self,
        command: AutomationCommand,
        deadline: Duration,
    ) -> Result<CorrelationHandle> {
        if command.chat_scope().trim().is_empty() {
            return Err(RelayError::InvalidParameter(
                "chat scope must not be empty".to_string(),
            ));
        }

        let issued_at = self.clock.now();
        let issued = match self.trigger_timeout {
            Some(limit) => tokio::time::timeout(limit, self.trigger.issue(&command))
                .await
                .unwrap_or(Err(AutomationError::TimedOut(limit))),
            None => self.trigger.issue(&command).await,
        };

        if let Err(error) = issued {
            warn!(
                chat_scope = %command.chat_scope(),
                is_attachment = command.is_attachment(),
                error = %error,
                "Automation trigger failed, no correlation registered"
            );
            return Err(error.into());
        }

        let handle = self.registry.register_since(
            command.chat_scope(),
            command.content(),
            command.is_attachment(),
            deadline,
            issued_at,
        );
        debug!(
            correlation_id = %handle.id(),
            chat_scope = %command.chat_scope(),
            "Automation command issued"
        );
        Ok(handle)
    }
}
