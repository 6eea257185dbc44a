#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::automation::{AutomationCommand, AutomationTrigger};
use relay_core::error::AutomationError;

/// Automation trigger that records every command and can be told to fail
#[derive(Debug, Default)]
pub struct MockTrigger {
    issued: Mutex<Vec<AutomationCommand>>,
    failure: Mutex<Option<AutomationError>>,
}

impl MockTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every following command with `error`
    pub fn fail_with(&self, error: AutomationError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn issued(&self) -> Vec<AutomationCommand> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl AutomationTrigger for MockTrigger {
    async fn issue(&self, command: &AutomationCommand) -> Result<(), AutomationError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.issued.lock().push(command.clone());
        Ok(())
    }
}
