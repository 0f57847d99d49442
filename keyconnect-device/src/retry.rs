//! Retry policy: what to do with each classified failure

use log::{info, warn};
use std::time::Duration;

use crate::error::{Classify, ErrorKind};
use crate::interaction::{InteractionBroker, Notice};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PIN_RETRY_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Terminal: the request stops here and is never retried
    Halt,
    /// Wait, then run the same operation again from its entry point
    Retry(Duration),
    /// Hand the error to the caller unchanged
    Raise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub poll_interval: Duration,
    pub pin_retry_delay: Duration,
    /// Consecutive retry cycles allowed before the error is raised
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            pin_retry_delay: DEFAULT_PIN_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn action(&self, kind: ErrorKind) -> Action {
        match kind {
            ErrorKind::TransportMissing
            | ErrorKind::Uninitialized
            | ErrorKind::FirmwareTooOld
            | ErrorKind::ParamValidation => Action::Halt,
            ErrorKind::NoConnectedDevice | ErrorKind::BootloaderMode => {
                Action::Retry(self.poll_interval)
            }
            ErrorKind::PinInvalid => Action::Retry(self.pin_retry_delay),
            ErrorKind::BackendFailure | ErrorKind::Unclassified => Action::Raise,
        }
    }

    /// Run `operation` until it succeeds or fails with a non-retryable error.
    ///
    /// Every retry re-enters `operation` itself, so a PIN typo prompts again
    /// for the request that was originally made. Halting errors raise a
    /// persistent notice, retried ones a transient notice.
    pub async fn run<T, E: Classify>(
        &self,
        broker: &InteractionBroker,
        mut operation: impl AsyncFnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut retries = 0u32;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let kind = error.kind();
            match self.action(kind) {
                Action::Halt => {
                    warn!("{kind}: {error}; halting");
                    broker.notify(Notice {
                        kind,
                        persistent: true,
                    });
                    return Err(error);
                }
                Action::Raise => return Err(error),
                Action::Retry(delay) => {
                    retries += 1;
                    if self.max_retries.is_some_and(|max| retries > max) {
                        warn!("{kind}: {error}; giving up after {} retries", retries - 1);
                        return Err(error);
                    }
                    info!("{kind}: {error}; retrying in {delay:?}");
                    broker.notify(Notice {
                        kind,
                        persistent: false,
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
