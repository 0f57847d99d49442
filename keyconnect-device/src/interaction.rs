//! Single-slot rendezvous between device flows and the user interface.
//!
//! A device flow suspends on a challenge (PIN, passphrase, confirmation or a
//! button press on the device) and the UI layer resolves it exactly once.
//! At most one challenge is outstanding at any time; raising a second one
//! while the first is pending fails with [`Error::ChallengeBusy`].

use log::debug;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChallengeKind {
    Pin,
    Passphrase,
    Confirmation,
    Button,
}

/// How passphrase challenges are answered for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassphraseMode {
    #[default]
    Prompt,
    /// Answer with an empty passphrase without asking the user
    Empty,
}

/// Something the UI layer should display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    RequestPin { kind: Option<String> },
    RequestPassphrase,
    RequestConfirmation { label: String },
    RequestButton { code: Option<String> },
    CloseChallenge,
    Notice(Notice),
}

/// Condition report raised by the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: ErrorKind,
    /// `true` when the flow halted and retrying will not clear it
    pub persistent: bool,
}

enum Responder {
    Pin(oneshot::Sender<String>),
    Passphrase(oneshot::Sender<String>),
    Confirmation(oneshot::Sender<bool>),
    Button,
}

impl Responder {
    fn kind(&self) -> ChallengeKind {
        match self {
            Responder::Pin(_) => ChallengeKind::Pin,
            Responder::Passphrase(_) => ChallengeKind::Passphrase,
            Responder::Confirmation(_) => ChallengeKind::Confirmation,
            Responder::Button => ChallengeKind::Button,
        }
    }
}

#[derive(Default)]
struct State {
    pending: Option<(u64, Responder)>,
    next_id: u64,
}

#[derive(Clone)]
pub struct InteractionBroker {
    state: Arc<Mutex<State>>,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl InteractionBroker {
    /// Create a broker and the receiving end of its UI event stream
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let broker = Self {
            state: Arc::new(Mutex::new(State::default())),
            events,
        };
        (broker, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: UiEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    fn occupy(&self, responder: Responder, event: UiEvent) -> Result<PendingChallenge<'_>> {
        let mut state = self.lock();
        if let Some((_, current)) = &state.pending {
            debug!(
                "Refusing {} challenge, {} is pending",
                responder.kind(),
                current.kind()
            );
            return Err(Error::ChallengeBusy);
        }
        state.next_id += 1;
        let id = state.next_id;
        debug!("Raising {} challenge #{id}", responder.kind());
        state.pending = Some((id, responder));
        drop(state);

        self.emit(event);
        Ok(PendingChallenge { broker: self, id })
    }

    fn take(&self, kind: ChallengeKind) -> Result<Responder> {
        let mut state = self.lock();
        match state.pending.take() {
            Some((_, responder)) if responder.kind() == kind => {
                drop(state);
                self.emit(UiEvent::CloseChallenge);
                Ok(responder)
            }
            other => {
                state.pending = other;
                Err(Error::NoChallenge(kind))
            }
        }
    }

    /// Suspend until the UI supplies a PIN
    pub async fn request_pin(&self, kind: Option<String>) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let _pending = self.occupy(Responder::Pin(tx), UiEvent::RequestPin { kind })?;
        rx.await.map_err(|_| Error::Cancelled)
    }

    /// Suspend until the UI supplies a passphrase, unless the mode answers it
    pub async fn request_passphrase(&self, mode: PassphraseMode) -> Result<String> {
        if mode == PassphraseMode::Empty {
            return Ok(String::new());
        }
        let (tx, rx) = oneshot::channel();
        let _pending = self.occupy(Responder::Passphrase(tx), UiEvent::RequestPassphrase)?;
        rx.await.map_err(|_| Error::Cancelled)
    }

    /// Suspend until the user accepts or declines `label`
    pub async fn request_confirmation(&self, label: impl Into<String>) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        let _pending = self.occupy(
            Responder::Confirmation(tx),
            UiEvent::RequestConfirmation {
                label: label.into(),
            },
        )?;
        rx.await.map_err(|_| Error::Cancelled)
    }

    /// Mark a button confirmation as pending on the device.
    ///
    /// The challenge stays raised until the returned guard is dropped, which
    /// the caller does once the device answers the acknowledged request.
    pub fn button(&self, code: Option<String>) -> Result<PendingChallenge<'_>> {
        self.occupy(Responder::Button, UiEvent::RequestButton { code })
    }

    pub fn respond_pin(&self, pin: impl Into<String>) -> Result<()> {
        if let Responder::Pin(tx) = self.take(ChallengeKind::Pin)? {
            let _ = tx.send(pin.into());
        }
        Ok(())
    }

    pub fn respond_passphrase(&self, passphrase: impl Into<String>) -> Result<()> {
        if let Responder::Passphrase(tx) = self.take(ChallengeKind::Passphrase)? {
            let _ = tx.send(passphrase.into());
        }
        Ok(())
    }

    pub fn respond_confirmation(&self, accepted: bool) -> Result<()> {
        if let Responder::Confirmation(tx) = self.take(ChallengeKind::Confirmation)? {
            let _ = tx.send(accepted);
        }
        Ok(())
    }

    /// Cancel the pending PIN, passphrase or confirmation challenge.
    ///
    /// Button challenges belong to the device and can't be cancelled here.
    pub fn cancel(&self) -> bool {
        let kind = match self.pending() {
            Some(ChallengeKind::Button) | None => return false,
            Some(kind) => kind,
        };
        // dropping the sender resolves the waiter with `Cancelled`
        self.take(kind).is_ok()
    }

    pub fn pending(&self) -> Option<ChallengeKind> {
        self.lock().pending.as_ref().map(|(_, r)| r.kind())
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(UiEvent::Notice(notice));
    }
}

/// Keeps a challenge raised; dropping it returns the broker to idle
pub struct PendingChallenge<'a> {
    broker: &'a InteractionBroker,
    id: u64,
}

impl Drop for PendingChallenge<'_> {
    fn drop(&mut self) {
        let mut state = self.broker.lock();
        if matches!(&state.pending, Some((id, _)) if *id == self.id) {
            state.pending = None;
            drop(state);
            self.broker.emit(UiEvent::CloseChallenge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pin_rendezvous() -> anyhow::Result<()> {
        let (broker, mut events) = InteractionBroker::new();
        let ui = broker.clone();

        let (pin, _) = tokio::join!(broker.request_pin(Some("current".into())), async {
            let event = events.recv().await;
            assert_eq!(
                event,
                Some(UiEvent::RequestPin {
                    kind: Some("current".into())
                })
            );
            assert_eq!(ui.pending(), Some(ChallengeKind::Pin));
            ui.respond_pin("1234")
        });

        assert_eq!(pin?, "1234");
        assert_eq!(broker.pending(), None);
        assert_eq!(events.recv().await, Some(UiEvent::CloseChallenge));
        Ok(())
    }

    #[tokio::test]
    async fn test_second_challenge_refused_while_pending() -> anyhow::Result<()> {
        let (broker, _events) = InteractionBroker::new();
        let _button = broker.button(Some("ButtonRequest_SignTx".into()))?;

        let result = broker.request_passphrase(PassphraseMode::Prompt).await;
        assert!(matches!(result, Err(Error::ChallengeBusy)));
        assert!(matches!(broker.button(None), Err(Error::ChallengeBusy)));
        Ok(())
    }

    #[tokio::test]
    async fn test_button_guard_returns_to_idle() -> anyhow::Result<()> {
        let (broker, mut events) = InteractionBroker::new();
        {
            let _button = broker.button(None)?;
            assert_eq!(broker.pending(), Some(ChallengeKind::Button));
            assert!(!broker.cancel());
        }
        assert_eq!(broker.pending(), None);
        assert_eq!(
            events.recv().await,
            Some(UiEvent::RequestButton { code: None })
        );
        assert_eq!(events.recv().await, Some(UiEvent::CloseChallenge));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_passphrase_resolves_immediately() -> anyhow::Result<()> {
        let (broker, mut events) = InteractionBroker::new();
        let passphrase = broker.request_passphrase(PassphraseMode::Empty).await?;
        assert_eq!(passphrase, "");
        assert_eq!(broker.pending(), None);
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_resolves_waiter() {
        let (broker, _events) = InteractionBroker::new();
        let ui = broker.clone();

        let (result, cancelled) = tokio::join!(broker.request_confirmation("Account #1"), async {
            tokio::task::yield_now().await;
            ui.cancel()
        });

        assert!(cancelled);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(broker.pending(), None);
    }

    #[tokio::test]
    async fn test_abandoned_request_clears_slot() -> anyhow::Result<()> {
        let (broker, _events) = InteractionBroker::new();
        let result = tokio::time::timeout(Duration::from_millis(5), broker.request_pin(None)).await;
        assert!(result.is_err());
        assert_eq!(broker.pending(), None);

        let _button = broker.button(None)?;
        Ok(())
    }

    #[test]
    fn test_respond_without_pending_challenge() {
        let (broker, _events) = InteractionBroker::new();
        assert!(matches!(
            broker.respond_pin("1111"),
            Err(Error::NoChallenge(ChallengeKind::Pin))
        ));
    }

    #[test]
    fn test_ui_event_serialization() -> anyhow::Result<()> {
        let event = UiEvent::Notice(Notice {
            kind: ErrorKind::NoConnectedDevice,
            persistent: false,
        });
        assert_eq!(
            serde_json::to_value(&event)?,
            serde_json::json!({"event": "notice", "kind": "NoConnectedDevice", "persistent": false})
        );
        Ok(())
    }
}
