//! In-memory device and backend shared by the executor tests

#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::Amount;
use keyconnect_core::backend::{AccountInfo, Backend, BackendFactory, BackendTransaction};
use keyconnect_core::coin::BackendKind;
use keyconnect_core::{Config, Executor, ProgressSender, Result};
use keyconnect_device::messages::{Features, Initialize, Message, WireMessage};
use keyconnect_device::{DeviceDescriptor, InteractionBroker, Session, Transport, UiEvent};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;

pub type Handler = Box<dyn FnMut(&Message) -> Message>;

pub fn features(major: u32, minor: u32, patch: u32) -> Features {
    Features {
        vendor: Some("bitcointrezor.com".into()),
        major_version: Some(major),
        minor_version: Some(minor),
        patch_version: Some(patch),
        initialized: true,
        ..Default::default()
    }
}

struct DeviceState {
    enumerations: RefCell<VecDeque<Vec<Features>>>,
    current: RefCell<Vec<Features>>,
    handler: RefCell<Handler>,
    sent: RefCell<Vec<Message>>,
    enumerate_calls: Cell<u32>,
    acquired: Cell<u32>,
    released: Cell<u32>,
}

/// Transport whose enumerations follow a script (the last one repeats) and
/// whose sessions answer every call but `Initialize` through a handler
#[derive(Clone)]
pub struct MockTransport {
    state: Rc<DeviceState>,
}

impl MockTransport {
    pub fn new(
        enumerations: Vec<Vec<Features>>,
        handler: impl FnMut(&Message) -> Message + 'static,
    ) -> Self {
        Self {
            state: Rc::new(DeviceState {
                enumerations: RefCell::new(enumerations.into()),
                current: RefCell::new(Vec::new()),
                handler: RefCell::new(Box::new(handler)),
                sent: RefCell::new(Vec::new()),
                enumerate_calls: Cell::new(0),
                acquired: Cell::new(0),
                released: Cell::new(0),
            }),
        }
    }

    /// One device present from the start
    pub fn with_device(
        features: Features,
        handler: impl FnMut(&Message) -> Message + 'static,
    ) -> Self {
        Self::new(vec![vec![features]], handler)
    }

    /// Messages sent to the device, `Initialize` excluded
    pub fn sent(&self) -> Vec<Message> {
        self.state.sent.borrow().clone()
    }

    pub fn sent_of<T: WireMessage>(&self) -> Vec<Message> {
        self.sent().into_iter().filter(|m| m.is::<T>()).collect()
    }

    pub fn enumerate_calls(&self) -> u32 {
        self.state.enumerate_calls.get()
    }

    pub fn acquired(&self) -> u32 {
        self.state.acquired.get()
    }

    pub fn released(&self) -> u32 {
        self.state.released.get()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn configure(&self, _config: &[u8]) -> keyconnect_device::Result<()> {
        Ok(())
    }

    async fn enumerate(&self) -> keyconnect_device::Result<Vec<DeviceDescriptor>> {
        self.state
            .enumerate_calls
            .set(self.state.enumerate_calls.get() + 1);
        if let Some(next) = self.state.enumerations.borrow_mut().pop_front() {
            *self.state.current.borrow_mut() = next;
        }
        Ok(self
            .state
            .current
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, _)| DeviceDescriptor {
                path: i.to_string(),
                session: None,
            })
            .collect())
    }

    async fn acquire(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> keyconnect_device::Result<Box<dyn Session>> {
        let index: usize = descriptor.path.parse().unwrap_or_default();
        let features = self.state.current.borrow()[index].clone();
        self.state.acquired.set(self.state.acquired.get() + 1);
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            features,
        }))
    }
}

struct MockSession {
    state: Rc<DeviceState>,
    features: Features,
}

#[async_trait(?Send)]
impl Session for MockSession {
    async fn call(&mut self, message: Message) -> keyconnect_device::Result<Message> {
        if message.is::<Initialize>() {
            return Message::encode(&self.features);
        }
        self.state.sent.borrow_mut().push(message.clone());
        Ok((self.state.handler.borrow_mut())(&message))
    }

    async fn release(&mut self) -> keyconnect_device::Result<()> {
        self.state.released.set(self.state.released.get() + 1);
        Ok(())
    }
}

struct BackendState {
    transactions: HashMap<String, BackendTransaction>,
    accounts: HashMap<String, AccountInfo>,
    lookups: RefCell<Vec<String>>,
    account_lookups: RefCell<Vec<String>>,
    created: RefCell<Vec<(BackendKind, String)>>,
}

/// Backend answering from fixed tables and recording every call
#[derive(Clone)]
pub struct MockBackends {
    state: Rc<BackendState>,
}

impl MockBackends {
    pub fn new(transactions: Vec<BackendTransaction>, accounts: Vec<(&str, AccountInfo)>) -> Self {
        Self {
            state: Rc::new(BackendState {
                transactions: transactions
                    .into_iter()
                    .map(|tx| (tx.hash.clone(), tx))
                    .collect(),
                accounts: accounts
                    .into_iter()
                    .map(|(address, info)| (address.to_string(), info))
                    .collect(),
                lookups: RefCell::default(),
                account_lookups: RefCell::default(),
                created: RefCell::default(),
            }),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![], vec![])
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lookups.borrow().clone()
    }

    pub fn account_lookups(&self) -> Vec<String> {
        self.state.account_lookups.borrow().clone()
    }

    pub fn created(&self) -> Vec<(BackendKind, String)> {
        self.state.created.borrow().clone()
    }
}

impl BackendFactory for MockBackends {
    fn create(&self, kind: BackendKind, default_url: &str) -> Box<dyn Backend> {
        self.state
            .created
            .borrow_mut()
            .push((kind, default_url.to_string()));
        Box::new(self.clone())
    }
}

#[async_trait(?Send)]
impl Backend for MockBackends {
    async fn lookup_transaction(&self, hash: &str) -> Result<BackendTransaction> {
        self.state.lookups.borrow_mut().push(hash.to_string());
        tokio::task::yield_now().await;
        self.state
            .transactions
            .get(hash)
            .cloned()
            .ok_or_else(|| keyconnect_core::Error::Backend("404 Not Found".into()))
    }

    async fn get_account_info(&self, address: &str) -> Result<AccountInfo> {
        self.state
            .account_lookups
            .borrow_mut()
            .push(address.to_string());
        self.state
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| keyconnect_core::Error::Backend("404 Not Found".into()))
    }
}

pub fn reference_tx(hash: &str, outputs: &[u64]) -> BackendTransaction {
    BackendTransaction {
        hash: hash.to_string(),
        version: 1,
        lock_time: 0,
        inputs: vec![keyconnect_core::backend::BackendInput {
            prev_hash: Some("11".repeat(32)),
            prev_index: 1,
            sequence: 0xffff_ffff,
            script_sig: "483045".into(),
        }],
        outputs: outputs
            .iter()
            .map(|sat| keyconnect_core::backend::BackendOutput {
                amount: Amount::from_sat(*sat),
                script_pubkey: "76a914".into(),
            })
            .collect(),
    }
}

pub fn trusted() -> Config {
    Config {
        trusted: true,
        ..Config::default()
    }
}

pub fn executor(
    transport: &MockTransport,
    backends: &MockBackends,
    config: &Config,
) -> (Executor, UnboundedReceiver<UiEvent>) {
    let (broker, events) = InteractionBroker::new();
    let executor = Executor::new(
        Box::new(transport.clone()),
        Box::new(backends.clone()),
        broker,
        config,
    );
    (executor, events)
}

/// Run one request while `answer` reacts to every UI event it raises.
///
/// Returns the outcome and every event seen, in order.
pub async fn execute_with_ui(
    executor: &Executor,
    events: &mut UnboundedReceiver<UiEvent>,
    origin: &str,
    payload: &Value,
    progress: Option<&ProgressSender>,
    mut answer: impl FnMut(&InteractionBroker, &UiEvent),
) -> (Result<Value>, Vec<UiEvent>) {
    let mut seen = Vec::new();
    let run = executor.execute(origin, payload, progress);
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            Some(event) = events.recv() => {
                answer(executor.broker(), &event);
                seen.push(event);
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    (result, seen)
}

/// Answer every confirmation with `accept` and ignore other events
pub fn confirm_all(accept: bool) -> impl FnMut(&InteractionBroker, &UiEvent) {
    move |broker, event| {
        if let UiEvent::RequestConfirmation { .. } = event {
            broker
                .respond_confirmation(accept)
                .expect("confirmation should be pending");
        }
    }
}

pub fn notices(events: &[UiEvent]) -> Vec<keyconnect_device::Notice> {
    events
        .iter()
        .filter_map(|event| match event {
            UiEvent::Notice(notice) => Some(*notice),
            _ => None,
        })
        .collect()
}
