//! Scripted transport and session used by unit tests

use async_trait::async_trait;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::messages::{Features, Message};
use crate::transport::{DeviceDescriptor, Session, Transport};

type Hook = Box<dyn FnMut(&Message)>;

/// Session answering each call with the next scripted message
pub struct ScriptedSession {
    replies: VecDeque<Message>,
    sent: Rc<RefCell<Vec<Message>>>,
    released: Rc<Cell<bool>>,
    hook: Option<Hook>,
}

impl ScriptedSession {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: replies.into(),
            sent: Rc::default(),
            released: Rc::default(),
            hook: None,
        }
    }

    pub fn sent(&self) -> Rc<RefCell<Vec<Message>>> {
        self.sent.clone()
    }

    pub fn released(&self) -> Rc<Cell<bool>> {
        self.released.clone()
    }

    pub fn on_call(&mut self, hook: impl FnMut(&Message) + 'static) {
        self.hook = Some(Box::new(hook));
    }
}

#[async_trait(?Send)]
impl Session for ScriptedSession {
    async fn call(&mut self, message: Message) -> Result<Message> {
        if let Some(hook) = self.hook.as_mut() {
            hook(&message);
        }
        self.sent.borrow_mut().push(message);
        self.replies
            .pop_front()
            .ok_or_else(|| Error::InvalidResponse("script exhausted".into()))
    }

    async fn release(&mut self) -> Result<()> {
        self.released.set(true);
        Ok(())
    }
}

pub fn features(major: u32, minor: u32, patch: u32) -> Features {
    Features {
        major_version: Some(major),
        minor_version: Some(minor),
        patch_version: Some(patch),
        initialized: true,
        ..Default::default()
    }
}

/// Transport whose enumerations follow a script; the last one repeats
pub struct ScriptedTransport {
    enumerations: RefCell<VecDeque<Vec<Features>>>,
    current: RefCell<Vec<Features>>,
    pub enumerate_calls: Cell<u32>,
    pub released: Rc<Cell<u32>>,
}

impl ScriptedTransport {
    /// Each step lists the features of the devices connected at that poll
    pub fn new(steps: Vec<Vec<Features>>) -> Self {
        Self {
            enumerations: RefCell::new(steps.into()),
            current: RefCell::default(),
            enumerate_calls: Cell::new(0),
            released: Rc::default(),
        }
    }
}

struct CountingSession {
    inner: ScriptedSession,
    released: Rc<Cell<u32>>,
}

#[async_trait(?Send)]
impl Session for CountingSession {
    async fn call(&mut self, message: Message) -> Result<Message> {
        self.inner.call(message).await
    }

    async fn release(&mut self) -> Result<()> {
        self.released.set(self.released.get() + 1);
        Ok(())
    }
}

#[async_trait(?Send)]
impl Transport for ScriptedTransport {
    async fn configure(&self, _config: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        self.enumerate_calls.set(self.enumerate_calls.get() + 1);
        if let Some(step) = self.enumerations.borrow_mut().pop_front() {
            *self.current.borrow_mut() = step;
        }
        Ok((0..self.current.borrow().len())
            .map(|i| DeviceDescriptor {
                path: i.to_string(),
                session: None,
            })
            .collect())
    }

    async fn acquire(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn Session>> {
        let index: usize = descriptor
            .path
            .parse()
            .map_err(|_| Error::InvalidResponse("bad path".into()))?;
        let features = self
            .current
            .borrow()
            .get(index)
            .cloned()
            .ok_or(Error::NoConnectedDevice)?;
        Ok(Box::new(CountingSession {
            inner: ScriptedSession::new(vec![Message::new(
                "Features",
                serde_json::to_value(features).unwrap_or_else(|_| json!({})),
            )]),
            released: self.released.clone(),
        }))
    }
}
