//! Sequential batch runner with per-item progress

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::response::BundleProgress;

pub type ProgressSender = mpsc::UnboundedSender<BundleProgress>;

/// Ordered batch items plus the response shape the caller asked for
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle<T> {
    items: Vec<T>,
    bundled: bool,
}

impl<T> Bundle<T> {
    /// A caller-supplied bundle: array response with progress
    pub fn many(items: Vec<T>) -> Self {
        Self {
            items,
            bundled: true,
        }
    }

    /// One bare item: answered with the item itself, no progress
    pub fn single(item: T) -> Self {
        Self {
            items: vec![item],
            bundled: false,
        }
    }

    /// Read items from `bundle_key` (an array) or a bare `single_key` object
    pub fn from_payload(
        payload: &Value,
        bundle_key: &str,
        single_key: &str,
        parse: impl Fn(&Value) -> Result<T>,
    ) -> Result<Self> {
        match (payload.get(bundle_key), payload.get(single_key)) {
            (Some(Value::Array(items)), _) => {
                Ok(Self::many(items.iter().map(parse).collect::<Result<_>>()?))
            }
            (Some(_), _) => Err(Error::validation(format!(
                "Parameter \"{bundle_key}\" has invalid type. \"array\" expected."
            ))),
            (None, Some(item)) => Ok(Self::single(parse(item)?)),
            (None, None) => Err(Error::validation(format!(
                "Parameter \"{bundle_key}\" is missing"
            ))),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_bundled(&self) -> bool {
        self.bundled
    }

    /// Run `process` on each item strictly in order.
    ///
    /// For bundled requests a progress notification carrying the index and
    /// the item's result is sent before the next item starts.
    pub async fn process(
        &self,
        progress: Option<&ProgressSender>,
        process: impl AsyncFnMut(usize, &T) -> Result<Value>,
    ) -> Result<Value> {
        self.process_from(&mut Vec::new(), progress, process).await
    }

    /// Like [`Bundle::process`], skipping the items already in `completed`.
    ///
    /// Each finished result is pushed onto `completed` before its progress
    /// is sent, so a failed run can be resumed at the first unfinished item
    /// without reporting earlier items twice.
    pub async fn process_from(
        &self,
        completed: &mut Vec<Value>,
        progress: Option<&ProgressSender>,
        mut process: impl AsyncFnMut(usize, &T) -> Result<Value>,
    ) -> Result<Value> {
        let start = completed.len();
        if start > 0 {
            debug!("Resuming bundle at item {start}");
        }

        for (index, item) in self.items.iter().enumerate().skip(start) {
            let response = process(index, item).await?;
            if self.bundled {
                debug!("Bundle item {index} of {} done", self.items.len());
                if let Some(progress) = progress {
                    // a closed channel means nobody is listening
                    let _ = progress.send(BundleProgress {
                        progress: index,
                        response: response.clone(),
                    });
                }
            }
            completed.push(response);
        }

        let responses = completed.clone();
        if self.bundled {
            Ok(Value::Array(responses))
        } else {
            Ok(responses.into_iter().next().unwrap_or(Value::Null))
        }
    }
}
