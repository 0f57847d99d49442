//! JSON-lines message loop: requests and UI answers in on stdin, responses,
//! bundle progress and UI events out on stdout

use anyhow::{Context, Result};
use keyconnect_core::keyconnect_device::{InteractionBroker, UiEvent};
use keyconnect_core::{BUNDLE_PROGRESS, BundleProgress, Executor, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_local};
use tracing::{debug, info, warn};

/// A line read from stdin
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Ui(UiAnswer),
    Request(Request),
}

#[derive(Debug, Deserialize)]
struct UiAnswer {
    ui: UiKind,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UiKind {
    Pin,
    Passphrase,
    Confirm,
    Cancel,
}

/// A line written to stdout
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Outbound {
    #[serde(rename = "response")]
    Response(Response),
    #[serde(rename = "ui-bundle-progress")]
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        payload: BundleProgress,
    },
    #[serde(rename = "ui")]
    Ui { payload: UiEvent },
    #[serde(rename = "error")]
    Error { error: String },
}

type Outbox = mpsc::UnboundedSender<Outbound>;

enum Step {
    Line(Option<String>),
    /// The request passed to `call` has been answered
    Answered,
}

fn send(out: &Outbox, message: Outbound) {
    if out.send(message).is_err() {
        debug!("Output closed, dropping message");
    }
}

/// Serve requests until stdin closes.
///
/// With `call` set, that request is started first and the loop ends as soon
/// as it has been answered. Must run inside a `LocalSet`.
pub async fn serve(
    executor: Executor,
    mut events: mpsc::UnboundedReceiver<UiEvent>,
    call: Option<Request>,
) -> Result<()> {
    let executor = Rc::new(executor);
    let (out, mut outbound) = mpsc::unbounded_channel::<Outbound>();

    let writer = spawn_local(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound.recv().await {
            let mut line = serde_json::to_vec(&message)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    // Once stdin is gone nobody can answer a challenge, so cancel them
    let closing = Rc::new(Cell::new(false));
    let forwarder = {
        let out = out.clone();
        let broker = executor.broker().clone();
        let closing = closing.clone();
        spawn_local(async move {
            while let Some(event) = events.recv().await {
                let is_challenge = !matches!(event, UiEvent::CloseChallenge | UiEvent::Notice(_));
                send(&out, Outbound::Ui { payload: event });
                if closing.get() && is_challenge {
                    broker.cancel();
                }
            }
        })
    };

    let mut requests = Vec::new();
    let mut call = call.map(|request| spawn_request(&executor, &out, request));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let step = match call.as_mut() {
            Some(handle) => tokio::select! {
                joined = handle => {
                    joined.context("Request task failed")?;
                    Step::Answered
                }
                line = lines.next_line() => Step::Line(line.context("Failed to read stdin")?),
            },
            None => Step::Line(lines.next_line().await.context("Failed to read stdin")?),
        };
        let line = match step {
            Step::Answered => {
                call = None;
                break;
            }
            Step::Line(Some(line)) => line,
            Step::Line(None) => {
                debug!("stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Inbound>(&line) {
            Ok(Inbound::Ui(answer)) => {
                if let Err(e) = answer_challenge(executor.broker(), &answer) {
                    warn!("Could not apply {:?} answer: {e:#}", answer.ui);
                    send(&out, Outbound::Error { error: e.to_string() });
                }
            }
            Ok(Inbound::Request(request)) => {
                requests.push(spawn_request(&executor, &out, request));
            }
            Err(e) => {
                warn!("Ignoring malformed line: {e}");
                send(&out, Outbound::Error { error: e.to_string() });
            }
        }
    }

    closing.set(true);
    executor.broker().cancel();
    if let Some(handle) = call {
        handle.await.context("Request task failed")?;
    }
    for handle in requests {
        handle.await.context("Request task failed")?;
    }

    executor.shutdown().await;
    forwarder.abort();
    drop(out);
    writer.await.context("Output task failed")??;
    info!("Message loop finished");
    Ok(())
}

/// Run one request on its own task; its progress is written before its response
fn spawn_request(executor: &Rc<Executor>, out: &Outbox, request: Request) -> JoinHandle<()> {
    let executor = executor.clone();
    let out = out.clone();
    spawn_local(async move {
        let (progress, mut updates) = mpsc::unbounded_channel::<BundleProgress>();
        let forward = {
            let out = out.clone();
            let id = request.id.clone();
            spawn_local(async move {
                while let Some(payload) = updates.recv().await {
                    debug!("{BUNDLE_PROGRESS} #{}", payload.progress);
                    send(
                        &out,
                        Outbound::Progress {
                            id: id.clone(),
                            payload,
                        },
                    );
                }
            })
        };

        let response = executor.handle(&request, Some(&progress)).await;
        drop(progress);
        if let Err(e) = forward.await {
            warn!("Progress forwarding failed: {e}");
        }
        send(&out, Outbound::Response(response));
    })
}

fn answer_challenge(broker: &InteractionBroker, answer: &UiAnswer) -> Result<()> {
    let text = || {
        answer
            .value
            .as_str()
            .map(str::to_string)
            .context("expected a string value")
    };
    match answer.ui {
        UiKind::Pin => broker.respond_pin(text()?)?,
        UiKind::Passphrase => broker.respond_passphrase(text()?)?,
        UiKind::Confirm => {
            let accepted = answer.value.as_bool().context("expected a boolean value")?;
            broker.respond_confirmation(accepted)?
        }
        UiKind::Cancel => {
            if !broker.cancel() {
                debug!("No challenge to cancel");
            }
        }
    }
    Ok(())
}
