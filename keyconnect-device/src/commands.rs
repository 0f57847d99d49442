//! Typed calls on an acquired device session

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::interaction::{InteractionBroker, PassphraseMode, PendingChallenge};
use crate::messages::*;
use crate::transport::Session;

/// Command set bound to one session and one interaction broker.
///
/// Every call runs the device's interaction loop: PIN, passphrase and button
/// requests are answered through the broker until the device sends a real
/// reply or a `Failure`.
pub struct DeviceCommands<'a> {
    session: &'a mut dyn Session,
    broker: &'a InteractionBroker,
    passphrase: PassphraseMode,
}

impl<'a> DeviceCommands<'a> {
    pub fn new(
        session: &'a mut dyn Session,
        broker: &'a InteractionBroker,
        passphrase: PassphraseMode,
    ) -> Self {
        Self {
            session,
            broker,
            passphrase,
        }
    }

    /// Send `message` and drive the interaction loop until the device replies
    pub async fn typed_call(&mut self, message: Message) -> Result<Message> {
        let broker = self.broker;
        let mut request = message;
        let mut button: Option<PendingChallenge<'a>> = None;

        loop {
            let response = self.session.call(request).await;
            // any answer from the device ends a pending button press
            drop(button.take());
            let response = response?;

            request = if response.is::<PinMatrixRequest>() {
                let pin_request: PinMatrixRequest = response.decode()?;
                let pin = broker.request_pin(pin_request.kind).await?;
                Message::encode(&PinMatrixAck { pin })?
            } else if response.is::<PassphraseRequest>() {
                let passphrase = broker.request_passphrase(self.passphrase).await?;
                Message::encode(&PassphraseAck { passphrase })?
            } else if response.is::<ButtonRequest>() {
                let button_request: ButtonRequest = response.decode()?;
                debug!("Waiting for button press ({:?})", button_request.code);
                button = Some(broker.button(button_request.code)?);
                Message::encode(&ButtonAck {})?
            } else if response.is::<Failure>() {
                let failure: Failure = response.decode()?;
                return Err(Error::failure(
                    failure.code.unwrap_or_default(),
                    failure.message.unwrap_or_else(|| "Device failure".to_string()),
                ));
            } else {
                return Ok(response);
            };
        }
    }

    pub async fn call<Req, Resp>(&mut self, request: &Req) -> Result<Resp>
    where
        Req: WireMessage + Serialize,
        Resp: WireMessage + DeserializeOwned,
    {
        let response = self.typed_call(Message::encode(request)?).await?;
        response.decode()
    }

    pub async fn sign_identity(
        &mut self,
        identity: IdentityType,
        challenge_hidden: &str,
        challenge_visual: &str,
    ) -> Result<SignedIdentity> {
        self.call(&SignIdentity {
            identity,
            challenge_hidden: challenge_hidden.to_string(),
            challenge_visual: challenge_visual.to_string(),
        })
        .await
    }

    pub async fn get_public_key(&mut self, path: &[u32]) -> Result<PublicKey> {
        self.call(&GetPublicKey {
            address_n: path.to_vec(),
        })
        .await
    }

    pub async fn get_address(
        &mut self,
        path: &[u32],
        coin_name: &str,
        show_display: bool,
    ) -> Result<String> {
        let address: Address = self
            .call(&GetAddress {
                address_n: path.to_vec(),
                coin_name: coin_name.to_string(),
                show_display,
            })
            .await?;
        Ok(address.address)
    }

    pub async fn ripple_get_address(&mut self, path: &[u32], show_display: bool) -> Result<String> {
        let address: RippleAddress = self
            .call(&RippleGetAddress {
                address_n: path.to_vec(),
                show_display,
            })
            .await?;
        Ok(address.address)
    }
}
