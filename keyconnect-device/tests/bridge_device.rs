//! Device flows over the HTTP bridge, against a mock bridge server

use keyconnect_device::{
    BridgeTransport, ErrorKind, InteractionBroker, PassphraseMode, RetryPolicy, UiEvent,
    wait_for_first_device,
};
use mockito::Matcher;
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn bridge_with_device(
    server: &mut mockito::ServerGuard,
    features: serde_json::Value,
) -> anyhow::Result<(BridgeTransport, Vec<mockito::Mock>)> {
    let mut mocks = vec![
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"version": "2.0.33"}"#)
            .create_async()
            .await,
        server
            .mock("POST", "/enumerate")
            .with_status(200)
            .with_body(r#"[{"path": "1", "session": null}]"#)
            .create_async()
            .await,
        server
            .mock("POST", "/acquire/1/null")
            .with_status(200)
            .with_body(r#"{"session": "3"}"#)
            .create_async()
            .await,
        server
            .mock("POST", "/release/3")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await,
    ];
    mocks.push(
        server
            .mock("POST", "/call/3")
            .match_body(Matcher::PartialJson(json!({"type": "Initialize"})))
            .with_status(200)
            .with_body(json!({"type": "Features", "message": features}).to_string())
            .create_async()
            .await,
    );
    let transport = BridgeTransport::load(&server.url()).await?;
    Ok((transport, mocks))
}

#[tokio::test]
async fn test_public_key_with_pin_over_bridge() -> anyhow::Result<()> {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let (transport, _mocks) = bridge_with_device(
        &mut server,
        json!({"major_version": 1, "minor_version": 9, "patch_version": 0, "initialized": true}),
    )
    .await?;
    let _get_key = server
        .mock("POST", "/call/3")
        .match_body(Matcher::PartialJson(json!({"type": "GetPublicKey"})))
        .with_status(200)
        .with_body(r#"{"type": "PinMatrixRequest", "message": {"type": "PinMatrixRequestType_Current"}}"#)
        .create_async()
        .await;
    let pin_ack = server
        .mock("POST", "/call/3")
        .match_body(Matcher::PartialJson(
            json!({"type": "PinMatrixAck", "message": {"pin": "1397"}}),
        ))
        .with_status(200)
        .with_body(r#"{"type": "PublicKey", "message": {"xpub": "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj"}}"#)
        .create_async()
        .await;

    let (broker, mut events) = InteractionBroker::new();
    let mut device = wait_for_first_device(&transport, &RetryPolicy::default(), &broker).await?;

    let answer_pin = async {
        while let Some(event) = events.recv().await {
            if let UiEvent::RequestPin { .. } = event {
                broker.respond_pin("1397")?;
                break;
            }
        }
        anyhow::Ok(())
    };
    let (key, answered) = {
        let mut commands = device.commands(&broker, PassphraseMode::Prompt);
        tokio::join!(
            commands.get_public_key(&[0x8000_002c, 0x8000_0000, 0x8000_0000]),
            answer_pin
        )
    };
    answered?;

    assert!(key?.xpub.starts_with("xpub6Bos"));
    pin_ack.assert_async().await;
    device.release().await?;
    Ok(())
}

#[tokio::test]
async fn test_uninitialized_device_halts_and_is_released() -> anyhow::Result<()> {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let (transport, mocks) = bridge_with_device(
        &mut server,
        json!({"major_version": 1, "minor_version": 9, "patch_version": 0, "initialized": false}),
    )
    .await?;

    let (broker, _events) = InteractionBroker::new();
    let error = wait_for_first_device(&transport, &RetryPolicy::default(), &broker)
        .await
        .err()
        .ok_or_else(|| anyhow::anyhow!("uninitialized device was accepted"))?;

    assert_eq!(error.kind(), ErrorKind::Uninitialized);
    // release mock
    mocks[3].assert_async().await;
    Ok(())
}
