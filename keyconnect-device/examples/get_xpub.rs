//! Example: export an extended public key through the device bridge
//!
//! Usage: get_xpub [bridge-url]
//! PIN and passphrase prompts are answered from stdin.

use keyconnect_device::{
    BridgeTransport, DEFAULT_BRIDGE_URL, InteractionBroker, PassphraseMode, RetryPolicy, UiEvent,
    wait_for_first_device,
};
use std::env;
use std::io::BufRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let url = env::args().nth(1).unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string());
    println!("Connecting to bridge at {url}...");
    let transport = BridgeTransport::load(&url).await?;

    let (broker, mut events) = InteractionBroker::new();
    let prompts = broker.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UiEvent::RequestPin { .. } => {
                    println!("Enter PIN (matrix positions):");
                    let _ = prompts.respond_pin(read_line());
                }
                UiEvent::RequestPassphrase => {
                    println!("Enter passphrase:");
                    let _ = prompts.respond_passphrase(read_line());
                }
                UiEvent::RequestButton { .. } => println!("Confirm on the device"),
                UiEvent::Notice(notice) => println!("Device: {}", notice.kind),
                _ => {}
            }
        }
    });

    let mut device = wait_for_first_device(&transport, &RetryPolicy::default(), &broker).await?;
    println!("Firmware {}", device.version());

    for (purpose, name) in [(44, "Legacy (P2PKH)"), (49, "Nested SegWit"), (84, "Native SegWit")] {
        let path = [0x8000_0000 | purpose, 0x8000_0000, 0x8000_0000];
        let key = device
            .commands(&broker, PassphraseMode::Prompt)
            .get_public_key(&path)
            .await?;
        println!("\n{name} - m/{purpose}'/0'/0'");
        println!("{}", key.xpub);
    }

    device.release().await?;
    Ok(())
}

fn read_line() -> String {
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}
