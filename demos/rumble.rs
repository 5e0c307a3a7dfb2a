use clap::Parser;
use evdevio::ecodes::{BTN_EAST, BTN_SOUTH, EV_FF, EV_KEY, EV_UINPUT, FF_GAIN, FF_RUMBLE, UI_FF_ERASE, UI_FF_UPLOAD};
use evdevio::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Serve force-feedback requests for a virtual gamepad
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seconds to keep serving requests
    #[arg(short, long, default_value = "30")]
    seconds: u64,

    /// Upload and play one rumble effect against the device ourselves
    #[arg(long)]
    self_test: bool,
}

/// Acts as a game would: upload a rumble, play it, then free the slot
fn play_rumble(node: PathBuf) -> Result<()> {
    let pad = InputDevice::open(&node)?;
    let id = pad.upload_effect(&Effect::rumble(0xc000, 0x4000, 500))?;
    println!("Client: uploaded rumble into slot {}", id);
    pad.write(EV_FF, id as u16, 1)?;
    std::thread::sleep(Duration::from_millis(600));
    pad.erase_effect(id)?;
    println!("Client: erased slot {}", id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut events = Capabilities::new();
    events.extend(EV_KEY, [BTN_SOUTH, BTN_EAST]);
    events.extend(EV_FF, [FF_RUMBLE, FF_GAIN]);

    let ui = UInput::builder()
        .name("evdevio rumble pad")
        .vendor(0x045e)
        .product(0x028e)
        .max_effects(16)
        .events(events)
        .config(Config::from_env())
        .build()?;
    let node = ui.device()?.path().to_path_buf();
    println!("Created {}", ui);
    println!("Send force feedback to {}", node.display());

    let mut stream = EventStream::new(&ui)?;
    if args.self_test {
        tokio::task::spawn_blocking(move || {
            if let Err(e) = play_rumble(node) {
                eprintln!("Client failed: {}", e);
            }
        });
    }

    let deadline = tokio::time::sleep(Duration::from_secs(args.seconds));
    tokio::pin!(deadline);
    loop {
        let event = tokio::select! {
            event = stream.next_event() => match event {
                Some(event) => event?,
                None => break,
            },
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        };

        match (event.type_, event.code) {
            (EV_UINPUT, UI_FF_UPLOAD) => {
                let mut request = ui.begin_upload(event.value as u32)?;
                let effect = request.effect();
                match effect.rumble_magnitudes() {
                    Some((strong, weak)) => println!(
                        "Upload into slot {}: rumble strong={} weak={} length={}ms",
                        effect.id(),
                        strong,
                        weak,
                        effect.replay().0
                    ),
                    None => println!("Upload into slot {}: effect type {:#x}", effect.id(), effect.effect_type()),
                }
                request.set_retval(0);
                ui.end_upload(request)?;
            }
            (EV_UINPUT, UI_FF_ERASE) => {
                let mut request = ui.begin_erase(event.value as u32)?;
                println!("Erase slot {}", request.effect_id());
                request.set_retval(0);
                ui.end_erase(request)?;
            }
            (EV_FF, FF_GAIN) => println!("Gain set to {}", event.value),
            (EV_FF, slot) => {
                if event.value > 0 {
                    println!("Play slot {} ({} times)", slot, event.value);
                } else {
                    println!("Stop slot {}", slot);
                }
            }
            _ => {}
        }
    }

    println!("Cleaning up..");
    Ok(())
}
