use clap::Parser;
use evdevio::ecodes::{self, EV_KEY};
use evdevio::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// Type text through a virtual keyboard
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Lowercase letters, digits and spaces to type
    #[arg(default_value = "hello evdevio")]
    text: String,

    /// Device name to register
    #[arg(short, long, default_value = "evdevio virtual keyboard")]
    name: String,

    /// Delay between key presses in milliseconds
    #[arg(short, long, default_value = "30")]
    delay: u64,
}

/// Key code for a character, following the US layout
fn keycode(c: char) -> Option<u16> {
    let name = match c {
        ' ' => "KEY_SPACE".to_string(),
        'a'..='z' | '0'..='9' => format!("KEY_{}", c.to_ascii_uppercase()),
        _ => return None,
    };
    ecodes::registry().value(&name)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut codes: Vec<u16> = args.text.chars().filter_map(keycode).collect();
    codes.sort_unstable();
    codes.dedup();

    let mut events = Capabilities::new();
    events.extend(EV_KEY, codes);

    let ui = UInput::builder()
        .name(&args.name)
        .events(events)
        .config(Config::from_env())
        .build()?;
    println!("Created {}", ui);
    match ui.device() {
        Ok(device) => println!("Event node: {}", device.path().display()),
        Err(e) => println!("Event node unknown: {}", e),
    }

    // Give the desktop a moment to pick up the new keyboard
    sleep(Duration::from_millis(500)).await;

    for c in args.text.chars() {
        let Some(code) = keycode(c) else {
            println!("Skipping {:?}", c);
            continue;
        };
        ui.write_event(KeyEvent::new(InputEvent::new(EV_KEY, code, KeyState::Down.value())))?;
        ui.syn()?;
        ui.write_event(KeyEvent::new(InputEvent::new(EV_KEY, code, KeyState::Up.value())))?;
        ui.syn()?;
        sleep(Duration::from_millis(args.delay)).await;
    }

    println!("Done, destroying device");
    Ok(())
}
