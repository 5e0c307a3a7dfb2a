use clap::Parser;
use evdevio::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Print events from an input device until interrupted
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event node to read, e.g. /dev/input/event3. Lists devices when omitted.
    device: Option<PathBuf>,

    /// Take exclusive delivery while reading
    #[arg(short, long)]
    grab: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let Some(path) = args.device else {
        for path in list_devices(&config.input_dir) {
            match InputDevice::open(&path) {
                Ok(device) => println!("{}\t{}\t{}", path.display(), device.name(), device.info()),
                Err(e) => println!("{}\t({})", path.display(), e),
            }
        }
        return Ok(());
    };

    let device = InputDevice::open(&path)?;
    println!("{}", device);
    println!("{}", device.info());
    for ty in device.capabilities_verbose(true) {
        let names: Vec<&str> = ty
            .codes
            .iter()
            .map(|entry| match entry {
                ResolvedEntry::Code(named) => named.name.as_str(),
                ResolvedEntry::Abs(named, _) => named.name.as_str(),
            })
            .collect();
        println!("  {} ({}): {}", ty.ev_type.name, ty.ev_type.value, names.join(" "));
    }
    println!();

    let _grab = if args.grab {
        Some(device.grab_scoped()?)
    } else {
        None
    };

    let mut stream = EventStream::new(&device)?;
    println!("Reading events, press Ctrl+C to exit");
    loop {
        tokio::select! {
            event = stream.next_event() => match event {
                Some(event) => println!("{}", categorize(event?)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
