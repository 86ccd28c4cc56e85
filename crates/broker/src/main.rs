//! Broker launcher: parses CLI args, wires up a `Broker`, installs signal
//! handling, and runs the event loop until interrupted.

use std::sync::mpsc;

use anyhow::Result;
use broker_core::{Broker, BrokerArgs};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    let args = BrokerArgs::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "broker_core=info,broker=info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config = args.into_config()?;
    info!("starting broker on {}", config.bind_addr);
    let mut broker = Broker::bind(config)?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("received signal {sig}, shutting down");
                let _ = stop_tx.send(());
            }
        });
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("received Ctrl+C, shutting down");
            let _ = stop_tx.send(());
        })?;
    }

    broker.run_with_shutdown(stop_rx)?;
    Ok(())
}
