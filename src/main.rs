#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::runtime::Builder;
use tokio::signal;
use validator::Validate;

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    #[structopt(long)]
    dump_config: bool,
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    // Load configuration
    let config = if let Some(config_path) = opts.config_path.as_deref() {
        neolight::models::Config::load_file(config_path).await?
    } else {
        Default::default()
    };

    config.validate()?;

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_string()?);
        return Ok(());
    }

    // Initialize the output device and the engine around it
    let device = neolight::device::Device::new(&config.identity.name, config.device.clone()).await?;

    info!(
        name = %config.identity.name,
        leds = device.led_count(),
        "initialized light"
    );

    let engine = neolight::engine::Engine::new(device);

    // Run the MQTT bridge until ctrl-c or a fatal error
    let bridge = neolight::mqtt::MqttBridge::new(&config, engine);
    let mut service = tokio::spawn(bridge.run());

    tokio::select! {
        _ = signal::ctrl_c() => {}
        result = &mut service => {
            result??;
        }
    }

    Ok(())
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("NEOLIGHT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "neolight=warn,neolightd=warn",
            1 => "neolight=info,neolightd=info",
            2 => "neolight=debug,neolightd=debug",
            _ => "neolight=trace,neolightd=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(run(opts))
}
