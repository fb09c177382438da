use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use panel_deck::{config::Config, connect, device::list_devices, display::parse_hex_color, App};

#[derive(Parser, Debug)]
#[command(name = "panel-deck")]
#[command(about = "Drive a 15-key Stream Deck panel")]
#[command(version)]
struct Cli {
    /// List attached panels and exit
    #[arg(long)]
    status: bool,

    /// Print --status output as JSON
    #[arg(long, requires = "status")]
    json: bool,

    /// Set device brightness (0-100, larger values are clamped)
    #[arg(long, value_name = "PERCENT")]
    brightness: Option<u8>,

    /// Clear all keys and show the idle wallpaper
    #[arg(long)]
    reset: bool,

    /// Fill a key with a color, e.g. --fill "#FF0000" --button 1
    #[arg(long, value_name = "HEX", requires = "button")]
    fill: Option<String>,

    /// Draw an image file to a key
    #[arg(long, value_name = "PATH", requires = "button")]
    image: Option<PathBuf>,

    /// Logical key number (1-15) for --fill and --image
    #[arg(long, value_name = "N")]
    button: Option<u8>,

    /// Use this config file instead of ~/.config/panel-deck/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn is_one_shot(&self) -> bool {
        self.brightness.is_some() || self.reset || self.fill.is_some() || self.image.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if cli.status {
        return check_status(&config, cli.json);
    }

    if cli.is_one_shot() {
        return run_one_shot(&cli, &config).await;
    }

    info!("Starting panel-deck");

    let mut app = App::new(config).await?;

    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let result = tokio::select! {
        result = app.run() => {
            result
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            Ok(())
        }
    };

    // Always run shutdown
    app.shutdown().await;
    result
}

fn check_status(config: &Config, json: bool) -> Result<()> {
    info!("Checking device status...");

    let devices = list_devices(config.device.vendor_id, config.device.product_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("✗ No device found");
        std::process::exit(1);
    }
    for device in &devices {
        println!("✓ Device found: {} {}", device.manufacturer, device.product);
        println!("  Serial: {}", device.serial_number);
        println!("  Path: {}", device.path);
    }
    Ok(())
}

async fn run_one_shot(cli: &Cli, config: &Config) -> Result<()> {
    let panel = connect(config).await?;

    let result = async {
        if cli.reset {
            panel.reset().await?;
            println!("✓ Device reset");
        }

        if let Some(brightness) = cli.brightness {
            panel.set_brightness(brightness).await?;
            println!("✓ Brightness set to {}%", brightness.min(100));
        }

        if let Some(hex) = &cli.fill {
            let Some(color) = parse_hex_color(hex) else {
                bail!("Invalid color '{}', expected #RRGGBB", hex);
            };
            let button = cli.button.context("--fill needs --button")?;
            panel.draw_color(color, button).await?;
            println!("✓ Filled button {} with {}", button, hex);
        }

        if let Some(path) = &cli.image {
            let button = cli.button.context("--image needs --button")?;
            panel.draw_image_file(path, button).await?;
            println!("✓ Drew {:?} on button {}", path, button);
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    panel.close().await;
    result
}
