use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use facegate_core::RegionAnalyzer;
use facegate_hw::Camera;

mod client;
mod config;
mod presenter;
mod session;

use client::HttpRecognitionClient;
use config::Config;
use presenter::ConsolePresenter;
use session::{Session, SessionEnd, Timings};

#[derive(Parser)]
#[command(name = "facegate", about = "Face-login client with auto-capture")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auto-capture login loop
    Run {
        /// Recognition endpoint URL (overrides FACEGATE_RECOGNIZE_URL)
        #[arg(long)]
        url: Option<String>,
        /// Landing page URL announced on success (overrides FACEGATE_LANDING_URL)
        #[arg(long)]
        landing_url: Option<String>,
        /// Camera device path (overrides FACEGATE_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
    },
    /// List available camera devices
    Devices,
    /// Grab one frame and report the region brightness
    Test {
        /// Camera device path (overrides FACEGATE_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Run {
            url,
            landing_url,
            device,
        } => {
            if let Some(url) = url {
                config.recognize_url = Some(url);
            }
            if let Some(url) = landing_url {
                config.landing_url = Some(url);
            }
            if let Some(dev) = device {
                config.camera_device = dev;
            }
            run_login(config).await
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no video capture devices found");
            }
            for d in devices {
                println!("{}  {} ({})", d.path, d.name, d.driver);
            }
            Ok(())
        }
        Commands::Test { device } => {
            if let Some(dev) = device {
                config.camera_device = dev;
            }
            run_diagnostics(&config)
        }
    }
}

async fn run_login(config: Config) -> Result<()> {
    let Some(recognize_url) = config.recognize_url.clone() else {
        bail!("recognition endpoint not configured (set FACEGATE_RECOGNIZE_URL or pass --url)");
    };

    let camera = Camera::open(&config.camera_device)?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        "camera ready"
    );

    let session = Session::new(
        camera,
        HttpRecognitionClient::new(recognize_url),
        ConsolePresenter,
        config.region_radius,
        Timings {
            tick_interval: config.tick_interval,
            dwell_threshold: config.dwell_threshold,
            retry_delay: config.retry_delay,
            nav_delay: config.nav_delay,
        },
        config.warmup_frames,
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match session.run(cancel).await? {
        SessionEnd::Authenticated => match &config.landing_url {
            Some(url) => println!("Navigating to {url}"),
            None => println!("Authenticated."),
        },
        SessionEnd::Cancelled => {
            tracing::info!("login session cancelled");
        }
    }
    Ok(())
}

fn run_diagnostics(config: &Config) -> Result<()> {
    let camera = Camera::open(&config.camera_device)?;
    for _ in 0..config.warmup_frames {
        let _ = camera.sample();
    }

    match camera.sample()? {
        Some(frame) => {
            let analyzer = RegionAnalyzer::new(config.region_radius);
            let signal = analyzer.analyze(&frame.data, frame.width, frame.height);
            println!("frame: {}x{}", frame.width, frame.height);
            println!(
                "region mean brightness: {:.1} ({} pixels)",
                signal.mean_brightness, signal.sampled_pixels
            );
            println!("presence: {}", signal.present);
        }
        None => println!("no frame available yet"),
    }
    Ok(())
}
