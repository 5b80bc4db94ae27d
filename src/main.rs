//! # wlframe - Wayland frame backend driver
//!
//! Opens a display, creates one frame and prints the host events it
//! receives until the compositor asks the frame to close.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use wlframe::event_queue::EventKind;
use wlframe::logging::{init_logging, LogLevel};
use wlframe::wait::pselect_readable;
use wlframe::{fns, ConnectionRegistry, FrameParams, ParamValue, StandaloneHost, WlFrameConfig};

#[derive(Parser)]
#[command(name = "wlframe")]
#[command(about = "Open a Wayland frame and print the events it receives")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/wlframe/wlframe.toml")]
    config: String,

    /// Wayland display name or socket path
    #[arg(long)]
    display: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Frame title
    #[arg(short, long)]
    title: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = WlFrameConfig::load(&cli.config);
    let mut log_config = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => Default::default(),
    };
    if cli.debug {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config);

    info!("🚀 Starting wlframe");
    info!(
        "📄 Version: {} ({}, {})",
        wlframe::VERSION,
        wlframe::GIT_COMMIT,
        wlframe::BUILD_DATE
    );

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            WlFrameConfig::default()
        }
    };

    let host = Arc::new(StandaloneHost::new());
    host.set_modifier_preferences(config.keyboard.preferences());
    host.set_extra_keyboard_modifiers(config.keyboard.extra_host_modifiers());

    let mut registry = ConnectionRegistry::new(host.clone(), config.registry_options());
    let display = cli.display.or(config.display.name);
    let connection = fns::open_connection(&mut registry, display.as_deref(), None, true)?;
    let terminal = registry
        .connection(connection)
        .map(|c| c.terminal())
        .context("connection vanished after opening")?;

    let mut params = FrameParams::new().with("terminal", ParamValue::Int(terminal.id as i64));
    if let Some(title) = cli.title {
        params.push("title", ParamValue::Str(title));
    }
    let frame = fns::create_frame(&mut registry, params)?;
    host.select_frame(Some(frame));

    loop {
        let fds = host.wait_descriptors();
        let ready = registry.wait(|| pselect_readable(&fds, Some(Duration::from_secs(5)), None))?;
        match ready {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("waiting for the compositor failed"),
        }

        let mut closed = false;
        registry.read_socket(terminal, |event| {
            println!("{:?}", event);
            if event.kind == EventKind::DeleteWindow && event.frame == Some(frame) {
                closed = true;
            }
        })?;

        if closed {
            info!("👋 {:?} closed by the compositor", frame);
            if let Err(e) = fns::delete_frame(&mut registry, frame) {
                warn!("deleting {:?} failed: {}", frame, e);
            }
            break;
        }
    }

    registry.shutdown();
    Ok(())
}
