//! ardctl - command-line remote for Ardour's WebSockets mixer surface
//!
//! Subcommands:
//! - `ardctl watch` - Print state traffic as it happens
//! - `ardctl strips` - List strips once the snapshot is in
//! - `ardctl gain|mute <strip> ...` - Change a strip
//! - `ardctl roll|tempo ...` - Drive the transport
//! - `ardctl surfaces|manifest` - Fetch HTTP metadata
//! - `ardctl config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use ardconf::ArdConfig;
use clap::{Parser, Subcommand};

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "ardctl")]
#[command(about = "Remote control for the Ardour mixer surface")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ./ardmix.toml
    #[arg(long, global = true, env = "ARDMIX_CONFIG")]
    config: Option<PathBuf>,

    /// Host running Ardour (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Surface port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every message crossing the socket
    Watch {
        /// Exit when the connection drops instead of reconnecting
        #[arg(long)]
        no_reconnect: bool,
    },

    /// List strips with their gain and mute state
    Strips {
        /// Include plugins and their parameters
        #[arg(short, long)]
        plugins: bool,
    },

    /// Set a strip's gain in dB
    Gain {
        /// Strip index or name
        strip: String,

        /// Gain in dB
        #[arg(allow_hyphen_values = true)]
        db: f64,
    },

    /// Mute or unmute a strip
    Mute {
        /// Strip index or name
        strip: String,

        /// on or off
        #[arg(value_parser = commands::parse_switch)]
        state: bool,
    },

    /// Start or stop the transport
    Roll {
        /// on or off
        #[arg(value_parser = commands::parse_switch)]
        state: bool,
    },

    /// Set the session tempo
    Tempo {
        /// Beats per minute
        bpm: f64,
    },

    /// List surfaces served by Ardour
    Surfaces,

    /// Show the manifest of the configured surface
    Manifest,

    /// Print the effective configuration and where it came from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut conf, sources) = ArdConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        conf.connection.host = host;
    }
    if let Some(port) = cli.port {
        conf.connection.port = port;
    }

    telemetry::init(&conf.telemetry.log_level);

    match cli.command {
        Commands::Watch { no_reconnect } => {
            commands::watch(&conf, !no_reconnect && conf.client.auto_reconnect).await?;
        }
        Commands::Strips { plugins } => {
            commands::strips(&conf, plugins).await?;
        }
        Commands::Gain { strip, db } => {
            commands::gain(&conf, &strip, db).await?;
        }
        Commands::Mute { strip, state } => {
            commands::mute(&conf, &strip, state).await?;
        }
        Commands::Roll { state } => {
            commands::roll(&conf, state).await?;
        }
        Commands::Tempo { bpm } => {
            commands::tempo(&conf, bpm).await?;
        }
        Commands::Surfaces => {
            commands::surfaces(&conf).await?;
        }
        Commands::Manifest => {
            commands::manifest(&conf).await?;
        }
        Commands::Config => {
            commands::print_config(&conf, &sources);
        }
    }

    Ok(())
}
