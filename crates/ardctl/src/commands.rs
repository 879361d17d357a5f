//! CLI command implementations

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ardconf::{ArdConfig, ConfigSources};
use ardmix::{ArdourClient, ClientConfig, ClientEvent, Component, Strip};
use tracing::{info, warn};

const CLIENT_NAME: &str = "ardctl";

/// Parse an on/off switch argument.
pub fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

/// How a strip was named on the command line.
#[derive(Debug, PartialEq)]
enum StripSelector {
    Index(u32),
    Name(String),
}

impl StripSelector {
    fn parse(s: &str) -> Self {
        match s.trim().parse::<u32>() {
            Ok(index) => StripSelector::Index(index),
            Err(_) => StripSelector::Name(s.to_string()),
        }
    }
}

fn client_for(conf: &ArdConfig) -> ArdourClient {
    ArdourClient::new(ClientConfig::from_conf(CLIENT_NAME, conf))
}

async fn connect(conf: &ArdConfig, auto_reconnect: bool) -> Result<ArdourClient> {
    let mut client = client_for(conf);
    client
        .connect(auto_reconnect)
        .await
        .with_context(|| format!("Failed to connect to {}", conf.connection.authority()))?;
    Ok(client)
}

/// Connect and wait for the initial strip snapshot.
async fn connect_ready(conf: &ArdConfig) -> Result<ArdourClient> {
    let mut client = connect(conf, false).await?;
    let wait = Duration::from_millis(conf.connection.connect_timeout_ms);
    match tokio::time::timeout(wait, client.wait_ready()).await {
        Ok(true) => Ok(client),
        Ok(false) => bail!("Connection closed before the mixer snapshot arrived"),
        Err(_) => bail!("Mixer snapshot not received within {:?}", wait),
    }
}

fn find_strip<'a>(client: &'a mut ArdourClient, selector: &str) -> Result<&'a mut Strip> {
    let mixer = client
        .mixer_mut()
        .ok_or_else(|| anyhow!("Client components are disabled in the configuration"))?;
    let strip = match StripSelector::parse(selector) {
        StripSelector::Index(index) => mixer.strip_mut(&[index]),
        StripSelector::Name(name) => mixer.strip_by_name_mut(&name),
    };
    strip.ok_or_else(|| anyhow!("No strip matches '{}'", selector))
}

/// Print traffic until interrupted or the connection is gone for good.
pub async fn watch(conf: &ArdConfig, auto_reconnect: bool) -> Result<()> {
    let mut client = client_for(conf);
    client.on_any(|event| match event {
        ClientEvent::Message { message, inbound } => {
            let arrow = if *inbound { "<-" } else { "->" };
            println!("{} {}", arrow, message);
        }
        ClientEvent::Connected(true) => info!("connected"),
        ClientEvent::Connected(false) => info!("disconnected"),
        ClientEvent::Error(error) => warn!("{}", error),
    });

    if let Err(e) = client.connect(auto_reconnect).await {
        if !auto_reconnect {
            return Err(e)
                .with_context(|| format!("Failed to connect to {}", conf.connection.authority()));
        }
        warn!("{}: will keep retrying", e);
    }

    let interrupted = tokio::select! {
        _ = client.run() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        client.disconnect().await;
    }
    Ok(())
}

/// List strips, optionally with plugins and parameters.
pub async fn strips(conf: &ArdConfig, with_plugins: bool) -> Result<()> {
    let mut client = connect_ready(conf).await?;
    {
        let mixer = client
            .mixer()
            .ok_or_else(|| anyhow!("Client components are disabled in the configuration"))?;

        for strip in mixer.strips() {
            println!(
                "{:>3}  {:<24} {:<8} {:>7.1} dB{}",
                strip.addr()[0],
                strip.name(),
                strip_kind(strip),
                strip.gain(),
                if strip.mute() { "  muted" } else { "" }
            );
            if !with_plugins {
                continue;
            }
            for plugin in strip.plugins() {
                println!(
                    "       {} {}",
                    if plugin.enabled() { "+" } else { "-" },
                    plugin.name()
                );
                for param in plugin.parameters() {
                    println!(
                        "           {:<20} {} [{} .. {}] {}",
                        param.name(),
                        param.value(),
                        param.min(),
                        param.max(),
                        param.value_type()
                    );
                }
            }
        }
    }
    client.disconnect().await;
    Ok(())
}

fn strip_kind(strip: &Strip) -> &'static str {
    if strip.is_master() {
        "master"
    } else if strip.is_monitor() {
        "monitor"
    } else if strip.is_vca() {
        "vca"
    } else if strip.is_midi() {
        "midi"
    } else if strip.is_audio() {
        "audio"
    } else {
        "other"
    }
}

pub async fn gain(conf: &ArdConfig, selector: &str, db: f64) -> Result<()> {
    let mut client = connect_ready(conf).await?;
    let strip = find_strip(&mut client, selector)?;
    strip.set_gain(db).context("Failed to send gain")?;
    println!("{}: {:.1} dB", strip.name(), db);
    client.disconnect().await;
    Ok(())
}

pub async fn mute(conf: &ArdConfig, selector: &str, state: bool) -> Result<()> {
    let mut client = connect_ready(conf).await?;
    let strip = find_strip(&mut client, selector)?;
    strip.set_mute(state).context("Failed to send mute")?;
    println!("{}: {}", strip.name(), if state { "muted" } else { "unmuted" });
    client.disconnect().await;
    Ok(())
}

pub async fn roll(conf: &ArdConfig, state: bool) -> Result<()> {
    let mut client = connect(conf, false).await?;
    client
        .transport_mut()
        .ok_or_else(|| anyhow!("Client components are disabled in the configuration"))?
        .set_roll(state)
        .context("Failed to send roll")?;
    client.disconnect().await;
    Ok(())
}

pub async fn tempo(conf: &ArdConfig, bpm: f64) -> Result<()> {
    if !(bpm.is_finite() && bpm > 0.0) {
        bail!("Tempo must be a positive number, got {}", bpm);
    }
    let mut client = connect(conf, false).await?;
    client
        .transport_mut()
        .ok_or_else(|| anyhow!("Client components are disabled in the configuration"))?
        .set_tempo(bpm)
        .context("Failed to send tempo")?;
    client.disconnect().await;
    Ok(())
}

pub async fn surfaces(conf: &ArdConfig) -> Result<()> {
    let listing = client_for(conf)
        .available_surfaces()
        .await
        .context("Failed to fetch surfaces.json")?;
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

pub async fn manifest(conf: &ArdConfig) -> Result<()> {
    let manifest = client_for(conf)
        .surface_manifest()
        .await
        .context("Failed to fetch manifest.xml")?;
    for (key, value) in manifest {
        println!("{key} = {value}");
    }
    Ok(())
}

pub fn print_config(conf: &ArdConfig, sources: &ConfigSources) {
    for file in &sources.files {
        println!("# loaded {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# override {var}");
    }
    print!("{}", conf.to_toml());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switches() {
        assert_eq!(parse_switch("on"), Ok(true));
        assert_eq!(parse_switch("OFF"), Ok(false));
        assert_eq!(parse_switch("1"), Ok(true));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn strip_selectors() {
        assert_eq!(StripSelector::parse("3"), StripSelector::Index(3));
        assert_eq!(StripSelector::parse(" 0 "), StripSelector::Index(0));
        assert_eq!(StripSelector::parse("Kick"), StripSelector::Name("Kick".to_string()));
        assert_eq!(StripSelector::parse("-1"), StripSelector::Name("-1".to_string()));
    }
}
