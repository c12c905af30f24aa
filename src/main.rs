// MIT License - Copyright (c) 2026 Peter Wright
// Receiver daemon

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use alarmd::constants::DEFAULT_CONFIG_PATH;
use alarmd::notify::test_events;
use alarmd::{Config, Daemon, HidrawCapture, LogNotifier, MqttNotifier, Notifier, NotifierSet, SysfsKeyswitch};

/// How long `--notification-test` waits for MQTT delivery.
const NOTIFICATION_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "alarmd")]
#[command(about = "Contact ID central station receiver for DSC alarm panels")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Send two test events through the configured notifiers and exit
    #[arg(long)]
    notification_test: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=alarmd=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Failed to load config file")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    if cli.notification_test {
        return runtime.block_on(notification_test(config));
    }
    runtime.block_on(run(config))
}

/// The log notifier plus MQTT when configured.
fn build_notifiers(config: &Config) -> Result<(NotifierSet, Option<(MqttNotifier, JoinHandle<()>)>)> {
    let notifiers = NotifierSet::new().with(LogNotifier);
    let Some(mqtt) = &config.mqtt else {
        return Ok((notifiers, None));
    };
    let (notifier, handle) = MqttNotifier::connect(&mqtt.url, &mqtt.client_id, &mqtt.publish_topic)
        .context("Invalid MQTT configuration")?;
    info!("MQTT: publishing events to {}", notifier.topic());
    Ok((notifiers, Some((notifier, handle))))
}

async fn notification_test(config: Config) -> Result<()> {
    let (mut notifiers, mqtt) = build_notifiers(&config)?;
    let mqtt = match mqtt {
        Some((notifier, handle)) => {
            // A second client handle on the same connection, kept for the disconnect
            let control = notifier.clone();
            notifiers.push(notifier);
            Some((control, handle))
        }
        None => None,
    };

    info!("Sending notification");
    notifiers.notify(&test_events());

    if let Some((control, mut handle)) = mqtt {
        // Let the spawned publishes reach the client queue ahead of the disconnect
        tokio::task::yield_now().await;
        control.disconnect().await.context("Failed to flush MQTT")?;
        if tokio::time::timeout(NOTIFICATION_FLUSH_TIMEOUT, &mut handle).await.is_err() {
            handle.abort();
            warn!("MQTT broker unreachable, test events not delivered");
        }
    }
    info!("Notification test complete, exiting");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let receiver = &config.receiver;
    let capture = HidrawCapture::open(&receiver.capture_device, receiver.handshake_command.clone())
        .with_context(|| format!("Failed to open capture device {}", receiver.capture_device.display()))?;

    let keyswitch = match &config.keyswitch {
        Some(ks) => Some(
            SysfsKeyswitch::open(ks.gpio_pin, Duration::from_millis(ks.pulse_ms))
                .await
                .with_context(|| format!("Failed to set up keyswitch on GPIO {}", ks.gpio_pin))?,
        ),
        None => None,
    };

    let (mut notifiers, mqtt) = build_notifiers(&config)?;
    let mqtt_handle = mqtt.map(|(notifier, handle)| {
        notifiers.push(notifier);
        handle
    });

    let mut daemon = Daemon::new(config.daemon_config(), capture, keyswitch, notifiers)
        .context("Failed to start receiver")?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    };

    let result = daemon.run(shutdown).await;

    if let Some(handle) = mqtt_handle {
        handle.abort();
    }
    drop(daemon);

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            warn!("Receiver stopped: {e}");
            Err(e).context("Receiver loop failed")
        }
    }
}
