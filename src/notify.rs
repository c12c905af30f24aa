// MIT License - Copyright (c) 2026 Peter Wright
// Event notification sinks

use std::time::Duration;

use chrono::Utc;
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Outgoing, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{AlarmError, Result};
use crate::event::{BatchClock, Event, ReportType};

/// Receives the events worth telling someone about.
///
/// `notify` must return promptly; delivery happens in the background and
/// failures are only logged.
pub trait Notifier {
    fn notify(&self, events: &[Event]);
}

/// Writes a one-line summary of each notified batch to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, events: &[Event]) {
        if events.is_empty() {
            info!("Empty Code List!");
            return;
        }
        let summary: Vec<String> = events.iter().map(ToString::to_string).collect();
        info!("Home Alarm Calling: {}", summary.join(", "));
    }
}

/// Two placeholder events for checking the configured notifiers end to end.
pub fn test_events() -> Vec<Event> {
    let mut clock = BatchClock::new();
    (1..=2)
        .map(|n| {
            Event::new(
                clock.next(),
                ReportType::Event,
                "TST",
                format!("{n:03}"),
                format!("This is test event #{n}"),
                "",
            )
        })
        .collect()
}

/// Fans a batch out to every configured notifier.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    pub fn push(&mut self, notifier: impl Notifier + 'static) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for NotifierSet {
    fn notify(&self, events: &[Event]) {
        for notifier in &self.notifiers {
            notifier.notify(events);
        }
    }
}

/// MQTT payload for one alarm event, published to `<topic>/event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttAlarmEvent {
    /// Publish time, milliseconds since the Unix epoch.
    pub now: u64,
    pub op: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub description: String,
    #[serde(rename = "eventCode")]
    pub event_code: String,
    pub zone: String,
    /// Event time, microseconds since the Unix epoch.
    pub timestamp: i64,
}

impl MqttAlarmEvent {
    pub fn from_event(event: &Event, now: u64) -> Self {
        Self {
            now,
            op: "ALARM_EVENT".to_string(),
            report_type: event.report_type,
            description: event.description.clone(),
            event_code: event.event_code.clone(),
            zone: event.zone_or_user.clone(),
            timestamp: event.timestamp,
        }
    }
}

fn now_epoch_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Publishes notified events to an MQTT broker.
#[derive(Clone)]
pub struct MqttNotifier {
    client: AsyncClient,
    topic: String,
}

impl MqttNotifier {
    /// Create the client and spawn its event loop. Connection happens in the
    /// background; the returned handle drives it until aborted.
    pub fn connect(url: &str, client_id: &str, publish_topic: &str) -> Result<(Self, JoinHandle<()>)> {
        let (host, port) = parse_mqtt_url(url)?;
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => info!("MQTT: connected"),
                    Ok(MqttEvent::Outgoing(Outgoing::Disconnect)) => {
                        info!("MQTT: disconnected");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let notifier = Self {
            client,
            topic: format!("{}/event", publish_topic.trim_end_matches('/')),
        };
        Ok((notifier, handle))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Queue a disconnect behind any publishes already handed to the client.
    /// The event loop task ends once it has been sent.
    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl Notifier for MqttNotifier {
    fn notify(&self, events: &[Event]) {
        let now = now_epoch_ms();
        for event in events {
            let payload = match serde_json::to_string(&MqttAlarmEvent::from_event(event, now)) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize MQTT payload: {e}");
                    continue;
                }
            };
            let client = self.client.clone();
            let topic = self.topic.clone();
            tokio::spawn(async move {
                match client.publish(&topic, QoS::AtLeastOnce, false, payload).await {
                    Ok(()) => debug!("Published event to {topic}"),
                    Err(e) => error!("Failed to publish to {topic}: {e}"),
                }
            });
        }
    }
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let invalid = |reason: &str| AlarmError::Config {
        reason: format!("{reason}: {url}"),
    };
    let (host, port_str) = stripped
        .rsplit_once(':')
        .ok_or_else(|| invalid("MQTT URL must be in format mqtt://host:port"))?;
    let port: u16 = port_str
        .parse()
        .map_err(|_| invalid("Invalid MQTT port number"))?;

    Ok((host.to_string(), port))
}
