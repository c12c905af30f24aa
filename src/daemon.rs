// MIT License - Copyright (c) 2026 Peter Wright
// Receiver daemon loop

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::contact_id::{Collector, Decoder};
use crate::controller::{ArmController, ConfirmationWindow};
use crate::error::{AlarmError, Result};
use crate::event::Event;
use crate::hardware::{CaptureDevice, Keyswitch, Sample};
use crate::notify::Notifier;
use crate::protocol::{encode_frame, read_frame_bytes, Command, Request, Response};
use crate::status::AlarmStatus;

/// Unix socket the control channel listens on. The socket file is removed
/// when the listener is dropped.
pub struct ControlListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Bind at `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            debug!("Removing stale control socket {}", path.display());
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!("Control socket listening on {}", path.display());
        Ok(Self { listener, path })
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove control socket {}: {e}", self.path.display());
        }
    }
}

/// Single-threaded receiver: decodes panel calls, serves control requests
/// and times out unconfirmed arm/disarm requests, one at a time.
pub struct Daemon<C, K, N> {
    config: DaemonConfig,
    capture: C,
    controller: ArmController<K>,
    notifier: N,
    status: AlarmStatus,
    collector: Collector,
    decoder: Decoder,
    window: ConfirmationWindow,
    listener: ControlListener,
}

impl<C, K, N> Daemon<C, K, N>
where
    C: CaptureDevice,
    K: Keyswitch,
    N: Notifier,
{
    /// Load the persisted status and bind the control socket.
    pub fn new(config: DaemonConfig, capture: C, keyswitch: Option<K>, notifier: N) -> Result<Self> {
        if keyswitch.is_none() {
            info!("No keyswitch configured, arm/disarm requests will be refused");
        }
        let status = AlarmStatus::load(&config.data_file_path)
            .with_notify_auto_events(config.notify_auto_events);
        let listener = ControlListener::bind(&config.socket_path)?;

        Ok(Self {
            collector: Collector::new(config.phone_number.clone()),
            decoder: Decoder::new(config.zone_names.clone()),
            window: ConfirmationWindow::new(config.confirm_timeout),
            controller: ArmController::new(keyswitch),
            config,
            capture,
            notifier,
            status,
            listener,
        })
    }

    pub fn status(&self) -> &AlarmStatus {
        &self.status
    }

    pub fn socket_path(&self) -> &Path {
        self.listener.path()
    }

    /// When the pending arm/disarm request will be given up, if any.
    pub fn confirmation_deadline(&self) -> Option<Instant> {
        self.window.deadline()
    }

    /// Run until `shutdown` completes or the capture device goes away.
    ///
    /// Sources are polled in priority order: a call, then a control request,
    /// then the confirmation deadline. A confirming report that arrives as
    /// the deadline expires is therefore applied first and the abort skipped.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        info!("Ready, listening for alarms");

        loop {
            self.window.sync(self.status.arm_status());
            let deadline = self.window.deadline();

            tokio::select! {
                biased;

                sample = self.capture.next_sample() => match sample {
                    Ok(first) => self.handle_call(first).await?,
                    Err(AlarmError::ChannelClosed) => {
                        error!("Capture device closed");
                        return Err(AlarmError::ChannelClosed);
                    }
                    Err(e) => error!("Capture device error: {e}"),
                },

                conn = self.listener.accept() => match conn {
                    Ok(stream) => {
                        if let Err(e) = self.serve_connection(stream).await {
                            if e.is_connection_local() {
                                warn!("Dropping control connection: {e}");
                            } else {
                                error!("Control connection failed: {e}");
                            }
                        }
                    }
                    Err(e) => warn!("Control accept failed: {e}"),
                },

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.confirmation_expired();
                }

                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process one call. Only loss of the capture device is returned.
    async fn handle_call(&mut self, first: Sample) -> Result<()> {
        let messages = match self.collector.handle_call(&mut self.capture, first).await {
            Ok(Some(messages)) => messages,
            Ok(None) => {
                debug!("Ignoring call that did not dial the receiver");
                return Ok(());
            }
            Err(AlarmError::ChannelClosed) => return Err(AlarmError::ChannelClosed),
            Err(e) => {
                error!("Call aborted: {e}");
                return Ok(());
            }
        };

        let events = self.decoder.decode(&messages);
        let notify_events = self.status.add_new_events(events);
        self.dispatch_notifications(&notify_events);
        Ok(())
    }

    fn confirmation_expired(&mut self) {
        info!("Timed out waiting for {} confirmation", self.status.arm_status());
        let notify_events = self.controller.abort_pending(&mut self.status);
        self.dispatch_notifications(&notify_events);
    }

    fn dispatch_notifications(&self, events: &[Event]) {
        if !events.is_empty() {
            self.notifier.notify(events);
        }
    }

    /// Read one request, answer it and close the connection.
    async fn serve_connection(&mut self, mut stream: UnixStream) -> Result<()> {
        let payload = timeout(self.config.request_timeout, read_frame_bytes(&mut stream))
            .await
            .map_err(|_| AlarmError::RequestTimeout)??;

        let response = match serde_json::from_slice::<Request>(&payload) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!("Malformed control request: {e}");
                Response::error(format!("Invalid request: {e}"))
            }
        };
        let frame = match encode_frame(&response) {
            Err(AlarmError::FrameTooLarge { len, max }) => {
                warn!("Control response of {len} bytes exceeds {max}");
                encode_frame(&Response::error(format!(
                    "Response too large ({len} bytes, max {max}), reduce limit"
                )))?
            }
            other => other?,
        };
        stream.write_all(&frame).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Execute one control command.
    pub async fn dispatch(&mut self, request: Request) -> Response {
        let command = request.command;
        info!("Control command: {}", command.as_str());

        let result = match command {
            Command::Arm => self.controller.request_arm(&mut self.status, false).await,
            Command::AutoArm => self.controller.request_arm(&mut self.status, true).await,
            Command::Disarm => self.controller.request_disarm(&mut self.status, false).await,
            Command::AutoDisarm => self.controller.request_disarm(&mut self.status, true).await,
            Command::Status => return respond(command, Ok(self.status.status_snapshot())),
            Command::History => {
                let options = request.options.unwrap_or_default();
                let history = self.status.history_slice(options.offset, options.limit);
                return respond(command, history);
            }
        };
        respond(command, result)
    }
}

fn respond<T: serde::Serialize>(command: Command, result: Result<T>) -> Response {
    match result.and_then(Response::ok) {
        Ok(response) => response,
        Err(e) => {
            warn!("Control command {} failed: {e}", command.as_str());
            Response::error(e.to_string())
        }
    }
}
