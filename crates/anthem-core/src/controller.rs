// ── Controller abstraction ──
//
// Session lifecycle for one Anthem account. `open()` authenticates,
// resolves the account, loads its device listing, and spawns background
// tasks (command processor, realtime forwarder). `close()` stops them.
// Dropping the last `Controller` clone cancels everything it spawned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anthem_api::{
    Account, AnthemClient, Device, DeviceState, DeviceTarget, Preset, PresetList,
    RealtimeChannel, RealtimeEvent, TokenManager, TokenState,
};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::ControllerConfig;
use crate::error::CoreError;

const COMMAND_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Session state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── ControllerEvent ──────────────────────────────────────────────

/// Notifications delivered to subscribers of [`Controller::events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    RealtimeConnected,
    RealtimeDisconnected { reason: String },
    /// Device state may have changed; re-read it through the controller.
    Invalidated { source: String },
    /// The realtime channel gave up. Requests still work.
    RealtimeFailed { message: String },
}

impl From<RealtimeEvent> for ControllerEvent {
    fn from(event: RealtimeEvent) -> Self {
        match event {
            RealtimeEvent::Connected => Self::RealtimeConnected,
            RealtimeEvent::Disconnected { reason } => Self::RealtimeDisconnected { reason },
            RealtimeEvent::Invalidate { topic } => Self::Invalidated { source: topic },
            RealtimeEvent::MethodInvoked { method, .. } => Self::Invalidated { source: method },
        }
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    shared: Arc<Shared>,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<ControllerEvent>,
    command_tx: Mutex<Option<mpsc::Sender<CommandEnvelope>>>,
    /// Root token; cancelled when the last clone is dropped.
    cancel: CancellationToken,
    /// Child of `cancel` for the current open session.
    session: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Set while the current session has a live realtime forwarder.
    realtime_active: Arc<AtomicBool>,
    /// Serializes `open` and `close`.
    lifecycle: Mutex<()>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State shared with background tasks. Holds no task handles, so tasks
/// never keep the controller alive.
struct Shared {
    config: ControllerConfig,
    client: AnthemClient,
    customer_id: Mutex<Option<String>>,
    account: Mutex<Option<Account>>,
}

impl Controller {
    /// Create a controller from configuration. Does NOT connect;
    /// call [`open()`](Self::open) to authenticate and start background tasks.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let tokens = Arc::new(TokenManager::new(config.auth_config(), &config.transport())?);
        let client = AnthemClient::new(config.api_config(), tokens)?;
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let session = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                shared: Arc::new(Shared {
                    config,
                    client,
                    customer_id: Mutex::new(None),
                    account: Mutex::new(None),
                }),
                connection_state,
                event_tx,
                command_tx: Mutex::new(None),
                cancel,
                session: Mutex::new(session),
                task_handles: Mutex::new(Vec::new()),
                realtime_active: Arc::new(AtomicBool::new(false)),
                lifecycle: Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.shared.config
    }

    /// The underlying gateway, for requests the controller does not wrap.
    pub fn client(&self) -> &AnthemClient {
        &self.inner.shared.client
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Open the session.
    ///
    /// Authenticates, resolves the account id, loads the device listing,
    /// and spawns the command processor. When realtime is enabled the
    /// device is registered for notifications; a registration failure is
    /// logged and the session opens without them.
    pub async fn open(&self) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.is_open() {
            return Ok(());
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        match self.establish().await {
            Ok(()) => {
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Connected);
                info!("session open");
                Ok(())
            }
            Err(e) => {
                self.inner.session.lock().await.cancel();
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(), CoreError> {
        let shared = &self.inner.shared;
        shared.client.tokens().ensure_valid().await?;

        let customer_id = match shared.config.customer_id {
            Some(ref id) => id.clone(),
            None => shared.client.customer_id().await?,
        };
        debug!(%customer_id, "resolved account id");
        *shared.customer_id.lock().await = Some(customer_id.clone());
        shared.refresh_account().await?;

        let session = self.inner.cancel.child_token();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(command_processor_task(
            Arc::clone(shared),
            command_rx,
            session.clone(),
        )));

        if shared.config.realtime_enabled {
            match shared.start_realtime(&customer_id, session.child_token()).await {
                Ok(channel) => {
                    self.inner.realtime_active.store(true, Ordering::Release);
                    handles.push(tokio::spawn(realtime_task(
                        channel,
                        self.inner.event_tx.clone(),
                        Arc::clone(&self.inner.realtime_active),
                        session.clone(),
                    )));
                }
                Err(e) => {
                    warn!(error = %e, "realtime registration failed, continuing without notifications");
                }
            }
        }
        drop(handles);

        *self.inner.command_tx.lock().await = Some(command_tx);
        *self.inner.session.lock().await = session;
        Ok(())
    }

    /// Close the session.
    ///
    /// Cancels and joins background tasks, forgets the credential and
    /// account data, and returns to [`Disconnected`](ConnectionState::Disconnected).
    /// Idempotent.
    pub async fn close(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.session.lock().await.cancel();
        *self.inner.command_tx.lock().await = None;
        self.inner.realtime_active.store(false, Ordering::Release);

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let shared = &self.inner.shared;
        shared.client.tokens().clear().await;
        *shared.customer_id.lock().await = None;
        *shared.account.lock().await = None;

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("session closed");
    }

    /// One-shot: open without realtime, run closure, close.
    pub async fn oneshot<F, Fut, T>(config: ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.realtime_enabled = false;

        let controller = Controller::new(cfg)?;
        controller.open().await?;
        let result = f(controller.clone()).await;
        controller.close().await;
        result
    }

    pub fn is_open(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Connected
    }

    /// Whether the open session receives realtime notifications.
    pub fn has_realtime(&self) -> bool {
        self.inner.realtime_active.load(Ordering::Acquire)
    }

    fn require_open(&self) -> Result<(), CoreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::Disconnected)
        }
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command.
    ///
    /// Commands are queued to the session's command processor and run
    /// one at a time in submission order.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.require_open()?;
        let command_tx = self
            .inner
            .command_tx
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)?;

        let (response_tx, response_rx) = oneshot::channel();
        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        response_rx.await.map_err(|_| CoreError::Disconnected)?
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn customer_id(&self) -> Result<String, CoreError> {
        self.inner
            .shared
            .customer_id
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)
    }

    /// Account listing as loaded by `open()` or the last refresh.
    pub async fn account(&self) -> Option<Account> {
        self.inner.shared.account.lock().await.clone()
    }

    /// Re-read the account listing from the cloud.
    pub async fn refresh_account(&self) -> Result<Account, CoreError> {
        self.require_open()?;
        self.inner.shared.refresh_account().await
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.inner
            .shared
            .account
            .lock()
            .await
            .as_ref()
            .map(|a| a.devices().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn device(&self, device_id: &str) -> Result<Device, CoreError> {
        self.inner.shared.device(device_id).await
    }

    pub async fn device_state(&self, device_id: &str) -> Result<DeviceState, CoreError> {
        self.require_open()?;
        self.device(device_id).await?;
        Ok(self.client().get_device_state(device_id).await?)
    }

    pub async fn presets(&self, device_id: &str) -> Result<PresetList, CoreError> {
        self.require_open()?;
        self.device(device_id).await?;
        Ok(self.client().get_presets(device_id).await?)
    }

    pub async fn preset(&self, device_id: &str, preset_id: u32) -> Result<Preset, CoreError> {
        let presets = self.presets(device_id).await?;
        presets
            .get(preset_id)
            .cloned()
            .ok_or_else(|| CoreError::PresetNotFound {
                device_id: device_id.to_owned(),
                preset_id,
            })
    }

    pub async fn token_state(&self) -> TokenState {
        self.client().tokens().state().await
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to session state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to realtime notifications.
    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// [`events`](Self::events) as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<ControllerEvent> {
        BroadcastStream::new(self.events())
    }
}

// ── Shared session state ─────────────────────────────────────────

impl Shared {
    async fn refresh_account(&self) -> Result<Account, CoreError> {
        let customer_id = self
            .customer_id
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)?;
        let account = self.client.get_customer(&customer_id).await?;
        debug!(
            locations = account.locations.len(),
            devices = account.devices().len(),
            "account refreshed"
        );
        *self.account.lock().await = Some(account.clone());
        Ok(account)
    }

    async fn device(&self, device_id: &str) -> Result<Device, CoreError> {
        self.account
            .lock()
            .await
            .as_ref()
            .and_then(|a| a.device(device_id).cloned())
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_owned(),
            })
    }

    /// Addressing for a command: account id, device id, and the device's SKU.
    async fn target(&self, device_id: &str) -> Result<DeviceTarget, CoreError> {
        let customer_id = self
            .customer_id
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)?;
        let device = self.device(device_id).await?;
        let sku = if device.sku.is_empty() {
            self.config.sku.clone()
        } else {
            device.sku
        };
        Ok(DeviceTarget::new(customer_id, device_id).with_sku(sku))
    }

    async fn start_realtime(
        &self,
        customer_id: &str,
        cancel: CancellationToken,
    ) -> Result<RealtimeChannel, CoreError> {
        let settings = self
            .client
            .register_mobile_device(customer_id, self.config.mobile_device_id.as_deref())
            .await?;
        info!(hub = %settings.hub, "starting realtime channel");
        Ok(RealtimeChannel::start(
            &settings,
            self.config.realtime.clone(),
            cancel,
        ))
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process commands from the mpsc channel in submission order.
async fn command_processor_task(
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&shared, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

/// Forward realtime notifications to controller subscribers.
///
/// Clears `active` on exit, before a failure is reported.
async fn realtime_task(
    channel: RealtimeChannel,
    event_tx: broadcast::Sender<ControllerEvent>,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut rx = channel.subscribe();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => {
                    let _ = event_tx.send(ControllerEvent::from(event));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime notifications dropped, invalidating");
                    let _ = event_tx.send(ControllerEvent::Invalidated {
                        source: "lagged".into(),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    channel.shutdown();
    let outcome = channel.join().await;
    active.store(false, Ordering::Release);
    if let Err(e) = outcome {
        error!(error = %e, "realtime channel stopped");
        let _ = event_tx.send(ControllerEvent::RealtimeFailed {
            message: e.to_string(),
        });
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(shared: &Shared, cmd: Command) -> Result<CommandResult, CoreError> {
    let target = shared.target(cmd.device_id()).await?;
    let client = &shared.client;
    debug!(?cmd, "executing command");

    let ack = match cmd {
        Command::StartPreset { preset_id, .. } => client.start_preset(&target, preset_id).await?,
        Command::StopPreset { preset_id, .. } => client.stop_preset(&target, preset_id).await?,
        Command::StartWarmup { preset_id, .. } => client.start_warmup(&target, preset_id).await?,
        Command::StopWarmup { preset_id, .. } => client.stop_warmup(&target, preset_id).await?,
        Command::TurnOnOutlet {
            outlet,
            temperature_celsius,
            flow_percent,
            ..
        } => {
            client
                .turn_on_outlet(&target, outlet, temperature_celsius, flow_percent)
                .await?
        }
        Command::SetTemperature {
            outlet,
            temperature_celsius,
            flow_percent,
            ..
        } => {
            client
                .set_temperature(&target, temperature_celsius, outlet, flow_percent)
                .await?
        }
        Command::SetFlow {
            outlet,
            flow_percent,
            temperature_celsius,
            ..
        } => {
            client
                .set_flow(&target, flow_percent, outlet, temperature_celsius)
                .await?
        }
        Command::Pause {
            temperature_celsius,
            flow_percent,
            ..
        } => {
            client
                .pause(&target, temperature_celsius, flow_percent)
                .await?
        }
        Command::TurnOff { .. } => client.turn_off(&target).await?,
        Command::ControlValves { control, .. } => client.control_valves(&target, &control).await?,
    };

    Ok(CommandResult::Accepted(ack))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use anthem_api::{IotHubSettings, RealtimeConfig, ReconnectConfig};
    use secrecy::SecretString;

    use super::*;

    fn unreachable_channel() -> RealtimeChannel {
        let settings = IotHubSettings {
            hub: "127.0.0.1".into(),
            device_id: "mobile-test".into(),
            username: "user".into(),
            password: SecretString::from("sas"),
            connection_string: None,
        };
        let config = RealtimeConfig {
            // Nothing listens on the discard port.
            port: 9,
            tls: false,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                max_retries: Some(0),
            },
            ..RealtimeConfig::default()
        };
        RealtimeChannel::start(&settings, config, CancellationToken::new())
    }

    #[tokio::test]
    async fn failed_channel_clears_realtime_flag() {
        let (event_tx, mut events) = broadcast::channel(16);
        let active = Arc::new(AtomicBool::new(true));

        realtime_task(
            unreachable_channel(),
            event_tx,
            Arc::clone(&active),
            CancellationToken::new(),
        )
        .await;

        assert!(!active.load(Ordering::Acquire));
        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ControllerEvent::RealtimeFailed { .. }) {
                failed = true;
            }
        }
        assert!(failed, "expected a RealtimeFailed event");
    }
}
