//! Realtime notification channel over the IoT hub's MQTT endpoint.
//!
//! A background task owns the MQTT event loop, keeps the device-bound and
//! direct-method subscriptions alive across reconnects, acknowledges every
//! remote method call, and fans notifications out through a
//! [`tokio::sync::broadcast`] channel. Notifications only say *that*
//! something changed; consumers re-read device state through the gateway.
//!
//! ```rust,ignore
//! let settings = client.register_mobile_device(&customer_id, None).await?;
//! let channel = RealtimeChannel::start(&settings, RealtimeConfig::default(), cancel.child_token());
//! let mut rx = channel.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     if event.is_invalidation() {
//!         let state = client.get_device_state(&device_id).await?;
//!     }
//! }
//! ```

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    Transport,
};
use secrecy::ExposeSecret;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::model::IotHubSettings;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const REQUEST_CHANNEL_CAPACITY: usize = 16;

const METHOD_TOPIC_PREFIX: &str = "$iothub/methods/POST/";
const METHOD_SUBSCRIPTION: &str = "$iothub/methods/POST/#";
const METHOD_ACK_PAYLOAD: &str = r#"{"status":"received"}"#;

// ── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// Broker accepted the connection and subscriptions were (re)issued.
    Connected,
    /// The connection dropped; a reconnect is scheduled.
    Disconnected { reason: String },
    /// A device-bound message arrived on `topic`.
    Invalidate { topic: String },
    /// The cloud invoked a direct method; it has already been acknowledged.
    MethodInvoked { method: String, request_id: String },
}

impl RealtimeEvent {
    /// `true` if cached device state should be considered stale.
    pub fn is_invalidation(&self) -> bool {
        matches!(self, Self::Invalidate { .. } | Self::MethodInvoked { .. })
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub port: u16,
    pub keep_alive: Duration,
    /// TLS to the broker. Only disabled for local test brokers.
    pub tls: bool,
    pub reconnect: ReconnectConfig,
    /// Consecutive credential refusals after which the channel gives up.
    pub max_auth_failures: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            port: 8883,
            keep_alive: Duration::from_secs(60),
            tls: true,
            reconnect: ReconnectConfig::default(),
            max_auth_failures: 3,
        }
    }
}

// ── Channel handle ──────────────────────────────────────────────────

/// Handle to a running realtime channel. Dropping it stops the task.
pub struct RealtimeChannel {
    event_rx: broadcast::Receiver<RealtimeEvent>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), Error>>>,
}

impl RealtimeChannel {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is reported as [`RealtimeEvent::Connected`].
    pub fn start(
        settings: &IotHubSettings,
        config: RealtimeConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (events, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (connected_tx, connected) = watch::channel(false);

        let (client, eventloop) =
            AsyncClient::new(mqtt_options(settings, &config), REQUEST_CHANNEL_CAPACITY);
        let subscriptions = vec![
            format!("devices/{}/messages/devicebound/#", settings.device_id),
            METHOD_SUBSCRIPTION.to_owned(),
        ];

        let worker = Worker {
            client,
            subscriptions,
            config,
            events,
            connected: connected_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run(eventloop));

        Self {
            event_rx,
            connected,
            cancel,
            task: Some(task),
        }
    }

    /// New receiver for the event stream.
    ///
    /// Slow receivers see `Lagged`; all receivers see `Closed` once the
    /// background task has exited.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.event_rx.resubscribe()
    }

    /// Watch the broker connection flag.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Signal the background task to disconnect and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish.
    ///
    /// Resolves to an error only when the channel gave up on its own:
    /// repeated credential refusals or an exhausted retry budget.
    pub async fn join(mut self) -> Result<(), Error> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await.map_err(|e| Error::Api {
            message: format!("realtime task failed: {e}"),
            status: None,
            body: None,
            source: None,
        })?
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn mqtt_options(settings: &IotHubSettings, config: &RealtimeConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&settings.device_id, &settings.hub, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_credentials(&settings.username, settings.password.expose_secret());
    if config.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

// ── Background task ─────────────────────────────────────────────────

struct Worker {
    client: AsyncClient,
    subscriptions: Vec<String>,
    config: RealtimeConfig,
    events: broadcast::Sender<RealtimeEvent>,
    connected: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl Worker {
    /// Poll until cancelled or until reconnecting is pointless.
    async fn run(self, mut eventloop: EventLoop) -> Result<(), Error> {
        let mut attempt: u32 = 0;
        let mut refusals = RefusalCounter::new(self.config.max_auth_failures);

        let outcome = loop {
            let polled = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Ok(()),
                polled = eventloop.poll() => polled,
            };

            match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("realtime channel connected");
                    attempt = 0;
                    refusals.reset();
                    self.connected.send_replace(true);
                    self.subscribe_all();
                    let _ = self.events.send(RealtimeEvent::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.dispatch(&publish.topic, publish.payload.len());
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.send_replace(false) {
                        let _ = self.events.send(RealtimeEvent::Disconnected {
                            reason: e.to_string(),
                        });
                    }

                    if let Err(fatal) = refusals.record(&e) {
                        error!(error = %fatal, "broker keeps refusing credentials, giving up");
                        break Err(fatal);
                    }

                    if let Some(max) = self.config.reconnect.max_retries {
                        if attempt >= max {
                            error!(max_retries = max, "realtime reconnection limit reached");
                            break Err(Error::Api {
                                message: format!("realtime connection lost: {e}"),
                                status: None,
                                body: None,
                                source: None,
                            });
                        }
                    }

                    let delay = calculate_backoff(attempt, &self.config.reconnect);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "realtime connection lost, reconnecting"
                    );

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break Ok(()),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        };

        self.connected.send_replace(false);
        let _ = self.client.try_disconnect();
        debug!("realtime loop exiting");
        outcome
    }

    fn subscribe_all(&self) {
        for topic in &self.subscriptions {
            if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                warn!(error = %e, topic, "failed to queue subscription");
            }
        }
    }

    fn dispatch(&self, topic: &str, payload_len: usize) {
        let event = if let Some((method, request_id)) = parse_method_topic(topic) {
            debug!(method, request_id, "direct method invoked");
            if let Some((reply_topic, payload)) = acknowledgement(topic) {
                let sent = self
                    .client
                    .try_publish(reply_topic, QoS::AtLeastOnce, false, payload);
                if let Err(e) = sent {
                    warn!(error = %e, method, "failed to acknowledge direct method");
                }
            }
            RealtimeEvent::MethodInvoked { method, request_id }
        } else {
            debug!(topic, bytes = payload_len, "device notification");
            RealtimeEvent::Invalidate {
                topic: topic.to_owned(),
            }
        };

        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Counts consecutive credential refusals from the broker.
///
/// Other connection errors leave the count alone; a successful `ConnAck`
/// resets it.
#[derive(Debug)]
struct RefusalCounter {
    count: u32,
    limit: u32,
}

impl RefusalCounter {
    fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    /// Record a connection error. Fails once the limit is reached.
    fn record(&mut self, err: &ConnectionError) -> Result<(), Error> {
        if !is_auth_refusal(err) {
            return Ok(());
        }
        self.count += 1;
        if self.count >= self.limit {
            return Err(Error::Authentication {
                message: format!(
                    "realtime broker refused credentials {} times: {err}",
                    self.count
                ),
                status: None,
                body: None,
            });
        }
        Ok(())
    }
}

fn is_auth_refusal(err: &ConnectionError) -> bool {
    matches!(
        err,
        ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized
        )
    )
}

// ── Topics ──────────────────────────────────────────────────────────

/// Split `$iothub/methods/POST/{method}/?$rid={rid}` into method and request id.
pub fn parse_method_topic(topic: &str) -> Option<(String, String)> {
    let rest = topic.strip_prefix(METHOD_TOPIC_PREFIX)?;
    let (method, query) = rest.split_once("/?")?;
    let request_id = query.split('&').find_map(|kv| kv.strip_prefix("$rid="))?;
    if method.is_empty() || request_id.is_empty() {
        return None;
    }
    Some((method.to_owned(), request_id.to_owned()))
}

pub fn ack_topic(request_id: &str) -> String {
    format!("$iothub/methods/res/200/?$rid={request_id}")
}

/// Reply owed for a message on `topic`: the response topic and payload
/// for a direct method call, `None` for anything else.
pub fn acknowledgement(topic: &str) -> Option<(String, &'static str)> {
    let (_, request_id) = parse_method_topic(topic)?;
    Some((ack_topic(&request_id), METHOD_ACK_PAYLOAD))
}

// ── Backoff calculation ─────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic spread seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn parses_direct_method_topics() {
        assert_eq!(
            parse_method_topic("$iothub/methods/POST/stateChanged/?$rid=42"),
            Some(("stateChanged".into(), "42".into()))
        );
        assert_eq!(
            parse_method_topic("$iothub/methods/POST/update/?foo=1&$rid=abc"),
            Some(("update".into(), "abc".into()))
        );
        assert_eq!(parse_method_topic("$iothub/methods/POST/update/"), None);
        assert_eq!(parse_method_topic("$iothub/methods/POST//?$rid=1"), None);
        assert_eq!(parse_method_topic("devices/x/messages/devicebound/a"), None);
    }

    #[test]
    fn ack_topic_echoes_request_id() {
        assert_eq!(ack_topic("42"), "$iothub/methods/res/200/?$rid=42");
    }

    #[test]
    fn direct_methods_are_acknowledged() {
        assert_eq!(
            acknowledgement("$iothub/methods/POST/stateChanged/?$rid=7"),
            Some((
                "$iothub/methods/res/200/?$rid=7".to_owned(),
                r#"{"status":"received"}"#
            ))
        );
        assert_eq!(acknowledgement("devices/mobile-test/messages/devicebound/x"), None);
        assert_eq!(acknowledgement("$iothub/methods/POST/update/"), None);
    }

    fn refused() -> ConnectionError {
        ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword)
    }

    fn dropped() -> ConnectionError {
        ConnectionError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
    }

    #[test]
    fn repeated_refusals_are_fatal() {
        let mut refusals = RefusalCounter::new(3);
        assert!(refusals.record(&refused()).is_ok());
        assert!(refusals.record(&refused()).is_ok());
        let err = refusals.record(&refused()).unwrap_err();
        assert!(matches!(err, Error::Authentication { status: None, .. }));
        assert!(err.to_string().contains("3 times"), "{err}");
    }

    #[test]
    fn conn_ack_resets_refusals() {
        let mut refusals = RefusalCounter::new(3);
        refusals.record(&refused()).unwrap();
        refusals.record(&refused()).unwrap();
        refusals.reset();
        refusals.record(&refused()).unwrap();
        refusals.record(&refused()).unwrap();
        assert!(refusals.record(&refused()).is_err());
    }

    #[test]
    fn network_errors_are_not_refusals() {
        let mut refusals = RefusalCounter::new(1);
        for _ in 0..5 {
            assert!(refusals.record(&dropped()).is_ok());
        }
        assert!(refusals.record(&ConnectionError::ConnectionRefused(
            ConnectReturnCode::NotAuthorized
        ))
        .is_err());
    }

    #[test]
    fn only_notifications_invalidate() {
        assert!(RealtimeEvent::Invalidate { topic: "t".into() }.is_invalidation());
        assert!(
            RealtimeEvent::MethodInvoked {
                method: "m".into(),
                request_id: "1".into()
            }
            .is_invalidation()
        );
        assert!(!RealtimeEvent::Connected.is_invalidation());
    }

    #[test]
    fn default_configs() {
        let config = RealtimeConfig::default();
        assert_eq!(config.port, 8883);
        assert_eq!(config.max_auth_failures, 3);
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert!(config.reconnect.max_retries.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig::default();
        let first = calculate_backoff(0, &config);
        assert!(first >= Duration::from_millis(750) && first <= Duration::from_millis(1250));

        let third = calculate_backoff(2, &config);
        assert!(third >= Duration::from_secs(3) && third <= Duration::from_secs(5));

        for attempt in [10, 20, 100, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            assert!(delay <= Duration::from_secs_f64(37.5), "attempt {attempt}: {delay:?}");
        }
    }

    fn local_settings() -> IotHubSettings {
        IotHubSettings {
            hub: "127.0.0.1".into(),
            device_id: "mobile-test".into(),
            username: "user".into(),
            password: SecretString::from("sas"),
            connection_string: None,
        }
    }

    fn unreachable_config() -> RealtimeConfig {
        RealtimeConfig {
            // Nothing listens on the discard port.
            port: 9,
            tls: false,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                max_retries: None,
            },
            ..RealtimeConfig::default()
        }
    }

    #[tokio::test]
    async fn shutdown_stops_a_reconnecting_channel() {
        let channel = RealtimeChannel::start(
            &local_settings(),
            unreachable_config(),
            CancellationToken::new(),
        );
        assert!(!channel.is_connected());
        channel.shutdown();
        assert!(channel.join().await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_an_error() {
        let mut config = unreachable_config();
        config.reconnect.max_retries = Some(0);
        let channel = RealtimeChannel::start(&local_settings(), config, CancellationToken::new());
        let err = channel.join().await.unwrap_err();
        assert!(matches!(err, Error::Api { status: None, .. }));
    }
}
