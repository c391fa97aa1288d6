//! Messaging transport seam and the MQTT implementation.
//!
//! A transport is connected at construction, subscribes to one topic, and once
//! started forwards every inbound payload to a [`PayloadSender`] from its own
//! background thread. It does no decoding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rumqttc::{Client, ClientError, Connection, ConnectionError, Event, MqttOptions, Packet, QoS};
use thiserror::Error;

use crate::config::MonitorConfig;
use crate::ingest::PayloadSender;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 10;

/// First reconnect delay after the connection drops.
const RECONNECT_MIN: Duration = Duration::from_secs(1);

/// Upper bound for the reconnect delay.
const RECONNECT_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },
    #[error("broker request failed: {0}")]
    Client(#[from] ClientError),
    #[error("transport already started")]
    AlreadyStarted,
    #[error("failed to spawn network thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The narrow interface the pipeline needs from a message transport.
pub trait Transport: Send {
    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Start the background network loop, forwarding payloads to `sink`.
    fn start(&mut self, sink: PayloadSender) -> Result<(), TransportError>;

    /// Stop the background loop. Safe to call more than once.
    fn stop(&mut self) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// MQTT
// ---------------------------------------------------------------------------

/// MQTT transport over the synchronous `rumqttc` client.
pub struct MqttTransport {
    address: String,
    client: Client,
    connection: Option<Connection>,
    topic: Option<String>,
    stopping: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Connect to the configured broker and wait for its acknowledgement.
    ///
    /// Failure here is fatal for the caller; there is no retry at startup.
    pub fn connect(config: &MonitorConfig) -> Result<Self, TransportError> {
        let address = format!("{}:{}", config.broker_host, config.broker_port);
        let mut options = MqttOptions::new(
            config.client_id(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keepalive());

        log::info!("connecting to MQTT broker at {address}");
        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);

        loop {
            match connection.iter().next() {
                Some(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::Connect {
                        address,
                        reason: e.to_string(),
                    });
                }
                None => {
                    return Err(TransportError::Connect {
                        address,
                        reason: "connection closed before acknowledgement".to_string(),
                    });
                }
            }
        }

        log::info!("connected to {address}");
        Ok(Self {
            address,
            client,
            connection: Some(connection),
            topic: None,
            stopping: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// Broker address as `host:port`.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Transport for MqttTransport {
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        log::info!("subscribing to topic: {topic}");
        self.client.subscribe(topic, QoS::AtMostOnce)?;
        self.topic = Some(topic.to_string());
        Ok(())
    }

    fn start(&mut self, sink: PayloadSender) -> Result<(), TransportError> {
        let connection = self
            .connection
            .take()
            .ok_or(TransportError::AlreadyStarted)?;
        let resubscribe = Resubscribe {
            client: self.client.clone(),
            topic: self.topic.clone(),
        };
        let stopping = Arc::clone(&self.stopping);

        let handle = thread::Builder::new()
            .name("sensorwatch-mqtt".to_string())
            .spawn(move || network_loop(connection, resubscribe, sink, stopping))?;
        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::info!("stopping MQTT client");
        let disconnected = self.client.disconnect();
        if let Err(e) = &disconnected {
            log::debug!("disconnect request failed: {e}");
        }
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            log::error!("MQTT network thread panicked");
        }
        disconnected.map_err(TransportError::from)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("error stopping MQTT client: {e}");
        }
    }
}

/// What the network thread needs to restore the subscription. rumqttc
/// reconnects with a clean session, so the broker forgets it on every drop.
struct Resubscribe {
    client: Client,
    topic: Option<String>,
}

impl Resubscribe {
    fn run(&self) {
        let Some(topic) = &self.topic else {
            return;
        };
        // try_ variant: this thread drains the request queue, so a blocking
        // send could deadlock.
        match self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            Ok(()) => log::info!("resubscribing to topic: {topic}"),
            Err(e) => log::error!("failed to resubscribe to {topic}: {e}"),
        }
    }
}

fn network_loop(
    mut connection: Connection,
    resubscribe: Resubscribe,
    sink: PayloadSender,
    stopping: Arc<AtomicBool>,
) {
    let mut backoff = RECONNECT_MIN;

    for event in connection.iter() {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                sink.offer(publish.payload.to_vec());
            }
            // The first CONNACK is consumed by `connect`, so any seen here
            // follows a reconnect.
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("reconnected to broker");
                resubscribe.run();
                backoff = RECONNECT_MIN;
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                log::debug!("subscription acknowledged: {:?}", ack.return_codes);
            }
            Ok(_) => {}
            Err(e) => {
                if stopping.load(Ordering::SeqCst) || is_shutdown(&e) {
                    break;
                }
                log::warn!("MQTT connection error: {e}; retrying in {}s", backoff.as_secs());
                sleep_unless_stopping(backoff, &stopping);
                backoff = (backoff * 2).min(RECONNECT_MAX);
            }
        }
    }
    log::debug!("MQTT network loop stopped");
}

fn is_shutdown(e: &ConnectionError) -> bool {
    matches!(e, ConnectionError::RequestsDone)
}

fn sleep_unless_stopping(total: Duration, stopping: &AtomicBool) {
    let step = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < total && !stopping.load(Ordering::SeqCst) {
        thread::sleep(step);
        slept += step;
    }
}
