// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Streaming module - broker session lifecycle and publishing

mod mqtt;
mod retry;
mod state;

pub use mqtt::MqttTransport;
pub use retry::{retry, FixedBackoff, RetryPolicy};
pub use state::ConnectionState;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::sensors::Reading;

/// Link notifications raised by a transport's background task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("broker refused connection: {0}")]
    Refused(String),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Per-message failure; never fatal to the simulation loop
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected to broker (state: {0})")]
    NotConnected(ConnectionState),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What [`Publisher::emit`] put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
}

/// A pub/sub session. Disconnects are reported through the transport's
/// [`LinkEvent`] channel, not through these calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One connection attempt
    async fn connect(&self) -> Result<(), TransportError>;

    /// Send with at-least-once delivery
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Owns the connection state machine on top of a [`Transport`]
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    state: Arc<watch::Sender<ConnectionState>>,
    backoff: FixedBackoff,
    publish_timeout: Duration,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, backoff: FixedBackoff, publish_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            state: Arc::new(state),
            backoff,
            publish_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect, retrying with the configured backoff.
    ///
    /// With the default unbounded backoff this only returns once connected.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.establish(ConnectionState::Connecting).await?;
        info!("Connected to MQTT broker");
        Ok(())
    }

    /// Watch the transport's link events and reconnect whenever it drops
    pub fn supervise(&self, mut link: mpsc::UnboundedReceiver<LinkEvent>) -> JoinHandle<()> {
        let publisher = self.clone();

        tokio::spawn(async move {
            while let Some(event) = link.recv().await {
                let reason = match event {
                    LinkEvent::Up => {
                        debug!("Transport link up");
                        continue;
                    }
                    LinkEvent::Down(reason) => reason,
                };

                // A session can drop before the initial connect has marked it
                // Connected; wait for that attempt to settle before judging the state
                let settled = publisher.settled_state().await;
                if !settled.is_connected() {
                    debug!("Ignoring link loss while {}: {}", settled, reason);
                    continue;
                }

                warn!("Disconnected from MQTT broker ({}). Attempting to reconnect...", reason);
                match publisher.establish(ConnectionState::Reconnecting).await {
                    Ok(()) => info!("Reconnected successfully"),
                    Err(e) => {
                        error!("Giving up on reconnect: {}", e);
                        break;
                    }
                }
            }
            debug!("Connection supervisor stopped");
        })
    }

    /// Publish raw bytes; fails fast unless connected
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(PublishError::NotConnected(state));
        }

        match tokio::time::timeout(self.publish_timeout, self.transport.publish(topic, payload)).await {
            Ok(result) => result.map_err(PublishError::from),
            Err(_) => Err(PublishError::Timeout(self.publish_timeout)),
        }
    }

    /// Serialize a reading to JSON and publish it under the domain
    pub async fn emit(&self, domain: &str, reading: &Reading) -> Result<Delivery, PublishError> {
        let topic = reading.topic(domain);
        let payload = serde_json::to_string(reading)?;
        self.publish(&topic, payload.clone().into_bytes()).await?;
        Ok(Delivery { topic, payload })
    }

    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.state.send_replace(ConnectionState::Disconnected);
        self.transport.disconnect().await
    }

    async fn establish(&self, pending: ConnectionState) -> Result<(), TransportError> {
        self.set_state(pending);

        let mut policy = self.backoff.clone();
        let result = retry(&mut policy, "MQTT connection", |_| self.transport.connect()).await;

        match &result {
            Ok(()) => self.set_state(ConnectionState::Connected),
            Err(_) => self.set_state(ConnectionState::Disconnected),
        }
        result
    }

    /// Current state once any in-flight initial connect has finished
    async fn settled_state(&self) -> ConnectionState {
        let mut state = self.state.subscribe();
        let settled = state
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map(|s| *s);
        settled.unwrap_or(ConnectionState::Disconnected)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Connection state {} -> {}", previous, next);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;
    use tokio::time::Instant;

    fn publisher(transport: Arc<FakeTransport>) -> Publisher {
        Publisher::new(
            transport,
            FixedBackoff::new(Duration::from_secs(5)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_rejected() {
        let (transport, _link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());

        let err = publisher.publish("/agriculture/A/temperature/1", b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, PublishError::NotConnected(ConnectionState::Disconnected)));
        assert!(transport.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_with_fixed_backoff() {
        let (transport, _link) = FakeTransport::new(2);
        let publisher = publisher(transport.clone());
        let started = Instant::now();

        publisher.connect().await.unwrap();

        assert_eq!(transport.connects(), 3);
        assert_eq!(publisher.state(), ConnectionState::Connected);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_backoff_gives_up() {
        let (transport, _link) = FakeTransport::new(10);
        let publisher = Publisher::new(
            transport.clone(),
            FixedBackoff::new(Duration::from_secs(1)).with_max_attempts(3),
            Duration::from_secs(5),
        );

        assert!(publisher.connect().await.is_err());
        assert_eq!(transport.connects(), 3);
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_link_loss() {
        let (transport, link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());
        publisher.connect().await.unwrap();
        let _supervisor = publisher.supervise(link);
        let mut state = publisher.subscribe_state();

        transport.fail_next_connects(1);
        transport.drop_link("connection reset by peer");

        state.wait_for(|s| *s == ConnectionState::Reconnecting).await.unwrap();
        let err = publisher.publish("/agriculture/A/ph/1", b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, PublishError::NotConnected(ConnectionState::Reconnecting)));

        state.wait_for(|s| s.is_connected()).await.unwrap();
        assert_eq!(transport.connects(), 3);
        publisher.publish("/agriculture/A/ph/1", b"{}".to_vec()).await.unwrap();
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_during_initial_connect_redials() {
        let (transport, link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());
        let _supervisor = publisher.supervise(link);

        transport.drop_during_next_connect();
        publisher.connect().await.unwrap();

        for _ in 0..10 {
            if transport.connects() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(transport.connects(), 2);
        assert_eq!(publisher.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_after_disconnect_is_ignored() {
        let (transport, link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());
        let _supervisor = publisher.supervise(link);
        publisher.connect().await.unwrap();

        publisher.disconnect().await.unwrap();
        transport.drop_link("closed by client");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.connects(), 1);
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_emit_serializes_reading() {
        let (transport, _link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());
        publisher.connect().await.unwrap();

        let reading = Reading {
            sensor_type: "temperature".to_string(),
            sensor_id: "1".to_string(),
            location: "A".to_string(),
            value: 21.37,
            unit: "°C".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let delivery = publisher.emit("agriculture", &reading).await.unwrap();
        assert_eq!(delivery.topic, "/agriculture/A/temperature/1");

        let sent = transport.published();
        let body: serde_json::Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(sent[0].0, delivery.topic);
        assert_eq!(sent[0].1, delivery.payload.as_bytes());
        assert_eq!(body["sensor_name"], "temperature");
        assert_eq!(body["value"], 21.37);
    }

    #[tokio::test]
    async fn test_transport_failure_is_per_message() {
        let (transport, _link) = FakeTransport::new(0);
        let publisher = publisher(transport.clone());
        publisher.connect().await.unwrap();

        transport.fail_publishes(true);
        let err = publisher.publish("/a/b/c/d", vec![1]).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(TransportError::Publish(_))));
        assert_eq!(publisher.state(), ConnectionState::Connected);

        transport.fail_publishes(false);
        publisher.publish("/a/b/c/d", vec![2]).await.unwrap();
        assert_eq!(transport.published().len(), 1);
    }
}
