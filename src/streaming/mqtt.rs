// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! MQTT transport on rumqttc

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, info, trace};

use super::{LinkEvent, Transport, TransportError};
use crate::config::Settings;

/// Outgoing request queue depth; publishes wait when it is full
const REQUEST_CAPACITY: usize = 100;

/// rumqttc client plus its event loop.
///
/// `connect` drives the event loop until CONNACK, then hands it to a background
/// task for keep-alive and acknowledgements. That task exits on the first
/// connection error and reports [`LinkEvent::Down`]; the next `connect` resumes
/// polling, which makes rumqttc dial the broker again.
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: Arc<Mutex<EventLoop>>,
    link: mpsc::UnboundedSender<LinkEvent>,
    broker: String,
    connect_timeout: Duration,
}

impl MqttTransport {
    pub fn new(settings: &Settings) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let mut options = MqttOptions::new(
            &settings.mqtt_client_id,
            &settings.mqtt_host,
            settings.mqtt_port,
        );
        options.set_keep_alive(settings.keep_alive());

        if let (Some(username), Some(password)) = (&settings.mqtt_username, &settings.mqtt_password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (link, events) = mpsc::unbounded_channel();

        let transport = Self {
            client,
            eventloop: Arc::new(Mutex::new(eventloop)),
            link,
            broker: format!("{}:{}", settings.mqtt_host, settings.mqtt_port),
            connect_timeout: settings.connect_timeout(),
        };
        (transport, events)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        // Held by the background driver until the link drops
        let mut eventloop = self.eventloop.clone().lock_owned().await;
        debug!("Connecting to MQTT broker at {}", self.broker);

        let outcome = tokio::time::timeout(self.connect_timeout, handshake(&mut eventloop)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(TransportError::Timeout(self.connect_timeout)),
        }

        info!("MQTT session established with {}", self.broker);
        tokio::spawn(drive(eventloop, self.link.clone()));
        let _ = self.link.send(LinkEvent::Up);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Connect(format!("disconnect failed: {}", e)))
    }
}

async fn handshake(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(TransportError::Refused(format!("{:?}", ack.code)))
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(TransportError::Refused(format!("{:?}", code)));
            }
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

async fn drive(mut eventloop: OwnedMutexGuard<EventLoop>, link: mpsc::UnboundedSender<LinkEvent>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                trace!("Broker acknowledged packet {}", ack.pkid);
            }
            Ok(_) => {}
            Err(e) => {
                let _ = link.send(LinkEvent::Down(e.to_string()));
                return;
            }
        }
    }
}
