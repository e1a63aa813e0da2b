//! Broker session over the embassy-net TCP stack.
//!
//! [`run_session`] owns one connection from TCP handshake to either the
//! end of the wake cycle or the first transport error. The caller retries
//! after [`MQTT_CONNECT_RETRY_MS`](crate::config::MQTT_CONNECT_RETRY_MS).

use core::net::Ipv4Addr;

use embassy_net::{IpAddress, Stack, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Instant, Timer};
use esp_radio::wifi::WifiController;
use log::{info, warn};
use rust_mqtt::{
    client::{
        client::MqttClient,
        client_config::{ClientConfig, MqttVersion},
    },
    packet::v5::publish_packet::QualityOfService,
    utils::rng_generator::CountingRng,
};

use crate::config::{Credentials, MQTT_KEEP_ALIVE_SECS, PAYLOAD_CAPACITY, Settings, THING_NAME};
use crate::error::Error;
use crate::keep_alive::PingSchedule;
use crate::network;
use crate::station::Station;
use crate::traits::{DisplaySurface, MessageBus, PowerController};

const TCP_BUFFER_LEN: usize = 1536;

/// Room for a full payload plus topic and packet header.
pub const MQTT_BUFFER_LEN: usize = PAYLOAD_CAPACITY + 256;

const MAX_PROPERTIES: usize = 5;

/// Socket poll period while no packet is pending.
const POLL_INTERVAL_MS: u64 = 20;

pub type Client<'a> = MqttClient<'a, TcpSocket<'a>, MAX_PROPERTIES, CountingRng>;

/// Socket and client buffers, reused by every session of a wake cycle.
pub struct Buffers {
    tcp_rx: [u8; TCP_BUFFER_LEN],
    tcp_tx: [u8; TCP_BUFFER_LEN],
    mqtt_rx: [u8; MQTT_BUFFER_LEN],
    mqtt_tx: [u8; MQTT_BUFFER_LEN],
}

impl Buffers {
    pub const fn new() -> Self {
        Self {
            tcp_rx: [0; TCP_BUFFER_LEN],
            tcp_tx: [0; TCP_BUFFER_LEN],
            mqtt_rx: [0; MQTT_BUFFER_LEN],
            mqtt_tx: [0; MQTT_BUFFER_LEN],
        }
    }
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new()
    }
}

/// [`MessageBus`] over a connected client. Disconnecting also takes the
/// WiFi link down.
pub struct MqttBus<'c, 'a> {
    client: &'c mut Client<'a>,
    wifi: &'c mut WifiController<'static>,
}

impl<'c, 'a> MqttBus<'c, 'a> {
    pub fn new(client: &'c mut Client<'a>, wifi: &'c mut WifiController<'static>) -> Self {
        Self { client, wifi }
    }
}

impl MessageBus for MqttBus<'_, '_> {
    async fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.client.subscribe_to_topic(topic).await.map_err(|e| {
            warn!("[MQTT] subscribe {} failed: {:?}", topic, e);
            Error::Bus
        })?;
        info!("[MQTT] subscribed to {}", topic);
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.client.unsubscribe_from_topic(topic).await.map_err(|e| {
            warn!("[MQTT] unsubscribe {} failed: {:?}", topic, e);
            Error::Bus
        })?;
        info!("[MQTT] unsubscribed from {}", topic);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("[MQTT] disconnect: {:?}", e);
        }
        network::wifi_disconnect(self.wifi).await;
    }
}

async fn resolve(stack: Stack<'_>, host: &str) -> Result<IpAddress, Error> {
    if let Ok(address) = host.parse::<Ipv4Addr>() {
        return Ok(IpAddress::Ipv4(address));
    }

    let addresses = stack.dns_query(host, DnsQueryType::A).await.map_err(|e| {
        warn!("[MQTT] cannot resolve {}: {:?}", host, e);
        Error::Network
    })?;
    addresses.first().copied().ok_or(Error::Network)
}

/// Open a TCP connection to the configured broker and log in.
pub async fn connect_broker<'a>(
    stack: Stack<'a>,
    settings: &'a Settings,
    buffers: &'a mut Buffers,
) -> Result<Client<'a>, Error> {
    let address = resolve(stack, &settings.mqtt_server).await?;
    let Buffers {
        tcp_rx,
        tcp_tx,
        mqtt_rx,
        mqtt_tx,
    } = buffers;

    let mut socket = TcpSocket::new(stack, tcp_rx, tcp_tx);
    socket.set_timeout(Some(Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS) * 2)));
    socket
        .connect((address, settings.mqtt_port))
        .await
        .map_err(|e| {
            warn!("[MQTT] tcp connect to {}:{} failed: {:?}", address, settings.mqtt_port, e);
            Error::Network
        })?;

    let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
    config.add_client_id(THING_NAME);
    config.add_max_subscribe_qos(QualityOfService::QoS0);
    config.keep_alive = MQTT_KEEP_ALIVE_SECS;
    config.max_packet_size = MQTT_BUFFER_LEN as u32;
    match settings.credentials() {
        Credentials::Anonymous => {}
        Credentials::User(user) => config.add_username(user),
        Credentials::UserPassword(user, password) => {
            config.add_username(user);
            config.add_password(password);
        }
    }

    let mut client = Client::new(
        socket,
        mqtt_tx,
        MQTT_BUFFER_LEN,
        mqtt_rx,
        MQTT_BUFFER_LEN,
        config,
    );
    client.connect_to_broker().await.map_err(|e| {
        warn!("[MQTT] broker refused connection: {:?}", e);
        Error::Bus
    })?;

    info!("[MQTT] connected to {}:{}", settings.mqtt_server, settings.mqtt_port);
    Ok(client)
}

/// One broker session. Returns `Ok` once the station has powered down.
pub async fn run_session<D, C>(
    stack: Stack<'_>,
    settings: &Settings,
    wifi: &mut WifiController<'static>,
    buffers: &mut Buffers,
    station: &mut Station,
    display: &mut D,
    power: &mut C,
) -> Result<(), Error>
where
    D: DisplaySurface,
    C: PowerController,
{
    let mut client = connect_broker(stack, settings, buffers).await?;
    station.connected(&mut MqttBus::new(&mut client, wifi)).await?;

    let mut pings = PingSchedule::new(MQTT_KEEP_ALIVE_SECS, Instant::now().as_millis());
    loop {
        // Only reads once a packet has started to arrive, so a receive is
        // never abandoned half way through a frame
        match client.receive_message_if_ready().await {
            Ok(Some((topic, payload))) => station.deliver(topic, payload),
            Ok(None) => {
                if pings.is_due(Instant::now().as_millis()) {
                    client.send_ping().await.map_err(|e| {
                        warn!("[MQTT] ping failed: {:?}", e);
                        Error::Bus
                    })?;
                    pings.sent(Instant::now().as_millis());
                }
                Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                warn!("[MQTT] receive failed: {:?}", e);
                return Err(Error::Bus);
            }
        }

        station
            .tick(&mut MqttBus::new(&mut client, wifi), display, power)
            .await?;
        if station.is_powered_down() {
            return Ok(());
        }
    }
}
