use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{info, warn};

use crate::config::Settings;
use crate::error::Error;

const CONNECT_RETRY_SECS: u64 = 5;
const POLL_MS: u64 = 500;

/// Start the station interface if needed and join the configured network,
/// retrying until the access point accepts us.
pub async fn wifi_connect(controller: &mut WifiController<'static>, settings: &Settings) -> Result<(), Error> {
    if !matches!(controller.is_started(), Ok(true)) {
        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(settings.wifi_ssid.as_str().into())
                .with_password(settings.wifi_password.as_str().into()),
        );
        controller.set_config(&client_config).map_err(|e| {
            warn!("[WIFI] rejected configuration: {:?}", e);
            Error::Network
        })?;
        controller.start_async().await.map_err(|e| {
            warn!("[WIFI] start failed: {:?}", e);
            Error::Network
        })?;
        info!("[WIFI] started");
    }

    info!("[WIFI] connecting to {}", settings.wifi_ssid);
    loop {
        match controller.connect_async().await {
            Ok(()) => {
                info!("[WIFI] connected");
                return Ok(());
            }
            Err(e) => {
                warn!("[WIFI] connect failed: {:?}, retrying", e);
                Timer::after(Duration::from_secs(CONNECT_RETRY_SECS)).await;
            }
        }
    }
}

pub async fn wifi_disconnect(controller: &mut WifiController<'static>) {
    if let Err(e) = controller.disconnect_async().await {
        warn!("[WIFI] disconnect: {:?}", e);
    }
    if let Err(e) = controller.stop_async().await {
        warn!("[WIFI] stop: {:?}", e);
    }
    info!("[WIFI] stopped");
}

/// Block until DHCP has handed out an address.
pub async fn wait_for_ip(stack: Stack<'_>) {
    while !stack.is_link_up() {
        Timer::after(Duration::from_millis(POLL_MS)).await;
    }
    info!("[WIFI] link up");

    loop {
        if let Some(config) = stack.config_v4() {
            info!("[WIFI] got IP {}", config.address);
            return;
        }
        Timer::after(Duration::from_millis(POLL_MS)).await;
    }
}
