//! Compile-time constants and operator-provided settings.
//!
//! Geometry, timing and pin assignments live here so they can be tuned in
//! one place. Connection parameters and beacon topics come from a
//! [`ConfigProvider`] and are validated once at boot by [`Settings::load`].

use heapless::String;

use crate::error::Error;
use crate::model::SLOT_COUNT;

// Device

/// Client id presented to the broker.
pub const THING_NAME: &str = "beaconboard";

/// Maximum length of any saved parameter.
pub const STRING_LEN: usize = 128;

// MQTT

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;

/// Delay between broker connection attempts.
pub const MQTT_CONNECT_RETRY_MS: u64 = 500;

/// Largest payload kept in the inbox; anything longer is dropped.
pub const PAYLOAD_CAPACITY: usize = 768;

// Power

/// Deep sleep duration between wake cycles (30 minutes).
pub const SLEEP_DURATION_SECS: u64 = 30 * 60;

/// GPIOs released before deep sleep: battery ADC, BMP280 I2C, panel SPI.
pub const RESET_PINS: [u8; 9] = [1, 8, 9, 10, 11, 12, 13, 14, 15];

/// Converts a raw ADC count into millivolts across the battery divider.
pub const BATTERY_ADC_FACTOR: f32 = 1.79;

/// Oneshot samples averaged per battery read.
pub const BATTERY_SAMPLES: u32 = 10;

// Screen geometry (Waveshare 7.5" V2, landscape)

pub const SCREEN_WIDTH: u32 = epd_waveshare::epd7in5_v2::WIDTH;
pub const SCREEN_HEIGHT: u32 = epd_waveshare::epd7in5_v2::HEIGHT;

/// Left edge of each slot column, in subscription order.
pub const COLUMN_ORIGINS: [i32; SLOT_COUNT] = [10, 275, 540];
pub const COLUMN_WIDTH: u32 = 250;

/// Everything a slot draws stays above this line.
pub const COLUMN_BOTTOM: i32 = 420;

pub const TITLE_BASELINE_Y: i32 = 70;
pub const FRAME_TOP: i32 = 80;
pub const FRAME_HEIGHT: u32 = 330;

/// Top of the temperature, humidity, pressure and battery rows.
pub const ROW_OFFSETS: [i32; 4] = [90, 160, 230, 300];
pub const ROW_HEIGHT: u32 = 60;

pub const TIMESTAMP_Y: i32 = 380;

pub const BATTERY_SUMMARY_X: i32 = 20;
pub const BATTERY_SUMMARY_Y: i32 = 455;

/// Names of the saved parameters.
pub mod param {
    pub const WIFI_SSID: &str = "wifiSsid";
    pub const WIFI_PASSWORD: &str = "wifiPass";
    pub const MQTT_SERVER: &str = "mqttServer";
    pub const MQTT_PORT: &str = "mqttPort";
    pub const MQTT_USER: &str = "mqttUser";
    pub const MQTT_PASSWORD: &str = "mqttPass";
    pub const BEACONS: [&str; super::SLOT_COUNT] = ["beacon1", "beacon2", "beacon3"];
}

/// Source of saved connection parameters.
pub trait ConfigProvider {
    fn saved_parameter(&self, name: &str) -> Option<&str>;
}

/// Parameters baked in at build time through `BEACONBOARD_*` environment variables.
pub struct BuildConfig;

impl ConfigProvider for BuildConfig {
    fn saved_parameter(&self, name: &str) -> Option<&str> {
        match name {
            param::WIFI_SSID => option_env!("BEACONBOARD_WIFI_SSID"),
            param::WIFI_PASSWORD => option_env!("BEACONBOARD_WIFI_PASS"),
            param::MQTT_SERVER => option_env!("BEACONBOARD_MQTT_SERVER"),
            param::MQTT_PORT => option_env!("BEACONBOARD_MQTT_PORT"),
            param::MQTT_USER => option_env!("BEACONBOARD_MQTT_USER"),
            param::MQTT_PASSWORD => option_env!("BEACONBOARD_MQTT_PASS"),
            "beacon1" => option_env!("BEACONBOARD_BEACON1"),
            "beacon2" => option_env!("BEACONBOARD_BEACON2"),
            "beacon3" => option_env!("BEACONBOARD_BEACON3"),
            _ => None,
        }
    }
}

impl<'a, const N: usize> ConfigProvider for [(&'a str, &'a str); N] {
    fn saved_parameter(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

pub type Text = String<STRING_LEN>;

/// Validated connection parameters and beacon topics.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub wifi_ssid: Text,
    pub wifi_password: Text,
    pub mqtt_server: Text,
    pub mqtt_port: u16,
    pub mqtt_user: Text,
    pub mqtt_password: Text,
    pub beacon_topics: [Text; SLOT_COUNT],
}

/// How to authenticate against the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    Anonymous,
    User(&'a str),
    UserPassword(&'a str, &'a str),
}

impl Settings {
    pub fn load<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self, Error> {
        let mqtt_server = required(provider, param::MQTT_SERVER)?;
        if mqtt_server.len() < 3 {
            return Err(Error::InvalidParameter(param::MQTT_SERVER));
        }

        let mqtt_port = match provider.saved_parameter(param::MQTT_PORT) {
            None | Some("") => DEFAULT_MQTT_PORT,
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(Error::InvalidParameter(param::MQTT_PORT)),
            },
        };

        let mut beacon_topics: [Text; SLOT_COUNT] = Default::default();
        for (topic, name) in beacon_topics.iter_mut().zip(param::BEACONS) {
            *topic = required(provider, name)?;
        }

        Ok(Self {
            wifi_ssid: required(provider, param::WIFI_SSID)?,
            wifi_password: optional(provider, param::WIFI_PASSWORD)?,
            mqtt_server,
            mqtt_port,
            mqtt_user: optional(provider, param::MQTT_USER)?,
            mqtt_password: optional(provider, param::MQTT_PASSWORD)?,
            beacon_topics,
        })
    }

    /// A password takes precedence; a bare user name connects without one.
    pub fn credentials(&self) -> Credentials<'_> {
        if !self.mqtt_password.is_empty() {
            Credentials::UserPassword(&self.mqtt_user, &self.mqtt_password)
        } else if !self.mqtt_user.is_empty() {
            Credentials::User(&self.mqtt_user)
        } else {
            Credentials::Anonymous
        }
    }
}

fn required<P: ConfigProvider + ?Sized>(provider: &P, name: &'static str) -> Result<Text, Error> {
    match provider.saved_parameter(name) {
        Some(value) if !value.is_empty() => to_text(name, value),
        _ => Err(Error::MissingParameter(name)),
    }
}

fn optional<P: ConfigProvider + ?Sized>(provider: &P, name: &'static str) -> Result<Text, Error> {
    match provider.saved_parameter(name) {
        Some(value) => to_text(name, value),
        None => Ok(Text::new()),
    }
}

fn to_text(name: &'static str, value: &str) -> Result<Text, Error> {
    Text::try_from(value).map_err(|_| Error::InvalidParameter(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPICS: [(&str, &str); 3] = [
        ("beacon1", "ruuvitag/F9:81:78:B2:70:BE"),
        ("beacon2", "ruuvitag/ED:30:75:FE:CD:37"),
        ("beacon3", "ruuvitag/CD:8C:07:25:4B:54"),
    ];

    fn params(server: &'static str, user: &'static str, pass: &'static str) -> [(&'static str, &'static str); 7] {
        [
            ("wifiSsid", "home"),
            ("mqttServer", server),
            ("mqttUser", user),
            ("mqttPass", pass),
            TOPICS[0],
            TOPICS[1],
            TOPICS[2],
        ]
    }

    #[test]
    fn loads_complete_parameters() {
        let settings = Settings::load(&params("broker.lan", "", "")).unwrap();

        assert_eq!(settings.mqtt_server.as_str(), "broker.lan");
        assert_eq!(settings.mqtt_port, DEFAULT_MQTT_PORT);
        assert_eq!(settings.beacon_topics[0].as_str(), "ruuvitag/F9:81:78:B2:70:BE");
        assert_eq!(settings.beacon_topics[2].as_str(), "ruuvitag/CD:8C:07:25:4B:54");
        assert!(settings.wifi_password.is_empty());
    }

    #[test]
    fn rejects_short_server_name() {
        assert_eq!(
            Settings::load(&params("ab", "", "")),
            Err(Error::InvalidParameter("mqttServer"))
        );
    }

    #[test]
    fn missing_beacon_topic_is_reported_by_name() {
        let provider = [("wifiSsid", "home"), ("mqttServer", "broker.lan"), TOPICS[0], TOPICS[2]];
        assert_eq!(
            Settings::load(&provider),
            Err(Error::MissingParameter("beacon2"))
        );
    }

    #[test]
    fn empty_topic_counts_as_missing() {
        let provider = [
            ("wifiSsid", "home"),
            ("mqttServer", "broker.lan"),
            TOPICS[0],
            ("beacon2", ""),
            TOPICS[2],
        ];
        assert_eq!(
            Settings::load(&provider),
            Err(Error::MissingParameter("beacon2"))
        );
    }

    #[test]
    fn parses_explicit_port() {
        let provider = [
            ("wifiSsid", "home"),
            ("mqttServer", "10.0.0.2"),
            ("mqttPort", "8883"),
            TOPICS[0],
            TOPICS[1],
            TOPICS[2],
        ];
        assert_eq!(Settings::load(&provider).unwrap().mqtt_port, 8883);

        let provider = [
            ("wifiSsid", "home"),
            ("mqttServer", "10.0.0.2"),
            ("mqttPort", "0"),
            TOPICS[0],
            TOPICS[1],
            TOPICS[2],
        ];
        assert_eq!(
            Settings::load(&provider),
            Err(Error::InvalidParameter("mqttPort"))
        );
    }

    #[test]
    fn rejects_oversized_value() {
        let long = "x".repeat(STRING_LEN + 1);
        let provider = [
            ("wifiSsid", "home"),
            ("mqttServer", long.as_str()),
            TOPICS[0],
            TOPICS[1],
            TOPICS[2],
        ];
        assert_eq!(
            Settings::load(&provider),
            Err(Error::InvalidParameter("mqttServer"))
        );
    }

    #[test]
    fn credentials_follow_what_is_set() {
        let anonymous = Settings::load(&params("broker.lan", "", "")).unwrap();
        assert_eq!(anonymous.credentials(), Credentials::Anonymous);

        let user = Settings::load(&params("broker.lan", "display", "")).unwrap();
        assert_eq!(user.credentials(), Credentials::User("display"));

        let full = Settings::load(&params("broker.lan", "display", "s3cret")).unwrap();
        assert_eq!(
            full.credentials(),
            Credentials::UserPassword("display", "s3cret")
        );
    }
}
