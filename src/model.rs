// Model of the data read in this app

use heapless::String;

use crate::config::{COLUMN_ORIGINS, STRING_LEN, Text};

/// Number of beacons shown side by side.
pub const SLOT_COUNT: usize = 3;

/// One beacon record as published on its topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    pub name: String<32>,
    /// Diagnostics only, never drawn.
    pub mac_address: String<24>,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_pa: i32,
    pub battery_voltage_v: f32,
    pub timestamp_epoch: i64,
}

impl SensorReading {
    /// Beacons report a pressure of zero when the record carries no data.
    pub fn is_present(&self) -> bool {
        self.pressure_pa != 0
    }

    pub fn pressure_hpa(&self) -> f32 {
        self.pressure_pa as f32 * 0.01
    }
}

/// A subscription target paired with its screen column.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconSlot {
    pub topic: String<STRING_LEN>,
    pub origin_x: i32,
}

impl BeaconSlot {
    /// Builds the fixed slot table, in subscription order.
    pub fn table(topics: &[Text; SLOT_COUNT]) -> [BeaconSlot; SLOT_COUNT] {
        core::array::from_fn(|index| BeaconSlot {
            topic: topics[index].clone(),
            origin_x: COLUMN_ORIGINS[index],
        })
    }

    /// True when a message published on `topic` belongs to this slot.
    pub fn accepts(&self, topic: &str) -> bool {
        topic_matches(&self.topic, topic)
    }
}

/// MQTT topic filter matching: `+` stands for exactly one level and a
/// trailing `#` for the parent level and everything below it. Topics
/// starting with `$` are only matched by filters that name them.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match part {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            exact => {
                if levels.next() != Some(exact) {
                    return false;
                }
            }
        }
    }
    levels.next().is_none()
}
