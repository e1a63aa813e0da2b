//! Beacon payload decoding.
//!
//! Payloads are JSON objects published by the beacon gateway, e.g.
//! `{"name":"Sauna","mac":"F9:81:78:B2:70:BE","temperature":21.5,
//! "humidity":40.2,"pressure":101325,"batteryVoltage":3.7,"timestamp":1700000000}`.
//! Decoding is best-effort and per field: a field that is missing, `null`
//! or of the wrong type stays zero or empty without affecting the others.
//! A payload that is not an object at all yields an empty record.

use heapless::String;
use log::{debug, warn};
use serde::Deserialize;

use crate::error::Error;
use crate::model::SensorReading;

/// Keys the display cares about. Anything else is skipped.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
enum Field {
    Name,
    Mac,
    Temperature,
    Humidity,
    Pressure,
    BatteryVoltage,
    Timestamp,
}

/// Top-level `"key": value` pairs of a JSON object, as raw slices.
///
/// Nested objects and arrays are skipped whole. Iteration stops at the
/// closing brace or at the first byte that cannot start a member.
struct Members<'a> {
    json: &'a [u8],
    pos: usize,
}

impl<'a> Members<'a> {
    fn new(json: &'a [u8]) -> Option<Self> {
        let mut members = Members { json, pos: 0 };
        members.skip_whitespace();
        if members.peek()? != b'{' {
            return None;
        }
        members.pos += 1;
        Some(members)
    }

    fn peek(&self) -> Option<u8> {
        self.json.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn skip_string(&mut self) -> Option<()> {
        self.pos += 1;
        loop {
            match self.peek()? {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Some(());
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_nested(&mut self) -> Option<()> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                b'"' => {
                    self.skip_string()?;
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Some(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_value(&mut self) -> Option<()> {
        match self.peek()? {
            b'"' => self.skip_string(),
            b'{' | b'[' => self.skip_nested(),
            _ => {
                while !matches!(
                    self.peek(),
                    None | Some(b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
                ) {
                    self.pos += 1;
                }
                Some(())
            }
        }
    }
}

impl<'a> Iterator for Members<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        if self.peek()? == b',' {
            self.pos += 1;
            self.skip_whitespace();
        }
        if self.peek()? != b'"' {
            return None;
        }

        let key_start = self.pos;
        self.skip_string()?;
        let key = &self.json[key_start..self.pos];

        self.skip_whitespace();
        if self.peek()? != b':' {
            return None;
        }
        self.pos += 1;
        self.skip_whitespace();

        let value_start = self.pos;
        self.skip_value()?;
        Some((key, &self.json[value_start..self.pos]))
    }
}

impl SensorReading {
    /// Parses a payload, defaulting every field that is missing or unreadable.
    pub fn parse(payload: &[u8]) -> SensorReading {
        let mut reading = SensorReading::default();
        let Some(members) = Members::new(payload) else {
            warn!("{} ({} bytes): not a JSON object", Error::Payload, payload.len());
            return reading;
        };

        for (key, value) in members {
            let Ok((field, _)) = serde_json_core::from_slice::<Field>(key) else {
                continue;
            };
            match field {
                Field::Name => reading.name = text(field, value),
                Field::Mac => reading.mac_address = text(field, value),
                Field::Temperature => reading.temperature_c = number(field, value) as f32,
                Field::Humidity => reading.humidity_pct = number(field, value) as f32,
                // Some gateways publish pressure as a float
                Field::Pressure => reading.pressure_pa = number(field, value) as i32,
                Field::BatteryVoltage => reading.battery_voltage_v = number(field, value) as f32,
                Field::Timestamp => reading.timestamp_epoch = integer(field, value),
            }
        }

        reading
    }
}

/// Decodes a payload into a reading, or `None` when it carries no usable data.
pub fn decode(payload: &[u8]) -> Option<SensorReading> {
    let reading = SensorReading::parse(payload);
    if reading.is_present() {
        Some(reading)
    } else {
        debug!("payload without pressure, treating as absent");
        None
    }
}

fn number(field: Field, value: &[u8]) -> f64 {
    match serde_json_core::from_slice::<f64>(value) {
        Ok((n, _)) if n.is_finite() => n,
        _ => {
            debug!("{:?} is not a number, using 0", field);
            0.0
        }
    }
}

/// Whole seconds, also accepted when written with a fraction.
fn integer(field: Field, value: &[u8]) -> i64 {
    match serde_json_core::from_slice::<i64>(value) {
        Ok((n, _)) => n,
        Err(_) => number(field, value) as i64,
    }
}

fn text<const N: usize>(field: Field, value: &[u8]) -> String<N> {
    match serde_json_core::from_slice::<&str>(value) {
        Ok((s, _)) => truncated(s),
        Err(_) => {
            debug!("{:?} is not a string, leaving it empty", field);
            String::new()
        }
    }
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for c in value.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
