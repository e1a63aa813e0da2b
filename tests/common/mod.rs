//! Recording collaborators shared by the integration tests.

#![allow(dead_code)]

use std::convert::Infallible;

use beaconboard::config::{SCREEN_HEIGHT, SCREEN_WIDTH, Settings, param};
use beaconboard::traits::{DisplaySurface, MessageBus, PowerController, PowerMonitor};
use beaconboard::Error;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{ContainsPoint, Rectangle};
use epd_waveshare::color::Color;
use epd_waveshare::prelude::RefreshLut;

pub const TOPICS: [&str; 3] = ["ruuvi/sauna", "ruuvi/porch", "ruuvi/cellar"];

pub const PAYLOAD: &[u8] = br#"{"pressure":10132,"temperature":21.5,"humidity":40.2,"batteryVoltage":3.7,"timestamp":1700000000,"name":"Tag1"}"#;

pub fn settings() -> Settings {
    let saved = [
        (param::WIFI_SSID, "lab"),
        (param::WIFI_PASSWORD, "secret"),
        (param::MQTT_SERVER, "broker.local"),
        (param::BEACONS[0], TOPICS[0]),
        (param::BEACONS[1], TOPICS[1]),
        (param::BEACONS[2], TOPICS[2]),
    ];
    Settings::load(&saved).expect("test settings are valid")
}

/// Records every bus call and fails the next subscribe on request.
#[derive(Default)]
pub struct RecordingBus {
    pub events: Vec<String>,
    pub subscribed: Vec<String>,
    pub fail_next_subscribe: bool,
}

impl MessageBus for RecordingBus {
    async fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        if self.fail_next_subscribe {
            self.fail_next_subscribe = false;
            self.events.push(format!("subscribe {} failed", topic));
            return Err(Error::Bus);
        }
        self.events.push(format!("subscribe {}", topic));
        self.subscribed.push(topic.to_owned());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.events.push(format!("unsubscribe {}", topic));
        self.subscribed.retain(|t| t != topic);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.events.push("disconnect".into());
        self.subscribed.clear();
    }
}

/// Keeps every non-background pixel written since the last reset.
#[derive(Default)]
pub struct Tracer {
    pub drawn: Vec<Point>,
    pub off_screen: usize,
}

impl Tracer {
    pub fn reset(&mut self) {
        self.drawn.clear();
        self.off_screen = 0;
    }

    pub fn outside(&self, area: &Rectangle) -> usize {
        self.drawn.iter().filter(|p| !area.contains(**p)).count()
    }

    pub fn min_x(&self) -> Option<i32> {
        self.drawn.iter().map(|p| p.x).min()
    }
}

impl OriginDimensions for Tracer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for Tracer {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let screen = self.bounding_box();
        for Pixel(point, color) in pixels {
            if !screen.contains(point) {
                self.off_screen += 1;
            }
            if color == Color::Black {
                self.drawn.push(point);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Panel {
    pub frame: Tracer,
    pub calls: Vec<&'static str>,
    pub commits: usize,
}

impl DisplaySurface for Panel {
    type Frame = Tracer;

    fn framebuffer(&mut self) -> &mut Tracer {
        &mut self.frame
    }

    fn power_on(&mut self) -> Result<(), Error> {
        self.calls.push("power_on");
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), Error> {
        self.calls.push("power_off");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.calls.push("clear");
        Ok(())
    }

    fn ambient_temperature(&mut self) -> i32 {
        self.calls.push("ambient");
        22
    }

    fn commit(&mut self, _mode: RefreshLut, _ambient_temperature: i32) -> Result<(), Error> {
        self.calls.push("commit");
        self.commits += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct Power {
    pub released: Vec<u8>,
    pub sleeps: Vec<u64>,
}

impl PowerController for Power {
    fn reset_pin(&mut self, pin: u8) {
        self.released.push(pin);
    }

    fn sleep_for(&mut self, seconds: u64) {
        self.sleeps.push(seconds);
    }
}

pub struct Battery(pub f32);

impl PowerMonitor for Battery {
    fn volts(&mut self) -> f32 {
        self.0
    }
}
