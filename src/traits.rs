//! Collaborator traits the core drives
//!
//! Each is implemented by a hardware adapter on target and by recording
//! mocks in the host tests.

use embedded_graphics::prelude::DrawTarget;
use epd_waveshare::{color::Color, prelude::RefreshLut};

use crate::battery;
use crate::error::Error;

/// Publish/subscribe transport carrying beacon payloads.
///
/// Incoming messages are not pulled through this trait; the hosting loop
/// hands them to [`crate::station::Station::deliver`].
#[allow(async_fn_in_trait)]
pub trait MessageBus {
    async fn subscribe(&mut self, topic: &str) -> Result<(), Error>;

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Error>;

    /// Drop the broker session and the network link
    async fn disconnect(&mut self);
}

/// E-paper panel together with its in-memory framebuffer.
pub trait DisplaySurface {
    type Frame: DrawTarget<Color = Color>;

    /// Framebuffer every draw call writes into
    fn framebuffer(&mut self) -> &mut Self::Frame;

    fn power_on(&mut self) -> Result<(), Error>;

    fn power_off(&mut self) -> Result<(), Error>;

    /// Clear the physical panel (the framebuffer is left untouched)
    fn clear(&mut self) -> Result<(), Error>;

    /// Temperature around the panel in Celsius
    fn ambient_temperature(&mut self) -> i32;

    /// Push the framebuffer to the panel
    fn commit(&mut self, mode: RefreshLut, ambient_temperature: i32) -> Result<(), Error>;
}

/// Battery telemetry
pub trait PowerMonitor {
    fn volts(&mut self) -> f32;

    fn charge_level_percent(&mut self) -> f32 {
        battery::charge_level(self.volts())
    }
}

/// Pin release and timed deep sleep
pub trait PowerController {
    fn reset_pin(&mut self, pin: u8);

    /// On target this does not return; the chip reboots on wake.
    fn sleep_for(&mut self, seconds: u64);
}
