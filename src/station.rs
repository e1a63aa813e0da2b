//! The appliance as seen by the hosting loop.
//!
//! The loop calls [`Station::prepare`] once at boot, [`Station::connected`]
//! whenever the broker session is (re)established, [`Station::deliver`] for
//! every incoming message and [`Station::tick`] on every iteration.

use embedded_graphics::prelude::DrawTarget;
use epd_waveshare::color::Color;
use log::info;

use crate::config::Settings;
use crate::error::Error;
use crate::power_down;
use crate::render;
use crate::sequencer::{AcquisitionState, Sequencer, Step};
use crate::traits::{DisplaySurface, MessageBus, PowerController, PowerMonitor};

pub struct Station {
    sequencer: Sequencer,
    powered_down: bool,
}

impl Station {
    pub fn new(settings: &Settings) -> Self {
        Self {
            sequencer: Sequencer::new(&settings.beacon_topics),
            powered_down: false,
        }
    }

    /// Blank frame, column outlines and the battery line.
    pub fn prepare<D, M>(&mut self, display: &mut D, monitor: &mut M)
    where
        D: DisplaySurface,
        M: PowerMonitor,
    {
        let percent = monitor.charge_level_percent();
        let volts = monitor.volts();
        info!("battery {:.2} V, {:.0} %", volts, percent);

        let frame = display.framebuffer();
        frame.clear(Color::White).ok();
        render::draw_layout(frame);
        render::draw_battery_summary(frame, percent, volts);
    }

    pub async fn connected<B: MessageBus>(&mut self, bus: &mut B) -> Result<(), Error> {
        self.sequencer.subscribe_current(bus).await
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.sequencer.deliver(topic, payload);
    }

    pub fn state(&self) -> AcquisitionState {
        self.sequencer.state()
    }

    pub fn current_topic(&self) -> Option<&str> {
        self.sequencer.current_topic()
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// One pass of the control loop. The shutdown sequence runs on the tick
    /// that captures the last slot and never again.
    pub async fn tick<B, D, C>(&mut self, bus: &mut B, display: &mut D, power: &mut C) -> Result<Step, Error>
    where
        B: MessageBus,
        D: DisplaySurface,
        C: PowerController,
    {
        if self.powered_down {
            return Ok(Step::Done);
        }

        let step = self.sequencer.tick(bus, display.framebuffer()).await?;
        if step == Step::Completed {
            self.powered_down = true;
            power_down::shut_down(bus, display, power).await;
        }
        Ok(step)
    }
}
