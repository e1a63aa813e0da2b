//! End of a wake cycle: show the finished frame, then sleep.
//!
//! The order is fixed. The panel is only driven while powered, and the pins
//! are released after it is off.

use epd_waveshare::prelude::RefreshLut;
use heapless::Vec;
use log::{error, info, warn};

use crate::config::{RESET_PINS, SLEEP_DURATION_SECS};
use crate::traits::{DisplaySurface, MessageBus, PowerController};

/// [`PowerController`] that only records what to do.
///
/// On target the pins are still owned by the panel, sensor and ADC drivers
/// while the shutdown runs. The hosting loop drops those drivers first and
/// then releases the recorded pins and sleeps for the recorded time.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SleepPlan {
    released: Vec<u8, { RESET_PINS.len() }>,
    sleep_secs: Option<u64>,
}

impl SleepPlan {
    /// Pins to release, in the order they were requested.
    pub fn released(&self) -> &[u8] {
        &self.released
    }

    /// Set once the shutdown sequence has finished.
    pub fn sleep_secs(&self) -> Option<u64> {
        self.sleep_secs
    }
}

impl PowerController for SleepPlan {
    fn reset_pin(&mut self, pin: u8) {
        if self.released.contains(&pin) {
            return;
        }
        if self.released.push(pin).is_err() {
            warn!("no room to release pin {}", pin);
        }
    }

    fn sleep_for(&mut self, seconds: u64) {
        self.sleep_secs = Some(seconds);
    }
}

pub async fn shut_down<B, D, C>(bus: &mut B, display: &mut D, power: &mut C)
where
    B: MessageBus,
    D: DisplaySurface,
    C: PowerController,
{
    info!("acquisition complete, shutting down");
    bus.disconnect().await;

    if let Err(e) = display.power_on() {
        warn!("panel power on: {}", e);
    }
    if let Err(e) = display.clear() {
        warn!("panel clear: {}", e);
    }

    let ambient = display.ambient_temperature();
    if let Err(e) = display.commit(RefreshLut::Full, ambient) {
        // Not retried; the next wake cycle redraws everything
        error!("frame commit at {} C failed: {}", ambient, e);
    }

    if let Err(e) = display.power_off() {
        warn!("panel power off: {}", e);
    }

    for pin in RESET_PINS {
        power.reset_pin(pin);
    }

    info!("sleeping for {} s", SLEEP_DURATION_SECS);
    power.sleep_for(SLEEP_DURATION_SECS);
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use core::convert::Infallible;
    use std::format;
    use std::string::String;
    use std::vec::Vec as StdVec;

    use embassy_futures::block_on;
    use embedded_graphics::prelude::*;
    use epd_waveshare::color::Color;

    use super::*;
    use crate::error::Error;

    type Log = RefCell<StdVec<String>>;

    struct Bus<'a>(&'a Log);

    impl MessageBus for Bus<'_> {
        async fn subscribe(&mut self, _topic: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn unsubscribe(&mut self, _topic: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.0.borrow_mut().push("disconnect".into());
        }
    }

    struct Blank;

    impl OriginDimensions for Blank {
        fn size(&self) -> Size {
            Size::new(800, 480)
        }
    }

    impl DrawTarget for Blank {
        type Color = Color;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }
    }

    struct Panel<'a> {
        log: &'a Log,
        frame: Blank,
        commit_fails: bool,
    }

    impl DisplaySurface for Panel<'_> {
        type Frame = Blank;

        fn framebuffer(&mut self) -> &mut Blank {
            &mut self.frame
        }

        fn power_on(&mut self) -> Result<(), Error> {
            self.log.borrow_mut().push("power_on".into());
            Ok(())
        }

        fn power_off(&mut self) -> Result<(), Error> {
            self.log.borrow_mut().push("power_off".into());
            Ok(())
        }

        fn clear(&mut self) -> Result<(), Error> {
            self.log.borrow_mut().push("clear".into());
            Ok(())
        }

        fn ambient_temperature(&mut self) -> i32 {
            self.log.borrow_mut().push("ambient".into());
            19
        }

        fn commit(&mut self, mode: RefreshLut, ambient_temperature: i32) -> Result<(), Error> {
            let full = matches!(mode, RefreshLut::Full);
            self.log
                .borrow_mut()
                .push(format!("commit full={} at {}", full, ambient_temperature));
            if self.commit_fails { Err(Error::Display) } else { Ok(()) }
        }
    }

    struct Power<'a>(&'a Log);

    impl PowerController for Power<'_> {
        fn reset_pin(&mut self, pin: u8) {
            self.0.borrow_mut().push(format!("reset {}", pin));
        }

        fn sleep_for(&mut self, seconds: u64) {
            self.0.borrow_mut().push(format!("sleep {}", seconds));
        }
    }

    fn run(commit_fails: bool) -> StdVec<String> {
        let log = Log::default();
        let mut panel = Panel {
            log: &log,
            frame: Blank,
            commit_fails,
        };
        block_on(shut_down(&mut Bus(&log), &mut panel, &mut Power(&log)));
        log.into_inner()
    }

    #[test]
    fn steps_run_in_order() {
        let log = run(false);

        assert_eq!(
            &log[..6],
            [
                "disconnect",
                "power_on",
                "clear",
                "ambient",
                "commit full=true at 19",
                "power_off",
            ]
        );
        assert_eq!(log.last().map(String::as_str), Some("sleep 1800"));
    }

    #[test]
    fn every_peripheral_pin_is_released_before_sleep() {
        let log = run(false);
        let resets: StdVec<&str> = log[6..log.len() - 1].iter().map(String::as_str).collect();

        assert_eq!(resets.len(), RESET_PINS.len());
        for pin in RESET_PINS {
            assert!(resets.contains(&format!("reset {}", pin).as_str()));
        }
    }

    #[test]
    fn failed_commit_does_not_stop_shutdown() {
        let log = run(true);

        assert_eq!(log[5], "power_off");
        assert_eq!(log.last().map(String::as_str), Some("sleep 1800"));
    }

    #[test]
    fn plan_records_pins_and_sleep_without_touching_hardware() {
        let log = Log::default();
        let mut panel = Panel {
            log: &log,
            frame: Blank,
            commit_fails: false,
        };
        let mut plan = SleepPlan::default();
        assert_eq!(plan.sleep_secs(), None);

        block_on(shut_down(&mut Bus(&log), &mut panel, &mut plan));

        assert_eq!(plan.released(), RESET_PINS);
        assert_eq!(plan.sleep_secs(), Some(SLEEP_DURATION_SECS));
        assert_eq!(log.borrow().last().map(String::as_str), Some("power_off"));
    }

    #[test]
    fn plan_keeps_each_pin_once() {
        let mut plan = SleepPlan::default();
        for pin in [10, 10, 11, 10] {
            plan.reset_pin(pin);
        }

        assert_eq!(plan.released(), [10, 11]);
    }
}
