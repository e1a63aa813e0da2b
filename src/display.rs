use epd_waveshare::{
    epd7in5_v2::{Display7in5, Epd7in5},
    prelude::*,
};
use esp_hal::{
    delay::Delay,
    gpio::{Input, Output},
};
use log::{info, warn};

use crate::error::Error;
use crate::hardware::{Bmp280, DisplayHardware, PanelSpi};
use crate::panel;
use crate::traits::DisplaySurface;

const BUSY_TIMEOUT_MS: u32 = 10_000;

/// Used when the BMP280 cannot be read.
const FALLBACK_AMBIENT_C: i32 = 21;

pub type Frame = Display7in5;

type Driver<'a> = Epd7in5<PanelSpi<'a>, Input<'a>, Output<'a>, Output<'a>, Delay>;

/// Wait for the BUSY line to be released (HIGH on this panel)
pub fn wait_for_display_ready(busy: &Input<'_>, delay: &Delay) -> Result<(), Error> {
    let timeout_cycles = BUSY_TIMEOUT_MS / 10;

    for _ in 0..timeout_cycles {
        if busy.is_high() {
            return Ok(());
        }
        delay.delay_millis(10);
    }

    Err(Error::Display)
}

/// Waveshare 7.5" V2 panel, its framebuffer and the ambient sensor
/// that sits next to it.
pub struct EpaperSurface<'a> {
    spi: PanelSpi<'a>,
    epd: Driver<'a>,
    delay: Delay,
    frame: &'a mut Frame,
    ambient: Bmp280<'a>,
}

impl<'a> EpaperSurface<'a> {
    /// Initialises the panel and leaves it asleep until the frame is committed.
    pub fn new(hw: DisplayHardware<'a>, frame: &'a mut Frame, ambient: Bmp280<'a>) -> Result<Self, Error> {
        info!("[EPD] initializing Waveshare 7.5\" V2");
        let DisplayHardware {
            mut spi,
            busy,
            dc,
            rst,
            mut delay,
        } = hw;

        wait_for_display_ready(&busy, &delay)?;

        let mut epd = Epd7in5::new(&mut spi, busy, dc, rst, &mut delay, None)
            .map_err(|_| Error::Display)?;
        epd.sleep(&mut spi, &mut delay).map_err(|_| Error::Display)?;
        info!("[EPD] driver ready, panel asleep");

        Ok(Self {
            spi,
            epd,
            delay,
            frame,
            ambient,
        })
    }
}

impl DisplaySurface for EpaperSurface<'_> {
    type Frame = Frame;

    fn framebuffer(&mut self) -> &mut Frame {
        self.frame
    }

    fn power_on(&mut self) -> Result<(), Error> {
        self.epd
            .wake_up(&mut self.spi, &mut self.delay)
            .map_err(|_| Error::Display)
    }

    fn power_off(&mut self) -> Result<(), Error> {
        self.epd
            .sleep(&mut self.spi, &mut self.delay)
            .map_err(|_| Error::Display)
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.epd
            .clear_frame(&mut self.spi, &mut self.delay)
            .map_err(|_| Error::Display)
    }

    fn ambient_temperature(&mut self) -> i32 {
        match self.ambient.read_temperature() {
            Ok(celsius) => celsius as i32,
            Err(e) => {
                warn!("[EPD] ambient temperature unavailable ({}), assuming {} C", e, FALLBACK_AMBIENT_C);
                FALLBACK_AMBIENT_C
            }
        }
    }

    fn commit(&mut self, mode: RefreshLut, ambient_temperature: i32) -> Result<(), Error> {
        panel::show_frame(
            &mut self.epd,
            &mut self.spi,
            &mut self.delay,
            self.frame.buffer(),
            mode,
            ambient_temperature,
        )
    }
}
