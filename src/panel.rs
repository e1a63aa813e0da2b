//! Frame refresh on the Waveshare 7.5" V2 panel.
//!
//! The V2 controller has no selectable lookup tables; every update is a
//! full refresh driven by `update_and_display_frame`. This module stays
//! generic over the embedded-hal traits so it runs on the host as well.

use core::ops::RangeInclusive;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};
use epd_waveshare::{epd7in5_v2::Epd7in5, prelude::*};
use log::{info, warn};

use crate::error::Error;

/// Panel operating range from the datasheet.
pub const OPERATING_RANGE_C: RangeInclusive<i32> = 0..=50;

/// Pushes `buffer` to the panel with a full refresh.
///
/// `Quick` is not supported by this controller; it is logged and the
/// frame is still shown with the full waveform.
pub fn show_frame<SPI, BUSY, DC, RST, DELAY>(
    epd: &mut Epd7in5<SPI, BUSY, DC, RST, DELAY>,
    spi: &mut SPI,
    delay: &mut DELAY,
    buffer: &[u8],
    mode: RefreshLut,
    ambient_temperature: i32,
) -> Result<(), Error>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    if !OPERATING_RANGE_C.contains(&ambient_temperature) {
        warn!("[EPD] {} C is outside the panel's operating range", ambient_temperature);
    }
    if !matches!(mode, RefreshLut::Full) {
        warn!("[EPD] {:?} refresh unsupported on 7.5\" V2, using full refresh", mode);
    }

    info!("[EPD] updating panel at {} C", ambient_temperature);
    epd.update_and_display_frame(spi, buffer, delay)
        .map_err(|_| Error::Display)?;

    info!("[EPD] panel updated");
    Ok(())
}
