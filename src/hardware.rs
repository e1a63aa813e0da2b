use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    Blocking,
    analog::adc::{Adc, AdcConfig, AdcPin, Attenuation},
    delay::Delay,
    gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pin, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    peripherals::{
        ADC1, GPIO1, GPIO8, GPIO9, GPIO10, GPIO11, GPIO12, GPIO13, GPIO14, GPIO15, I2C0, LPWR,
        SPI2,
    },
    rtc_cntl::{Rtc, sleep::TimerWakeupSource},
    spi::master::{Config as SpiConfig, Spi},
    time::Rate,
};
use log::{debug, info, warn};

use crate::battery;
use crate::config::BATTERY_SAMPLES;
use crate::error::Error;
use crate::traits::PowerMonitor;

const SPI_FREQ_MHZ: u32 = 10;
const BMP280_ADDRESS: u8 = 0x76;
const ADC_READ_ATTEMPTS: u32 = 100;

pub type PanelSpi<'a> = ExclusiveDevice<Spi<'a, Blocking>, Output<'a>, Delay>;

/// SPI bus and control lines of the e-paper panel.
pub struct DisplayHardware<'a> {
    pub spi: PanelSpi<'a>,
    pub busy: Input<'a>,
    pub dc: Output<'a>,
    pub rst: Output<'a>,
    pub delay: Delay,
}

impl<'a> DisplayHardware<'a> {
    pub fn new<CS, MOSI, SCK, DC, RST, BUSY>(
        spi_periph: SPI2<'a>,
        cs_gpio: CS,
        mosi_gpio: MOSI,
        sck_gpio: SCK,
        dc_gpio: DC,
        rst_gpio: RST,
        busy_gpio: BUSY,
    ) -> Result<Self, Error>
    where
        CS: Into<AnyPin<'a>>,
        MOSI: Into<AnyPin<'a>>,
        SCK: Into<AnyPin<'a>>,
        DC: Into<AnyPin<'a>>,
        RST: Into<AnyPin<'a>>,
        BUSY: Into<AnyPin<'a>>,
    {
        let spi_bus = Spi::new(
            spi_periph,
            SpiConfig::default().with_frequency(Rate::from_mhz(SPI_FREQ_MHZ)),
        )
        .map_err(|_| Error::Display)?
        .with_sck(sck_gpio.into())
        .with_mosi(mosi_gpio.into());

        let cs = Output::new(cs_gpio.into(), Level::High, OutputConfig::default());
        let dc = Output::new(dc_gpio.into(), Level::Low, OutputConfig::default());
        let rst = Output::new(rst_gpio.into(), Level::High, OutputConfig::default());
        let busy = Input::new(busy_gpio.into(), InputConfig::default());

        let spi = ExclusiveDevice::new(spi_bus, cs, Delay::new()).map_err(|_| Error::Display)?;

        Ok(Self {
            spi,
            busy,
            dc,
            rst,
            delay: Delay::new(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Calibration {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,
}

/// On-board BMP280, used only for the panel's ambient temperature.
pub struct Bmp280<'a> {
    i2c: I2c<'a, Blocking>,
    calibration: Option<Calibration>,
}

impl<'a> Bmp280<'a> {
    pub fn new<SDA, SCL>(i2c_periph: I2C0<'a>, sda: SDA, scl: SCL) -> Result<Self, Error>
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
    {
        let i2c = I2c::new(
            i2c_periph,
            I2cConfig::default().with_frequency(Rate::from_khz(100)),
        )
        .map_err(|_| Error::Sensor)?
        .with_sda(sda.into())
        .with_scl(scl.into());

        Ok(Self {
            i2c,
            calibration: None,
        })
    }

    pub fn read_chip_id(&mut self) -> Result<u8, Error> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(BMP280_ADDRESS, &[0xD0], &mut id)
            .map_err(|_| Error::Sensor)?;
        Ok(id[0])
    }

    pub fn init(&mut self) -> Result<(), Error> {
        let delay = Delay::new();

        // Soft reset
        self.i2c
            .write(BMP280_ADDRESS, &[0xE0, 0xB6])
            .map_err(|_| Error::Sensor)?;
        delay.delay_millis(10);

        // Wait for NVM data to be copied (status bit 0 must be 0)
        for _ in 0..50 {
            let mut status = [0u8];
            if self
                .i2c
                .write_read(BMP280_ADDRESS, &[0xF3], &mut status)
                .is_ok()
                && status[0] & 0x01 == 0
            {
                break;
            }
            delay.delay_millis(5);
        }

        let chip_id = self.read_chip_id()?;
        info!("[BMP280] chip id 0x{:02X}", chip_id);

        // Temperature trimming only
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(BMP280_ADDRESS, &[0x88], &mut raw)
            .map_err(|_| Error::Sensor)?;

        self.calibration = Some(Calibration {
            dig_t1: u16::from_le_bytes([raw[0], raw[1]]),
            dig_t2: i16::from_le_bytes([raw[2], raw[3]]),
            dig_t3: i16::from_le_bytes([raw[4], raw[5]]),
        });

        // Forced mode on demand: temperature x1, pressure skipped
        Ok(())
    }

    pub fn read_temperature(&mut self) -> Result<f32, Error> {
        let calib = self.calibration.ok_or(Error::Sensor)?;
        let delay = Delay::new();

        // ctrl_meas: osrs_t = x1, osrs_p = skipped, mode = forced
        self.i2c
            .write(BMP280_ADDRESS, &[0xF4, 0b001_000_01])
            .map_err(|_| Error::Sensor)?;
        delay.delay_millis(10);

        let mut buf = [0u8; 3];
        self.i2c
            .write_read(BMP280_ADDRESS, &[0xFA], &mut buf)
            .map_err(|_| Error::Sensor)?;

        let adc_t: i32 = ((buf[0] as i32) << 12) | ((buf[1] as i32) << 4) | ((buf[2] as i32) >> 4);

        // Bosch datasheet compensation, integer version
        let var1 = (((adc_t >> 3) - ((calib.dig_t1 as i32) << 1)) * (calib.dig_t2 as i32)) >> 11;
        let var2 = (((((adc_t >> 4) - (calib.dig_t1 as i32))
            * ((adc_t >> 4) - (calib.dig_t1 as i32)))
            >> 12)
            * (calib.dig_t3 as i32))
            >> 14;
        let t_fine = var1 + var2;

        Ok(((t_fine * 5 + 128) >> 8) as f32 / 100.0)
    }
}

/// Battery voltage through the on-board divider.
pub struct BatteryMonitor<'a> {
    adc: Adc<'a, ADC1<'a>, Blocking>,
    pin: AdcPin<GPIO1<'a>, ADC1<'a>>,
    delay: Delay,
}

impl<'a> BatteryMonitor<'a> {
    pub fn new(adc_periph: ADC1<'a>, gpio: GPIO1<'a>) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(gpio, Attenuation::_11dB);

        Self {
            adc: Adc::new(adc_periph, config),
            pin,
            delay: Delay::new(),
        }
    }

    fn read_raw(&mut self) -> Option<u16> {
        for _ in 0..ADC_READ_ATTEMPTS {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return Some(raw);
            }
            self.delay.delay_micros(50);
        }
        None
    }
}

impl PowerMonitor for BatteryMonitor<'_> {
    fn volts(&mut self) -> f32 {
        let mut sum = 0u32;
        let mut count = 0u32;
        for _ in 0..BATTERY_SAMPLES {
            match self.read_raw() {
                Some(raw) => {
                    sum += u32::from(raw);
                    count += 1;
                }
                None => warn!("[BATT] ADC read failed"),
            }
        }

        if count == 0 {
            return 0.0;
        }
        battery::volts_from_raw(sum as f32 / count as f32)
    }
}

/// GPIOs released before deep sleep.
///
/// Drivers are built on `reborrow()`s of these pins, so the pins are back
/// here, unused, once those drivers have been dropped.
pub struct SleepPins<'a> {
    pub gpio1: GPIO1<'a>,
    pub gpio8: GPIO8<'a>,
    pub gpio9: GPIO9<'a>,
    pub gpio10: GPIO10<'a>,
    pub gpio11: GPIO11<'a>,
    pub gpio12: GPIO12<'a>,
    pub gpio13: GPIO13<'a>,
    pub gpio14: GPIO14<'a>,
    pub gpio15: GPIO15<'a>,
}

impl SleepPins<'_> {
    /// Leaves every listed pin as a floating input, which draws the least
    /// current while asleep.
    pub fn park(self, numbers: &[u8]) {
        let pins: [AnyPin<'_>; 9] = [
            self.gpio1.into(),
            self.gpio8.into(),
            self.gpio9.into(),
            self.gpio10.into(),
            self.gpio11.into(),
            self.gpio12.into(),
            self.gpio13.into(),
            self.gpio14.into(),
            self.gpio15.into(),
        ];

        for pin in pins {
            let number = pin.number();
            if numbers.contains(&number) {
                drop(Input::new(pin, InputConfig::default().with_pull(Pull::None)));
                debug!("[SLEEP] GPIO{} released", number);
            }
        }
    }
}

/// Timer wake-up through the RTC controller.
pub struct DeepSleep<'a> {
    rtc: Rtc<'a>,
}

impl<'a> DeepSleep<'a> {
    pub fn new(lpwr: LPWR<'a>) -> Self {
        Self {
            rtc: Rtc::new(lpwr),
        }
    }

    /// Does not return; the chip reboots on wake.
    pub fn enter(&mut self, seconds: u64) {
        let timer = TimerWakeupSource::new(core::time::Duration::from_secs(seconds));
        info!(
            "[SLEEP] awake for {} ms, sleeping {} s",
            embassy_time::Instant::now().as_millis(),
            seconds
        );

        // Let the UART drain
        Delay::new().delay_millis(100);
        self.rtc.sleep_deep(&[&timer]);
    }
}
