#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use beaconboard::{
    battery, clock,
    config::{self, Credentials, Settings},
    decoder,
    display::wait_for_display_ready,
    hardware::{BatteryMonitor, Bmp280, DisplayHardware},
    render,
    traits::PowerMonitor,
};

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn assert_close(&mut self, value: f32, expected: f32, tolerance: f32, test_name: &str) {
        self.total += 1;
        if (value - expected).abs() < tolerance {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!(
                "  ✗ {} FAILED: {:.2} not close to {:.2} (tolerance: {:.2})",
                test_name,
                value,
                expected,
                tolerance
            );
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

fn test_core_logic(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Core Logic Tests");

    let payload = br#"{"name":"Tag1","temperature":21.5,"humidity":40.2,"pressure":10132,"batteryVoltage":3.7,"timestamp":1700000000}"#;
    match decoder::decode(payload) {
        Some(reading) => {
            results.assert_eq(reading.name.as_str(), "Tag1", "decoded name");
            results.assert_eq(reading.pressure_pa, 10132, "decoded pressure");
            results.assert_close(reading.temperature_c, 21.5, 0.01, "decoded temperature");
        }
        None => results.assert(false, "payload decoded"),
    }
    results.assert(decoder::decode(b"{\"pressure\":0}").is_none(), "zero pressure is absent");
    results.assert(decoder::decode(b"not json").is_none(), "garbage is absent");

    results.assert_eq(render::format_value(23.456).as_str(), "  23.46", "fixed width value");
    results.assert_eq(render::format_value(-5.0).as_str(), "  -5.00", "negative value");

    results.assert_eq(
        clock::format_local(1_700_000_000).as_str(),
        "15/11/23 00:13:20",
        "winter local time",
    );
    results.assert_eq(
        clock::format_local(1_690_000_000).as_str(),
        "22/07/23 07:26:40",
        "summer local time",
    );

    results.assert_close(battery::charge_level(4.2), 100.0, 0.01, "full battery");
    results.assert_close(battery::charge_level(3.0), 0.0, 0.01, "empty battery clamps");

    let saved = [
        (config::param::WIFI_SSID, "lab"),
        (config::param::MQTT_SERVER, "10.0.0.2"),
        (config::param::MQTT_USER, "display"),
        ("beacon1", "ruuvi/a"),
        ("beacon2", "ruuvi/b"),
        ("beacon3", "ruuvi/c"),
    ];
    match Settings::load(&saved) {
        Ok(settings) => {
            results.assert_eq(settings.mqtt_port, config::DEFAULT_MQTT_PORT, "default port");
            results.assert_eq(settings.credentials(), Credentials::User("display"), "user-only login");
        }
        Err(e) => {
            esp_println::println!("    Settings rejected: {}", e);
            results.assert(false, "settings load");
        }
    }
}

async fn test_bmp280_sensor<SDA, SCL>(
    results: &mut TestResults,
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: SDA,
    scl: SCL,
) where
    SDA: Into<esp_hal::gpio::AnyPin<'static>>,
    SCL: Into<esp_hal::gpio::AnyPin<'static>>,
{
    esp_println::println!("\n[TEST] BMP280 Ambient Sensor Tests");

    let mut bmp280 = match Bmp280::new(i2c0, sda, scl) {
        Ok(bmp280) => bmp280,
        Err(e) => {
            esp_println::println!("  Failed to configure I2C: {}", e);
            results.assert(false, "I2C configuration");
            return;
        }
    };

    if let Err(e) = bmp280.init() {
        esp_println::println!("  Failed to initialize BMP280: {}", e);
        results.assert(false, "BMP280 initialization");
        return;
    }
    results.assert(true, "BMP280 initialization");

    match bmp280.read_chip_id() {
        Ok(chip_id) => results.assert_eq(chip_id, 0x58, "BMP280 chip ID is 0x58"),
        Err(e) => {
            esp_println::println!("    Failed to read chip ID: {}", e);
            results.assert(false, "read chip ID");
        }
    }

    esp_println::println!("  Reading temperatures (3 samples)...");
    for i in 0..3 {
        Timer::after(Duration::from_millis(100)).await;
        match bmp280.read_temperature() {
            Ok(temp) => {
                esp_println::println!("    Sample {}: {:.2}°C", i + 1, temp);
                results.assert(temp > -40.0 && temp < 85.0, "temperature in valid range");
            }
            Err(e) => {
                esp_println::println!("    Failed to read temperature: {}", e);
                results.assert(false, "read temperature");
            }
        }
    }
}

fn test_battery_adc(
    results: &mut TestResults,
    adc1: esp_hal::peripherals::ADC1<'static>,
    gpio1: esp_hal::peripherals::GPIO1<'static>,
) {
    esp_println::println!("\n[TEST] Battery ADC Tests");

    let mut monitor = BatteryMonitor::new(adc1, gpio1);
    let volts = monitor.volts();
    let percent = monitor.charge_level_percent();
    esp_println::println!("    {:.2} V, {:.0} %", volts, percent);

    // Powered from USB without a cell the divider still reads close to 4.2 V
    results.assert(volts > 2.5 && volts < 4.6, "battery voltage plausible");
    results.assert((0.0..=100.0).contains(&percent), "charge level in range");
}

fn test_panel_busy(results: &mut TestResults, panel: DisplayHardware<'static>) {
    esp_println::println!("\n[TEST] E-Paper BUSY Handshake");

    let delay = Delay::new();
    match wait_for_display_ready(&panel.busy, &delay) {
        Ok(()) => results.assert(true, "panel reports idle"),
        Err(e) => {
            esp_println::println!("    BUSY never released: {}", e);
            results.assert(false, "panel reports idle");
        }
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_core_logic(&mut results);

    // Extract the peripherals we need before initializing RTOS timer
    let i2c0 = peripherals.I2C0;
    let gpio8 = peripherals.GPIO8;
    let gpio9 = peripherals.GPIO9;

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Run hardware tests
    test_bmp280_sensor(&mut results, i2c0, gpio8, gpio9).await;
    test_battery_adc(&mut results, peripherals.ADC1, peripherals.GPIO1);

    match DisplayHardware::new(
        peripherals.SPI2,
        peripherals.GPIO10,
        peripherals.GPIO11,
        peripherals.GPIO12,
        peripherals.GPIO13,
        peripherals.GPIO14,
        peripherals.GPIO15,
    ) {
        Ok(panel) => test_panel_busy(&mut results, panel),
        Err(e) => {
            esp_println::println!("  Failed to configure SPI: {}", e);
            results.assert(false, "SPI configuration");
        }
    }

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        if results.failed == 0 {
            Timer::after(Duration::from_millis(200)).await;
        } else {
            Timer::after(Duration::from_millis(1000)).await;
        }
    }
}
