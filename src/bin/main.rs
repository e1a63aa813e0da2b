#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{rng::Rng, timer::timg::TimerGroup};
use esp_radio::{Controller, wifi::WifiDevice};
use static_cell::StaticCell;

use beaconboard::{
    config::{BuildConfig, MQTT_CONNECT_RETRY_MS, SLEEP_DURATION_SECS, Settings},
    display::{EpaperSurface, Frame},
    hardware::{BatteryMonitor, Bmp280, DeepSleep, DisplayHardware, SleepPins},
    mqtt::{self, Buffers},
    network,
    power_down::SleepPlan,
    station::Station,
};

esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

static FRAME: StaticCell<Frame> = StaticCell::new();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("=== Beaconboard ===");

    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut deep_sleep = DeepSleep::new(peripherals.LPWR);

    let settings = match Settings::load(&BuildConfig) {
        Ok(settings) => settings,
        Err(e) => {
            esp_println::println!("[ERROR] configuration: {}", e);
            deep_sleep.enter(SLEEP_DURATION_SECS);
            return;
        }
    };

    // Peripheral drivers borrow these and hand them back when dropped
    let mut pins = SleepPins {
        gpio1: peripherals.GPIO1,
        gpio8: peripherals.GPIO8,
        gpio9: peripherals.GPIO9,
        gpio10: peripherals.GPIO10,
        gpio11: peripherals.GPIO11,
        gpio12: peripherals.GPIO12,
        gpio13: peripherals.GPIO13,
        gpio14: peripherals.GPIO14,
        gpio15: peripherals.GPIO15,
    };
    let mut plan = SleepPlan::default();

    {
        // Ambient sensor for the panel's temperature compensation
        let mut bmp280 = Bmp280::new(peripherals.I2C0, pins.gpio8.reborrow(), pins.gpio9.reborrow())
            .expect("I2C0 configuration");
        if let Err(e) = bmp280.init() {
            esp_println::println!("[ERROR] BMP280 init failed: {}", e);
        }

        let panel = DisplayHardware::new(
            peripherals.SPI2,
            pins.gpio10.reborrow(),
            pins.gpio11.reborrow(),
            pins.gpio12.reborrow(),
            pins.gpio13.reborrow(),
            pins.gpio14.reborrow(),
            pins.gpio15.reborrow(),
        )
        .expect("SPI2 configuration");
        let frame = FRAME.init_with(Frame::default);
        let mut display = match EpaperSurface::new(panel, frame, bmp280) {
            Ok(display) => display,
            Err(e) => {
                esp_println::println!("[ERROR] e-paper init failed: {}", e);
                deep_sleep.enter(SLEEP_DURATION_SECS);
                return;
            }
        };

        let mut battery = BatteryMonitor::new(peripherals.ADC1, pins.gpio1.reborrow());

        let mut station = Station::new(&settings);
        station.prepare(&mut display, &mut battery);

        // WiFi
        let radio = &*mk_static!(Controller<'static>, esp_radio::init().expect("radio init"));
        let (mut controller, interfaces) =
            esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()).expect("wifi init");

        let rng = Rng::new();
        let seed = (rng.random() as u64) << 32 | rng.random() as u64;
        let (stack, runner) = embassy_net::new(
            interfaces.sta,
            embassy_net::Config::dhcpv4(Default::default()),
            mk_static!(StackResources<3>, StackResources::<3>::new()),
            seed,
        );

        if let Err(e) = spawner.spawn(net_task(runner)) {
            esp_println::println!("[ERROR] Failed to spawn task: {:?}", e);
        }

        let buffers = mk_static!(Buffers, Buffers::new());

        loop {
            if !stack.is_link_up() {
                if let Err(e) = network::wifi_connect(&mut controller, &settings).await {
                    esp_println::println!("[WIFI] {}", e);
                    Timer::after(Duration::from_millis(MQTT_CONNECT_RETRY_MS)).await;
                    continue;
                }
                network::wait_for_ip(stack).await;
            }

            match mqtt::run_session(
                stack,
                &settings,
                &mut controller,
                buffers,
                &mut station,
                &mut display,
                &mut plan,
            )
            .await
            {
                Ok(()) => break,
                Err(e) => esp_println::println!("[MQTT] session ended: {}, reconnecting", e),
            }

            Timer::after(Duration::from_millis(MQTT_CONNECT_RETRY_MS)).await;
        }
    }

    // Panel, sensor and ADC drivers are gone; their pins are ours again
    pins.park(plan.released());
    deep_sleep.enter(plan.sleep_secs().unwrap_or(SLEEP_DURATION_SECS));
}
