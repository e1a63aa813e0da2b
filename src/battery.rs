//! Battery charge estimation for a single Li-ion cell.

use core::fmt::Write;

use heapless::String;

use crate::config::BATTERY_ADC_FACTOR;

/// Open-circuit voltage against remaining charge, ascending.
const DISCHARGE_CURVE: [(f32, f32); 12] = [
    (3.20, 0.0),
    (3.45, 5.0),
    (3.60, 10.0),
    (3.68, 20.0),
    (3.73, 30.0),
    (3.77, 40.0),
    (3.81, 50.0),
    (3.86, 60.0),
    (3.93, 70.0),
    (4.00, 80.0),
    (4.08, 90.0),
    (4.20, 100.0),
];

/// Cell voltage from an averaged raw ADC count.
pub fn volts_from_raw(raw: f32) -> f32 {
    raw * BATTERY_ADC_FACTOR / 1000.0
}

/// Remaining charge in percent, clamped to 0..=100.
pub fn charge_level(volts: f32) -> f32 {
    let (first_v, first_pct) = DISCHARGE_CURVE[0];
    if volts <= first_v {
        return first_pct;
    }

    for pair in DISCHARGE_CURVE.windows(2) {
        let (lo_v, lo_pct) = pair[0];
        let (hi_v, hi_pct) = pair[1];
        if volts <= hi_v {
            return lo_pct + (volts - lo_v) / (hi_v - lo_v) * (hi_pct - lo_pct);
        }
    }

    100.0
}

/// Bottom-of-screen label, e.g. `Battery: 87% 4.04 V`.
pub fn summary_text(percent: f32, volts: f32) -> String<32> {
    let mut out = String::new();
    let _ = write!(out, "Battery: {}% {:.2} V", percent.clamp(0.0, 100.0) as u8, volts);
    out
}
