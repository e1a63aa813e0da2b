//! Screen layout: three slot columns, each with a title, four metric rows
//! and a timestamp, plus one battery summary line along the bottom.
//!
//! Every per-slot draw is clipped to the slot's column, so a long name or an
//! oversized value is cut off rather than bleeding into a neighbour.

use core::fmt::Write;

use embedded_graphics::{
    draw_target::DrawTargetExt,
    geometry::AngleUnit,
    mono_font::{
        MonoFont, MonoTextStyle, MonoTextStyleBuilder,
        ascii::{FONT_8X13, FONT_9X15},
        iso_8859_1::FONT_10X20,
    },
    prelude::*,
    primitives::{
        Arc, Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, RoundedRectangle,
        StrokeAlignment, Triangle,
    },
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use epd_waveshare::color::Color;
use heapless::String;
use profont::PROFONT_24_POINT;

use crate::battery;
use crate::clock;
use crate::config::{
    BATTERY_SUMMARY_X, BATTERY_SUMMARY_Y, COLUMN_BOTTOM, COLUMN_ORIGINS, COLUMN_WIDTH,
    FRAME_HEIGHT, FRAME_TOP, ROW_HEIGHT, ROW_OFFSETS, TIMESTAMP_Y, TITLE_BASELINE_Y,
};
use crate::model::SensorReading;

const ICON_INSET_X: i32 = 10;
const ICON_INSET_Y: i32 = 5;
const VALUE_RIGHT: i32 = 170;
const SUFFIX_X: i32 = 175;
const TIMESTAMP_RIGHT: i32 = COLUMN_WIDTH as i32 - 10;

const FOREGROUND: Color = Color::Black;
const BACKGROUND: Color = Color::White;

/// Fixed-width numeric text: 7 characters, 2 decimals. Wider values are
/// kept whole; `f32::MAX` needs 42 characters.
pub type ValueText = String<48>;

pub fn format_value(value: f32) -> ValueText {
    let mut out = ValueText::new();
    let _ = write!(out, "{:7.2}", value);
    out
}

/// Region a slot is allowed to draw into.
pub fn column_area(origin_x: i32) -> Rectangle {
    Rectangle::new(
        Point::new(origin_x, 0),
        Size::new(COLUMN_WIDTH, COLUMN_BOTTOM as u32),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Thermometer,
    Droplet,
    Gauge,
    Battery,
}

impl Icon {
    /// Draws the 50x50 glyph with its top-left corner at `at`.
    pub fn draw<D: DrawTarget<Color = Color>>(self, target: &mut D, at: Point) {
        let fill = PrimitiveStyle::with_fill(FOREGROUND);
        let outline = PrimitiveStyleBuilder::new()
            .stroke_color(FOREGROUND)
            .stroke_width(2)
            .stroke_alignment(StrokeAlignment::Inside)
            .build();
        let line = PrimitiveStyle::with_stroke(FOREGROUND, 3);

        match self {
            Icon::Thermometer => {
                RoundedRectangle::with_equal_corners(
                    Rectangle::new(at + Point::new(19, 2), Size::new(12, 32)),
                    Size::new(6, 6),
                )
                .into_styled(outline)
                .draw(target)
                .ok();
                Rectangle::new(at + Point::new(23, 14), Size::new(4, 16))
                    .into_styled(fill)
                    .draw(target)
                    .ok();
                Circle::new(at + Point::new(15, 28), 20)
                    .into_styled(fill)
                    .draw(target)
                    .ok();
            }
            Icon::Droplet => {
                Triangle::new(
                    at + Point::new(25, 3),
                    at + Point::new(12, 26),
                    at + Point::new(38, 26),
                )
                .into_styled(fill)
                .draw(target)
                .ok();
                Circle::new(at + Point::new(11, 18), 28)
                    .into_styled(fill)
                    .draw(target)
                    .ok();
            }
            Icon::Gauge => {
                Arc::new(at + Point::new(5, 5), 40, 150.0_f32.deg(), 240.0_f32.deg())
                    .into_styled(line)
                    .draw(target)
                    .ok();
                Line::new(at + Point::new(25, 25), at + Point::new(37, 13))
                    .into_styled(line)
                    .draw(target)
                    .ok();
                Circle::new(at + Point::new(21, 21), 8)
                    .into_styled(fill)
                    .draw(target)
                    .ok();
            }
            Icon::Battery => {
                Rectangle::new(at + Point::new(3, 14), Size::new(40, 22))
                    .into_styled(outline)
                    .draw(target)
                    .ok();
                Rectangle::new(at + Point::new(43, 20), Size::new(4, 10))
                    .into_styled(fill)
                    .draw(target)
                    .ok();
                Rectangle::new(at + Point::new(7, 18), Size::new(20, 14))
                    .into_styled(fill)
                    .draw(target)
                    .ok();
            }
        }
    }
}

/// The four rows of a slot, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    Battery,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Pressure,
        Metric::Battery,
    ];

    pub fn icon(self) -> Icon {
        match self {
            Metric::Temperature => Icon::Thermometer,
            Metric::Humidity => Icon::Droplet,
            Metric::Pressure => Icon::Gauge,
            Metric::Battery => Icon::Battery,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Metric::Temperature => " °C",
            Metric::Humidity => " %",
            Metric::Pressure => " hPa",
            Metric::Battery => " V",
        }
    }

    pub fn row_offset(self) -> i32 {
        ROW_OFFSETS[self as usize]
    }

    pub fn value(self, reading: &SensorReading) -> f32 {
        match self {
            Metric::Temperature => reading.temperature_c,
            Metric::Humidity => reading.humidity_pct,
            Metric::Pressure => reading.pressure_hpa(),
            Metric::Battery => reading.battery_voltage_v,
        }
    }
}

fn text_style(font: &'static MonoFont<'static>) -> MonoTextStyle<'static, Color> {
    MonoTextStyleBuilder::new()
        .font(font)
        .text_color(FOREGROUND)
        .background_color(BACKGROUND)
        .build()
}

/// Rounded frames around all three columns, drawn once at boot.
pub fn draw_layout<D: DrawTarget<Color = Color>>(target: &mut D) {
    let style = PrimitiveStyleBuilder::new()
        .stroke_color(FOREGROUND)
        .stroke_width(2)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();

    for origin_x in COLUMN_ORIGINS {
        RoundedRectangle::with_equal_corners(
            Rectangle::new(
                Point::new(origin_x, FRAME_TOP),
                Size::new(COLUMN_WIDTH, FRAME_HEIGHT),
            ),
            Size::new(12, 12),
        )
        .into_styled(style)
        .draw(&mut target.clipped(&column_area(origin_x)))
        .ok();
    }
}

/// Beacon name centred above the column.
pub fn draw_top_label<D: DrawTarget<Color = Color>>(target: &mut D, name: &str, origin_x: i32) {
    let style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Bottom)
        .build();

    Text::with_text_style(
        name,
        Point::new(origin_x + COLUMN_WIDTH as i32 / 2, TITLE_BASELINE_Y),
        text_style(&PROFONT_24_POINT),
        style,
    )
    .draw(&mut target.clipped(&column_area(origin_x)))
    .ok();
}

/// Icon, left-aligned unit suffix and right-aligned value for one row.
pub fn draw_metric_row<D: DrawTarget<Color = Color>>(
    target: &mut D,
    icon: Icon,
    suffix: &str,
    value: f32,
    origin_x: i32,
    row_y: i32,
) {
    let mut column = target.clipped(&column_area(origin_x));
    let middle = row_y + ROW_HEIGHT as i32 / 2;

    icon.draw(&mut column, Point::new(origin_x + ICON_INSET_X, row_y + ICON_INSET_Y));

    let left = TextStyleBuilder::new()
        .alignment(Alignment::Left)
        .baseline(Baseline::Middle)
        .build();
    Text::with_text_style(
        suffix,
        Point::new(origin_x + SUFFIX_X, middle),
        text_style(&FONT_10X20),
        left,
    )
    .draw(&mut column)
    .ok();

    let right = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Middle)
        .build();
    Text::with_text_style(
        format_value(value).as_str(),
        Point::new(origin_x + VALUE_RIGHT, middle),
        text_style(&FONT_10X20),
        right,
    )
    .draw(&mut column)
    .ok();
}

/// Small right-aligned local time under the rows.
pub fn draw_timestamp<D: DrawTarget<Color = Color>>(target: &mut D, text: &str, origin_x: i32) {
    let style = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Top)
        .build();

    Text::with_text_style(
        text,
        Point::new(origin_x + TIMESTAMP_RIGHT, TIMESTAMP_Y),
        text_style(&FONT_8X13),
        style,
    )
    .draw(&mut target.clipped(&column_area(origin_x)))
    .ok();
}

/// Everything one reading contributes to its column.
pub fn draw_reading<D: DrawTarget<Color = Color>>(
    target: &mut D,
    reading: &SensorReading,
    origin_x: i32,
) {
    draw_top_label(target, &reading.name, origin_x);
    for metric in Metric::ALL {
        draw_metric_row(
            target,
            metric.icon(),
            metric.suffix(),
            metric.value(reading),
            origin_x,
            metric.row_offset(),
        );
    }
    draw_timestamp(
        target,
        &clock::format_local(reading.timestamp_epoch),
        origin_x,
    );
}

/// Device battery line at the bottom of the screen.
pub fn draw_battery_summary<D: DrawTarget<Color = Color>>(target: &mut D, percent: f32, volts: f32) {
    let style = TextStyleBuilder::new()
        .alignment(Alignment::Left)
        .baseline(Baseline::Top)
        .build();

    Text::with_text_style(
        &battery::summary_text(percent, volts),
        Point::new(BATTERY_SUMMARY_X, BATTERY_SUMMARY_Y),
        text_style(&FONT_9X15),
        style,
    )
    .draw(target)
    .ok();
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;
    use crate::config::{SCREEN_HEIGHT, SCREEN_WIDTH};

    /// Records the extent of every pixel written.
    struct Tracer {
        min: Point,
        max: Point,
        touched: usize,
    }

    impl Tracer {
        fn new() -> Self {
            Self {
                min: Point::new(i32::MAX, i32::MAX),
                max: Point::new(i32::MIN, i32::MIN),
                touched: 0,
            }
        }

        fn within(&self, area: &Rectangle) -> bool {
            self.touched > 0 && area.contains(self.min) && area.contains(self.max)
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
            for Pixel(point, _) in pixels {
                self.min = self.min.component_min(point);
                self.max = self.max.component_max(point);
                self.touched += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn value_format_is_seven_wide_with_two_decimals() {
        assert_eq!(format_value(23.456).as_str(), "  23.46");
        assert_eq!(format_value(1013.25).as_str(), "1013.25");
        assert_eq!(format_value(-5.0).as_str(), "  -5.00");
        assert_eq!(format_value(0.0).len(), 7);
    }

    #[test]
    fn large_values_are_not_cut_off() {
        assert_eq!(format_value(1e14).as_str(), "100000000376832.00");

        let max = format_value(3e38);
        assert!(max.len() > 38);
        assert!(max.ends_with(".00"));
        assert!(format_value(-f32::MAX).starts_with("-340282346638528859811704183484516925440"));
    }

    #[test]
    fn columns_do_not_overlap() {
        let areas = COLUMN_ORIGINS.map(column_area);
        for (i, a) in areas.iter().enumerate() {
            for b in areas.iter().skip(i + 1) {
                assert!(a.intersection(b).is_zero_sized());
            }
            assert!(a.bottom_right().unwrap().x < SCREEN_WIDTH as i32);
        }
    }

    #[test]
    fn metric_rows_stay_inside_their_column() {
        for origin_x in COLUMN_ORIGINS {
            for metric in Metric::ALL {
                let mut tracer = Tracer::new();
                draw_metric_row(
                    &mut tracer,
                    metric.icon(),
                    metric.suffix(),
                    -12345.678,
                    origin_x,
                    metric.row_offset(),
                );
                assert!(
                    tracer.within(&column_area(origin_x)),
                    "{:?} at {} drew {:?}..{:?}",
                    metric,
                    origin_x,
                    tracer.min,
                    tracer.max
                );
            }
        }
    }

    #[test]
    fn long_title_is_clipped_to_its_column() {
        let origin_x = COLUMN_ORIGINS[1];
        let mut tracer = Tracer::new();
        draw_top_label(&mut tracer, "An extremely long beacon name", origin_x);

        assert!(tracer.within(&column_area(origin_x)));
    }

    #[test]
    fn whole_reading_stays_inside_its_column() {
        let reading = SensorReading {
            name: String::try_from("Tag1").unwrap(),
            temperature_c: 21.5,
            humidity_pct: 40.2,
            pressure_pa: 10132,
            battery_voltage_v: 3.7,
            timestamp_epoch: 1_700_000_000,
            ..Default::default()
        };

        for origin_x in COLUMN_ORIGINS {
            let mut tracer = Tracer::new();
            draw_reading(&mut tracer, &reading, origin_x);
            assert!(tracer.within(&column_area(origin_x)));
        }
    }

    #[test]
    fn value_ends_at_the_right_edge_of_its_slot() {
        let mut tracer = Tracer::new();
        draw_metric_row(&mut tracer, Icon::Gauge, "", 1.0, 0, ROW_OFFSETS[0]);

        assert!(tracer.max.x <= VALUE_RIGHT);
        assert!(tracer.max.x >= VALUE_RIGHT - 1);
    }

    #[test]
    fn battery_summary_is_below_the_columns() {
        let mut tracer = Tracer::new();
        draw_battery_summary(&mut tracer, 80.0, 4.0);

        assert!(tracer.touched > 0);
        assert!(tracer.min.y >= COLUMN_BOTTOM);
        assert!(tracer.max.y < SCREEN_HEIGHT as i32);
    }

    #[test]
    fn layout_draws_one_frame_per_column() {
        for origin_x in COLUMN_ORIGINS {
            let mut tracer = Tracer::new();
            draw_layout(&mut tracer.clipped(&column_area(origin_x)));
            assert!(tracer.within(&column_area(origin_x)));
            assert_eq!(tracer.min, Point::new(origin_x, FRAME_TOP));
        }
    }
}
