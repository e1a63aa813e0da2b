//! Three-beacon environmental display.
//!
//! Each wake cycle subscribes to three beacon topics one after another,
//! draws every reading into its own column of an e-paper framebuffer,
//! pushes the frame to the panel and deep-sleeps until the next cycle.
//!
//! The core modules are hardware-independent and build on the host for
//! `cargo test`. Everything that touches ESP32-S3 peripherals lives behind
//! the `embedded` feature.

#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod keep_alive;
pub mod model;
pub mod panel;
pub mod power_down;
pub mod render;
pub mod sequencer;
pub mod station;
pub mod traits;

#[cfg(feature = "embedded")]
pub mod display;
#[cfg(feature = "embedded")]
pub mod hardware;
#[cfg(feature = "embedded")]
pub mod mqtt;
#[cfg(feature = "embedded")]
pub mod network;

pub use error::Error;
