//! Error type shared by the core and the hardware adapters.
//!
//! Variants carry only fixed-size data so the type stays usable without `alloc`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required configuration parameter was not provided.
    MissingParameter(&'static str),

    /// A configuration parameter was present but failed validation.
    InvalidParameter(&'static str),

    /// A payload could not be parsed as a beacon record.
    Payload,

    /// A payload arrived on a topic other than the one being awaited.
    TopicMismatch,

    /// The message bus rejected a subscribe/unsubscribe/ping.
    Bus,

    /// Wi-Fi or TCP level failure.
    Network,

    /// SPI transfer or BUSY handshake with the panel failed.
    Display,

    /// Ambient or battery sensor read failed.
    Sensor,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingParameter(name) => write!(f, "missing parameter '{}'", name),
            Error::InvalidParameter(name) => write!(f, "invalid parameter '{}'", name),
            Error::Payload => f.write_str("unparseable payload"),
            Error::TopicMismatch => f.write_str("payload for unexpected topic"),
            Error::Bus => f.write_str("message bus error"),
            Error::Network => f.write_str("network error"),
            Error::Display => f.write_str("display error"),
            Error::Sensor => f.write_str("sensor error"),
        }
    }
}
