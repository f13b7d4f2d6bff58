#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Tally Light Library
//!
//! This library provides the modules for a WiFi tally light: it finds a tally
//! server on the network, subscribes to one video input over TCP and drives a
//! preview and a program indicator from the single-byte state feed.

use core::fmt;

/// Write one formatted line to a [`console::Console`].
macro_rules! log_line {
    ($console:expr, $($arg:tt)*) => {
        $console.write_line(format_args!($($arg)*))
    };
}

pub mod acquisition;
pub mod config;
pub mod console;
pub mod indicator;
pub mod protocol;
pub mod session;
pub mod state_machine;

#[cfg(test)]
mod test_utils;

#[cfg(feature = "device")]
pub mod tcp_client;
#[cfg(feature = "device")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Error types for the tally light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyError {
    /// WiFi association or driver error
    WiFi,
    /// Network scan failed
    Scan,
    /// Hostname did not resolve to exactly one address
    Resolve,
    /// TCP connection could not be established
    Connect,
    /// Read or write on an established connection failed
    Transport,
    /// Indicator output pin error
    Output,
    /// Build-time configuration value is invalid
    Config,
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TallyError::WiFi => "wifi association failed",
            TallyError::Scan => "network scan failed",
            TallyError::Resolve => "hostname resolution failed",
            TallyError::Connect => "connection failed",
            TallyError::Transport => "transport error",
            TallyError::Output => "indicator output error",
            TallyError::Config => "invalid configuration",
        };
        f.write_str(text)
    }
}
