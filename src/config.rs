//! Tally light configuration
//!
//! Values are baked in at compile time: `build.rs` reads `.env` and the process
//! environment and exports them as `rustc-env` variables. [`TallyConfig::from_build_env`]
//! turns those strings into a typed configuration at boot.

use crate::TallyError;
use crate::acquisition::ExhaustedPolicy;
use crate::protocol::ChannelSubscription;
use core::net::Ipv4Addr;
use heapless::String;

/// Default TCP port of the tally server
pub const DEFAULT_PORT: u16 = 7411;

/// GPIO driving the preview indicator
pub const PREVIEW_PIN: u8 = 2;

/// GPIO driving the program indicator
pub const PROGRAM_PIN: u8 = 3;

/// Maximum number of access points kept from one scan
pub const MAX_SCAN_RESULTS: usize = 16;

/// Session loop poll interval in milliseconds
pub const POLL_INTERVAL_MS: u32 = 50;

/// Delay before retrying a failed server connection in milliseconds
pub const RETRY_INTERVAL_MS: u32 = 50;

/// Association status poll interval in milliseconds
pub const JOIN_POLL_INTERVAL_MS: u32 = 50;

/// WiFi reconnection interval in milliseconds
pub const WIFI_RECONNECT_INTERVAL_MS: u32 = 5000;

/// WiFi connection timeout in milliseconds (discovery candidates only)
pub const WIFI_CONNECT_TIMEOUT_MS: u32 = 10000;

/// Pause between two discovery candidates in milliseconds
pub const DISCOVERY_COOLDOWN_MS: u32 = 1000;

/// Pause before scanning again once every candidate failed, in milliseconds
pub const RESCAN_INTERVAL_MS: u32 = 5000;

/// TCP connect timeout in milliseconds
pub const CONNECT_TIMEOUT_MS: u32 = 10000;

pub const SSID_MAX: usize = 32;
pub const PASSWORD_MAX: usize = 64;
pub const HOSTNAME_MAX: usize = 64;

/// How the device obtains network connectivity and the server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Join one configured network and talk to a literal server address
    Static {
        ssid: String<SSID_MAX>,
        password: String<PASSWORD_MAX>,
        server: Ipv4Addr,
    },
    /// Try every open network until `hostname` resolves
    Discovery {
        hostname: String<HOSTNAME_MAX>,
        exhausted: ExhaustedPolicy,
    },
}

/// Fixed intervals used by every busy-poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval_ms: u32,
    pub retry_interval_ms: u32,
    pub join_poll_ms: u32,
    pub rejoin_interval_ms: u32,
    pub join_timeout_ms: u32,
    pub discovery_cooldown_ms: u32,
    pub rescan_interval_ms: u32,
    pub connect_timeout_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            retry_interval_ms: RETRY_INTERVAL_MS,
            join_poll_ms: JOIN_POLL_INTERVAL_MS,
            rejoin_interval_ms: WIFI_RECONNECT_INTERVAL_MS,
            join_timeout_ms: WIFI_CONNECT_TIMEOUT_MS,
            discovery_cooldown_ms: DISCOVERY_COOLDOWN_MS,
            rescan_interval_ms: RESCAN_INTERVAL_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyConfig {
    pub mode: AcquisitionMode,
    pub port: u16,
    pub channel: ChannelSubscription,
    /// Whether PREVIEW energizes the preview line at all
    pub use_preview: bool,
    pub timing: Timing,
}

/// Unparsed settings as exported by `build.rs`
#[derive(Debug, Clone, Copy)]
pub struct RawSettings<'a> {
    pub mode: &'a str,
    pub wifi_ssid: &'a str,
    pub wifi_password: &'a str,
    pub server_ip: &'a str,
    pub server_host: &'a str,
    pub port: &'a str,
    pub channel: &'a str,
    pub use_preview: &'a str,
    pub discovery_exhausted: &'a str,
}

impl RawSettings<'static> {
    /// Settings compiled into this firmware image
    pub const fn from_build_env() -> Self {
        Self {
            mode: env!("TALLY_MODE"),
            wifi_ssid: env!("WIFI_SSID"),
            wifi_password: env!("WIFI_PASSWORD"),
            server_ip: env!("TALLY_SERVER_IP"),
            server_host: env!("TALLY_SERVER_HOST"),
            port: env!("TALLY_PORT"),
            channel: env!("TALLY_CHANNEL"),
            use_preview: env!("TALLY_USE_PREVIEW"),
            discovery_exhausted: env!("TALLY_DISCOVERY_EXHAUSTED"),
        }
    }
}

impl TallyConfig {
    /// Parse the settings compiled into this firmware image
    pub fn from_build_env() -> Result<Self, TallyError> {
        Self::parse(&RawSettings::from_build_env())
    }

    pub fn parse(raw: &RawSettings<'_>) -> Result<Self, TallyError> {
        let mode = match raw.mode.trim() {
            "static" => Self::static_mode(raw)?,
            "discovery" => Self::discovery_mode(raw)?,
            // Unset: a configured SSID selects the static strategy
            "" if !raw.wifi_ssid.trim().is_empty() => Self::static_mode(raw)?,
            "" => Self::discovery_mode(raw)?,
            _ => return Err(TallyError::Config),
        };

        let port = raw.port.trim().parse::<u16>().map_err(|_| TallyError::Config)?;
        if port == 0 {
            return Err(TallyError::Config);
        }
        let channel = raw.channel.trim().parse::<u8>().map_err(|_| TallyError::Config)?;

        Ok(Self {
            mode,
            port,
            channel: ChannelSubscription::new(channel),
            use_preview: parse_bool(raw.use_preview)?,
            timing: Timing::default(),
        })
    }

    fn static_mode(raw: &RawSettings<'_>) -> Result<AcquisitionMode, TallyError> {
        let ssid = raw.wifi_ssid.trim();
        if ssid.is_empty() {
            return Err(TallyError::Config);
        }
        Ok(AcquisitionMode::Static {
            ssid: String::try_from(ssid).map_err(|_| TallyError::Config)?,
            password: String::try_from(raw.wifi_password.trim())
                .map_err(|_| TallyError::Config)?,
            server: raw
                .server_ip
                .trim()
                .parse::<Ipv4Addr>()
                .map_err(|_| TallyError::Config)?,
        })
    }

    fn discovery_mode(raw: &RawSettings<'_>) -> Result<AcquisitionMode, TallyError> {
        let hostname = raw.server_host.trim();
        if hostname.is_empty() {
            return Err(TallyError::Config);
        }
        let exhausted = match raw.discovery_exhausted.trim() {
            "" | "rescan" => ExhaustedPolicy::Rescan,
            "proceed" => ExhaustedPolicy::Proceed,
            _ => return Err(TallyError::Config),
        };
        Ok(AcquisitionMode::Discovery {
            hostname: String::try_from(hostname).map_err(|_| TallyError::Config)?,
            exhausted,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool, TallyError> {
    let value = value.trim();
    for truthy in ["true", "1", "yes", "on"] {
        if value.eq_ignore_ascii_case(truthy) {
            return Ok(true);
        }
    }
    for falsy in ["false", "0", "no", "off"] {
        if value.eq_ignore_ascii_case(falsy) {
            return Ok(false);
        }
    }
    Err(TallyError::Config)
}
