//! WiFi module for ESP32-C3 board
//!
//! Station-mode association, scanning and DNS on top of esp-wifi 0.14.1 and the
//! embassy-net DHCP stack.

use crate::TallyError;
use crate::acquisition::{ScanResults, ScannedNetwork, Security, WifiNetwork, single_address};
use crate::config::MAX_SCAN_RESULTS;
use core::net::Ipv4Addr;
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, Stack};
use esp_println::println;
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController};

/// WiFi manager backed by the esp-wifi controller and an embassy-net stack
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
    started: bool,
}

impl<'a> WiFiManager<'a> {
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self {
            controller,
            stack,
            started: false,
        }
    }

    /// Bring the radio up once; scanning and joining both need it running
    fn ensure_started(&mut self) -> Result<(), TallyError> {
        if !self.started {
            self.controller.start().map_err(|_| TallyError::WiFi)?;
            self.started = true;
        }
        Ok(())
    }

    /// Print the DHCP lease, if one has been obtained
    pub fn print_dhcp_info(&self) {
        let Some(config) = self.stack.config_v4() else {
            println!("[DHCP] No DHCP configuration available");
            return;
        };

        println!("[DHCP] IP Address: {}", config.address);
        if let Some(gateway) = config.gateway {
            println!("[DHCP] Gateway: {}", gateway);
        }
        for (i, dns) in config.dns_servers.iter().enumerate() {
            println!("[DHCP] DNS Server {}: {}", i + 1, dns);
        }
    }
}

impl WifiNetwork for WiFiManager<'_> {
    async fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), TallyError> {
        println!("[WIFI] Connecting to WiFi network: {}", ssid);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| TallyError::WiFi)?,
            password: password.try_into().map_err(|_| TallyError::WiFi)?,
            auth_method,
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| TallyError::WiFi)?;
        self.ensure_started()?;
        self.controller.connect().map_err(|_| TallyError::WiFi)
    }

    fn is_joined(&mut self) -> bool {
        // Associated is not enough, the session needs a DHCP address too
        self.controller.is_connected().unwrap_or(false) && self.stack.config_v4().is_some()
    }

    async fn leave(&mut self) -> Result<(), TallyError> {
        if self.controller.is_connected().unwrap_or(false) {
            self.controller.disconnect().map_err(|_| TallyError::WiFi)?;
        }
        Ok(())
    }

    async fn scan(&mut self) -> Result<ScanResults, TallyError> {
        self.ensure_started()?;
        let found = self
            .controller
            .scan_n_async(MAX_SCAN_RESULTS)
            .await
            .map_err(|_| TallyError::Scan)?;

        let mut results = ScanResults::new();
        for ap in found.iter() {
            let security = match ap.auth_method {
                None | Some(AuthMethod::None) => Security::Open,
                Some(_) => Security::Protected,
            };
            // SSIDs that do not fit are dropped rather than truncated
            let Ok(network) = ScannedNetwork::new(ap.ssid.as_str(), security) else {
                continue;
            };
            if results.push(network).is_err() {
                break;
            }
        }
        Ok(results)
    }

    async fn resolve(&mut self, hostname: &str) -> Result<Ipv4Addr, TallyError> {
        let addresses = self
            .stack
            .dns_query(hostname, DnsQueryType::A)
            .await
            .map_err(|_| TallyError::Resolve)?;

        single_address(addresses.iter().filter_map(|address| match address {
            IpAddress::Ipv4(address) => Some(*address),
            #[allow(unreachable_patterns)]
            _ => None,
        }))
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}
