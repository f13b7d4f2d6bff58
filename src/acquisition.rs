//! Network acquisition
//!
//! Brings up WiFi and produces the [`ServerEndpoint`] the tally session talks to.
//! Two strategies share one trait: a static network with a literal server
//! address, and discovery across every open network until the server's hostname
//! resolves.

use crate::TallyError;
use crate::config::{
    self, AcquisitionMode, HOSTNAME_MAX, MAX_SCAN_RESULTS, PASSWORD_MAX, SSID_MAX, TallyConfig,
};
use crate::console::Console;
use core::fmt;
use core::net::Ipv4Addr;
use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};

/// Address and port of the tally server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl ServerEndpoint {
    pub const fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// Endpoint handed over when discovery gave up; every connect to it fails
    pub const fn unresolved(port: u16) -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            port,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.address.is_unspecified()
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Security of a scanned network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Open,
    Protected,
}

/// One entry of a scan snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedNetwork {
    pub ssid: String<SSID_MAX>,
    pub security: Security,
}

impl ScannedNetwork {
    pub fn new(ssid: &str, security: Security) -> Result<Self, TallyError> {
        Ok(Self {
            ssid: String::try_from(ssid).map_err(|_| TallyError::Scan)?,
            security,
        })
    }

    pub fn is_open(&self) -> bool {
        self.security == Security::Open
    }
}

/// Scan results, in the order the radio reported them
pub type ScanResults = Vec<ScannedNetwork, MAX_SCAN_RESULTS>;

/// Wireless network primitive
#[allow(async_fn_in_trait)]
pub trait WifiNetwork {
    /// Start associating with `ssid`. An empty password joins an open network.
    async fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), TallyError>;

    /// Associated and holding an IPv4 lease
    fn is_joined(&mut self) -> bool;

    /// Drop the current association
    async fn leave(&mut self) -> Result<(), TallyError>;

    /// Take one snapshot of the visible networks
    async fn scan(&mut self) -> Result<ScanResults, TallyError>;

    /// Resolve `hostname` to exactly one IPv4 address; answers with several are errors
    async fn resolve(&mut self, hostname: &str) -> Result<Ipv4Addr, TallyError>;

    /// Local address, for diagnostics
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// The address of a DNS answer holding exactly one record
pub fn single_address<I>(answer: I) -> Result<Ipv4Addr, TallyError>
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    let mut addresses = answer.into_iter();
    match (addresses.next(), addresses.next()) {
        (Some(address), None) => Ok(address),
        _ => Err(TallyError::Resolve),
    }
}

/// What discovery does once every scanned candidate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedPolicy {
    /// Wait, then scan again
    Rescan,
    /// Give up and hand the session an unresolved endpoint
    Proceed,
}

/// Capability shared by both strategies
#[allow(async_fn_in_trait)]
pub trait AcquisitionStrategy {
    async fn acquire<N, D, C>(
        &mut self,
        network: &mut N,
        delay: &mut D,
        console: &mut C,
    ) -> ServerEndpoint
    where
        N: WifiNetwork,
        D: DelayNs,
        C: Console;
}

/// How long to wait for an association
#[derive(Debug, Clone, Copy)]
struct JoinWait {
    poll_ms: u32,
    /// Re-issue the join request this often while waiting
    rejoin_every_ms: Option<u32>,
    /// Give up after this long
    timeout_ms: Option<u32>,
}

async fn join_network<N, D, C>(
    network: &mut N,
    delay: &mut D,
    console: &mut C,
    ssid: &str,
    password: &str,
    wait: JoinWait,
) -> Result<(), TallyError>
where
    N: WifiNetwork,
    D: DelayNs,
    C: Console,
{
    log_line!(console, "[WIFI] Connecting to {}", ssid);

    let mut waited_ms: u32 = 0;
    let mut since_request_ms: Option<u32> = None;

    loop {
        let request_due = match (since_request_ms, wait.rejoin_every_ms) {
            (None, _) => true,
            (Some(elapsed), Some(every)) => elapsed >= every,
            (Some(_), None) => false,
        };
        if request_due {
            if since_request_ms.is_some() {
                log_line!(
                    console,
                    "[WIFI] Still not associated with {} after {}ms, retrying",
                    ssid,
                    waited_ms
                );
            }
            if let Err(e) = network.begin_join(ssid, password).await {
                log_line!(console, "[WIFI] Join request for {} failed: {}", ssid, e);
            }
            since_request_ms = Some(0);
        }

        if network.is_joined() {
            match network.local_address() {
                Some(ip) => log_line!(console, "[WIFI] WiFi connected, local IP address: {}", ip),
                None => log_line!(console, "[WIFI] WiFi connected"),
            }
            return Ok(());
        }

        if let Some(timeout) = wait.timeout_ms {
            if waited_ms >= timeout {
                log_line!(console, "[WIFI] Failed to join {} within {}ms", ssid, timeout);
                return Err(TallyError::WiFi);
            }
        }

        delay.delay_ms(wait.poll_ms).await;
        waited_ms = waited_ms.saturating_add(wait.poll_ms);
        since_request_ms = since_request_ms.map(|ms| ms.saturating_add(wait.poll_ms));
    }
}

/// Join one configured network; the server address is a literal
#[derive(Debug, Clone)]
pub struct StaticStrategy {
    pub ssid: String<SSID_MAX>,
    pub password: String<PASSWORD_MAX>,
    pub server: ServerEndpoint,
    pub join_poll_ms: u32,
    pub rejoin_interval_ms: u32,
}

impl Default for StaticStrategy {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            server: ServerEndpoint::unresolved(config::DEFAULT_PORT),
            join_poll_ms: config::JOIN_POLL_INTERVAL_MS,
            rejoin_interval_ms: config::WIFI_RECONNECT_INTERVAL_MS,
        }
    }
}

impl AcquisitionStrategy for StaticStrategy {
    /// Blocks until associated; there is no upper bound.
    async fn acquire<N, D, C>(
        &mut self,
        network: &mut N,
        delay: &mut D,
        console: &mut C,
    ) -> ServerEndpoint
    where
        N: WifiNetwork,
        D: DelayNs,
        C: Console,
    {
        let wait = JoinWait {
            poll_ms: self.join_poll_ms,
            rejoin_every_ms: Some(self.rejoin_interval_ms),
            timeout_ms: None,
        };
        while let Err(e) =
            join_network(network, delay, console, &self.ssid, &self.password, wait).await
        {
            log_line!(console, "[WIFI] Joining {} failed: {}, starting over", self.ssid, e);
        }

        log_line!(console, "[WIFI] Using configured tally server {}", self.server);
        self.server
    }
}

/// Scan for open networks and keep the first one where the server hostname resolves
#[derive(Debug, Clone)]
pub struct DiscoveryStrategy {
    pub hostname: String<HOSTNAME_MAX>,
    pub port: u16,
    pub exhausted: ExhaustedPolicy,
    pub join_poll_ms: u32,
    pub join_timeout_ms: u32,
    pub cooldown_ms: u32,
    pub rescan_interval_ms: u32,
}

impl DiscoveryStrategy {
    /// Walk one scan snapshot. Returns the endpoint of the first network where
    /// the hostname resolves.
    async fn try_candidates<N, D, C>(
        &self,
        candidates: &[ScannedNetwork],
        network: &mut N,
        delay: &mut D,
        console: &mut C,
    ) -> Option<ServerEndpoint>
    where
        N: WifiNetwork,
        D: DelayNs,
        C: Console,
    {
        let wait = JoinWait {
            poll_ms: self.join_poll_ms,
            rejoin_every_ms: None,
            timeout_ms: Some(self.join_timeout_ms),
        };

        for candidate in candidates {
            if !candidate.is_open() {
                log_line!(console, "[DISCOVERY] Skipping encrypted network {}", candidate.ssid);
                continue;
            }

            if join_network(network, delay, console, &candidate.ssid, "", wait)
                .await
                .is_err()
            {
                if let Err(e) = network.leave().await {
                    log_line!(console, "[WIFI] Failed to leave {}: {}", candidate.ssid, e);
                }
                delay.delay_ms(self.cooldown_ms).await;
                continue;
            }

            match network.resolve(&self.hostname).await {
                Ok(address) => {
                    let endpoint = ServerEndpoint::new(address, self.port);
                    log_line!(
                        console,
                        "[DISCOVERY] {} resolved to {} on {}",
                        self.hostname,
                        endpoint,
                        candidate.ssid
                    );
                    return Some(endpoint);
                }
                Err(e) => {
                    log_line!(
                        console,
                        "[DISCOVERY] {} not found on {}: {}",
                        self.hostname,
                        candidate.ssid,
                        e
                    );
                    if let Err(e) = network.leave().await {
                        log_line!(console, "[WIFI] Failed to leave {}: {}", candidate.ssid, e);
                    }
                    delay.delay_ms(self.cooldown_ms).await;
                }
            }
        }

        None
    }
}

impl AcquisitionStrategy for DiscoveryStrategy {
    async fn acquire<N, D, C>(
        &mut self,
        network: &mut N,
        delay: &mut D,
        console: &mut C,
    ) -> ServerEndpoint
    where
        N: WifiNetwork,
        D: DelayNs,
        C: Console,
    {
        loop {
            let candidates = match network.scan().await {
                Ok(candidates) => candidates,
                Err(e) => {
                    log_line!(console, "[DISCOVERY] Scan failed: {}", e);
                    ScanResults::new()
                }
            };
            log_line!(console, "[DISCOVERY] Scan found {} networks", candidates.len());

            if let Some(endpoint) = self
                .try_candidates(&candidates, network, delay, console)
                .await
            {
                return endpoint;
            }

            match self.exhausted {
                ExhaustedPolicy::Proceed => {
                    log_line!(
                        console,
                        "[DISCOVERY] No network knows {}, continuing without a server",
                        self.hostname
                    );
                    return ServerEndpoint::unresolved(self.port);
                }
                ExhaustedPolicy::Rescan => {
                    log_line!(
                        console,
                        "[DISCOVERY] No network knows {}, scanning again in {}ms",
                        self.hostname,
                        self.rescan_interval_ms
                    );
                    delay.delay_ms(self.rescan_interval_ms).await;
                }
            }
        }
    }
}

/// Acquisition strategy selected by configuration
#[derive(Debug, Clone)]
pub enum NetworkAcquisition {
    Static(StaticStrategy),
    Discovery(DiscoveryStrategy),
}

impl NetworkAcquisition {
    pub fn from_config(config: &TallyConfig) -> Self {
        let timing = &config.timing;
        match &config.mode {
            AcquisitionMode::Static {
                ssid,
                password,
                server,
            } => NetworkAcquisition::Static(StaticStrategy {
                ssid: ssid.clone(),
                password: password.clone(),
                server: ServerEndpoint::new(*server, config.port),
                join_poll_ms: timing.join_poll_ms,
                rejoin_interval_ms: timing.rejoin_interval_ms,
            }),
            AcquisitionMode::Discovery {
                hostname,
                exhausted,
            } => NetworkAcquisition::Discovery(DiscoveryStrategy {
                hostname: hostname.clone(),
                port: config.port,
                exhausted: *exhausted,
                join_poll_ms: timing.join_poll_ms,
                join_timeout_ms: timing.join_timeout_ms,
                cooldown_ms: timing.discovery_cooldown_ms,
                rescan_interval_ms: timing.rescan_interval_ms,
            }),
        }
    }
}

impl AcquisitionStrategy for NetworkAcquisition {
    async fn acquire<N, D, C>(
        &mut self,
        network: &mut N,
        delay: &mut D,
        console: &mut C,
    ) -> ServerEndpoint
    where
        N: WifiNetwork,
        D: DelayNs,
        C: Console,
    {
        match self {
            NetworkAcquisition::Static(strategy) => strategy.acquire(network, delay, console).await,
            NetworkAcquisition::Discovery(strategy) => {
                strategy.acquire(network, delay, console).await
            }
        }
    }
}
