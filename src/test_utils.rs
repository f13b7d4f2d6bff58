//! In-memory stand-ins for the radio, the TCP socket and the timer

use crate::TallyError;
use crate::acquisition::{ScanResults, ScannedNetwork, ServerEndpoint, WifiNetwork};
use crate::session::TallyTransport;
use core::convert::Infallible;
use core::net::Ipv4Addr;
use embassy_futures::yield_now;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

/// Delay that records each wait and yields once instead of sleeping
#[derive(Debug, Default)]
pub struct FakeDelay {
    pub waits_ms: Vec<u32>,
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.push(ns / 1_000_000);
        yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
        yield_now().await;
    }
}

/// Yield `polls` times, then complete. Bounds tests of loops that never end.
pub async fn yield_budget(polls: usize) {
    for _ in 0..polls {
        yield_now().await;
    }
}

/// Radio with scripted scans, associations and DNS answers
#[derive(Debug, Default)]
pub struct FakeNetwork {
    scans: VecDeque<ScanResults>,
    joinable: Vec<String>,
    resolves: Vec<(String, Ipv4Addr)>,
    polls_before_join: usize,
    polls_seen: usize,
    target: Option<String>,
    pub join_requests: Vec<String>,
    pub resolve_attempts: Vec<String>,
    pub scans_taken: usize,
    pub leaves: usize,
    fail_leave: bool,
}

impl FakeNetwork {
    pub fn with_scan(mut self, networks: &[ScannedNetwork]) -> Self {
        let mut results = ScanResults::new();
        for network in networks {
            results.push(network.clone()).expect("scan fits");
        }
        self.scans.push_back(results);
        self
    }

    pub fn joinable(mut self, ssids: &[&str]) -> Self {
        self.joinable = ssids.iter().map(|ssid| ssid.to_string()).collect();
        self
    }

    pub fn resolves_on(mut self, ssid: &str, address: Ipv4Addr) -> Self {
        self.resolves.push((ssid.to_string(), address));
        self
    }

    pub fn fail_leave(mut self) -> Self {
        self.fail_leave = true;
        self
    }

    /// Report "not joined" for the first `polls` status checks
    pub fn join_after_polls(mut self, polls: usize) -> Self {
        self.polls_before_join = polls;
        self
    }
}

impl WifiNetwork for FakeNetwork {
    async fn begin_join(&mut self, ssid: &str, _password: &str) -> Result<(), TallyError> {
        self.join_requests.push(ssid.to_string());
        self.target = Some(ssid.to_string());
        Ok(())
    }

    fn is_joined(&mut self) -> bool {
        if self.polls_seen < self.polls_before_join {
            self.polls_seen += 1;
            return false;
        }
        match &self.target {
            Some(target) => self.joinable.iter().any(|ssid| ssid == target),
            None => false,
        }
    }

    async fn leave(&mut self) -> Result<(), TallyError> {
        self.target = None;
        self.leaves += 1;
        if self.fail_leave { Err(TallyError::WiFi) } else { Ok(()) }
    }

    async fn scan(&mut self) -> Result<ScanResults, TallyError> {
        self.scans_taken += 1;
        Ok(self.scans.pop_front().unwrap_or_default())
    }

    async fn resolve(&mut self, _hostname: &str) -> Result<Ipv4Addr, TallyError> {
        let target = self.target.clone().unwrap_or_default();
        self.resolve_attempts.push(target.clone());
        self.resolves
            .iter()
            .find(|(ssid, _)| *ssid == target)
            .map(|(_, address)| *address)
            .ok_or(TallyError::Resolve)
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.target.as_ref().map(|_| Ipv4Addr::new(192, 168, 77, 100))
    }
}

/// What happened on the fake socket, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEvent {
    Connect(ServerEndpoint),
    Write(u8),
    Read(u8),
}

/// TCP socket fed from a scripted byte queue
#[derive(Debug, Default)]
pub struct FakeTransport {
    connected: bool,
    refuse_connects: usize,
    fail_writes: bool,
    inbound: VecDeque<u8>,
    pub events: Vec<WireEvent>,
}

impl FakeTransport {
    /// Refuse the next `count` connection attempts
    pub fn refuse_connects(mut self, count: usize) -> Self {
        self.refuse_connects = count;
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Queue bytes as if the server had sent them
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Simulate the server closing the connection
    pub fn drop_link(&mut self) {
        self.connected = false;
        self.inbound.clear();
    }

    pub fn connects(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, WireEvent::Connect(_)))
            .count()
    }

    pub fn writes(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                WireEvent::Write(byte) => Some(*byte),
                _ => None,
            })
            .collect()
    }
}

impl TallyTransport for FakeTransport {
    async fn connect(&mut self, endpoint: ServerEndpoint) -> Result<(), TallyError> {
        self.events.push(WireEvent::Connect(endpoint));
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(TallyError::Connect);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn bytes_available(&mut self) -> usize {
        if self.connected { self.inbound.len() } else { 0 }
    }

    async fn read_byte(&mut self) -> Result<u8, TallyError> {
        let byte = self.inbound.pop_front().ok_or(TallyError::Transport)?;
        self.events.push(WireEvent::Read(byte));
        Ok(byte)
    }

    async fn write_byte(&mut self, byte: u8) -> Result<(), TallyError> {
        if self.fail_writes {
            return Err(TallyError::Transport);
        }
        self.events.push(WireEvent::Write(byte));
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

/// Output pin recording every level written to it
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    writes: Rc<RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn level(&self) -> Option<bool> {
        self.writes.borrow().last().copied()
    }

    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push(true);
        Ok(())
    }
}

/// Output pin whose writes can be made to fail
#[derive(Debug, Clone, Default)]
pub struct FlakyPin {
    failing: Rc<Cell<bool>>,
}

impl FlakyPin {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn write(&self) -> Result<(), ErrorKind> {
        if self.failing.get() { Err(ErrorKind::Other) } else { Ok(()) }
    }
}

impl ErrorType for FlakyPin {
    type Error = ErrorKind;
}

impl OutputPin for FlakyPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write()
    }
}
