//! Tally session
//!
//! Owns the single server connection and the indicator outputs. Each loop
//! iteration checks liveness, (re)connects and subscribes when needed, then
//! drains every pending state byte into the outputs.

use crate::TallyError;
use crate::acquisition::ServerEndpoint;
use crate::config::TallyConfig;
use crate::console::Console;
use crate::indicator::{IndicatorLine, TallyOutputs};
use crate::protocol::{ChannelSubscription, OutputPair, TallyState};
use crate::state_machine::{SessionEvent, SessionState, SessionStateMachine, StateTransition};
use embedded_hal_async::delay::DelayNs;

/// Transport primitive: one TCP connection to the tally server
#[allow(async_fn_in_trait)]
pub trait TallyTransport {
    /// Open a connection. Bounded by the transport's own timeout.
    async fn connect(&mut self, endpoint: ServerEndpoint) -> Result<(), TallyError>;

    /// Liveness of the current connection
    fn is_connected(&mut self) -> bool;

    /// Number of received bytes that can be read without waiting
    fn bytes_available(&mut self) -> usize;

    async fn read_byte(&mut self) -> Result<u8, TallyError>;

    async fn write_byte(&mut self, byte: u8) -> Result<(), TallyError>;

    /// Drop the connection so the next `connect` starts clean
    fn close(&mut self);
}

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub endpoint: ServerEndpoint,
    pub channel: ChannelSubscription,
    pub use_preview: bool,
    pub poll_interval_ms: u32,
    pub retry_interval_ms: u32,
}

impl SessionSettings {
    pub fn from_config(config: &TallyConfig, endpoint: ServerEndpoint) -> Self {
        Self {
            endpoint,
            channel: config.channel,
            use_preview: config.use_preview,
            poll_interval_ms: config.timing.poll_interval_ms,
            retry_interval_ms: config.timing.retry_interval_ms,
        }
    }
}

/// Connection lifecycle plus protocol decoding
pub struct TallySession<T, O>
where
    T: TallyTransport,
    O: TallyOutputs,
{
    transport: T,
    outputs: O,
    settings: SessionSettings,
    machine: SessionStateMachine,
    current: OutputPair,
}

impl<T, O> TallySession<T, O>
where
    T: TallyTransport,
    O: TallyOutputs,
{
    /// `outputs` must already be switched off, as [`crate::indicator::IndicatorPair::new`] does.
    pub fn new(transport: T, outputs: O, settings: SessionSettings) -> Self {
        Self {
            transport,
            outputs,
            settings,
            machine: SessionStateMachine::new(),
            current: OutputPair::OFF,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.get_current_state()
    }

    pub fn state_machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    /// Output levels currently driven
    pub fn outputs(&self) -> OutputPair {
        self.current
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run the session forever: one [`step`](Self::step), then sleep.
    pub async fn run<D, C>(&mut self, delay: &mut D, console: &mut C) -> !
    where
        D: DelayNs,
        C: Console,
    {
        let channel = self.settings.channel;
        log_line!(
            console,
            "[TALLY] Watching input {} on {}",
            channel.to_byte(),
            self.settings.endpoint
        );
        if !channel.within_server_range() {
            log_line!(
                console,
                "[TALLY] Input {} is outside the range most tally servers accept",
                channel.to_byte()
            );
        }

        loop {
            let wait_ms = self.step(console).await;
            delay.delay_ms(wait_ms).await;
        }
    }

    /// One loop iteration. Returns how long to sleep before the next one.
    pub async fn step<C: Console>(&mut self, console: &mut C) -> u32 {
        if self.machine.is_connected() && !self.transport.is_connected() {
            log_line!(console, "[TALLY] Connection lost");
            self.transport.close();
            self.apply_event(SessionEvent::LinkLost, console);
        }

        if !self.machine.is_connected() && !self.open_connection(console).await {
            return self.settings.retry_interval_ms;
        }

        self.drain(console).await;
        self.settings.poll_interval_ms
    }

    async fn open_connection<C: Console>(&mut self, console: &mut C) -> bool {
        let endpoint = self.settings.endpoint;
        self.apply_event(SessionEvent::ConnectRequested, console);
        log_line!(console, "[TALLY] Connecting to {}", endpoint);

        let result = if endpoint.is_resolved() {
            self.subscribe(endpoint).await
        } else {
            log_line!(console, "[TALLY] No server address was resolved");
            Err(TallyError::Connect)
        };

        match result {
            Ok(()) => {
                self.apply_event(SessionEvent::ConnectSucceeded, console);
                log_line!(
                    console,
                    "[TALLY] Connection established, subscribed to input {}",
                    self.settings.channel.to_byte()
                );
                true
            }
            Err(e) => {
                self.transport.close();
                self.apply_event(SessionEvent::ConnectFailed, console);
                log_line!(
                    console,
                    "[TALLY] Connection failed: {} (attempt {})",
                    e,
                    self.machine.failed_attempts()
                );
                false
            }
        }
    }

    /// Connect and send the subscription byte, exactly once per connection
    async fn subscribe(&mut self, endpoint: ServerEndpoint) -> Result<(), TallyError> {
        self.transport.connect(endpoint).await?;
        self.transport
            .write_byte(self.settings.channel.to_byte())
            .await
    }

    async fn drain<C: Console>(&mut self, console: &mut C) {
        while self.transport.bytes_available() > 0 {
            match self.transport.read_byte().await {
                Ok(byte) => self.handle_byte(byte, console),
                Err(e) => {
                    // The liveness check on the next iteration decides what happens
                    log_line!(console, "[TALLY] Read failed: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_byte<C: Console>(&mut self, byte: u8, console: &mut C) {
        match TallyState::decode(byte) {
            Some(state) => {
                log_line!(console, "[TALLY] {} ({:?})", byte, state);
                let target = OutputPair::for_state(state, self.settings.use_preview);
                self.drive(target, console);
            }
            None => log_line!(console, "[TALLY] {} (unknown, ignored)", byte),
        }
    }

    /// Write only the lines whose level changes
    fn drive<C: Console>(&mut self, target: OutputPair, console: &mut C) {
        if target.preview != self.current.preview {
            match self.outputs.set_line(IndicatorLine::Preview, target.preview) {
                Ok(()) => self.current.preview = target.preview,
                Err(e) => log_line!(console, "[TALLY] Preview line: {}", e),
            }
        }
        if target.program != self.current.program {
            match self.outputs.set_line(IndicatorLine::Program, target.program) {
                Ok(()) => self.current.program = target.program,
                Err(e) => log_line!(console, "[TALLY] Program line: {}", e),
            }
        }
    }

    fn apply_event<C: Console>(&mut self, event: SessionEvent, console: &mut C) {
        let from = self.machine.get_current_state();
        match self.machine.handle_event(event) {
            StateTransition::Transition(to) | StateTransition::TransitionWithReset(to) => {
                log_line!(console, "[STATE] {:?} -> {:?}", from, to);
            }
            StateTransition::Stay => {}
        }
    }
}
