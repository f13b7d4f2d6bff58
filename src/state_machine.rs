//! Tally session state machine
//!
//! Tracks the lifecycle of the single server connection. Transitions are pure;
//! the session performs the I/O and feeds the outcome back in as events.

/// Connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events reported by the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// No live connection at the start of an iteration
    ConnectRequested,
    ConnectSucceeded,
    ConnectFailed,
    /// Liveness check found the link gone
    LinkLost,
}

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// Keep the current state
    Stay,
    /// Move to a new state
    Transition(SessionState),
    /// Move to a new state and clear the failure count
    TransitionWithReset(SessionState),
}

/// Connection lifecycle state machine
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    current_state: SessionState,
    failed_attempts: u32,
    connections: u32,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Disconnected,
            failed_attempts: 0,
            connections: 0,
        }
    }

    pub fn get_current_state(&self) -> SessionState {
        self.current_state
    }

    /// Consecutive failed connection attempts. Diagnostic only; retries are unbounded.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Connections established since boot
    pub fn connections(&self) -> u32 {
        self.connections
    }

    pub fn is_connected(&self) -> bool {
        self.current_state == SessionState::Connected
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> StateTransition {
        let transition = self.get_state_transition(self.current_state, event);

        match transition {
            StateTransition::Transition(new_state) => {
                if event == SessionEvent::ConnectFailed {
                    self.failed_attempts = self.failed_attempts.saturating_add(1);
                }
                self.transition_to_state(new_state);
            }
            StateTransition::TransitionWithReset(new_state) => {
                self.failed_attempts = 0;
                if new_state == SessionState::Connected {
                    self.connections = self.connections.saturating_add(1);
                }
                self.transition_to_state(new_state);
            }
            StateTransition::Stay => {}
        }

        transition
    }

    fn transition_to_state(&mut self, new_state: SessionState) {
        self.current_state = new_state;
    }

    fn get_state_transition(
        &self,
        current_state: SessionState,
        event: SessionEvent,
    ) -> StateTransition {
        match (current_state, event) {
            (SessionState::Disconnected, SessionEvent::ConnectRequested) => {
                StateTransition::Transition(SessionState::Connecting)
            }
            (SessionState::Connecting, SessionEvent::ConnectSucceeded) => {
                StateTransition::TransitionWithReset(SessionState::Connected)
            }
            (SessionState::Connecting, SessionEvent::ConnectFailed) => {
                StateTransition::Transition(SessionState::Disconnected)
            }
            (SessionState::Connected, SessionEvent::LinkLost) => {
                StateTransition::Transition(SessionState::Disconnected)
            }
            _ => StateTransition::Stay,
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
