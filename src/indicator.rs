//! Preview/program indicator outputs

use crate::TallyError;
use crate::protocol::OutputPair;
use embedded_hal::digital::{OutputPin, PinState};

/// The two physical tally lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorLine {
    Preview,
    Program,
}

/// Output primitive used by the tally session
pub trait TallyOutputs {
    /// Drive one line on or off
    fn set_line(&mut self, line: IndicatorLine, on: bool) -> Result<(), TallyError>;

    /// Drive both lines to `pair`
    fn set_pair(&mut self, pair: OutputPair) -> Result<(), TallyError> {
        self.set_line(IndicatorLine::Preview, pair.preview)?;
        self.set_line(IndicatorLine::Program, pair.program)
    }
}

/// Indicator lines on two GPIO output pins (active high)
pub struct IndicatorPair<P, Q>
where
    P: OutputPin,
    Q: OutputPin,
{
    preview: P,
    program: Q,
}

impl<P, Q> IndicatorPair<P, Q>
where
    P: OutputPin,
    Q: OutputPin,
{
    /// Take ownership of the pins and switch both lines off
    pub fn new(preview: P, program: Q) -> Result<Self, TallyError> {
        let mut pair = Self { preview, program };
        pair.set_pair(OutputPair::OFF)?;
        Ok(pair)
    }
}

impl<P, Q> TallyOutputs for IndicatorPair<P, Q>
where
    P: OutputPin,
    Q: OutputPin,
{
    fn set_line(&mut self, line: IndicatorLine, on: bool) -> Result<(), TallyError> {
        let state = PinState::from(on);
        match line {
            IndicatorLine::Preview => self.preview.set_state(state).map_err(|_| TallyError::Output),
            IndicatorLine::Program => self.program.set_state(state).map_err(|_| TallyError::Output),
        }
    }
}
