//! Tally wire protocol
//!
//! The device writes one subscription byte after connecting; the server then
//! sends one byte per tally update. There is no framing beyond
//! "one byte = one message".

/// Highest input index the reference tally server accepts
pub const MAX_SERVER_CHANNEL: u8 = 10;

/// Tally state codes sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TallyState {
    Inactive = 0,
    Preview = 1,
    Program = 2,
}

impl TallyState {
    /// Decode a state byte. Unknown codes yield `None` and must be ignored.
    pub fn decode(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TallyState::Inactive),
            1 => Some(TallyState::Preview),
            2 => Some(TallyState::Program),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Input channel the device subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSubscription(u8);

impl ChannelSubscription {
    pub const fn new(channel: u8) -> Self {
        Self(channel)
    }

    /// Byte written once per connection
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Whether the reference server will accept this channel
    pub fn within_server_range(self) -> bool {
        self.0 <= MAX_SERVER_CHANNEL
    }
}

/// Desired level of the two indicator lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputPair {
    pub preview: bool,
    pub program: bool,
}

impl OutputPair {
    pub const OFF: OutputPair = OutputPair {
        preview: false,
        program: false,
    };

    /// Derive the outputs for a tally state. Program and preview are never on together.
    pub fn for_state(state: TallyState, use_preview: bool) -> Self {
        match state {
            TallyState::Inactive => OutputPair::OFF,
            TallyState::Preview => OutputPair {
                preview: use_preview,
                program: false,
            },
            TallyState::Program => OutputPair {
                preview: false,
                program: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_codes_decode() {
        assert_eq!(TallyState::decode(0), Some(TallyState::Inactive));
        assert_eq!(TallyState::decode(1), Some(TallyState::Preview));
        assert_eq!(TallyState::decode(2), Some(TallyState::Program));
        assert_eq!(TallyState::decode(9), None);
    }

    #[test]
    fn preview_flag_only_affects_preview() {
        assert_eq!(
            OutputPair::for_state(TallyState::Preview, false),
            OutputPair::OFF
        );
        assert_eq!(
            OutputPair::for_state(TallyState::Program, false),
            OutputPair {
                preview: false,
                program: true
            }
        );
    }

    #[test]
    fn server_channel_range() {
        assert!(ChannelSubscription::new(3).within_server_range());
        assert!(ChannelSubscription::new(10).within_server_range());
        assert!(!ChannelSubscription::new(11).within_server_range());
    }

    proptest! {
        #[test]
        fn decode_accepts_only_three_codes(byte in any::<u8>()) {
            let decoded = TallyState::decode(byte);
            prop_assert_eq!(decoded.is_some(), byte <= 2);
            if let Some(state) = decoded {
                prop_assert_eq!(state.code(), byte);
            }
        }

        #[test]
        fn outputs_never_both_on(byte in 0u8..3, use_preview in any::<bool>()) {
            let state = TallyState::decode(byte).expect("codes 0..3 are known");
            let pair = OutputPair::for_state(state, use_preview);
            prop_assert!(!(pair.preview && pair.program));
        }
    }
}
