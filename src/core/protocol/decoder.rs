//! Button report decoder
//!
//! Each report byte is the instantaneous bitmask of the five buttons. Only
//! "all released" (0) and "exactly one bit set" are accepted; anything else
//! is treated as a garbled frame and dropped so the decoder resynchronises on
//! the next clean byte.

use crate::core::buttons::{Button, ButtonEvent, ButtonStates};

/// Highest legal report value (all five bits)
const MAX_REPORT: u8 = 0b1_1111;

/// A validated report byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBitmask(u8);

impl ButtonBitmask {
    /// Validate a raw report byte
    pub fn parse(value: u8) -> Option<Self> {
        if value > MAX_REPORT || value.count_ones() > 1 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Raw value
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Result of feeding one byte to the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Invalid frame, state untouched
    Rejected(u8),
    /// Valid frame; edges in button order (empty when nothing changed)
    Accepted(Vec<ButtonEvent>),
}

impl FrameOutcome {
    /// Edges produced by this frame
    pub fn events(&self) -> &[ButtonEvent] {
        match self {
            Self::Rejected(_) => &[],
            Self::Accepted(events) => events,
        }
    }

    /// Whether the frame was discarded
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Apply one report byte to `states`
///
/// Table and last bitmask are updated together; a rejected byte leaves both
/// untouched.
pub fn decode_frame(states: &mut ButtonStates, value: u8) -> FrameOutcome {
    let Some(mask) = ButtonBitmask::parse(value) else {
        return FrameOutcome::Rejected(value);
    };

    let value = mask.bits();
    let last = states.last_bitmask();
    let changed = value ^ last;
    let newly_pressed = changed & value;
    let newly_released = changed & last;

    let mut events = Vec::new();
    for button in Button::ALL {
        if newly_pressed == button.mask() {
            states.set(button, true);
            events.push(ButtonEvent::Pressed(button));
        } else if newly_released == button.mask() {
            states.set(button, false);
            events.push(ButtonEvent::Released(button));
        }
    }

    states.set_last(value);
    FrameOutcome::Accepted(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(states: &mut ButtonStates, bytes: &[u8]) -> Vec<FrameOutcome> {
        bytes.iter().map(|b| decode_frame(states, *b)).collect()
    }

    #[test]
    fn test_parse_validation() {
        assert!(ButtonBitmask::parse(0).is_some());
        for i in 0..5 {
            assert!(ButtonBitmask::parse(1 << i).is_some());
        }
        assert!(ButtonBitmask::parse(0x03).is_none());
        assert!(ButtonBitmask::parse(0x1F).is_none());
        assert!(ButtonBitmask::parse(0x20).is_none());
        assert!(ButtonBitmask::parse(0xFF).is_none());
    }

    #[test]
    fn test_press_noop_release_press_sequence() {
        let mut states = ButtonStates::new();
        let outcomes = feed(&mut states, &[0x01, 0x01, 0x00, 0x02]);

        assert_eq!(outcomes[0].events(), &[ButtonEvent::Pressed(Button::Left)]);
        assert!(outcomes[1].events().is_empty());
        assert!(!outcomes[1].is_rejected());
        assert_eq!(outcomes[2].events(), &[ButtonEvent::Released(Button::Left)]);
        assert_eq!(outcomes[3].events(), &[ButtonEvent::Pressed(Button::Right)]);

        assert_eq!(states.as_array(), [false, true, false, false, false]);
        assert_eq!(states.last_bitmask(), 0x02);
    }

    #[test]
    fn test_two_bits_discarded() {
        let mut states = ButtonStates::new();
        decode_frame(&mut states, 0x04);
        let before = states;

        let outcome = decode_frame(&mut states, 0x03);
        assert_eq!(outcome, FrameOutcome::Rejected(0x03));
        assert_eq!(states, before);
    }

    #[test]
    fn test_direct_switch_between_buttons() {
        let mut states = ButtonStates::new();
        decode_frame(&mut states, 0x01);
        let outcome = decode_frame(&mut states, 0x02);
        assert_eq!(
            outcome.events(),
            &[
                ButtonEvent::Released(Button::Left),
                ButtonEvent::Pressed(Button::Right)
            ]
        );
        assert_eq!(states.table_bitmask(), states.last_bitmask());
    }

    #[test]
    fn test_press_release_restores_released() {
        for button in Button::ALL {
            let mut states = ButtonStates::new();
            feed(&mut states, &[button.mask(), 0]);
            assert_eq!(states, ButtonStates::new());
        }
    }

    proptest! {
        #[test]
        fn prop_invalid_frames_never_mutate(
            prefix in proptest::collection::vec(prop_oneof![Just(0u8), Just(1), Just(2), Just(4), Just(8), Just(16)], 0..8),
            bad in any::<u8>().prop_filter("invalid report", |v| *v > 31 || v.count_ones() > 1),
        ) {
            let mut states = ButtonStates::new();
            feed(&mut states, &prefix);
            let before = states;
            prop_assert!(decode_frame(&mut states, bad).is_rejected());
            prop_assert_eq!(states, before);
        }

        #[test]
        fn prop_table_tracks_last_bitmask(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut states = ButtonStates::new();
            for b in bytes {
                decode_frame(&mut states, b);
                prop_assert_eq!(states.table_bitmask(), states.last_bitmask());
            }
        }

        #[test]
        fn prop_repeat_produces_no_edge(bit in 0usize..5, pressed in any::<bool>()) {
            let value = if pressed { 1u8 << bit } else { 0 };
            let mut states = ButtonStates::new();
            decode_frame(&mut states, value);
            let outcome = decode_frame(&mut states, value);
            prop_assert!(outcome.events().is_empty());
        }

        #[test]
        fn prop_single_edge_from_released(bit in 0usize..5) {
            let mut states = ButtonStates::new();
            let outcome = decode_frame(&mut states, 1u8 << bit);
            let button = Button::from_index(bit).unwrap();
            prop_assert_eq!(outcome.events(), &[ButtonEvent::Pressed(button)]);
            prop_assert_eq!(states.pressed().collect::<Vec<_>>(), vec![button]);
        }
    }
}
