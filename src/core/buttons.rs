//! Physical button model
//!
//! The controller reports five buttons. [`ButtonStates`] keeps the per-button
//! pressed table together with the last accepted report bitmask so both are
//! always read and written as one unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of buttons the controller reports
pub const BUTTON_COUNT: usize = 5;

/// A physical mouse button, by report bit index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    /// Bit 0
    Left,
    /// Bit 1
    Right,
    /// Bit 2
    Middle,
    /// Bit 3 (back)
    Side1,
    /// Bit 4 (forward)
    Side2,
}

impl Button {
    /// All buttons in bit order
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Left,
        Button::Right,
        Button::Middle,
        Button::Side1,
        Button::Side2,
    ];

    /// Bit index in the report byte
    pub fn index(self) -> usize {
        self as usize
    }

    /// Button for a bit index, if in range
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Single-bit mask for this button
    pub fn mask(self) -> u8 {
        1 << self.index()
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
            Self::Side1 => "side1",
            Self::Side2 => "side2",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single press or release edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edge", content = "button", rename_all = "lowercase")]
pub enum ButtonEvent {
    /// Button went down
    Pressed(Button),
    /// Button went up
    Released(Button),
}

impl ButtonEvent {
    /// Button this edge belongs to
    pub fn button(self) -> Button {
        match self {
            Self::Pressed(b) | Self::Released(b) => b,
        }
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pressed(b) => write!(f, "press({})", b.index()),
            Self::Released(b) => write!(f, "release({})", b.index()),
        }
    }
}

/// Pressed table plus the last accepted report bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonStates {
    pressed: [bool; BUTTON_COUNT],
    last: u8,
}

impl ButtonStates {
    /// All released
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `button` is currently down
    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    /// Pressed flags in bit order
    pub fn as_array(&self) -> [bool; BUTTON_COUNT] {
        self.pressed
    }

    /// Buttons currently down
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }

    /// Last accepted report bitmask
    pub fn last_bitmask(&self) -> u8 {
        self.last
    }

    /// Bitmask rebuilt from the pressed table
    pub fn table_bitmask(&self) -> u8 {
        Button::ALL
            .iter()
            .filter(|b| self.is_pressed(**b))
            .fold(0, |acc, b| acc | b.mask())
    }

    pub(crate) fn set(&mut self, button: Button, pressed: bool) {
        self.pressed[button.index()] = pressed;
    }

    pub(crate) fn set_last(&mut self, mask: u8) {
        self.last = mask;
    }
}

impl fmt::Display for ButtonStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for button in Button::ALL {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            let mark = if self.is_pressed(button) { '*' } else { '-' };
            write!(f, "{}:{}", button.name(), mark)?;
        }
        Ok(())
    }
}
