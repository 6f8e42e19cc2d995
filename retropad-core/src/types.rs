//! Core report types: Buttons, Report and the axis levels.

use core::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::lines::Port;

/// Size of the HID input report in bytes.
pub const REPORT_SIZE: usize = 6;

/// Axis byte for the negative extreme (left / up).
pub const AXIS_MIN: u8 = 0x00;
/// Axis byte for a centered axis.
pub const AXIS_CENTER: u8 = 0x7F;
/// Axis byte for the positive extreme (right / down).
pub const AXIS_MAX: u8 = 0xFF;

/// One player's button byte, active-high.
///
/// The named constants are the multiplexed pad layout. In serial mode the
/// byte carries the pad's own button order, inverted to active-high.
///
/// # Example
///
/// ```
/// use retropad_core::Buttons;
///
/// let buttons = Buttons::A | Buttons::START;
/// assert!(buttons.contains(Buttons::START));
/// assert!(!buttons.contains(Buttons::MODE));
/// assert_eq!(buttons.raw(), 0xC0);
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(pub u8);

impl Buttons {
    pub const Z: Self = Self(1 << 0);
    pub const Y: Self = Self(1 << 1);
    pub const X: Self = Self(1 << 2);
    pub const MODE: Self = Self(1 << 3);
    pub const B: Self = Self(1 << 4);
    pub const C: Self = Self(1 << 5);
    pub const A: Self = Self(1 << 6);
    pub const START: Self = Self(1 << 7);

    /// No buttons pressed.
    pub const NONE: Self = Self(0);

    /// Check if all of the given button(s) are pressed.
    #[inline]
    #[must_use]
    pub const fn contains(self, button: Buttons) -> bool {
        (self.0 & button.0) == button.0
    }

    #[inline]
    pub fn set(&mut self, button: Buttons, pressed: bool) {
        if pressed {
            self.0 |= button.0;
        } else {
            self.0 &= !button.0;
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Buttons {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Buttons {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Buttons {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Not for Buttons {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

/// The HID input report.
///
/// Layout: `[x1, y1, x2, y2, buttons1, buttons2]`. Axes are unsigned with
/// [`AXIS_CENTER`] at rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Report([u8; REPORT_SIZE]);

impl Report {
    /// Both players centered with no buttons pressed.
    pub const NEUTRAL: Self = Self([
        AXIS_CENTER,
        AXIS_CENTER,
        AXIS_CENTER,
        AXIS_CENTER,
        0x00,
        0x00,
    ]);

    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; REPORT_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.0
    }

    /// X and Y axis bytes of `player`.
    #[inline]
    #[must_use]
    pub const fn axes(&self, player: Port) -> (u8, u8) {
        let base = player.index() * 2;
        (self.0[base], self.0[base + 1])
    }

    #[inline]
    #[must_use]
    pub const fn buttons(&self, player: Port) -> Buttons {
        Buttons(self.0[4 + player.index()])
    }

    /// Whether either player holds any button.
    #[inline]
    #[must_use]
    pub const fn any_pressed(&self) -> bool {
        self.0[4] != 0 || self.0[5] != 0
    }

    /// Overwrite one player's axes and buttons.
    #[inline]
    pub fn set_player(&mut self, player: Port, x: u8, y: u8, buttons: Buttons) {
        let base = player.index() * 2;
        self.0[base] = x;
        self.0[base + 1] = y;
        self.0[4 + player.index()] = buttons.raw();
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::NEUTRAL
    }
}
