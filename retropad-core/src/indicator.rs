//! Status LEDs.
//!
//! The mode lamp is lit for a serial session. The activity lamp flickers
//! while any button is held: it toggles on every report pass with a button
//! down and goes dark once everything is released.

use embedded_hal::digital::OutputPin;

use crate::arbiter::Mode;
use crate::lines::drive;
use crate::types::Report;

/// Mode and activity lamps on two active-high pins.
pub struct StatusLeds<P> {
    mode: P,
    activity: P,
    activity_lit: bool,
}

impl<P: OutputPin> StatusLeds<P> {
    /// Take both pins and switch them off.
    pub fn new(mut mode: P, mut activity: P) -> Self {
        drive(&mut mode, false);
        drive(&mut activity, false);
        Self {
            mode,
            activity,
            activity_lit: false,
        }
    }

    pub fn show_mode(&mut self, mode: Option<Mode>) {
        drive(&mut self.mode, mode == Some(Mode::Serial));
    }

    /// Update the activity lamp from the current report.
    pub fn on_report(&mut self, report: &Report) {
        let lit = report.any_pressed() && !self.activity_lit;
        if lit != self.activity_lit {
            self.activity_lit = lit;
            drive(&mut self.activity, lit);
        }
    }

    #[inline]
    #[must_use]
    pub fn activity_lit(&self) -> bool {
        self.activity_lit
    }
}
