//! Sample-set to HID report translation.

use crate::lines::Port;
use crate::mux::{decode_pad, RawSampleTable};
use crate::serial::{PadStatus, SerialFrame};
use crate::types::{Buttons, Report, AXIS_CENTER, REPORT_SIZE};

/// One complete input capture from whichever engine is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleSet {
    Multiplexed(RawSampleTable),
    Serial(SerialFrame),
}

/// Where each report byte comes from in a serial frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SerialSource {
    /// Data slot copied as is.
    Direct(usize),
    /// Data slot inverted (active-low buttons).
    Inverted(usize),
}

// Data slots in wire order.
const DAT1: usize = 0;
const DAT2: usize = 1;
const RJX: usize = 2;
const RJY: usize = 3;
const LJX: usize = 4;
const LJY: usize = 5;

/// Report layout of a serial frame: left stick as player 1 X/Y, right
/// stick as player 2 X/Y, then both button bytes.
const SERIAL_LAYOUT: [SerialSource; REPORT_SIZE] = [
    SerialSource::Direct(LJX),
    SerialSource::Direct(LJY),
    SerialSource::Direct(RJX),
    SerialSource::Direct(RJY),
    SerialSource::Inverted(DAT2),
    SerialSource::Inverted(DAT1),
];

/// Owns the committed report. It is the only writer of it.
#[derive(Debug)]
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            report: Report::NEUTRAL,
        }
    }

    #[inline]
    #[must_use]
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Translate `samples` and commit the result. Returns whether the report
    /// changed.
    pub fn build(&mut self, samples: &SampleSet) -> bool {
        let next = translate(samples);
        if next == self.report {
            return false;
        }
        self.report = next;
        true
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure translation of a sample set into a report.
#[must_use]
pub fn translate(samples: &SampleSet) -> Report {
    match samples {
        SampleSet::Multiplexed(table) => translate_multiplexed(table),
        SampleSet::Serial(frame) => translate_serial(frame),
    }
}

fn translate_multiplexed(table: &RawSampleTable) -> Report {
    let mut report = Report::NEUTRAL;
    for port in Port::ALL {
        let pad = decode_pad(table.port(port));
        report.set_player(port, pad.x, pad.y, pad.buttons);
    }
    report
}

fn translate_serial(frame: &SerialFrame) -> Report {
    let status = frame.status();
    if status == PadStatus::Absent {
        return Report::NEUTRAL;
    }

    let data = &frame.data.0;
    let mut bytes = [0u8; REPORT_SIZE];
    for (byte, source) in bytes.iter_mut().zip(SERIAL_LAYOUT) {
        *byte = match source {
            SerialSource::Direct(slot) => data[slot],
            SerialSource::Inverted(slot) => !data[slot],
        };
    }

    let mut report = Report::from_bytes(bytes);
    if status == PadStatus::Digital {
        // Stick bytes are filler on a digital pad.
        for port in Port::ALL {
            let buttons: Buttons = report.buttons(port);
            report.set_player(port, AXIS_CENTER, AXIS_CENTER, buttons);
        }
    }
    report
}
