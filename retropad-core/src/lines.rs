//! Controller-port line access.
//!
//! The engines talk to the ports through [`MuxLines`] and [`SerialLines`].
//! [`MuxPorts`] and [`SerialPort`] implement them over any `embedded-hal` 1.0
//! pins. A pin error is treated like line noise: inputs read as released
//! (high) and a failed output write is dropped. Both are corrected on the
//! next tick.

use embedded_hal::digital::{InputPin, OutputPin};

/// Number of data lines on a multiplexed port.
pub const LINES_PER_PORT: usize = 6;

/// Mask of the data lines within a sampled byte.
pub const LINE_MASK: u8 = (1 << LINES_PER_PORT) - 1;

/// Multiplexed controller port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    One,
    Two,
}

impl Port {
    pub const ALL: [Port; 2] = [Port::One, Port::Two];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Port::One => 0,
            Port::Two => 1,
        }
    }
}

/// Lines of the two multiplexed ports.
pub trait MuxLines {
    /// Drive the shared select line.
    fn set_select(&mut self, high: bool);

    /// Sample the data lines of `port`. Bit `n` is line D`n`; 1 means high
    /// (released). Bits above [`LINE_MASK`] are zero.
    fn read_port(&mut self, port: Port) -> u8;
}

/// Lines of the serial port, seen from the bus master.
pub trait SerialLines {
    fn set_clock(&mut self, high: bool);

    /// Drive the master-to-pad data line.
    fn set_command(&mut self, high: bool);

    /// Assert (drive low) or release (drive high) the attention line.
    fn set_attention(&mut self, asserted: bool);

    /// Sample the pad-to-master data line.
    fn data_in(&mut self) -> bool;
}

#[inline]
pub(crate) fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    let _ = if high { pin.set_high() } else { pin.set_low() };
}

#[inline]
fn sense<P: InputPin>(pin: &mut P) -> bool {
    pin.is_low().map(|low| !low).unwrap_or(true)
}

/// Two multiplexed ports sharing one select line.
pub struct MuxPorts<S, I> {
    select: S,
    ports: [[I; LINES_PER_PORT]; 2],
}

impl<S: OutputPin, I: InputPin> MuxPorts<S, I> {
    /// Wrap the select output and the D0..D5 inputs of both ports.
    pub fn new(select: S, port1: [I; LINES_PER_PORT], port2: [I; LINES_PER_PORT]) -> Self {
        Self {
            select,
            ports: [port1, port2],
        }
    }
}

impl<S: OutputPin, I: InputPin> MuxLines for MuxPorts<S, I> {
    fn set_select(&mut self, high: bool) {
        drive(&mut self.select, high);
    }

    fn read_port(&mut self, port: Port) -> u8 {
        self.ports[port.index()]
            .iter_mut()
            .enumerate()
            .fold(0u8, |mask, (bit, pin)| {
                if sense(pin) {
                    mask | (1 << bit)
                } else {
                    mask
                }
            })
    }
}

/// Serial port: attention, clock and command outputs plus the data input.
pub struct SerialPort<O, I> {
    attention: O,
    clock: O,
    command: O,
    data: I,
}

impl<O: OutputPin, I: InputPin> SerialPort<O, I> {
    pub fn new(attention: O, clock: O, command: O, data: I) -> Self {
        Self {
            attention,
            clock,
            command,
            data,
        }
    }
}

impl<O: OutputPin, I: InputPin> SerialLines for SerialPort<O, I> {
    fn set_clock(&mut self, high: bool) {
        drive(&mut self.clock, high);
    }

    fn set_command(&mut self, high: bool) {
        drive(&mut self.command, high);
    }

    fn set_attention(&mut self, asserted: bool) {
        drive(&mut self.attention, !asserted);
    }

    fn data_in(&mut self) -> bool {
        sense(&mut self.data)
    }
}
