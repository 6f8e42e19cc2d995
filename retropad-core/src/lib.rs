//! Platform-agnostic protocol engines and HID report logic for a legacy
//! console pad to USB joystick adapter.
//!
//! This crate holds everything that does not touch a specific chip: the
//! line-level state machines for both pad families, mode arbitration, report
//! translation and the idle/transmit scheduling. It can be used both in
//! embedded `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! The crate is organized into several modules:
//!
//! - [`timing`]: Tick kinds, the tick schedule and its deadlines ([`TickDeadlines`])
//! - [`lines`]: Port line traits over `embedded-hal` pins ([`MuxPorts`], [`SerialPort`])
//! - [`mux`]: Multiplexed 3/6-button pad engine ([`MuxEngine`])
//! - [`serial`]: Serial pad bus master with stall watchdog ([`SerialEngine`])
//! - [`runner`]: Single owner of both engines and their ticks ([`PadRunner`])
//! - [`arbiter`]: One-shot power-up mode selection ([`Arbiter`], [`ModeCell`])
//! - [`report`]: Sample set to report translation ([`ReportBuilder`])
//! - [`idle`]: HID idle-rate scheduling ([`IdleScheduler`])
//! - [`hid`]: The HID report descriptor
//! - [`output`]: Output sink trait ([`OutputSink`])
//! - [`bridge`]: The main loop tying it together ([`PadBridge`])
//! - [`indicator`]: Mode and activity LEDs ([`StatusLeds`])
//!
//! # Data flow
//!
//! ```text
//! ticks ──► PadRunner ──SampleSet──► PadBridge ──Report──► OutputSink
//!              ▲                       │  ▲
//!              └── Mode ◄── Arbiter ◄──┘  └── idle ticks, SET_IDLE
//! ```
//!
//! # Example
//!
//! ```rust
//! use retropad_core::{translate, Buttons, Port, RawSampleTable, SampleSet};
//!
//! // Player 1 holds Start and Up; nothing on port 2.
//! let port1 = [0x33, 0x3F, 0x1F, 0x3E, 0x33, 0x3F, 0x3F, 0x3F];
//! let table = RawSampleTable::from_ports(port1, [0x3F; 8]);
//!
//! let report = translate(&SampleSet::Multiplexed(table));
//! assert_eq!(report.axes(Port::One), (0x7F, 0x00));
//! assert_eq!(report.buttons(Port::One), Buttons::START);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded targets)
//! - **`log`**: Log through the `log` facade instead
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations,
//! making it suitable for embedded systems with limited resources.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod arbiter;
pub mod bridge;
pub mod config;
pub mod hid;
pub mod idle;
pub mod indicator;
pub mod lines;
pub mod mux;
pub mod output;
pub mod report;
pub mod runner;
pub mod serial;
pub mod timing;
pub mod types;

// Re-export main types at crate root
pub use arbiter::{ArbitrationConfig, Arbiter, Mode, ModeCell, ModeError};
pub use bridge::{BridgeError, HealthChange, OutputHealth, PadBridge};
pub use config::{Profile, Timing};
pub use hid::REPORT_DESCRIPTOR;
pub use idle::{IdleRate, IdleScheduler, SharedIdleRate};
pub use indicator::StatusLeds;
pub use lines::{MuxLines, MuxPorts, Port, SerialLines, SerialPort};
pub use mux::{decode_pad, DecodedPad, MuxEngine, MuxEvent, PadKind, RawSampleTable};
pub use output::{OutputError, OutputSink};
pub use report::{translate, ReportBuilder, SampleSet};
pub use runner::PadRunner;
pub use serial::{PadStatus, SerialEngine, SerialEvent, SerialFrame, ShiftAccumulator};
pub use timing::{TickDeadlines, TickKind, TickSchedule, TickTable};
pub use types::{Buttons, Report};
