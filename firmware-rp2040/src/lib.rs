//! Legacy console pad to USB HID joystick adapter for RP2040.
//!
//! This crate provides the embedded implementation of the adapter: it polls
//! two multiplexed 3/6-button pads or one serial analog pad and presents
//! them to the host as a USB HID joystick.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) and:
//! 1. Samples the pad lines on a high-priority interrupt executor
//! 2. Picks the protocol family once at power-up (dual profile only)
//! 3. Translates each sample set into a 6-byte joystick report
//! 4. Sends the report on change and on the host's idle rate
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | Port 1 D0..D5 | 2-7 | Multiplexed pad 1 data lines (pull-up) |
//! | Port 2 D0..D5 | 8-13 | Multiplexed pad 2 data lines (pull-up) |
//! | Select | 14 | Shared multiplexer select output |
//! | Serial DAT | 16 | Serial pad data, pad to adapter (pull-up) |
//! | Serial CMD | 17 | Serial pad command, adapter to pad |
//! | Serial CLK | 18 | Serial pad clock |
//! | Serial ATT | 19 | Serial pad attention (active-low) |
//! | Activity LED | 15 | Flickers while any button is held |
//! | Mode LED | 25 | On-board LED, lit in serial mode |
//!
//! # Architecture
//!
//! The firmware uses the Embassy async runtime with two executors:
//!
//! - **Interrupt executor** (SWI_IRQ_1, priority P2): the pad task. It owns
//!   the [`PadRunner`] and sleeps until the earliest tick in its
//!   [`TickDeadlines`], so poll, clock and watchdog ticks run one at a time
//! - **Thread executor**: the USB device task and the report task
//!
//! Sample sets travel from the pad task to the report task through Embassy's
//! [`Signal`](embassy_sync::signal::Signal) with "latest value wins"
//! semantics.
//!
//! # Modules
//!
//! - [`usb_output`]: USB HID output ([`UsbHidOutput`], [`RetropadRequestHandler`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`profile-dual`** (default): Both pad families, chosen at power-up
//! - **`profile-mux-only`**: Two multiplexed ports only
//! - **`profile-serial-only`**: One serial port only
//!
//! Pick a non-default profile with `--no-default-features --features dev-panic,profile-...`.
//!
//! # Re-exports
//!
//! This crate re-exports the public items of [`retropad_core`] for convenience,
//! so consumers only need to depend on this crate.

#![no_std]

// Ensure mutually exclusive profile features
#[cfg(any(
    all(feature = "profile-dual", feature = "profile-mux-only"),
    all(feature = "profile-dual", feature = "profile-serial-only"),
    all(feature = "profile-mux-only", feature = "profile-serial-only"),
))]
compile_error!("Only one of `profile-dual`, `profile-mux-only` and `profile-serial-only` can be enabled");

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features");

// Re-export core types for convenience
pub use retropad_core::*;

pub mod usb_output;

pub use usb_output::{
    configure_usb_hid, RetropadRequestHandler, SharedReport, UsbHidOutput, UsbStateHandler,
};

use embassy_rp::gpio::{Input, Output};

/// Capability profile selected by Cargo features.
#[cfg(feature = "profile-mux-only")]
pub const PROFILE: Profile = Profile::MultiplexedOnly;
/// Capability profile selected by Cargo features.
#[cfg(feature = "profile-serial-only")]
pub const PROFILE: Profile = Profile::SerialOnly;
/// Capability profile selected by Cargo features.
#[cfg(not(any(feature = "profile-mux-only", feature = "profile-serial-only")))]
pub const PROFILE: Profile = Profile::Dual;

/// Both multiplexed ports on GPIO.
pub type PadMuxPorts = MuxPorts<Output<'static>, Input<'static>>;

/// The serial port on GPIO.
pub type PadSerialPort = SerialPort<Output<'static>, Input<'static>>;

/// Both pad engines on the board's ports.
pub type BoardRunner = PadRunner<PadMuxPorts, PadSerialPort>;

/// Mode and activity LEDs.
pub type BoardLeds = StatusLeds<Output<'static>>;
