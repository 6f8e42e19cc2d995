//! Output sink trait and error types.

use core::future::Future;

use crate::types::Report;

/// Error type for output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// USB/communication I/O error.
    Io,
    /// Endpoint disabled by the host (bus reset or deconfigured).
    Disabled,
}

/// Async trait for report sinks.
///
/// This trait abstracts the destination of the joystick report so the
/// bridge can be driven by USB HID on target and by a mock in tests.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait OutputSink {
    /// Send a report to the host.
    ///
    /// May block until the previous report has been sent.
    fn send(&mut self, report: &Report) -> impl Future<Output = Result<(), OutputError>>;

    /// Check if the output is ready to accept data (e.g., USB enumerated).
    fn is_ready(&self) -> bool;
}
