//! USB HID joystick output implementation.

use core::cell::Cell;

use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_usb::class::hid::{HidWriter, ReportId, RequestHandler, State};
use embassy_usb::control::OutResponse;
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Handler};
use portable_atomic::{AtomicBool, Ordering};
use retropad_core::hid::MAX_PACKET_SIZE;
use retropad_core::types::REPORT_SIZE;
use retropad_core::{IdleRate, OutputError, OutputSink, Report, SharedIdleRate, REPORT_DESCRIPTOR};

/// USB driver of the RP2040.
pub type UsbDriver<'d> = Driver<'d, USB>;

/// HID writer sized for one joystick report per packet.
pub type ReportWriter<'d> = HidWriter<'d, UsbDriver<'d>, { MAX_PACKET_SIZE as usize }>;

/// Last report handed to the host, for `GET_REPORT`.
pub type SharedReport = Mutex<CriticalSectionRawMutex, Cell<Report>>;

/// USB HID joystick output.
///
/// Wraps an embassy-usb HID writer. Readiness follows the device's
/// configured state as seen by [`UsbStateHandler`].
pub struct UsbHidOutput<'d> {
    writer: ReportWriter<'d>,
    configured: &'d AtomicBool,
}

impl<'d> UsbHidOutput<'d> {
    pub fn new(writer: ReportWriter<'d>, configured: &'d AtomicBool) -> Self {
        Self { writer, configured }
    }
}

impl<'d> OutputSink for UsbHidOutput<'d> {
    async fn send(&mut self, report: &Report) -> Result<(), OutputError> {
        self.writer
            .write(report.as_bytes())
            .await
            .map_err(|e| match e {
                EndpointError::Disabled => OutputError::Disabled,
                EndpointError::BufferOverflow => OutputError::Io,
            })
    }

    fn is_ready(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }
}

/// Tracks whether the host has configured the device.
pub struct UsbStateHandler {
    configured: &'static AtomicBool,
}

impl UsbStateHandler {
    pub const fn new(configured: &'static AtomicBool) -> Self {
        Self { configured }
    }
}

impl Handler for UsbStateHandler {
    fn enabled(&mut self, enabled: bool) {
        if !enabled {
            self.configured.store(false, Ordering::Release);
        }
    }

    fn reset(&mut self) {
        self.configured.store(false, Ordering::Release);
    }

    fn configured(&mut self, configured: bool) {
        self.configured.store(configured, Ordering::Release);
        defmt::info!("USB configured: {}", configured);
    }
}

/// HID class request handler.
///
/// `GET_REPORT` answers with the last committed report; `GET_IDLE` and
/// `SET_IDLE` read and write the shared idle rate. Output reports are
/// rejected since the joystick has none.
pub struct RetropadRequestHandler {
    report: &'static SharedReport,
    idle_rate: &'static SharedIdleRate,
}

impl RetropadRequestHandler {
    pub const fn new(report: &'static SharedReport, idle_rate: &'static SharedIdleRate) -> Self {
        Self { report, idle_rate }
    }
}

impl RequestHandler for RetropadRequestHandler {
    fn get_report(&mut self, _id: ReportId, buf: &mut [u8]) -> Option<usize> {
        let report = self.report.lock(Cell::get);
        let out = buf.get_mut(..REPORT_SIZE)?;
        out.copy_from_slice(report.as_bytes());
        Some(REPORT_SIZE)
    }

    fn set_report(&mut self, _id: ReportId, _data: &[u8]) -> OutResponse {
        OutResponse::Rejected
    }

    fn set_idle_ms(&mut self, _id: Option<ReportId>, duration_ms: u32) {
        let rate = IdleRate::from_millis(duration_ms);
        defmt::debug!("SET_IDLE {} ms -> {} ticks", duration_ms, rate.0);
        self.idle_rate.store(rate);
    }

    fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
        Some(self.idle_rate.load().as_millis())
    }
}

/// Configure the USB HID class in the USB builder.
///
/// Returns the HID writer for use by the application.
pub fn configure_usb_hid<'d>(
    builder: &mut Builder<'d, UsbDriver<'d>>,
    state: &'d mut State<'d>,
    request_handler: &'d mut RetropadRequestHandler,
) -> ReportWriter<'d> {
    let config = embassy_usb::class::hid::Config {
        report_descriptor: REPORT_DESCRIPTOR,
        request_handler: Some(request_handler),
        poll_ms: 1,
        max_packet_size: MAX_PACKET_SIZE,
        hid_subclass: embassy_usb::class::hid::HidSubclass::No,
        hid_boot_protocol: embassy_usb::class::hid::HidBootProtocol::None,
    };

    HidWriter::new(builder, state, config)
}
