#![no_std]
#![no_main]

use core::cell::Cell;

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::select::{select, Either};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embassy_usb::class::hid::State;
use embassy_usb::{Builder, Config as UsbConfig};
use portable_atomic::AtomicBool;
use retropad_rp2040::{
    configure_usb_hid, ArbitrationConfig, BoardLeds, BoardRunner, HealthChange, IdleRate,
    ModeCell, MuxPorts, OutputHealth, PadBridge, Report, RetropadRequestHandler, SampleSet,
    SerialPort, SharedIdleRate, SharedReport, StatusLeds, TickDeadlines, Timing, UsbHidOutput,
    UsbStateHandler, PROFILE,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

const TIMING: Timing = Timing::DEFAULT;

type SampleSignal = Signal<CriticalSectionRawMutex, SampleSet>;

/// Signal for passing completed sample sets from the pad task to the report task.
/// Using Signal instead of Channel provides "latest value wins" semantics.
static SAMPLE_SIGNAL: StaticCell<SampleSignal> = StaticCell::new();

/// Session mode, written once by the report task or at startup.
static MODE: ModeCell = ModeCell::new();

/// Idle rate as set by the host.
static IDLE_RATE: SharedIdleRate = SharedIdleRate::new(IdleRate(TIMING.default_idle_ticks));

/// Committed report, for GET_REPORT.
static CURRENT_REPORT: SharedReport = Mutex::new(Cell::new(Report::NEUTRAL));

/// Set while the host has the device configured.
static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// High-priority executor for the pad engines.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// HID state and handlers.
static HID_STATE: StaticCell<State> = StaticCell::new();
static REQUEST_HANDLER: StaticCell<RetropadRequestHandler> = StaticCell::new();
static STATE_HANDLER: StaticCell<UsbStateHandler> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("retropad starting, profile {:?}", PROFILE);

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // Initialize the sample signal (latest-value semantics)
    let samples = SAMPLE_SIGNAL.init(Signal::new());

    if let Some(mode) = PROFILE.fixed_mode() {
        if let Err(e) = MODE.select(mode) {
            warn!("mode already selected: {:?}", e);
        }
    }

    // --- Pad ports ---
    let mux_ports = MuxPorts::new(
        Output::new(p.PIN_14, Level::Low),
        [
            Input::new(p.PIN_2, Pull::Up),
            Input::new(p.PIN_3, Pull::Up),
            Input::new(p.PIN_4, Pull::Up),
            Input::new(p.PIN_5, Pull::Up),
            Input::new(p.PIN_6, Pull::Up),
            Input::new(p.PIN_7, Pull::Up),
        ],
        [
            Input::new(p.PIN_8, Pull::Up),
            Input::new(p.PIN_9, Pull::Up),
            Input::new(p.PIN_10, Pull::Up),
            Input::new(p.PIN_11, Pull::Up),
            Input::new(p.PIN_12, Pull::Up),
            Input::new(p.PIN_13, Pull::Up),
        ],
    );

    let serial_port = SerialPort::new(
        Output::new(p.PIN_19, Level::High), // ATT
        Output::new(p.PIN_18, Level::High), // CLK
        Output::new(p.PIN_17, Level::High), // CMD
        Input::new(p.PIN_16, Pull::Up),     // DAT
    );
    let runner = BoardRunner::new(mux_ports, serial_port, TIMING);

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("Rust Retropad");
    usb_config.product = Some("Retro Pad USB Adapter");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );
    builder.handler(STATE_HANDLER.init(UsbStateHandler::new(&USB_CONFIGURED)));

    // Configure HID class
    let hid_state = HID_STATE.init(State::new());
    let request_handler =
        REQUEST_HANDLER.init(RetropadRequestHandler::new(&CURRENT_REPORT, &IDLE_RATE));
    let hid_writer = configure_usb_hid(&mut builder, hid_state, request_handler);

    // Build the USB device
    let usb_device = builder.build();

    let bridge = PadBridge::new(
        UsbHidOutput::new(hid_writer, &USB_CONFIGURED),
        PROFILE,
        TIMING,
        ArbitrationConfig::DEFAULT,
    );

    let leds = StatusLeds::new(
        Output::new(p.PIN_25, Level::Low), // mode
        Output::new(p.PIN_15, Level::Low), // activity
    );

    // Pad engines preempt the USB stack and the report loop.
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high.spawn(pad_task(runner, samples).unwrap());

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(usb_task(usb_device).unwrap());
    spawner.spawn(report_task(bridge, samples, leds).unwrap());

    info!("retropad initialized");
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// Pad task - sole owner of both engines. Sleeps until the earliest
/// scheduled tick and dispatches it, then follows the session mode.
#[embassy_executor::task]
async fn pad_task(mut runner: BoardRunner, samples: &'static SampleSignal) {
    let settle = Duration::from_micros(TIMING.settle_us.into());
    let origin = Instant::now();
    let mut deadlines = TickDeadlines::new();
    let mut followed = None;

    runner.start(PROFILE);

    loop {
        let mode = MODE.get();
        if mode != followed {
            if let Some(mode) = mode {
                if !runner.enter(mode) {
                    warn!("pad engines cannot enter {:?}", mode);
                }
            }
            followed = mode;
        }

        if runner.sample_pending() {
            Timer::after(settle).await;
            runner.latch();
        }

        deadlines.sync(runner.ticks(), origin.elapsed().as_micros());
        let Some((kind, at)) = deadlines.next() else {
            error!("no pad tick scheduled");
            return;
        };
        Timer::at(origin + Duration::from_micros(at)).await;

        if let Some(set) = runner.on_tick(kind) {
            // Last action of the tick.
            samples.signal(set);
        }
        deadlines.fired(kind, runner.ticks());
    }
}

/// Report task - feeds sample sets and idle ticks to the bridge, sends
/// the report when due and drives the status LEDs.
#[embassy_executor::task]
async fn report_task(
    mut bridge: PadBridge<UsbHidOutput<'static>>,
    samples: &'static SampleSignal,
    mut leds: BoardLeds,
) {
    let mut idle = Ticker::every(Duration::from_micros(TIMING.idle_tick_us.into()));
    let mut health = OutputHealth::new();
    leds.show_mode(bridge.mode());

    loop {
        match select(samples.wait(), idle.next()).await {
            Either::First(set) => {
                if let Some(mode) = bridge.ingest(&set) {
                    match MODE.select(mode) {
                        Ok(()) => leds.show_mode(Some(mode)),
                        Err(e) => warn!("mode already selected: {:?}", e),
                    }
                }
                CURRENT_REPORT.lock(|report| report.set(*bridge.report()));
            }
            Either::Second(()) => bridge.idle_tick(),
        }
        leds.on_report(bridge.report());

        bridge.set_idle_rate(IDLE_RATE.load());
        let outcome = bridge.service().await;
        match health.observe(&outcome) {
            Some(HealthChange::Failing(e)) => error!("Output error: {:?}", e),
            Some(HealthChange::Recovered) => info!("Output recovered"),
            None => {}
        }
    }
}
