//! Integration tests for channel locking under concurrent callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use gpt_pwm::regs::{
    ClockSource, CLKSEL_GPT10, CLKSEL_GPT11, CM_CLKSEL_CORE_OFFSET, CM_CORE_START, GPT_TMAR,
};
use gpt_pwm::sim::{SimBoard, SIM_CLKSEL_RESET};
use gpt_pwm::{
    ClockRef, ClockTree, ControllerConfig, Interrupt, MemoryMap, PwmController, PwmError,
    PwmResult, RegisterWindow,
};

#[test]
fn concurrent_writers_never_mix_values() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder().timer(8).build();
    let controller = Arc::new(PwmController::new(&config, sim.clone()).unwrap());

    let writers: Vec<_> = [20u32, 80]
        .into_iter()
        .map(|value| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let interrupt = Interrupt::new();
                let mut handle = controller.open(8, &interrupt).unwrap();
                let command = value.to_string();
                for _ in 0..200 {
                    handle.write(command.as_bytes(), &interrupt).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let snapshot = controller.channel(8).unwrap().snapshot();
    let plan = snapshot.plan.unwrap();
    let expected = plan.reload + plan.duty_offset(snapshot.current_value);
    assert!(snapshot.current_value == 20 || snapshot.current_value == 80);
    assert_eq!(snapshot.compare, expected);
    assert_eq!(
        sim.read32(controller.channel(8).unwrap().timer().base + GPT_TMAR),
        expected
    );
    assert_eq!(sim.live_mappings(), 0);
}

#[test]
fn clock_selector_updates_do_not_clobber_each_other() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder()
        .timers([10, 11])
        .use_system_clock(false)
        .build();
    let controller = Arc::new(PwmController::new(&config, sim.clone()).unwrap());

    let switchers: Vec<_> = [10u32, 11]
        .into_iter()
        .map(|id| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let interrupt = Interrupt::new();
                let channel = controller.channel(id).unwrap();
                for round in 0..100 {
                    let source = if round % 2 == 0 {
                        ClockSource::HighRate
                    } else {
                        ClockSource::LowRate
                    };
                    channel.select_clock_source(source, &interrupt).unwrap();
                }
                channel
                    .select_clock_source(ClockSource::HighRate, &interrupt)
                    .unwrap();
            })
        })
        .collect();
    for switcher in switchers {
        switcher.join().unwrap();
    }

    let clksel = sim.read32(CM_CORE_START + CM_CLKSEL_CORE_OFFSET);
    assert_eq!(clksel, SIM_CLKSEL_RESET | CLKSEL_GPT10 | CLKSEL_GPT11);
}

/// Board whose mappings of one base can be held shut, to park a caller inside
/// the channel lock.
struct GatedBoard {
    sim: SimBoard,
    armed: Mutex<Option<u32>>,
    entered: AtomicBool,
    gate: Mutex<bool>,
    opened: Condvar,
}

impl GatedBoard {
    fn new() -> Self {
        Self {
            sim: SimBoard::new(),
            armed: Mutex::new(None),
            entered: AtomicBool::new(false),
            gate: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    fn arm(&self, base: u32) {
        *self.gate.lock().unwrap() = false;
        *self.armed.lock().unwrap() = Some(base);
    }

    fn wait_until_entered(&self) {
        while !self.entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    }

    fn release(&self) {
        *self.armed.lock().unwrap() = None;
        *self.gate.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl MemoryMap for GatedBoard {
    fn map(&self, base: u32, size: u32) -> PwmResult<Box<dyn RegisterWindow + '_>> {
        let armed = *self.armed.lock().unwrap();
        if armed == Some(base) {
            self.entered.store(true, Ordering::SeqCst);
            let mut open = self.gate.lock().unwrap();
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
        }
        self.sim.map(base, size)
    }
}

impl ClockTree for GatedBoard {
    fn get(&self, name: &str) -> PwmResult<ClockRef> {
        self.sim.get(name)
    }

    fn rate(&self, clock: &ClockRef) -> u32 {
        self.sim.rate(clock)
    }

    fn enable(&self, clock: &ClockRef) -> PwmResult<()> {
        self.sim.enable(clock)
    }

    fn disable(&self, clock: &ClockRef) {
        self.sim.disable(clock)
    }

    fn put(&self, clock: ClockRef) {
        self.sim.put(clock)
    }
}

#[test]
fn blocked_reader_is_interrupted_then_retries() {
    let board = Arc::new(GatedBoard::new());
    let config = ControllerConfig::builder()
        .timer(11)
        .use_system_clock(false)
        .build();
    let controller = PwmController::new(&config, board.clone()).unwrap();
    let idle = Interrupt::new();
    let mut writer = controller.open(11, &idle).unwrap();
    let mut reader = controller.open(11, &idle).unwrap();

    board.arm(controller.channel(11).unwrap().timer().base);
    let parked = thread::spawn(move || writer.write(b"30", &Interrupt::new()));
    board.wait_until_entered();

    let interrupt = Interrupt::new();
    interrupt.raise();
    let mut buf = [0u8; 64];
    assert_eq!(reader.read(&mut buf, &interrupt), Err(PwmError::Interrupted));

    board.release();
    assert_eq!(parked.join().unwrap(), Ok(2));

    interrupt.clear();
    let len = reader.read(&mut buf, &interrupt).unwrap();
    assert_eq!(&buf[..len], b"PWM11 Frequency 1024 Hz Duty Cycle 30%\n");
}

#[test]
fn channels_do_not_block_each_other() {
    let board = Arc::new(GatedBoard::new());
    let config = ControllerConfig::builder()
        .timers([8, 9])
        .build();
    let controller = Arc::new(PwmController::new(&config, board.clone()).unwrap());
    let idle = Interrupt::new();
    let mut parked_handle = controller.open(8, &idle).unwrap();
    let mut gpt9 = controller.open(9, &idle).unwrap();

    board.arm(controller.channel(8).unwrap().timer().base);
    let parked = thread::spawn(move || parked_handle.write(b"10", &Interrupt::new()));
    board.wait_until_entered();

    // The parked writer holds only GPT8's lock.
    let interrupt = Interrupt::new();
    interrupt.raise();
    assert_eq!(gpt9.write(b"75", &interrupt), Ok(2));
    assert_eq!(controller.channel(9).unwrap().snapshot().current_value, 75);
    assert_eq!(
        controller.channel(8).unwrap().set_value(5, &interrupt),
        Err(PwmError::Interrupted)
    );

    board.release();
    assert_eq!(parked.join().unwrap(), Ok(2));
    assert_eq!(controller.channel(8).unwrap().snapshot().current_value, 10);
}
