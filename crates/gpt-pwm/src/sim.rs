//! In-memory board: a register file and clock tree for hosts without the
//! real hardware.
//!
//! Registers are keyed by physical address. Every mapping is counted while it
//! is live and every register write is logged, so callers can check that no
//! window outlives its operation and that writes happened in the right order.
//! Faults can be injected per mapping base and per clock name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::clock::{ClockRef, ClockTree};
use crate::error::{PwmError, PwmResult};
use crate::regs::{
    CLK_32K_FREQ, CLK_SYS_FREQ, CM_CLKSEL_CORE_OFFSET, CM_CORE_START, PADCONF_START, PWM_TIMERS,
};
use crate::sync::Mutex;
use crate::window::{MemoryMap, RegisterWindow};

/// Reset value of each timer's pad: GPIO mode with the input buffer enabled.
pub const SIM_PAD_RESET: u16 = 0x0104;
/// Reset value of CM_CLKSEL_CORE, with unrelated selector bits set.
pub const SIM_CLKSEL_RESET: u32 = 0x0000_030A;

/// Width of a logged register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Half,
    Word,
}

/// One logged register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u32,
    pub value: u32,
    pub width: AccessWidth,
}

#[derive(Debug)]
struct SimClock {
    key: u32,
    rate: u32,
    enabled: bool,
    refs: u32,
}

#[derive(Debug, Default)]
struct SimState {
    registers: BTreeMap<u32, u32>,
    writes: Vec<RegisterWrite>,
    clocks: BTreeMap<String, SimClock>,
    fail_map: BTreeSet<u32>,
    fail_clock_get: BTreeSet<String>,
    fail_clock_enable: BTreeSet<String>,
}

/// Simulated OMAP35x timer board.
#[derive(Debug)]
pub struct SimBoard {
    state: Mutex<SimState>,
    live_mappings: AtomicUsize,
    total_mappings: AtomicUsize,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    /// A board in its reset state: GPT8/GPT9 clocks at the system rate,
    /// GPT10/GPT11 on the 32 kHz clock, every PWM pad in GPIO mode.
    pub fn new() -> Self {
        let mut state = SimState::default();
        for (key, timer) in (1u32..).zip(PWM_TIMERS.iter()) {
            let rate = if timer.has_clock_select() {
                CLK_32K_FREQ
            } else {
                CLK_SYS_FREQ
            };
            state.clocks.insert(
                timer.clock_name(),
                SimClock {
                    key,
                    rate,
                    enabled: false,
                    refs: 0,
                },
            );
            state
                .registers
                .insert(PADCONF_START + timer.pad_offset, u32::from(SIM_PAD_RESET));
        }
        state
            .registers
            .insert(CM_CORE_START + CM_CLKSEL_CORE_OFFSET, SIM_CLKSEL_RESET);

        Self {
            state: Mutex::new(state),
            live_mappings: AtomicUsize::new(0),
            total_mappings: AtomicUsize::new(0),
        }
    }

    pub fn read32(&self, address: u32) -> u32 {
        self.state.lock().registers.get(&address).copied().unwrap_or(0)
    }

    pub fn read16(&self, address: u32) -> u16 {
        (self.read32(address) & 0xFFFF) as u16
    }

    /// Presets a register without logging a write.
    pub fn preset(&self, address: u32, value: u32) {
        self.state.lock().registers.insert(address, value);
    }

    /// Every write since construction or the last [`SimBoard::clear_writes`].
    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.state.lock().writes.clone()
    }

    pub fn writes_to(&self, address: u32) -> Vec<u32> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|write| write.address == address)
            .map(|write| write.value)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Windows currently mapped.
    pub fn live_mappings(&self) -> usize {
        self.live_mappings.load(Ordering::SeqCst)
    }

    /// Windows mapped since construction.
    pub fn total_mappings(&self) -> usize {
        self.total_mappings.load(Ordering::SeqCst)
    }

    /// Makes every later mapping of `base` fail.
    pub fn fail_map(&self, base: u32) {
        self.state.lock().fail_map.insert(base);
    }

    pub fn fail_clock_get(&self, name: &str) {
        self.state.lock().fail_clock_get.insert(name.to_owned());
    }

    pub fn fail_clock_enable(&self, name: &str) {
        self.state.lock().fail_clock_enable.insert(name.to_owned());
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.fail_map.clear();
        state.fail_clock_get.clear();
        state.fail_clock_enable.clear();
    }

    pub fn set_clock_rate(&self, name: &str, rate: u32) {
        if let Some(clock) = self.state.lock().clocks.get_mut(name) {
            clock.rate = rate;
        }
    }

    pub fn clock_enabled(&self, name: &str) -> bool {
        self.state
            .lock()
            .clocks
            .get(name)
            .is_some_and(|clock| clock.enabled)
    }

    /// Outstanding references taken with [`ClockTree::get`].
    pub fn clock_refs(&self, name: &str) -> u32 {
        self.state.lock().clocks.get(name).map_or(0, |clock| clock.refs)
    }

    fn store(&self, address: u32, value: u32, width: AccessWidth) {
        let mut state = self.state.lock();
        state.registers.insert(address, value);
        state.writes.push(RegisterWrite {
            address,
            value,
            width,
        });
    }
}

struct SimWindow<'a> {
    board: &'a SimBoard,
    base: u32,
    size: u32,
}

impl SimWindow<'_> {
    fn address(&self, offset: u32) -> u32 {
        debug_assert!(offset < self.size, "offset {offset:#x} outside window");
        self.base + offset
    }
}

impl RegisterWindow for SimWindow<'_> {
    fn read16(&self, offset: u32) -> u16 {
        self.board.read16(self.address(offset))
    }

    fn write16(&mut self, offset: u32, value: u16) {
        self.board
            .store(self.address(offset), u32::from(value), AccessWidth::Half);
    }

    fn read32(&self, offset: u32) -> u32 {
        self.board.read32(self.address(offset))
    }

    fn write32(&mut self, offset: u32, value: u32) {
        self.board.store(self.address(offset), value, AccessWidth::Word);
    }
}

impl Drop for SimWindow<'_> {
    fn drop(&mut self) {
        self.board.live_mappings.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryMap for SimBoard {
    fn map(&self, base: u32, size: u32) -> PwmResult<Box<dyn RegisterWindow + '_>> {
        if self.state.lock().fail_map.contains(&base) {
            return Err(PwmError::Map { base, size });
        }
        self.live_mappings.fetch_add(1, Ordering::SeqCst);
        self.total_mappings.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimWindow {
            board: self,
            base,
            size,
        }))
    }
}

impl ClockTree for SimBoard {
    fn get(&self, name: &str) -> PwmResult<ClockRef> {
        let mut state = self.state.lock();
        if state.fail_clock_get.contains(name) {
            return Err(PwmError::ClockUnavailable(name.to_owned()));
        }
        let clock = state
            .clocks
            .get_mut(name)
            .ok_or_else(|| PwmError::ClockUnavailable(name.to_owned()))?;
        clock.refs += 1;
        Ok(ClockRef::new(name, clock.key))
    }

    fn rate(&self, clock: &ClockRef) -> u32 {
        self.state
            .lock()
            .clocks
            .get(clock.name())
            .map_or(0, |clock| clock.rate)
    }

    fn enable(&self, clock: &ClockRef) -> PwmResult<()> {
        let mut state = self.state.lock();
        if state.fail_clock_enable.contains(clock.name()) {
            return Err(PwmError::ClockEnable(clock.name().to_owned()));
        }
        if let Some(sim) = state.clocks.get_mut(clock.name()) {
            sim.enabled = true;
        }
        Ok(())
    }

    fn disable(&self, clock: &ClockRef) {
        if let Some(sim) = self.state.lock().clocks.get_mut(clock.name()) {
            sim.enabled = false;
        }
    }

    fn put(&self, clock: ClockRef) {
        if let Some(sim) = self.state.lock().clocks.get_mut(clock.name()) {
            sim.refs = sim.refs.saturating_sub(1);
        }
    }
}
