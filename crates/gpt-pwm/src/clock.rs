//! Functional clock acquisition and GPT10/GPT11 source selection.

use log::{debug, error};

use crate::board::Board;
use crate::channel::ChannelCore;
use crate::error::{PwmError, PwmResult};
use crate::regs::{ClockSource, TimerInfo, CM_CLKSEL_CORE_OFFSET, CM_CORE_SIZE, CM_CORE_START};
use crate::window::with_register_window;

/// A resolved reference into the host clock tree.
#[derive(Debug, PartialEq, Eq)]
pub struct ClockRef {
    name: String,
    key: u32,
}

impl ClockRef {
    pub fn new(name: impl Into<String>, key: u32) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform-defined identity of the clock.
    pub fn key(&self) -> u32 {
        self.key
    }
}

/// Host clock framework, in the get/rate/enable/disable/put shape.
pub trait ClockTree: Send + Sync {
    /// Resolves a clock by name, taking a reference on it.
    fn get(&self, name: &str) -> PwmResult<ClockRef>;

    /// Current rate of the clock in Hz.
    fn rate(&self, clock: &ClockRef) -> u32;

    fn enable(&self, clock: &ClockRef) -> PwmResult<()>;

    fn disable(&self, clock: &ClockRef);

    /// Drops the reference taken by [`ClockTree::get`].
    fn put(&self, clock: ClockRef);
}

/// Resolves and enables the channel's functional clock, recording its rate.
///
/// A source already chosen through [`select_source`] keeps its rate; the
/// clock tree's rate is used only for a timer whose selector was never
/// touched. Returns immediately if the clock is already held. If enabling
/// fails the resolved reference is released before the error is returned.
pub(crate) fn enable(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    if core.clock.is_some() {
        return Ok(());
    }

    let clocks = board.platform();
    let name = core.timer.clock_name();

    let clock = clocks.get(&name).map_err(|err| {
        error!("gpt{}: failed to get {name}: {err}", core.timer.id);
        PwmError::ClockUnavailable(name.clone())
    })?;

    core.input_frequency = match core.source {
        Some(source) => source.frequency(),
        None => clocks.rate(&clock),
    };

    if let Err(err) = clocks.enable(&clock) {
        error!("gpt{}: error enabling {name}: {err}", core.timer.id);
        clocks.put(clock);
        return Err(PwmError::ClockEnable(name));
    }

    debug!(
        "gpt{}: {name} enabled, input {} Hz",
        core.timer.id, core.input_frequency
    );
    core.clock = Some(clock);
    Ok(())
}

/// Disables and releases the functional clock if held.
pub(crate) fn disable(board: &Board, core: &mut ChannelCore) {
    if let Some(clock) = core.clock.take() {
        let clocks = board.platform();
        clocks.disable(&clock);
        clocks.put(clock);
        debug!("gpt{}: functional clock released", core.timer.id);
    }
}

/// Moves a selectable timer onto `source` and updates its input frequency.
///
/// Timers without a selector bit are left untouched. A running channel keeps
/// its old reload value until frequency programming is run again.
pub(crate) fn select_source(
    board: &Board,
    core: &mut ChannelCore,
    source: ClockSource,
) -> PwmResult<()> {
    if core.timer.clksel_bit.is_none() {
        return Ok(());
    }
    write_selector(board, core.timer, source)?;

    core.input_frequency = source.frequency();
    core.source = Some(source);
    debug!(
        "gpt{}: input clock now {:?} ({} Hz)",
        core.timer.id, source, core.input_frequency
    );
    Ok(())
}

/// Sets or clears the timer's CM_CLKSEL_CORE bit without touching channel
/// state. Read-modify-write under the board-wide selector lock.
pub(crate) fn write_selector(board: &Board, timer: &TimerInfo, source: ClockSource) -> PwmResult<()> {
    let Some(bit) = timer.clksel_bit else {
        return Ok(());
    };

    let _selector = board.clock_select().lock();
    with_register_window(board.platform(), CM_CORE_START, CM_CORE_SIZE, |regs| {
        let current = regs.read32(CM_CLKSEL_CORE_OFFSET);
        let updated = match source {
            ClockSource::HighRate => current | bit,
            ClockSource::LowRate => current & !bit,
        };
        regs.write32(CM_CLKSEL_CORE_OFFSET, updated);
        Ok(())
    })
}

pub(crate) fn switch_to_high_rate(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    select_source(board, core, ClockSource::HighRate)
}

pub(crate) fn switch_to_low_rate(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    select_source(board, core, ClockSource::LowRate)
}
