//! Reload/compare arithmetic and the register writes that apply it.
//!
//! The timer counts up from the reload value to `0xFFFF_FFFF` and wraps back
//! to the reload value, so the period is `0xFFFF_FFFF - reload + 1` input
//! ticks. The output toggles on overflow and on match; the compare value's
//! distance above the reload value sets the active time.

use log::{debug, warn};

use crate::board::Board;
use crate::channel::{ChannelCore, ChannelState};
use crate::error::{PwmError, PwmResult};
use crate::regs::{GPT_REGS_PAGE_SIZE, GPT_TCLR, GPT_TCRR, GPT_TLDR, GPT_TMAR, TCLR_ST};
use crate::window::with_register_window;

const COUNTER_MAX: u32 = 0xFFFF_FFFF;
const COUNTER_LAST: u32 = 0xFFFF_FFFE;

/// Highest reload value that still leaves one usable compare step.
const RELOAD_CEILING: u32 = COUNTER_LAST - 1;

/// Tenths of a microsecond per second.
const TENTHS_US_PER_SEC: u32 = 10_000_000;

/// Register values derived from an input clock and an output frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrequencyPlan {
    /// Output frequency after clamping.
    pub output_hz: u32,
    /// Value loaded into TLDR and the initial TCRR.
    pub reload: u32,
    /// Counter steps between reload and overflow; `reload + usable_range`
    /// is always `0xFFFF_FFFE`.
    pub usable_range: u32,
    /// Half-period in tenths of a microsecond, the divisor for pulse widths.
    pub pulse_factor: u32,
}

impl FrequencyPlan {
    /// Computes the plan for `requested_hz`, clamped to `[1, input_hz / 2]`.
    /// At `input_hz / 2` the period is stretched to three ticks and
    /// `output_hz` reports the resulting `input_hz / 3`.
    ///
    /// Fails when the input clock is too slow to produce any output.
    pub fn new(input_hz: u32, requested_hz: u32) -> PwmResult<Self> {
        if input_hz < 2 {
            return Err(PwmError::InvalidArgument("input clock below 2 Hz"));
        }

        let mut output_hz = requested_hz.min(input_hz / 2).max(1);
        let ticks_per_period = input_hz / output_hz;
        let mut reload = COUNTER_MAX - (ticks_per_period - 1);
        if reload > RELOAD_CEILING {
            // Two ticks leave no compare step; the capped reload gives three.
            reload = RELOAD_CEILING;
            output_hz = (input_hz / (COUNTER_MAX - RELOAD_CEILING + 1)).max(1);
        }
        let usable_range = COUNTER_LAST - reload;
        let pulse_factor = TENTHS_US_PER_SEC / (output_hz.saturating_mul(2));

        Ok(Self {
            output_hz,
            reload,
            usable_range,
            pulse_factor,
        })
    }

    /// Compare offset for a duty cycle in percent (1..=100).
    pub fn duty_offset(&self, percent: u32) -> u32 {
        let offset = u64::from(percent) * u64::from(self.usable_range) / 100;
        self.clamp_offset(offset)
    }

    /// Compare offset for a pulse width in tenths of a microsecond.
    ///
    /// Both the range and the half-period factor are pre-halved, matching the
    /// 32-bit formulation; the product is widened so long ranges cannot wrap.
    pub fn pulse_offset(&self, tenths_us: u32) -> u32 {
        if self.pulse_factor == 0 {
            return self.usable_range;
        }
        let offset = u64::from(tenths_us) * u64::from(self.usable_range / 2)
            / u64::from(self.pulse_factor);
        self.clamp_offset(offset)
    }

    /// Duty cycle in percent represented by a compare value.
    pub fn duty_percent(&self, compare: u32) -> u32 {
        let offset = compare.saturating_sub(self.reload);
        let percent = 100 * u64::from(offset) / u64::from(self.usable_range);
        u32::try_from(percent).unwrap_or(u32::MAX)
    }

    fn clamp_offset(&self, offset: u64) -> u32 {
        let clamped = offset.clamp(1, u64::from(self.usable_range));
        u32::try_from(clamped).unwrap_or(self.usable_range)
    }
}

/// Fixes the channel's output frequency and loads TLDR and TCRR.
///
/// TCRR is seeded with the reload value so the first period is full length.
/// Must be re-run after a clock source switch.
pub(crate) fn program_frequency(
    board: &Board,
    core: &mut ChannelCore,
    requested_hz: u32,
) -> PwmResult<()> {
    let plan = FrequencyPlan::new(core.input_frequency, requested_hz)?;
    if plan.output_hz != requested_hz {
        warn!(
            "gpt{}: frequency {requested_hz} Hz clamped to {} Hz (input {} Hz)",
            core.timer.id, plan.output_hz, core.input_frequency
        );
    }

    with_register_window(board.platform(), core.timer.base, GPT_REGS_PAGE_SIZE, |regs| {
        regs.write32(GPT_TLDR, plan.reload);
        regs.write32(GPT_TCRR, plan.reload);
        Ok(())
    })?;

    debug!(
        "gpt{}: {} Hz, reload {:#010x}, range {}",
        core.timer.id, plan.output_hz, plan.reload, plan.usable_range
    );
    core.plan = Some(plan);
    if core.state < ChannelState::Stopped {
        core.state = ChannelState::Stopped;
    }
    Ok(())
}

/// Applies a duty cycle in percent; zero stops the channel.
pub(crate) fn set_duty_percent(board: &Board, core: &mut ChannelCore, percent: u32) -> PwmResult<()> {
    if percent > 100 {
        return Err(PwmError::InvalidArgument("duty cycle above 100%"));
    }
    let plan = core.programmed_plan()?;

    if percent == 0 {
        return stop(board, core);
    }

    let compare = plan.reload + plan.duty_offset(percent);
    start(board, core, compare)?;
    core.current_value = percent;
    Ok(())
}

/// Applies an absolute pulse width in tenths of a microsecond.
///
/// Values outside `band` (inclusive) are rejected.
pub(crate) fn set_pulse_width(
    board: &Board,
    core: &mut ChannelCore,
    tenths_us: u32,
    band: (u32, u32),
) -> PwmResult<()> {
    let (min, max) = band;
    if tenths_us < min || tenths_us > max {
        return Err(PwmError::InvalidArgument("pulse width outside servo band"));
    }
    let plan = core.programmed_plan()?;

    let compare = plan.reload + plan.pulse_offset(tenths_us);
    start(board, core, compare)?;
    core.current_value = tenths_us;
    Ok(())
}

/// Clears the start bit and forgets the current value.
pub(crate) fn stop(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    let control = core.control & !TCLR_ST;
    with_register_window(board.platform(), core.timer.base, GPT_REGS_PAGE_SIZE, |regs| {
        regs.write32(GPT_TCLR, control);
        Ok(())
    })?;

    core.control = control;
    core.current_value = 0;
    if core.state >= ChannelState::Stopped {
        core.state = ChannelState::Stopped;
    }
    Ok(())
}

/// Loads TMAR then sets the start bit, in one mapping.
fn start(board: &Board, core: &mut ChannelCore, compare: u32) -> PwmResult<()> {
    let control = with_register_window(board.platform(), core.timer.base, GPT_REGS_PAGE_SIZE, |regs| {
        regs.write32(GPT_TMAR, compare);
        let control = regs.read32(GPT_TCLR) | TCLR_ST;
        regs.write32(GPT_TCLR, control);
        Ok(control)
    })?;

    core.compare = compare;
    core.control = control;
    core.state = ChannelState::Running;
    Ok(())
}
