//! Routing a timer's output pad to PWM mode and putting it back.

use log::{debug, error};

use crate::board::Board;
use crate::channel::ChannelCore;
use crate::error::{PwmError, PwmResult};
use crate::regs::{PADCONF_SIZE, PADCONF_START, PWM_ENABLE_MUX};
use crate::window::with_register_window;

/// Saves the pad's current configuration and switches it to the timer output.
///
/// Runs at most once per channel; later calls are no-ops so the captured
/// configuration is never overwritten with the PWM encoding.
pub(crate) fn capture_and_route(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    if core.pin_captured {
        return Ok(());
    }

    let offset = core.timer.pad_offset;
    let previous = with_register_window(board.platform(), PADCONF_START, PADCONF_SIZE, |pads| {
        let previous = pads.read16(offset);
        pads.write16(offset, PWM_ENABLE_MUX);
        Ok(previous)
    })
    .map_err(|err| {
        error!("gpt{}: pad capture failed: {err}", core.timer.id);
        PwmError::RegisterAccess("pad configuration")
    })?;

    core.previous_pin_config = previous;
    core.pin_captured = true;
    debug!(
        "gpt{}: pad {offset:#05x} routed to PWM (was {previous:#06x})",
        core.timer.id
    );
    Ok(())
}

/// Writes the saved pad configuration back, once.
///
/// A saved value of zero means nothing was captured, so nothing is written.
pub(crate) fn restore(board: &Board, core: &mut ChannelCore) -> PwmResult<()> {
    let previous = core.previous_pin_config;
    if previous == 0 {
        return Ok(());
    }

    let offset = core.timer.pad_offset;
    with_register_window(board.platform(), PADCONF_START, PADCONF_SIZE, |pads| {
        pads.write16(offset, previous);
        Ok(())
    })
    .map_err(|err| {
        error!("gpt{}: pad restore failed: {err}", core.timer.id);
        PwmError::RegisterAccess("pad configuration")
    })?;

    core.previous_pin_config = 0;
    debug!("gpt{}: pad {offset:#05x} restored to {previous:#06x}", core.timer.id);
    Ok(())
}
