//! Per-open text interface onto a channel: status reads and value writes.

use std::fmt::Write as _;

use log::debug;

use crate::channel::{ChannelCore, ChannelState, TimerChannel, STATUS_BUF_LEN};
use crate::config::{ChannelSettings, Mode};
use crate::error::{PwmError, PwmResult};
use crate::sync::{Arc, Interrupt};

/// Only this many leading bytes of a write are parsed.
pub const COMMAND_MAX_LEN: usize = 8;

/// An open handle on one channel.
///
/// Every operation holds the channel lock for its full duration, so reads and
/// writes through any number of handles on the same channel serialise.
pub struct ChannelHandle {
    channel: Arc<TimerChannel>,
    offset: usize,
}

impl ChannelHandle {
    /// Opens `channel`, bringing it up first if it is not yet programmed.
    pub(crate) fn open(channel: Arc<TimerChannel>, interrupt: &Interrupt) -> PwmResult<Self> {
        {
            let mut core = channel.lock(interrupt)?;
            core.ensure_live()?;
            if !core.state.is_programmed() {
                channel.bring_up(&mut core)?;
            }
            if core.status.is_none() {
                core.status = Some(heapless::String::new());
            }
        }
        debug!("gpt{}: opened", channel.id());
        Ok(Self { channel, offset: 0 })
    }

    pub fn id(&self) -> u32 {
        self.channel.id()
    }

    pub fn channel(&self) -> &TimerChannel {
        &self.channel
    }

    /// Copies the status line into `buf`.
    ///
    /// Returns the number of bytes copied, or 0 once this handle has already
    /// delivered the line and nothing was written since. A line longer than
    /// `buf` is truncated, not continued on the next read.
    pub fn read(&mut self, buf: &mut [u8], interrupt: &Interrupt) -> PwmResult<usize> {
        let mut core = self.channel.lock(interrupt)?;
        core.ensure_live()?;
        if self.offset > 0 {
            return Ok(0);
        }

        let line = render_status(&core, self.channel.settings())?;
        let len = line.len().min(buf.len());
        buf[..len].copy_from_slice(&line.as_bytes()[..len]);
        core.status = Some(line);
        self.offset = len;
        Ok(len)
    }

    /// Renders the status line without touching the read offset.
    pub fn status(&self, interrupt: &Interrupt) -> PwmResult<String> {
        let core = self.channel.lock(interrupt)?;
        core.ensure_live()?;
        let line = render_status(&core, self.channel.settings())?;
        Ok(line.as_str().to_owned())
    }

    /// Parses a value from `input` and applies it to the channel.
    ///
    /// On success the whole input counts as consumed. Malformed or
    /// out-of-range input fails with [`PwmError::InvalidArgument`] and leaves
    /// the channel as it was. Either way the next read reports afresh.
    pub fn write(&mut self, input: &[u8], interrupt: &Interrupt) -> PwmResult<usize> {
        let mut core = self.channel.lock(interrupt)?;
        core.ensure_live()?;
        self.offset = 0;

        let value = parse_command(input)?;
        self.channel.apply_value(&mut core, value)?;
        debug!("gpt{}: value {value} applied", self.channel.id());
        Ok(input.len())
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal unsigned integer from the
/// first [`COMMAND_MAX_LEN`] bytes of `input`.
///
/// Surrounding whitespace and trailing NULs are ignored. Empty input is an
/// error rather than an implicit zero.
pub fn parse_command(input: &[u8]) -> PwmResult<u32> {
    let head = &input[..input.len().min(COMMAND_MAX_LEN)];
    let text = std::str::from_utf8(head)
        .map_err(|_| PwmError::InvalidArgument("command is not ASCII"))?
        .trim_start()
        .trim_end_matches(|c: char| c.is_ascii_whitespace() || c == '\0');

    if text.is_empty() {
        return Err(PwmError::InvalidArgument("empty command"));
    }

    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PwmError::InvalidArgument("command is not an unsigned integer"));
    }
    u32::from_str_radix(digits, radix)
        .map_err(|_| PwmError::InvalidArgument("command is not an unsigned integer"))
}

fn render_status(
    core: &ChannelCore,
    settings: &ChannelSettings,
) -> PwmResult<heapless::String<STATUS_BUF_LEN>> {
    let frequency = core
        .plan
        .map_or(settings.frequency, |plan| plan.output_hz);

    let mut line = heapless::String::new();
    let written = match (core.state, core.plan, settings.mode) {
        (ChannelState::Running, Some(plan), Mode::Duty) => writeln!(
            line,
            "PWM{} Frequency {frequency} Hz Duty Cycle {}%",
            core.timer.id,
            plan.duty_percent(core.compare)
        ),
        // Pulse widths are held in tenths of a microsecond.
        (ChannelState::Running, Some(_), Mode::Servo { .. }) => writeln!(
            line,
            "PWM{} Frequency {frequency} Hz Pulse Width {}.{} us",
            core.timer.id,
            core.current_value / 10,
            core.current_value % 10
        ),
        _ => writeln!(line, "PWM{} Frequency {frequency} Hz Stopped", core.timer.id),
    };
    written.map_err(|_| PwmError::BufferOverflow(STATUS_BUF_LEN))?;
    Ok(line)
}
