//! Error types shared by every layer of the timer core.

use thiserror::Error;

/// Errors raised while bringing up, driving or tearing down a PWM channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PwmError {
    /// A physical register range could not be mapped.
    #[error("cannot map register window {base:#010x}+{size:#x}")]
    Map { base: u32, size: u32 },
    /// The named functional clock could not be resolved.
    #[error("clock {0} unavailable")]
    ClockUnavailable(String),
    /// The named functional clock was resolved but refused to enable.
    #[error("failed to enable clock {0}")]
    ClockEnable(String),
    /// A register block needed by a bring-up or teardown step was unreachable.
    #[error("register access failed: {0}")]
    RegisterAccess(&'static str),
    /// A caller-supplied value was malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The wait for a channel lock was interrupted; the caller should retry.
    #[error("interrupted while waiting for channel lock")]
    Interrupted,
    /// The timer id has no entry in the PWM timer table.
    #[error("timer {0} is not PWM capable")]
    UnknownTimer(u32),
    /// The timer id was listed more than once in the configuration.
    #[error("timer {0} specified more than once")]
    DuplicateTimer(u32),
    /// No channel was configured for the timer id.
    #[error("no PWM channel for timer {0}")]
    NoSuchChannel(u32),
    /// The status line did not fit the channel's text buffer.
    #[error("status line exceeds {0} bytes")]
    BufferOverflow(usize),
    /// The controller has already been shut down.
    #[error("controller has been shut down")]
    ShutDown,
}

const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const ERESTARTSYS: i32 = 512;

impl PwmError {
    /// Negative errno a character-device front end would return for this error.
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::Map { .. } => ENOMEM,
            Self::ClockUnavailable(_) | Self::NoSuchChannel(_) | Self::ShutDown => ENODEV,
            Self::ClockEnable(_) | Self::RegisterAccess(_) => EIO,
            Self::InvalidArgument(_)
            | Self::UnknownTimer(_)
            | Self::DuplicateTimer(_)
            | Self::BufferOverflow(_) => EINVAL,
            Self::Interrupted => ERESTARTSYS,
        };
        -code
    }

    /// Returns true when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Result type for timer core operations.
pub type PwmResult<T> = Result<T, PwmError>;
