//! # gpt-pwm
//!
//! Duty-cycle and servo PWM output on the OMAP35x general-purpose timers
//! GPT8 to GPT11. Each configured timer becomes a channel with a small text
//! interface: reading reports the programmed frequency and duty cycle (or
//! pulse width), writing a number sets a new one.
//!
//! ## Module Overview
//! - [`regs`]       – Register offsets, control bits and the timer table.
//! - [`window`]     – Scoped register mappings that never outlive an access.
//! - [`clock`]      – Functional clock handling and 32 kHz/system clock selection.
//! - [`program`]    – Reload/compare arithmetic and the writes applying it.
//! - [`channel`]    – Channel state machine with rolled-back bring-up.
//! - [`device`]     – Per-open read/write interface and command parsing.
//! - [`controller`] – Registry owning every channel from construction to shutdown.
//! - [`config`]     – Host configuration and its validation.
//! - [`sim`]        – In-memory board for tests and host tools.
//!
//! Hardware is reached only through the [`Platform`] traits, so the same core
//! runs against a real memory mapper or against [`sim::SimBoard`].

pub mod board;
pub mod channel;
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
mod pinmux;
pub mod program;
pub mod regs;
pub mod sim;
pub mod sync;
pub mod window;

pub use board::{Board, Platform};
pub use channel::{ChannelSnapshot, ChannelState, TimerChannel};
pub use clock::{ClockRef, ClockTree};
pub use config::{BringUp, ChannelSettings, ControllerConfig, ControllerConfigBuilder, Mode, ResolvedConfig};
pub use controller::PwmController;
pub use device::{parse_command, ChannelHandle};
pub use error::{PwmError, PwmResult};
pub use program::FrequencyPlan;
pub use regs::{ClockSource, TimerInfo};
pub use sync::Interrupt;
pub use window::{with_register_window, MemoryMap, RegisterWindow};

#[cfg(test)]
mod tests;
