//! Controller configuration and its resolution into per-channel settings.

use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PwmError, PwmResult};
use crate::regs::{self, TimerInfo, PWM_TIMERS};

/// Output frequency used in duty mode when none is configured.
pub const DEFAULT_FREQUENCY: u32 = 1024;
/// Output frequency forced in servo mode.
pub const SERVO_FREQUENCY: u32 = 50;

/// Narrowest pulse accepted in servo mode, in tenths of a microsecond.
pub const SERVO_ABSOLUTE_MIN: u32 = 10_000;
/// Widest pulse accepted in servo mode, in tenths of a microsecond.
pub const SERVO_ABSOLUTE_MAX: u32 = 20_000;
/// Pulse applied to servo channels at bring-up, in tenths of a microsecond.
pub const SERVO_CENTER: u32 = 15_000;

/// What a written value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Duty cycle in percent, 0 stops the output.
    #[default]
    Duty,
    /// Pulse width in tenths of a microsecond within `[min, max]`.
    Servo { min: u32, max: u32 },
}

impl Mode {
    /// Servo mode over the full absolute band.
    pub const fn servo() -> Self {
        Self::Servo {
            min: SERVO_ABSOLUTE_MIN,
            max: SERVO_ABSOLUTE_MAX,
        }
    }
}

/// When channels acquire their hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BringUp {
    /// Every channel is brought up while the controller is constructed.
    #[default]
    Eager,
    /// Each channel is brought up by its first open.
    OnOpen,
}

/// Controller configuration as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    /// Timer ids to expose; empty selects every PWM-capable timer.
    pub timers: Vec<u32>,
    /// Output frequency in Hz; `None` or zero selects the mode default.
    pub frequency: Option<u32>,
    pub mode: Mode,
    /// Run GPT10/GPT11 from the system clock rather than the 32 kHz clock.
    pub use_system_clock: bool,
    pub bring_up: BringUp,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            frequency: None,
            mode: Mode::Duty,
            use_system_clock: true,
            bring_up: BringUp::Eager,
        }
    }
}

impl ControllerConfig {
    /// Creates a new controller configuration builder.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }

    /// Validates the timer list and settles frequency and servo band.
    ///
    /// The configuration itself is left untouched; all adjustments land in
    /// the returned value.
    pub fn resolve(&self) -> PwmResult<ResolvedConfig> {
        let timers = self.resolve_timers()?;
        let mode = self.resolve_mode();
        let frequency = self.resolve_frequency(mode);

        Ok(ResolvedConfig {
            timers,
            settings: ChannelSettings {
                frequency,
                mode,
                use_system_clock: self.use_system_clock,
            },
            bring_up: self.bring_up,
        })
    }

    fn resolve_timers(&self) -> PwmResult<Vec<&'static TimerInfo>> {
        if self.timers.is_empty() {
            return Ok(PWM_TIMERS.iter().collect());
        }

        let mut timers: Vec<&'static TimerInfo> = Vec::with_capacity(self.timers.len());
        for &id in &self.timers {
            let timer = regs::lookup(id).ok_or(PwmError::UnknownTimer(id))?;
            if timers.iter().any(|seen| seen.id == id) {
                return Err(PwmError::DuplicateTimer(id));
            }
            timers.push(timer);
        }
        Ok(timers)
    }

    fn resolve_mode(&self) -> Mode {
        let Mode::Servo { min, max } = self.mode else {
            return Mode::Duty;
        };

        let mut band = (min, max);
        if band.0 < SERVO_ABSOLUTE_MIN {
            warn!("servo min {} raised to {SERVO_ABSOLUTE_MIN}", band.0);
            band.0 = SERVO_ABSOLUTE_MIN;
        }
        if band.1 > SERVO_ABSOLUTE_MAX {
            warn!("servo max {} lowered to {SERVO_ABSOLUTE_MAX}", band.1);
            band.1 = SERVO_ABSOLUTE_MAX;
        }
        if band.0 >= band.1 {
            warn!(
                "servo band {}..{} is empty, using {SERVO_ABSOLUTE_MIN}..{SERVO_ABSOLUTE_MAX}",
                band.0, band.1
            );
            band = (SERVO_ABSOLUTE_MIN, SERVO_ABSOLUTE_MAX);
        }

        Mode::Servo {
            min: band.0,
            max: band.1,
        }
    }

    fn resolve_frequency(&self, mode: Mode) -> u32 {
        let requested = self.frequency.filter(|&hz| hz > 0);
        match (mode, requested) {
            (Mode::Servo { .. }, Some(hz)) if hz != SERVO_FREQUENCY => {
                warn!("servo mode ignores frequency {hz} Hz, using {SERVO_FREQUENCY} Hz");
                SERVO_FREQUENCY
            }
            (Mode::Servo { .. }, _) => SERVO_FREQUENCY,
            (Mode::Duty, Some(hz)) => hz,
            (Mode::Duty, None) => DEFAULT_FREQUENCY,
        }
    }
}

/// Builder for ergonomic controller configuration construction.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    /// Replaces the timer list.
    pub fn timers<I: IntoIterator<Item = u32>>(mut self, ids: I) -> Self {
        self.config.timers = ids.into_iter().collect();
        self
    }

    /// Appends one timer to the list.
    pub fn timer(mut self, id: u32) -> Self {
        self.config.timers.push(id);
        self
    }

    /// Sets the output frequency in Hz.
    pub fn frequency(mut self, hz: u32) -> Self {
        self.config.frequency = Some(hz);
        self
    }

    /// Selects percentage duty-cycle mode.
    pub fn duty_mode(mut self) -> Self {
        self.config.mode = Mode::Duty;
        self
    }

    /// Selects servo mode with a pulse band in tenths of a microsecond.
    pub fn servo_mode(mut self, min: u32, max: u32) -> Self {
        self.config.mode = Mode::Servo { min, max };
        self
    }

    pub fn use_system_clock(mut self, enabled: bool) -> Self {
        self.config.use_system_clock = enabled;
        self
    }

    pub fn bring_up(mut self, bring_up: BringUp) -> Self {
        self.config.bring_up = bring_up;
        self
    }

    /// Builds the controller configuration.
    pub fn build(self) -> ControllerConfig {
        self.config
    }
}

/// Settings every channel of a controller shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSettings {
    /// Requested output frequency; each channel clamps its own copy.
    pub frequency: u32,
    pub mode: Mode,
    pub use_system_clock: bool,
}

/// A validated configuration, ready for controller construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub timers: Vec<&'static TimerInfo>,
    pub settings: ChannelSettings,
    pub bring_up: BringUp,
}

impl ResolvedConfig {
    pub fn timer_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.timers.iter().map(|timer| timer.id)
    }
}
