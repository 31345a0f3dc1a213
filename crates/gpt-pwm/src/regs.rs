//! OMAP35x register map for the PWM-capable general-purpose timers.
//!
//! Addresses and bit positions come from the OMAP35x Technical Reference
//! Manual (general-purpose timer, system control module pad configuration
//! and CORE clock management chapters).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timer register block
// ---------------------------------------------------------------------------

/// Size of one general-purpose timer register page.
pub const GPT_REGS_PAGE_SIZE: u32 = 4096;

/// Timer control register.
pub const GPT_TCLR: u32 = 0x024;
/// Live counter register.
pub const GPT_TCRR: u32 = 0x028;
/// Load (reload) register, copied into TCRR on overflow.
pub const GPT_TLDR: u32 = 0x02C;
/// Match (compare) register.
pub const GPT_TMAR: u32 = 0x038;

/// TCLR: start/stop the counter.
pub const TCLR_ST: u32 = 1 << 0;
/// TCLR: auto-reload from TLDR on overflow.
pub const TCLR_AR: u32 = 1 << 1;
/// TCLR: compare enable.
pub const TCLR_CE: u32 = 1 << 6;
/// TCLR: trigger output on overflow and match.
pub const TCLR_TRG_OVFL_MATCH: u32 = 0b10 << 10;
/// TCLR: toggle (rather than pulse) the output on trigger.
pub const TCLR_PT: u32 = 1 << 12;

/// Control word of a programmed but stopped PWM timer.
pub const DEFAULT_TCLR: u32 = TCLR_PT | TCLR_TRG_OVFL_MATCH | TCLR_CE | TCLR_AR;

// ---------------------------------------------------------------------------
// Pad configuration (pin mux)
// ---------------------------------------------------------------------------

/// Start of the system control module pad configuration block.
pub const PADCONF_START: u32 = 0x4800_2030;
/// Size of the pad configuration block.
pub const PADCONF_SIZE: u32 = 0x05CC;
/// Pad encoding routing a pin to its timer PWM output (mode 2, pulls off).
pub const PWM_ENABLE_MUX: u16 = 0x0002;

// ---------------------------------------------------------------------------
// CORE clock management
// ---------------------------------------------------------------------------

/// Start of the CORE clock management register block.
pub const CM_CORE_START: u32 = 0x4800_4000;
/// Size of the CORE clock management register block.
pub const CM_CORE_SIZE: u32 = 0x1000;
/// CM_CLKSEL_CORE, holding the GPT10/GPT11 source selectors.
pub const CM_CLKSEL_CORE_OFFSET: u32 = 0x0A40;

/// CM_CLKSEL_CORE: GPT10 runs from the system clock when set.
pub const CLKSEL_GPT10: u32 = 0x40;
/// CM_CLKSEL_CORE: GPT11 runs from the system clock when set.
pub const CLKSEL_GPT11: u32 = 0x80;

/// Rate of the always-on 32 kHz clock.
pub const CLK_32K_FREQ: u32 = 32_768;
/// Rate of the system clock.
pub const CLK_SYS_FREQ: u32 = 13_000_000;

// ---------------------------------------------------------------------------
// Timer table
// ---------------------------------------------------------------------------

/// Static description of one PWM-capable timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerInfo {
    /// Timer number (GPT8..GPT11).
    pub id: u32,
    /// Offset of the timer's output pad inside the pad configuration block.
    pub pad_offset: u32,
    /// Physical base of the timer register page.
    pub base: u32,
    /// Source-select bit in CM_CLKSEL_CORE, for timers that have one.
    pub clksel_bit: Option<u32>,
}

impl TimerInfo {
    /// Name of the timer's functional clock in the clock tree.
    pub fn clock_name(&self) -> String {
        format!("gpt{}_fck", self.id)
    }

    /// Whether the timer can be moved between the 32 kHz and system clocks.
    pub fn has_clock_select(&self) -> bool {
        self.clksel_bit.is_some()
    }
}

/// Every timer that can drive a PWM pin, in bring-up order.
pub static PWM_TIMERS: [TimerInfo; 4] = [
    TimerInfo {
        id: 8,
        pad_offset: 0x4800_217A - PADCONF_START,
        base: 0x4903_E000,
        clksel_bit: None,
    },
    TimerInfo {
        id: 9,
        pad_offset: 0x4800_2174 - PADCONF_START,
        base: 0x4904_0000,
        clksel_bit: None,
    },
    TimerInfo {
        id: 10,
        pad_offset: 0x4800_2176 - PADCONF_START,
        base: 0x4808_6000,
        clksel_bit: Some(CLKSEL_GPT10),
    },
    TimerInfo {
        id: 11,
        pad_offset: 0x4800_2178 - PADCONF_START,
        base: 0x4808_8000,
        clksel_bit: Some(CLKSEL_GPT11),
    },
];

/// Looks up the table entry for a timer id.
pub fn lookup(id: u32) -> Option<&'static TimerInfo> {
    PWM_TIMERS.iter().find(|timer| timer.id == id)
}

/// Input clock a selectable timer runs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClockSource {
    /// Always-on 32 kHz clock.
    LowRate,
    /// System clock.
    HighRate,
}

impl ClockSource {
    /// Known rate of the source in Hz.
    pub fn frequency(self) -> u32 {
        match self {
            Self::LowRate => CLK_32K_FREQ,
            Self::HighRate => CLK_SYS_FREQ,
        }
    }
}
