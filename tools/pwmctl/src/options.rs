//! Command-line options and their translation into a controller configuration.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use gpt_pwm::config::{SERVO_ABSOLUTE_MAX, SERVO_ABSOLUTE_MIN};
use gpt_pwm::{BringUp, ControllerConfig};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive OMAP35x timer PWM channels on a simulated board")]
pub struct Opts {
    /// Output frequency in Hz (ignored in servo mode).
    #[arg(long, value_name = "HZ")]
    pub frequency: Option<u32>,

    /// Comma-separated timer ids; all PWM-capable timers when omitted.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub timers: Vec<u32>,

    /// Interpret written values as pulse widths in tenths of a microsecond.
    #[arg(long)]
    pub servo: bool,

    #[arg(long, value_name = "TENTHS_US", requires = "servo")]
    pub servo_min: Option<u32>,

    #[arg(long, value_name = "TENTHS_US", requires = "servo")]
    pub servo_max: Option<u32>,

    /// Keep GPT10/GPT11 on the 32 kHz clock.
    #[arg(long = "no-system-clock")]
    pub no_system_clock: bool,

    /// Defer each channel's bring-up to its first use.
    #[arg(long)]
    pub lazy: bool,

    /// JSON controller configuration; replaces the options above.
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["frequency", "timers", "servo", "no_system_clock", "lazy"]
    )]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less log output; repeat to silence warnings.
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub action: Option<Action>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read commands from stdin, one per line.
    Run,
    /// Print every channel's status line and exit.
    Status,
}

impl Opts {
    pub fn action(&self) -> Action {
        self.action.unwrap_or(Action::Status)
    }

    pub fn log_level(&self) -> LevelFilter {
        match (self.verbose, self.quiet) {
            (0, 0) => LevelFilter::Info,
            (1, _) => LevelFilter::Debug,
            (v, _) if v > 1 => LevelFilter::Trace,
            (_, 1) => LevelFilter::Warn,
            (_, 2) => LevelFilter::Error,
            _ => LevelFilter::Off,
        }
    }

    /// Builds the controller configuration from the file or the flags.
    pub fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        if let Some(path) = &self.config {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()));
        }

        let mut builder = ControllerConfig::builder()
            .timers(self.timers.iter().copied())
            .use_system_clock(!self.no_system_clock)
            .bring_up(if self.lazy {
                BringUp::OnOpen
            } else {
                BringUp::Eager
            });
        if let Some(hz) = self.frequency {
            builder = builder.frequency(hz);
        }
        if self.servo {
            builder = builder.servo_mode(
                self.servo_min.unwrap_or(SERVO_ABSOLUTE_MIN),
                self.servo_max.unwrap_or(SERVO_ABSOLUTE_MAX),
            );
        }
        Ok(builder.build())
    }
}
