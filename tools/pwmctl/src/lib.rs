//! Console front end for `gpt-pwm`.
//!
//! Builds a controller on the simulated board from command-line options (or a
//! JSON configuration file) and exposes each channel through a line-oriented
//! command session, so the channel text interface can be exercised without
//! target hardware.

pub mod logger;
pub mod options;
pub mod session;

pub use options::{Action, Opts};
pub use session::{Command, CommandError, Reply, Session};

#[cfg(test)]
mod tests;
