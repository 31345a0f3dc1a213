//! Line-oriented command session over a controller's channels.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use gpt_pwm::{ChannelHandle, Interrupt, PwmController, PwmError};
use log::debug;
use thiserror::Error;

/// Buffer handed to each channel read; large enough for any status line.
const READ_BUF_LEN: usize = 128;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid timer id `{0}`")]
    BadId(String),
}

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send `value` verbatim to the channel's write interface.
    Write { id: u32, value: String },
    Read { id: u32 },
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Usage(HELP));
        };

        let command = match verb {
            "write" | "w" => {
                const USAGE: &str = "write <id> <value>";
                let id = next_id(&mut words, USAGE)?;
                let value = words.next().ok_or(CommandError::Usage(USAGE))?;
                Self::Write {
                    id,
                    value: value.to_owned(),
                }
            }
            "read" | "r" => Self::Read {
                id: next_id(&mut words, "read <id>")?,
            },
            "status" | "s" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        Ok(command)
    }
}

fn next_id<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    usage: &'static str,
) -> Result<u32, CommandError> {
    let word = words.next().ok_or(CommandError::Usage(usage))?;
    word.parse()
        .map_err(|_| CommandError::BadId(word.to_owned()))
}

const HELP: &str = "write <id> <value> | read <id> | status | help | quit";

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Written { id: u32, bytes: usize },
    Line(String),
    /// The handle already delivered the current status.
    EndOfData { id: u32 },
    Status(Vec<String>),
    Help,
    Quit,
}

/// Keeps one open handle per channel touched during the session.
pub struct Session<'a> {
    controller: &'a PwmController,
    handles: BTreeMap<u32, ChannelHandle>,
    interrupt: Interrupt,
}

impl<'a> Session<'a> {
    pub fn new(controller: &'a PwmController, interrupt: Interrupt) -> Self {
        Self {
            controller,
            handles: BTreeMap::new(),
            interrupt,
        }
    }

    pub fn execute(&mut self, command: &Command) -> Result<Reply, PwmError> {
        match command {
            Command::Write { id, value } => {
                let interrupt = self.interrupt.clone();
                let bytes = self.handle(*id)?.write(value.as_bytes(), &interrupt)?;
                Ok(Reply::Written { id: *id, bytes })
            }
            Command::Read { id } => {
                let interrupt = self.interrupt.clone();
                let mut buf = [0u8; READ_BUF_LEN];
                let len = self.handle(*id)?.read(&mut buf, &interrupt)?;
                if len == 0 {
                    Ok(Reply::EndOfData { id: *id })
                } else {
                    Ok(Reply::Line(String::from_utf8_lossy(&buf[..len]).into_owned()))
                }
            }
            Command::Status => {
                let mut lines = Vec::new();
                for id in self.controller.channel_ids() {
                    let interrupt = self.interrupt.clone();
                    lines.push(self.handle(id)?.status(&interrupt)?);
                }
                Ok(Reply::Status(lines))
            }
            Command::Help => Ok(Reply::Help),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    /// Executes `lines` until one says quit or the input ends, printing each
    /// reply to `out`. Command and channel errors are printed and skipped.
    pub fn run<I, W>(&mut self, lines: I, out: &mut W) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = String>,
        W: Write,
    {
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    writeln!(out, "error: {err}")?;
                    continue;
                }
            };
            debug!("executing {command:?}");

            match self.execute(&command) {
                Ok(Reply::Quit) => break,
                Ok(reply) => print_reply(out, &reply)?,
                Err(PwmError::Interrupted) => {
                    writeln!(out, "interrupted")?;
                    break;
                }
                Err(err) => writeln!(out, "error: {err}")?,
            }
        }
        out.flush()?;
        Ok(())
    }

    fn handle(&mut self, id: u32) -> Result<&mut ChannelHandle, PwmError> {
        match self.handles.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let handle = self.controller.open(id, &self.interrupt)?;
                Ok(entry.insert(handle))
            }
        }
    }
}

/// Prints a reply in the form the console shows it.
pub fn print_reply<W: Write>(out: &mut W, reply: &Reply) -> std::io::Result<()> {
    match reply {
        Reply::Written { id, bytes } => writeln!(out, "PWM{id}: wrote {bytes} byte(s)"),
        Reply::Line(line) => write!(out, "{line}"),
        Reply::EndOfData { id } => writeln!(out, "PWM{id}: no new data"),
        Reply::Status(lines) => lines.iter().try_for_each(|line| write!(out, "{line}")),
        Reply::Help => writeln!(out, "{HELP}"),
        Reply::Quit => Ok(()),
    }
}
