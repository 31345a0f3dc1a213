use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gpt_pwm::sim::SimBoard;
use gpt_pwm::{Interrupt, PwmController};
use log::{info, warn};
use pwmctl::session::{print_reply, Reply};
use pwmctl::{logger, Action, Command, Opts, Session};

/// How often the stdin loop checks for Ctrl-C while waiting for a line.
const INPUT_POLL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logger::init(opts.log_level()).context("installing logger")?;

    let config = opts.controller_config()?;
    let board = Arc::new(SimBoard::new());
    let controller =
        PwmController::new(&config, board).context("bringing up PWM controller")?;

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        ctrlc::set_handler(move || interrupt.raise()).context("installing Ctrl-C handler")?;
    }

    let mut session = Session::new(&controller, interrupt.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match opts.action() {
        Action::Status => session
            .execute(&Command::Status)
            .map_err(anyhow::Error::from)
            .and_then(|reply| print_reply(&mut out, &reply).map_err(Into::into)),
        Action::Run => {
            info!("reading commands from stdin; `help` lists them");
            print_reply(&mut out, &Reply::Help)?;
            session.run(stdin_lines(interrupt.clone()), &mut out)
        }
    };

    if interrupt.is_raised() {
        warn!("interrupted");
    }
    drop(session);
    controller.shutdown();
    result
}

/// Lines from stdin, read on a helper thread so Ctrl-C can end the session
/// while a read is pending.
fn stdin_lines(interrupt: Interrupt) -> impl Iterator<Item = String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    std::iter::from_fn(move || loop {
        if interrupt.is_raised() {
            return None;
        }
        match rx.recv_timeout(INPUT_POLL) {
            Ok(line) => return Some(line),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    })
}
