use std::sync::Arc;

use gpt_pwm::sim::SimBoard;
use gpt_pwm::{ControllerConfig, Interrupt, PwmController, PwmError};

use crate::{Command, CommandError, Reply, Session};

fn controller(config: ControllerConfig) -> PwmController {
    PwmController::new(&config, Arc::new(SimBoard::new())).unwrap()
}

fn run(controller: &PwmController, script: &str) -> String {
    let mut session = Session::new(controller, Interrupt::new());
    let mut out = Vec::new();
    session
        .run(script.lines().map(str::to_owned), &mut out)
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn parses_commands() {
    assert_eq!(
        "write 10 0x20".parse::<Command>(),
        Ok(Command::Write {
            id: 10,
            value: "0x20".into()
        })
    );
    assert_eq!("r 9".parse::<Command>(), Ok(Command::Read { id: 9 }));
    assert_eq!("status".parse::<Command>(), Ok(Command::Status));
    assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
}

#[test]
fn rejects_malformed_commands() {
    assert_eq!(
        "blink 8".parse::<Command>(),
        Err(CommandError::Unknown("blink".into()))
    );
    assert_eq!(
        "read ten".parse::<Command>(),
        Err(CommandError::BadId("ten".into()))
    );
    assert!(matches!(
        "write 8".parse::<Command>(),
        Err(CommandError::Usage(_))
    ));
}

#[test]
fn status_lists_every_channel() {
    let controller = controller(ControllerConfig::builder().timers([8, 11]).build());
    let mut session = Session::new(&controller, Interrupt::new());

    let reply = session.execute(&Command::Status).unwrap();

    assert_eq!(
        reply,
        Reply::Status(vec![
            "PWM8 Frequency 1024 Hz Stopped\n".into(),
            "PWM11 Frequency 1024 Hz Stopped\n".into(),
        ])
    );
}

#[test]
fn script_writes_then_reads() {
    let controller = controller(
        ControllerConfig::builder()
            .timer(10)
            .use_system_clock(false)
            .build(),
    );

    let output = run(
        &controller,
        "# set half duty\nwrite 10 50\nread 10\nread 10\nquit\nread 10\n",
    );

    assert_eq!(
        output,
        "PWM10: wrote 2 byte(s)\n\
         PWM10 Frequency 1024 Hz Duty Cycle 50%\n\
         PWM10: no new data\n"
    );
}

#[test]
fn errors_are_reported_and_skipped() {
    let controller = controller(ControllerConfig::builder().timer(8).build());

    let output = run(&controller, "write 8 250\nread 9\nbogus\nwrite 8 0\n");

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("error: invalid argument"));
    assert_eq!(lines[1], format!("error: {}", PwmError::NoSuchChannel(9)));
    assert_eq!(lines[2], "error: unknown command `bogus`");
    assert_eq!(lines[3], "PWM8: wrote 1 byte(s)");
}
