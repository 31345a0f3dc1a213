//! Tests for ControllerConfig resolution and controller lifecycle.

use std::sync::Arc;

use gpt_pwm::config::{DEFAULT_FREQUENCY, SERVO_ABSOLUTE_MAX, SERVO_ABSOLUTE_MIN, SERVO_FREQUENCY};
use gpt_pwm::regs::{
    CLK_SYS_FREQ, CM_CLKSEL_CORE_OFFSET, CM_CORE_START, PADCONF_START, PWM_TIMERS,
};
use gpt_pwm::sim::{SimBoard, SIM_CLKSEL_RESET, SIM_PAD_RESET};
use gpt_pwm::{
    BringUp, ChannelState, ClockSource, ControllerConfig, Interrupt, Mode, PwmController, PwmError,
};

#[test]
fn controller_config_default() {
    let config = ControllerConfig::default();

    assert!(config.timers.is_empty());
    assert_eq!(config.frequency, None);
    assert_eq!(config.mode, Mode::Duty);
    assert!(config.use_system_clock);
    assert_eq!(config.bring_up, BringUp::Eager);
}

#[test]
fn controller_config_builder() {
    let config = ControllerConfig::builder()
        .timers([11, 8])
        .timer(9)
        .frequency(2000)
        .use_system_clock(false)
        .bring_up(BringUp::OnOpen)
        .build();

    assert_eq!(config.timers, vec![11, 8, 9]);
    assert_eq!(config.frequency, Some(2000));
    assert!(!config.use_system_clock);
    assert_eq!(config.bring_up, BringUp::OnOpen);
}

#[test]
fn empty_timer_list_selects_every_timer() {
    let resolved = ControllerConfig::default().resolve().unwrap();

    assert_eq!(resolved.timer_ids().collect::<Vec<_>>(), vec![8, 9, 10, 11]);
    assert_eq!(resolved.settings.frequency, DEFAULT_FREQUENCY);
}

#[test]
fn timer_list_keeps_its_order() {
    let resolved = ControllerConfig::builder()
        .timers([10, 8])
        .build()
        .resolve()
        .unwrap();

    assert_eq!(resolved.timer_ids().collect::<Vec<_>>(), vec![10, 8]);
}

#[test]
fn unknown_and_repeated_timers_are_rejected() {
    let unknown = ControllerConfig::builder().timers([8, 12]).build();
    assert_eq!(unknown.resolve(), Err(PwmError::UnknownTimer(12)));

    let repeated = ControllerConfig::builder().timers([9, 10, 9]).build();
    assert_eq!(repeated.resolve(), Err(PwmError::DuplicateTimer(9)));
}

#[test]
fn zero_frequency_selects_default() {
    let resolved = ControllerConfig::builder()
        .frequency(0)
        .build()
        .resolve()
        .unwrap();

    assert_eq!(resolved.settings.frequency, DEFAULT_FREQUENCY);
}

#[test]
fn servo_mode_forces_fifty_hertz() {
    let resolved = ControllerConfig::builder()
        .frequency(400)
        .servo_mode(12_000, 18_000)
        .build()
        .resolve()
        .unwrap();

    assert_eq!(resolved.settings.frequency, SERVO_FREQUENCY);
    assert_eq!(
        resolved.settings.mode,
        Mode::Servo {
            min: 12_000,
            max: 18_000
        }
    );
}

#[test]
fn servo_band_is_clamped_to_absolute_limits() {
    let resolved = ControllerConfig::builder()
        .servo_mode(5_000, 25_000)
        .build()
        .resolve()
        .unwrap();
    assert_eq!(resolved.settings.mode, Mode::servo());

    let inverted = ControllerConfig::builder()
        .servo_mode(19_000, 11_000)
        .build()
        .resolve()
        .unwrap();
    assert_eq!(
        inverted.settings.mode,
        Mode::Servo {
            min: SERVO_ABSOLUTE_MIN,
            max: SERVO_ABSOLUTE_MAX
        }
    );
}

#[test]
fn resolve_leaves_config_untouched() {
    let config = ControllerConfig::builder()
        .servo_mode(1, 2)
        .frequency(7)
        .build();
    let copy = config.clone();

    config.resolve().unwrap();

    assert_eq!(config, copy);
}

#[test]
fn controller_brings_up_every_channel() {
    let sim = Arc::new(SimBoard::new());
    let controller = PwmController::new(&ControllerConfig::default(), sim.clone()).unwrap();

    assert_eq!(controller.channel_ids(), vec![8, 9, 10, 11]);
    assert_eq!(controller.mode(), Mode::Duty);
    for id in controller.channel_ids() {
        assert_eq!(controller.channel(id).unwrap().state(), ChannelState::Stopped);
        assert_eq!(controller.frequency(id), Ok(DEFAULT_FREQUENCY));
    }
    assert_eq!(sim.live_mappings(), 0);
}

#[test]
fn frequency_is_clamped_per_channel() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder()
        .timers([8, 10])
        .frequency(20_000)
        .use_system_clock(false)
        .build();
    let controller = PwmController::new(&config, sim).unwrap();

    assert_eq!(controller.frequency(8), Ok(20_000));
    assert_eq!(controller.frequency(10), Ok(10_922));
    assert_eq!(controller.config().settings.frequency, 20_000);
}

#[test]
fn unknown_channel_is_reported() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder().timer(8).build();
    let controller = PwmController::new(&config, sim).unwrap();

    assert!(matches!(
        controller.open(9, &Interrupt::new()),
        Err(PwmError::NoSuchChannel(9))
    ));
    assert_eq!(controller.frequency(11), Err(PwmError::NoSuchChannel(11)));
}

#[test]
fn failed_bring_up_unwinds_earlier_channels() {
    let sim = Arc::new(SimBoard::new());
    sim.fail_clock_enable("gpt11_fck");

    let result = PwmController::new(&ControllerConfig::default(), sim.clone());

    assert!(matches!(result, Err(PwmError::ClockEnable(_))));
    for timer in PWM_TIMERS.iter() {
        assert_eq!(sim.read16(PADCONF_START + timer.pad_offset), SIM_PAD_RESET);
        assert!(!sim.clock_enabled(&timer.clock_name()));
        assert_eq!(sim.clock_refs(&timer.clock_name()), 0);
    }
    assert_eq!(sim.read32(CM_CORE_START + CM_CLKSEL_CORE_OFFSET), SIM_CLKSEL_RESET);
    assert_eq!(sim.live_mappings(), 0);
}

#[test]
fn shutdown_restores_board_once() {
    let sim = Arc::new(SimBoard::new());
    let controller = PwmController::new(&ControllerConfig::default(), sim.clone()).unwrap();

    controller.shutdown();
    assert!(controller.is_shut_down());
    for timer in PWM_TIMERS.iter() {
        assert_eq!(sim.read16(PADCONF_START + timer.pad_offset), SIM_PAD_RESET);
        assert!(!sim.clock_enabled(&timer.clock_name()));
    }
    assert_eq!(sim.read32(CM_CORE_START + CM_CLKSEL_CORE_OFFSET), SIM_CLKSEL_RESET);

    sim.clear_writes();
    controller.shutdown();
    drop(controller);
    assert!(sim.writes().is_empty());
}

#[test]
fn dropping_the_controller_shuts_it_down() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder().timer(10).build();
    drop(PwmController::new(&config, sim.clone()).unwrap());

    assert!(!sim.clock_enabled("gpt10_fck"));
    assert_eq!(sim.read32(CM_CORE_START + CM_CLKSEL_CORE_OFFSET), SIM_CLKSEL_RESET);
}

#[test]
fn on_open_channel_uses_a_source_chosen_before_open() {
    let sim = Arc::new(SimBoard::new());
    let config = ControllerConfig::builder()
        .timer(10)
        .use_system_clock(false)
        .bring_up(BringUp::OnOpen)
        .build();
    let controller = PwmController::new(&config, sim).unwrap();
    let interrupt = Interrupt::new();

    controller
        .channel(10)
        .unwrap()
        .select_clock_source(ClockSource::HighRate, &interrupt)
        .unwrap();
    let _handle = controller.open(10, &interrupt).unwrap();

    let snapshot = controller.channel(10).unwrap().snapshot();
    assert_eq!(snapshot.input_frequency, CLK_SYS_FREQ);
    assert_eq!(snapshot.plan.unwrap().usable_range, 12_693);
}

#[test]
fn errors_map_to_errno() {
    assert_eq!(PwmError::InvalidArgument("x").errno(), -22);
    assert_eq!(PwmError::Interrupted.errno(), -512);
    assert_eq!(PwmError::Map { base: 0, size: 4 }.errno(), -12);
    assert_eq!(PwmError::ClockUnavailable("gpt8_fck".into()).errno(), -19);
    assert_eq!(PwmError::RegisterAccess("pad configuration").errno(), -5);
    assert!(PwmError::Interrupted.is_retryable());
    assert!(!PwmError::ShutDown.is_retryable());
}
