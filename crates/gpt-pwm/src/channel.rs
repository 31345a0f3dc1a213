//! One PWM channel: its register state, lock, and bring-up/teardown sequence.
//!
//! Bring-up runs pad routing, clock enable, the optional move to the system
//! clock, frequency programming and (in servo mode) centring. Each completed
//! step is pushed on an undo stack; if a later step fails the stack is popped
//! so the channel ends up exactly where it started.

use log::{debug, error, warn};

use crate::board::Board;
use crate::clock::{self, ClockRef};
use crate::config::{ChannelSettings, Mode, SERVO_CENTER};
use crate::error::{PwmError, PwmResult};
use crate::pinmux;
use crate::program::{self, FrequencyPlan};
use crate::regs::{ClockSource, TimerInfo, DEFAULT_TCLR};
use crate::sync::{Arc, Interrupt, Mutex, MutexGuard};

/// Capacity of a channel's status text buffer.
pub const STATUS_BUF_LEN: usize = 128;

/// Position of a channel in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    Uninit,
    PinRouted,
    ClockEnabled,
    /// Frequency programmed, output disabled.
    Stopped,
    /// Frequency programmed, output enabled.
    Running,
}

impl ChannelState {
    pub fn is_programmed(self) -> bool {
        self >= Self::Stopped
    }
}

/// Mutable channel state, only reachable through the channel lock.
#[derive(Debug)]
pub(crate) struct ChannelCore {
    pub(crate) timer: &'static TimerInfo,
    pub(crate) state: ChannelState,
    pub(crate) input_frequency: u32,
    pub(crate) plan: Option<FrequencyPlan>,
    pub(crate) compare: u32,
    pub(crate) control: u32,
    pub(crate) previous_pin_config: u16,
    pub(crate) pin_captured: bool,
    pub(crate) current_value: u32,
    pub(crate) clock: Option<ClockRef>,
    pub(crate) source: Option<ClockSource>,
    pub(crate) status: Option<heapless::String<STATUS_BUF_LEN>>,
    pub(crate) retired: bool,
}

impl ChannelCore {
    pub(crate) fn new(timer: &'static TimerInfo) -> Self {
        Self {
            timer,
            state: ChannelState::Uninit,
            input_frequency: 0,
            plan: None,
            compare: 0,
            control: DEFAULT_TCLR,
            previous_pin_config: 0,
            pin_captured: false,
            current_value: 0,
            clock: None,
            source: None,
            status: None,
            retired: false,
        }
    }

    pub(crate) fn programmed_plan(&self) -> PwmResult<FrequencyPlan> {
        self.plan
            .ok_or(PwmError::InvalidArgument("channel frequency not programmed"))
    }

    pub(crate) fn ensure_live(&self) -> PwmResult<()> {
        if self.retired {
            Err(PwmError::ShutDown)
        } else {
            Ok(())
        }
    }
}

/// Point-in-time copy of a channel's programmed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub id: u32,
    pub state: ChannelState,
    pub input_frequency: u32,
    pub plan: Option<FrequencyPlan>,
    pub compare: u32,
    pub control: u32,
    pub current_value: u32,
    pub previous_pin_config: u16,
    pub clock_source: Option<ClockSource>,
}

/// Clock and programming fields a failed source switch puts back.
#[derive(Debug, Clone, Copy)]
struct SavedProgram {
    source: Option<ClockSource>,
    input_frequency: u32,
    plan: Option<FrequencyPlan>,
    compare: u32,
    control: u32,
    current_value: u32,
    state: ChannelState,
}

impl SavedProgram {
    fn capture(core: &ChannelCore) -> Self {
        Self {
            source: core.source,
            input_frequency: core.input_frequency,
            plan: core.plan,
            compare: core.compare,
            control: core.control,
            current_value: core.current_value,
            state: core.state,
        }
    }

    fn restore(&self, core: &mut ChannelCore) {
        core.source = self.source;
        core.input_frequency = self.input_frequency;
        core.plan = self.plan;
        core.compare = self.compare;
        core.control = self.control;
        core.current_value = self.current_value;
        core.state = self.state;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BringUpStep {
    RoutePin,
    EnableClock,
    SelectHighRate,
    Program,
    CenterServo,
}

/// A timer bound to a PWM output, guarded by its own lock.
pub struct TimerChannel {
    timer: &'static TimerInfo,
    board: Arc<Board>,
    settings: ChannelSettings,
    core: Mutex<ChannelCore>,
}

impl TimerChannel {
    pub(crate) fn new(timer: &'static TimerInfo, board: Arc<Board>, settings: ChannelSettings) -> Self {
        Self {
            timer,
            board,
            settings,
            core: Mutex::new(ChannelCore::new(timer)),
        }
    }

    pub fn id(&self) -> u32 {
        self.timer.id
    }

    pub fn timer(&self) -> &'static TimerInfo {
        self.timer
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    pub fn state(&self) -> ChannelState {
        self.core.lock().state
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let core = self.core.lock();
        ChannelSnapshot {
            id: self.timer.id,
            state: core.state,
            input_frequency: core.input_frequency,
            plan: core.plan,
            compare: core.compare,
            control: core.control,
            current_value: core.current_value,
            previous_pin_config: core.previous_pin_config,
            clock_source: core.source,
        }
    }

    /// Brings the channel to the programmed state; a no-op if it is already
    /// there.
    pub fn initialize(&self, interrupt: &Interrupt) -> PwmResult<()> {
        let mut core = self.lock(interrupt)?;
        self.bring_up(&mut core)
    }

    /// Applies a duty cycle or pulse width according to the channel mode.
    pub fn set_value(&self, value: u32, interrupt: &Interrupt) -> PwmResult<()> {
        let mut core = self.lock(interrupt)?;
        core.ensure_live()?;
        self.apply_value(&mut core, value)
    }

    /// Moves a selectable timer to another input clock.
    ///
    /// A programmed channel is reprogrammed for the new input rate, and a
    /// running one has its current value re-applied against the new range.
    /// If reprogramming fails the selector goes back to the previous source
    /// and the channel keeps its previous plan and value.
    pub fn select_clock_source(&self, source: ClockSource, interrupt: &Interrupt) -> PwmResult<()> {
        let mut core = self.lock(interrupt)?;
        core.ensure_live()?;

        let saved = SavedProgram::capture(&core);
        clock::select_source(&self.board, &mut core, source)?;
        if !core.state.is_programmed() {
            return Ok(());
        }

        if let Err(err) = program::program_frequency(&self.board, &mut core, self.settings.frequency) {
            self.revert_source(&mut core, &saved, false);
            return Err(err);
        }
        if core.state == ChannelState::Running {
            let value = core.current_value;
            if let Err(err) = self.apply_value(&mut core, value) {
                self.revert_source(&mut core, &saved, true);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Releases everything bring-up acquired, in reverse order.
    ///
    /// Safe on a channel in any state, including one never brought up; steps
    /// that were never performed are skipped. The channel refuses further use
    /// afterwards.
    pub fn teardown(&self) {
        let mut core = self.core.lock();
        let board = self.board.as_ref();

        if core.state.is_programmed() {
            if let Err(err) = program::stop(board, &mut core) {
                warn!("gpt{}: stop during teardown failed: {err}", self.timer.id);
            }
            core.plan = None;
        }
        if core.source == Some(ClockSource::HighRate) {
            if let Err(err) = clock::switch_to_low_rate(board, &mut core) {
                warn!("gpt{}: clock source restore failed: {err}", self.timer.id);
            }
        }
        clock::disable(board, &mut core);
        if let Err(err) = pinmux::restore(board, &mut core) {
            warn!("gpt{}: {err}", self.timer.id);
        }

        core.state = ChannelState::Uninit;
        core.status = None;
        core.retired = true;
        debug!("gpt{}: torn down", self.timer.id);
    }

    pub(crate) fn lock(&self, interrupt: &Interrupt) -> PwmResult<MutexGuard<'_, ChannelCore>> {
        self.core.lock_interruptible(interrupt)
    }

    pub(crate) fn bring_up(&self, core: &mut ChannelCore) -> PwmResult<()> {
        core.ensure_live()?;
        if core.state.is_programmed() {
            return Ok(());
        }

        let mut completed: Vec<BringUpStep> = Vec::with_capacity(5);
        for step in self.bring_up_steps() {
            if let Err(err) = self.run_step(core, step) {
                error!(
                    "gpt{}: {step:?} failed ({err}), unwinding {} step(s)",
                    self.timer.id,
                    completed.len()
                );
                while let Some(done) = completed.pop() {
                    self.undo_step(core, done);
                }
                return Err(err);
            }
            completed.push(step);
        }

        debug!("gpt{}: ready", self.timer.id);
        Ok(())
    }

    pub(crate) fn apply_value(&self, core: &mut ChannelCore, value: u32) -> PwmResult<()> {
        match self.settings.mode {
            Mode::Duty => program::set_duty_percent(&self.board, core, value),
            Mode::Servo { min, max } => program::set_pulse_width(&self.board, core, value, (min, max)),
        }
    }

    /// Puts the selector and the programmed registers back as `saved` had
    /// them. `reload_written` says the timer already holds a reload for the
    /// new rate and must be reprogrammed. If that cannot be done the channel
    /// is stopped and left unprogrammed.
    fn revert_source(&self, core: &mut ChannelCore, saved: &SavedProgram, reload_written: bool) {
        let board = self.board.as_ref();
        error!(
            "gpt{}: clock switch failed, restoring {:?}",
            self.timer.id, saved.source
        );

        let previous = saved.source.unwrap_or(ClockSource::LowRate);
        if let Err(err) = clock::write_selector(board, self.timer, previous) {
            error!("gpt{}: selector restore failed: {err}", self.timer.id);
            self.abandon_program(core);
            return;
        }
        saved.restore(core);

        if reload_written {
            let restored = program::program_frequency(board, core, self.settings.frequency)
                .and_then(|()| match saved.state {
                    ChannelState::Running => self.apply_value(core, saved.current_value),
                    _ => Ok(()),
                });
            if let Err(err) = restored {
                error!("gpt{}: reprogram after revert failed: {err}", self.timer.id);
                self.abandon_program(core);
            }
        }
    }

    fn abandon_program(&self, core: &mut ChannelCore) {
        if let Err(err) = program::stop(self.board.as_ref(), core) {
            warn!("gpt{}: stop failed: {err}", self.timer.id);
        }
        core.plan = None;
        core.current_value = 0;
        core.state = ChannelState::ClockEnabled;
    }

    fn bring_up_steps(&self) -> Vec<BringUpStep> {
        let mut steps = vec![BringUpStep::RoutePin, BringUpStep::EnableClock];
        if self.settings.use_system_clock && self.timer.has_clock_select() {
            steps.push(BringUpStep::SelectHighRate);
        }
        steps.push(BringUpStep::Program);
        if let Mode::Servo { min, max } = self.settings.mode {
            if (min..=max).contains(&SERVO_CENTER) {
                steps.push(BringUpStep::CenterServo);
            }
        }
        steps
    }

    fn run_step(&self, core: &mut ChannelCore, step: BringUpStep) -> PwmResult<()> {
        let board = self.board.as_ref();
        match step {
            BringUpStep::RoutePin => {
                pinmux::capture_and_route(board, core)?;
                core.state = ChannelState::PinRouted;
            }
            BringUpStep::EnableClock => {
                clock::enable(board, core)?;
                core.state = ChannelState::ClockEnabled;
            }
            BringUpStep::SelectHighRate => clock::switch_to_high_rate(board, core)?,
            BringUpStep::Program => {
                program::stop(board, core)?;
                program::program_frequency(board, core, self.settings.frequency)?;
            }
            BringUpStep::CenterServo => self.apply_value(core, SERVO_CENTER)?,
        }
        Ok(())
    }

    fn undo_step(&self, core: &mut ChannelCore, step: BringUpStep) {
        let board = self.board.as_ref();
        let outcome = match step {
            BringUpStep::RoutePin => {
                let restored = pinmux::restore(board, core);
                if restored.is_ok() {
                    core.pin_captured = false;
                }
                core.state = ChannelState::Uninit;
                restored
            }
            BringUpStep::EnableClock => {
                clock::disable(board, core);
                core.state = ChannelState::PinRouted;
                Ok(())
            }
            BringUpStep::SelectHighRate => clock::switch_to_low_rate(board, core),
            BringUpStep::Program => {
                let stopped = program::stop(board, core);
                core.plan = None;
                core.state = ChannelState::ClockEnabled;
                stopped
            }
            BringUpStep::CenterServo => program::stop(board, core),
        };
        if let Err(err) = outcome {
            warn!("gpt{}: undo of {step:?} failed: {err}", self.timer.id);
        }
    }
}
