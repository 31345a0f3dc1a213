//! The controller registry: one channel per configured timer, created once
//! and torn down once.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info};

use crate::board::{Board, Platform};
use crate::channel::TimerChannel;
use crate::config::{BringUp, ControllerConfig, Mode, ResolvedConfig};
use crate::device::ChannelHandle;
use crate::error::{PwmError, PwmResult};
use crate::sync::{Arc, Interrupt};

/// Owns every configured channel and the board they share.
///
/// Dropping the controller shuts it down if [`PwmController::shutdown`] was
/// not called already. Handles that outlive the controller fail with
/// [`PwmError::ShutDown`].
pub struct PwmController {
    config: ResolvedConfig,
    board: Arc<Board>,
    channels: Vec<Arc<TimerChannel>>,
    shut_down: AtomicBool,
}

impl PwmController {
    /// Resolves `config`, builds the channels and, for eager bring-up,
    /// initialises each of them in table order.
    ///
    /// If any channel fails to come up, the channels already initialised are
    /// torn down in reverse order and the error is returned.
    pub fn new(config: &ControllerConfig, platform: Arc<dyn Platform>) -> PwmResult<Self> {
        let config = config.resolve()?;
        let board = Board::new(platform);
        let channels: Vec<Arc<TimerChannel>> = config
            .timers
            .iter()
            .map(|&timer| Arc::new(TimerChannel::new(timer, Arc::clone(&board), config.settings)))
            .collect();

        if config.bring_up == BringUp::Eager {
            let interrupt = Interrupt::new();
            for (index, channel) in channels.iter().enumerate() {
                if let Err(err) = channel.initialize(&interrupt) {
                    error!("gpt{}: bring-up failed: {err}", channel.id());
                    for done in channels[..index].iter().rev() {
                        done.teardown();
                    }
                    return Err(err);
                }
            }
        }

        let controller = Self {
            config,
            board,
            channels,
            shut_down: AtomicBool::new(false),
        };
        controller.log_summary();
        Ok(controller)
    }

    /// Opens a handle on the channel for timer `id`.
    pub fn open(&self, id: u32, interrupt: &Interrupt) -> PwmResult<ChannelHandle> {
        if self.is_shut_down() {
            return Err(PwmError::ShutDown);
        }
        let channel = self.channel(id)?;
        ChannelHandle::open(Arc::clone(channel), interrupt)
    }

    pub fn channel(&self, id: u32) -> PwmResult<&Arc<TimerChannel>> {
        self.channels
            .iter()
            .find(|channel| channel.id() == id)
            .ok_or(PwmError::NoSuchChannel(id))
    }

    pub fn channels(&self) -> &[Arc<TimerChannel>] {
        &self.channels
    }

    pub fn channel_ids(&self) -> Vec<u32> {
        self.channels.iter().map(|channel| channel.id()).collect()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn mode(&self) -> Mode {
        self.config.settings.mode
    }

    /// Output frequency of a channel: its clamped value once programmed,
    /// the configured value before that.
    pub fn frequency(&self, id: u32) -> PwmResult<u32> {
        let snapshot = self.channel(id)?.snapshot();
        Ok(snapshot
            .plan
            .map_or(self.config.settings.frequency, |plan| plan.output_hz))
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Tears every channel down in reverse order. Only the first call does
    /// anything.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for channel in self.channels.iter().rev() {
            channel.teardown();
        }
        info!("PWM controller shut down ({} channel(s))", self.channels.len());
    }

    fn log_summary(&self) {
        let settings = &self.config.settings;
        let ids = self.channel_ids();
        match settings.mode {
            Mode::Duty => info!(
                "PWM controller: timers {ids:?}, {} Hz, duty cycle mode",
                settings.frequency
            ),
            Mode::Servo { min, max } => info!(
                "PWM controller: timers {ids:?}, {} Hz, servo mode {min}..{max}",
                settings.frequency
            ),
        }
    }
}

impl Drop for PwmController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
