
use crate::board::Board;
use crate::channel::TimerChannel;
use crate::config::{ChannelSettings, Mode};
use crate::regs::{self, TimerInfo};
use crate::sim::SimBoard;
use crate::sync::Arc;

fn sim_board() -> (Arc<SimBoard>, Arc<Board>) {
    let sim = Arc::new(SimBoard::new());
    let board = Board::new(sim.clone());
    (sim, board)
}

fn timer(id: u32) -> &'static TimerInfo {
    regs::lookup(id).unwrap()
}

fn duty_settings(use_system_clock: bool) -> ChannelSettings {
    ChannelSettings {
        frequency: 1024,
        mode: Mode::Duty,
        use_system_clock,
    }
}

fn servo_settings() -> ChannelSettings {
    ChannelSettings {
        frequency: 50,
        mode: Mode::servo(),
        use_system_clock: true,
    }
}

fn channel(board: &Arc<Board>, id: u32, settings: ChannelSettings) -> TimerChannel {
    TimerChannel::new(timer(id), Arc::clone(board), settings)
}
