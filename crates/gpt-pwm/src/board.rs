//! The hardware seam shared by every channel of a controller.

use crate::clock::ClockTree;
use crate::sync::{Arc, Mutex};
use crate::window::MemoryMap;

/// Everything the timer core needs from the host: register mappings and a
/// clock tree.
pub trait Platform: MemoryMap + ClockTree {}

impl<T: MemoryMap + ClockTree> Platform for T {}

/// Host platform plus the process-wide lock guarding CM_CLKSEL_CORE.
///
/// The selector register carries bits for more than one timer, so its
/// read-modify-write is serialised here rather than under any channel lock.
pub struct Board {
    platform: Arc<dyn Platform>,
    clock_select: Mutex<()>,
}

impl Board {
    pub fn new(platform: Arc<dyn Platform>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            clock_select: Mutex::new(()),
        })
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub(crate) fn clock_select(&self) -> &Mutex<()> {
        &self.clock_select
    }
}
