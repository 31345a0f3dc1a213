//! Scoped access to physical register ranges.
//!
//! Nothing in the core keeps a mapping between operations: each access maps
//! the range, runs, and drops the window, which unmaps it.

use crate::error::PwmResult;

/// Typed view onto a mapped register range. Offsets are relative to the
/// mapped base.
pub trait RegisterWindow {
    fn read16(&self, offset: u32) -> u16;
    fn write16(&mut self, offset: u32, value: u16);
    fn read32(&self, offset: u32) -> u32;
    fn write32(&mut self, offset: u32, value: u32);
}

/// Source of register mappings. Dropping the returned window unmaps it.
pub trait MemoryMap: Send + Sync {
    /// Maps `size` bytes at physical address `base`.
    ///
    /// Fails with [`PwmError::Map`](crate::PwmError::Map) when the range
    /// cannot be mapped.
    fn map(&self, base: u32, size: u32) -> PwmResult<Box<dyn RegisterWindow + '_>>;
}

/// Maps `[base, base + size)`, hands the window to `f`, and unmaps it on every
/// exit path. A mapping failure is returned as-is; it is never retried.
pub fn with_register_window<M, T, F>(mem: &M, base: u32, size: u32, f: F) -> PwmResult<T>
where
    M: MemoryMap + ?Sized,
    F: FnOnce(&mut dyn RegisterWindow) -> PwmResult<T>,
{
    let mut window = mem.map(base, size)?;
    let result = f(&mut *window);
    drop(window);
    result
}
