//! Operating System Abstraction Layer (OSAL) for the ISP block core.
//!
//! The only blocking paths in the crate (idle polling and the Vvalid wait on
//! disable) go through this trait so they stay bounded and testable.

/// Device virtual address as seen by the ISP DMA engines.
pub type DmaAddr = u64;

/// Microseconds on the platform's monotonic clock.
pub type TimeStamp = u64;

/// Clock and delay services of the platform.
pub trait Osal {
    fn get_time_us(&self) -> TimeStamp;

    /// Busy-waits `us` microseconds.
    fn udelay(&self, us: u32);

    /// Sleeps at least `ms` milliseconds.
    fn msleep(&self, ms: u32);

    /// `timeout_us` passed since `start_time`.
    fn timeout_check(&self, start_time: TimeStamp, timeout_us: u32) -> bool {
        let elapsed = self.get_time_us().saturating_sub(start_time);
        elapsed >= timeout_us as u64
    }
}
