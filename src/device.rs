//! Interfaces of the services the block core runs on.
//!
//! The common control sequencer (PCC), the frame manager and the memory
//! allocator live outside this crate; the controller only sees them
//! through these traits.

use crate::{err::IspError, osal::DmaAddr};

/// Device-visible buffer handed out by an [`Allocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaBuffer {
    pub dva: DmaAddr,
    pub size: usize,
    pub name: &'static str,
    /// Allocator-private handle.
    pub handle: u64,
}

pub trait Allocator: Send {
    fn alloc(&mut self, size: usize, name: &'static str) -> Result<DmaBuffer, IspError>;

    fn free(&mut self, buf: DmaBuffer);

    /// Copies `data` into the buffer at `offset` and makes it visible to
    /// the device.
    fn write_for_device(&mut self, buf: &DmaBuffer, offset: usize, data: &[u8])
    -> Result<(), IspError>;
}

/// How the PCC applies the frame's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloaderMode {
    /// Registers were written over the APB bus already.
    #[default]
    ApbDirect,
    /// The C-loader fetches the register list from memory.
    DmaDirect,
}

/// Register list handed to the C-loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloaderCmd {
    pub mode: CloaderMode,
    pub header_dva: DmaAddr,
    pub header_num: u32,
}

/// Interrupt enables the PCC programs on `enable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PccEnableConfig {
    pub int_en: [u32; 2],
}

/// Trigger parameters of one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PccFrameConfig {
    pub fcount: u32,
    pub num_buffers: u32,
    pub int_grp_en: u32,
    /// Interrupt groups of the first, middle and last buffer of a batch.
    pub fro_int_grp_en: Option<[u32; 3]>,
    pub cotf_in: bool,
    pub cotf_out: bool,
    pub cloader: CloaderCmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PccDumpLevel {
    Status,
    Full,
}

/// Common control sequencer: final trigger, COREX dispatch and the
/// interrupt demultiplexer of one block.
pub trait Pcc: Send {
    fn enable(&mut self, cfg: &PccEnableConfig) -> Result<(), IspError>;

    fn disable(&mut self);

    fn shot(&mut self, frame: &PccFrameConfig) -> Result<(), IspError>;

    /// Status of interrupt line `line`, cleared when `clear` is set.
    fn get_interrupt_status(&mut self, line: usize, clear: bool) -> u32;

    fn reset(&mut self) -> Result<(), IspError>;

    /// Holds the queue channel (clock gating off) while `on`.
    fn set_queue_channel_gate(&mut self, on: bool);

    fn dump(&self, level: PccDumpLevel);
}

/// Why a frame left the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Success,
    LateFrame,
    InvalidFrameNumber,
    Drop,
}

/// Frame lifecycle collaborator.
pub trait FrameManager: Send {
    fn frame_start(&mut self, instance: u32, fcount: u32, num_buffers: u32);

    fn frame_done(&mut self, instance: u32, fcount: u32, reason: DoneReason);

    /// The block latched the configuration of `fcount`.
    fn config_lock(&mut self, _instance: u32, _fcount: u32) {}

    fn notify_error(&mut self, _instance: u32, _line: usize, _status: u32) {}

    /// Platform-wide debug snapshot.
    fn request_snapshot(&mut self, _instance: u32) {}
}
