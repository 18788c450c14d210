//! Previous-frame feedback buffers of the temporal mixer.
//!
//! The mixer reads the previous output and writes the current one. Each
//! plane (image and weight) owns two buffers in a [`FeedbackArena`]; the
//! roles flip once per frame unless one of the [`SwapConditions`] holds.

use alloc::vec::Vec;

use crate::{
    config::{Mtnr0Config, TnrMode},
    device::{Allocator, DmaBuffer},
    dma::{
        CompMode, DmaFormat, LossyQuality, SbwcType, align_up, header_stride, image_stride,
        payload_stride,
    },
    err::IspError,
    geometry::StripeInput,
    osal::DmaAddr,
    registers::dma::MAX_BATCH,
};

/// Internal buffer users of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subdev {
    L0YIn,
    L0WIn,
    L0YOut,
    L0WOut,
    L0YIn2nr,
    L0WIn2nr,
    L0YOut2nr,
    L0WOut2nr,
}

impl Subdev {
    pub const NORMAL: [Subdev; 4] = [Subdev::L0YIn, Subdev::L0WIn, Subdev::L0YOut, Subdev::L0WOut];
    pub const RECURSIVE_2NR: [Subdev; 4] = [
        Subdev::L0YIn2nr,
        Subdev::L0WIn2nr,
        Subdev::L0YOut2nr,
        Subdev::L0WOut2nr,
    ];

    pub fn is_weight(self) -> bool {
        matches!(
            self,
            Subdev::L0WIn | Subdev::L0WOut | Subdev::L0WIn2nr | Subdev::L0WOut2nr
        )
    }

    /// Output subdevs start as the write side of their arena.
    pub fn is_output(self) -> bool {
        matches!(
            self,
            Subdev::L0YOut | Subdev::L0WOut | Subdev::L0YOut2nr | Subdev::L0WOut2nr
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Subdev::L0YIn => "MTNR0_L0Y_IN",
            Subdev::L0WIn => "MTNR0_L0W_IN",
            Subdev::L0YOut => "MTNR0_L0Y_OUT",
            Subdev::L0WOut => "MTNR0_L0W_OUT",
            Subdev::L0YIn2nr => "MTNR0_L0Y_IN_2NR",
            Subdev::L0WIn2nr => "MTNR0_L0W_IN_2NR",
            Subdev::L0YOut2nr => "MTNR0_L0Y_OUT_2NR",
            Subdev::L0WOut2nr => "MTNR0_L0W_OUT_2NR",
        }
    }
}

/// Geometry of the feedback image, taken from the previous-frame write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufInfo {
    pub width: u32,
    pub height: u32,
    pub bits: u32,
    pub sbwc: SbwcType,
    pub still: bool,
    pub cache_32b_pa: bool,
}

const COMP_BLOCK_W: u32 = 32;
const COMP_BLOCK_H: u32 = 4;

/// Bytes one frame of `subdev` takes.
///
/// Still capture keeps only the weight planes; its image planes are rejected.
pub fn buffer_size(subdev: Subdev, info: &BufInfo) -> Result<usize, IspError> {
    if info.width == 0 || info.height == 0 {
        return Err(IspError::InvalidGeometry("zero feedback size"));
    }

    if subdev.is_weight() {
        let size = align_up(info.width / 2, 16) * (info.height / 2 + 4);
        return Ok(size as usize);
    }
    if info.still {
        return Err(IspError::InvalidArgument);
    }

    // Luma of a custom request is lossy; only chroma would stay lossless.
    let y_type = match info.sbwc {
        SbwcType::LossyCustom32 => SbwcType::Lossy32,
        SbwcType::LossyCustom64 => SbwcType::Lossy64,
        other => other,
    };
    let (comp, align_64b) = y_type.comp_sbwc_en();
    let align_64b = align_64b || (info.cache_32b_pa && comp != CompMode::None);
    let quality = if comp == CompMode::Lossy {
        LossyQuality::Footprint
    } else {
        LossyQuality::Visual
    };

    let size = match comp {
        CompMode::None => {
            let stride = image_stride(
                info.bits,
                info.bits,
                DmaFormat::Y,
                align_up(info.width, 32),
                16,
                true,
            );
            stride * align_up(info.height, 4)
        }
        CompMode::Lossless | CompMode::Lossy => {
            let rows = info.height.div_ceil(COMP_BLOCK_H);
            let payload = payload_stride(
                comp,
                info.bits,
                info.width,
                align_64b,
                quality,
                COMP_BLOCK_W,
                COMP_BLOCK_H,
            );
            payload * rows + header_stride(info.width, COMP_BLOCK_W, 16) * rows
        }
    };

    Ok(size as usize)
}

/// Two buffers of one plane with an index naming the write target.
#[derive(Debug)]
pub struct FeedbackArena {
    bufs: [Option<DmaBuffer>; 2],
    writer: usize,
}

impl FeedbackArena {
    pub fn new() -> Self {
        Self {
            bufs: [None, None],
            writer: 1,
        }
    }

    pub fn is_allocated(&self, output: bool) -> bool {
        self.bufs[self.index(output)].is_some()
    }

    fn index(&self, output: bool) -> usize {
        if output { self.writer } else { 1 - self.writer }
    }

    fn put(&mut self, output: bool, buf: DmaBuffer) {
        let idx = self.index(output);
        self.bufs[idx] = Some(buf);
    }

    fn take(&mut self, output: bool) -> Option<DmaBuffer> {
        let idx = self.index(output);
        self.bufs[idx].take()
    }

    /// Buffer holding the previous frame.
    pub fn prev(&self) -> Option<&DmaBuffer> {
        self.bufs[1 - self.writer].as_ref()
    }

    /// Buffer the current frame is written to.
    pub fn cur(&self) -> Option<&DmaBuffer> {
        self.bufs[self.writer].as_ref()
    }

    pub fn swap_feedback_slots(&mut self) {
        self.writer = 1 - self.writer;
    }

    fn drain(&mut self) -> impl Iterator<Item = DmaBuffer> + '_ {
        self.writer = 1;
        self.bufs.iter_mut().filter_map(Option::take)
    }
}

impl Default for FeedbackArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Image and weight arenas of one feedback path.
#[derive(Debug, Default)]
pub struct FeedbackSet {
    pub image: FeedbackArena,
    pub weight: FeedbackArena,
}

impl FeedbackSet {
    pub fn new() -> Self {
        Self {
            image: FeedbackArena::new(),
            weight: FeedbackArena::new(),
        }
    }

    fn arena(&self, subdev: Subdev) -> &FeedbackArena {
        if subdev.is_weight() { &self.weight } else { &self.image }
    }

    fn arena_mut(&mut self, subdev: Subdev) -> &mut FeedbackArena {
        if subdev.is_weight() {
            &mut self.weight
        } else {
            &mut self.image
        }
    }

    pub fn is_allocated(&self, subdev: Subdev) -> bool {
        self.arena(subdev).is_allocated(subdev.is_output())
    }

    pub fn allocated_count(&self) -> usize {
        self.image.bufs.iter().chain(self.weight.bufs.iter()).filter(|b| b.is_some()).count()
    }

    /// Allocates every missing buffer of `subdevs`.
    ///
    /// A subdev whose size cannot be resolved is skipped. If an allocation
    /// fails, the buffers allocated by this call are freed again.
    pub fn alloc(
        &mut self,
        subdevs: &[Subdev],
        info: &BufInfo,
        alloc: &mut dyn Allocator,
    ) -> Result<(), IspError> {
        let mut done: Vec<Subdev> = Vec::new();

        for &sd in subdevs {
            if self.is_allocated(sd) {
                continue;
            }
            let size = match buffer_size(sd, info) {
                Ok(size) => size,
                Err(e) => {
                    debug!("[MTNR0] {}: no buffer ({})", sd.name(), e);
                    continue;
                }
            };

            match alloc.alloc(size, sd.name()) {
                Ok(buf) => {
                    info!(
                        "[MTNR0] {}: alloc {} bytes at {:#x}",
                        sd.name(),
                        size,
                        buf.dva
                    );
                    self.arena_mut(sd).put(sd.is_output(), buf);
                    done.push(sd);
                }
                Err(e) => {
                    error!("[MTNR0] {}: failed to alloc {} bytes", sd.name(), size);
                    for prev in done {
                        if let Some(buf) = self.arena_mut(prev).take(prev.is_output()) {
                            alloc.free(buf);
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    pub fn swap_feedback_slots(&mut self) {
        self.image.swap_feedback_slots();
        self.weight.swap_feedback_slots();
    }

    pub fn free_all(&mut self, alloc: &mut dyn Allocator) {
        for buf in self.image.drain().chain(self.weight.drain()) {
            debug!("[MTNR0] free {} at {:#x}", buf.name, buf.dva);
            alloc.free(buf);
        }
    }
}

/// The mixer skips the blend and reuses its previous output.
pub fn skip_mix(cfg: &Mtnr0Config) -> bool {
    cfg.skip_wdma && !cfg.still_en && cfg.mixer_mode == TnrMode::Normal
}

/// More stripes of the same frame follow this one.
pub fn partial_stripe(stripe: &StripeInput) -> bool {
    stripe.is_partial()
}

/// An even batch ends on the buffer it started on.
pub fn even_batch(num_buffers: u32) -> bool {
    num_buffers > 1 && num_buffers % 2 == 0
}

/// Exception conditions that keep the feedback roles in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapConditions {
    pub skip_mix: bool,
    pub partial_stripe: bool,
    pub even_batch: bool,
}

impl SwapConditions {
    pub fn new(cfg: &Mtnr0Config, stripe: &StripeInput, num_buffers: u32) -> Self {
        Self {
            skip_mix: skip_mix(cfg),
            partial_stripe: partial_stripe(stripe),
            even_batch: even_batch(num_buffers),
        }
    }

    /// Flip the arena roles after this frame.
    pub fn swap_frame(&self) -> bool {
        !(self.skip_mix || self.partial_stripe || self.even_batch)
    }

    /// Alternate the roles between odd and even buffers of a batch.
    pub fn swap_fro(&self) -> bool {
        !(self.skip_mix || self.partial_stripe)
    }
}

/// Per-buffer read and write addresses of one feedback plane.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchAddrs {
    pub read: Vec<DmaAddr>,
    pub write: Vec<DmaAddr>,
}

/// Fills one address per batch buffer. Buffer 0 reads `prev` and writes
/// `cur`; odd buffers trade the two when `swap_fro` is set.
pub fn fill_batch_addresses(
    prev: DmaAddr,
    cur: DmaAddr,
    num_buffers: u32,
    swap_fro: bool,
) -> BatchAddrs {
    let nb = (num_buffers.max(1) as usize).min(MAX_BATCH);
    let mut out = BatchAddrs {
        read: Vec::with_capacity(nb),
        write: Vec::with_capacity(nb),
    };

    for b in 0..nb {
        if swap_fro && b % 2 == 1 {
            out.read.push(cur);
            out.write.push(prev);
        } else {
            out.read.push(prev);
            out.write.push(cur);
        }
    }

    out
}
