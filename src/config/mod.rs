//! Per-block hardware constants and per-stream block configuration.
//!
//! [`HwConfig`] carries everything that differs between block revisions and
//! is fixed for the lifetime of a controller. [`Mtnr0Config`] is the tuning
//! side's view of one stream and may change before every shot.

use crate::{
    irq::{IrqLayout, MTNR0_IRQ_LAYOUT, RGBP_IRQ_LAYOUT},
    registers::{
        SpaceLayout,
        consts::{COREX_STRIDE, OFFSET_MAX_REGISTER},
        mtnr0::{ACCESS_TABLE, INT0_EN_MASK, INT1_EN_MASK},
        rgbp,
    },
};

/// PCC interrupt group ids.
pub const PCC_INT_GRP_FRAME_START: u32 = 0;
pub const PCC_INT_GRP_FRAME_END: u32 = 1;
pub const PCC_INT_GRP_ERR_CRPT: u32 = 2;
pub const PCC_INT_GRP_CMDQ_HOLD: u32 = 3;
pub const PCC_INT_GRP_SETTING_DONE: u32 = 4;
pub const PCC_INT_GRP_DEBUG: u32 = 5;
pub const PCC_INT_GRP_ENABLE_ALL: u32 = 7;

/// Interrupt group enables for the first, middle and last buffer of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FroIntGroups {
    pub first: u32,
    pub middle: u32,
    pub last: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IspBlock {
    Mtnr0V13,
    /// Frame-row latched variant: the configuration of a frame is only
    /// taken on its row interrupt.
    RgbpV13,
}

#[derive(Debug, Clone)]
pub struct HwConfig {
    pub ty: IspBlock,
    pub name: &'static str,
    pub num_corexs: u32,
    pub corex_stride: u32,
    pub dma_addr_shift: u32,
    pub max_register: u32,
    /// Upper bound of idleness polls after a reset.
    pub idle_try_count: u32,
    /// Delay between two idleness polls.
    pub idle_poll_us: u32,
    /// How long `disable` waits for the running frame to end.
    pub stop_timeout_ms: u32,
    pub cloader_payload_size: usize,
    pub cloader_header_size: usize,
    pub comp_block_width: u32,
    pub comp_block_height: u32,
    /// DMA engines can issue 32-byte partial accesses on compressed planes.
    pub cache_32b_pa: bool,
    /// Pixels trimmed from each margin of an OTF stripe, when the block crops them.
    pub strip_otf_margin_crop: Option<u32>,
    pub stream_count: usize,
    pub int_en: [u32; 2],
    pub int_grp_en: u32,
    pub int_grp_en_fro: FroIntGroups,
    pub irq: IrqLayout,
}

impl HwConfig {
    pub fn new(ty: IspBlock) -> Self {
        match ty {
            IspBlock::Mtnr0V13 => Self::new_mtnr0_v13(),
            IspBlock::RgbpV13 => Self::new_rgbp_v13(),
        }
    }

    fn new_mtnr0_v13() -> Self {
        Self {
            ty: IspBlock::Mtnr0V13,
            name: "MTNR0",
            num_corexs: 2,
            corex_stride: COREX_STRIDE,
            dma_addr_shift: 4,
            max_register: OFFSET_MAX_REGISTER,
            idle_try_count: 20000,
            idle_poll_us: 3,
            stop_timeout_ms: 250,
            cloader_payload_size: 0x8000,
            cloader_header_size: 0x2000,
            comp_block_width: 32,
            comp_block_height: 4,
            cache_32b_pa: false,
            strip_otf_margin_crop: None,
            stream_count: 4,
            int_en: [INT0_EN_MASK, INT1_EN_MASK],
            int_grp_en: (1 << PCC_INT_GRP_FRAME_START)
                | (1 << PCC_INT_GRP_FRAME_END)
                | (1 << PCC_INT_GRP_ERR_CRPT)
                | (1 << PCC_INT_GRP_CMDQ_HOLD)
                | (1 << PCC_INT_GRP_SETTING_DONE)
                | (1 << PCC_INT_GRP_DEBUG)
                | (1 << PCC_INT_GRP_ENABLE_ALL),
            int_grp_en_fro: FroIntGroups {
                first: 1 << PCC_INT_GRP_FRAME_START,
                middle: 0,
                last: 1 << PCC_INT_GRP_FRAME_END,
            },
            irq: MTNR0_IRQ_LAYOUT,
        }
    }

    fn new_rgbp_v13() -> Self {
        Self {
            ty: IspBlock::RgbpV13,
            name: "RGBP",
            int_en: [rgbp::INT0_EN_MASK, rgbp::INT1_EN_MASK],
            irq: RGBP_IRQ_LAYOUT,
            ..Self::new_mtnr0_v13()
        }
    }

    pub fn space_layout(&self) -> SpaceLayout {
        SpaceLayout {
            num_corexs: self.num_corexs,
            corex_stride: self.corex_stride,
            dma_addr_shift: self.dma_addr_shift,
            access: ACCESS_TABLE,
        }
    }
}

/// Temporal mixing mode of the L0 mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum TnrMode {
    /// First frame of a sequence: nothing to mix with yet.
    #[default]
    Prepare = 0,
    First = 1,
    Normal = 2,
    Fusion = 3,
}

impl TnrMode {
    pub fn next_debug_cycle(self) -> Self {
        match self {
            TnrMode::Prepare => TnrMode::First,
            TnrMode::First => TnrMode::Normal,
            TnrMode::Normal | TnrMode::Fusion => TnrMode::Prepare,
        }
    }
}

/// Per-stream MTNR0 block configuration, supplied by the tuning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mtnr0Config {
    pub still_last_frame_en: bool,
    pub l0_bypass: bool,
    pub mvc_en: bool,
    pub mvc_in_w: u32,
    pub mvc_in_h: u32,
    pub mvc_out_w: u32,
    pub mvc_out_h: u32,
    pub geomatch_en: bool,
    pub mixer_en: bool,
    pub mixer_mode: TnrMode,
    pub still_en: bool,
    pub img_l0_bit: u32,
    pub wgt_l0_bit: u32,
    pub skip_wdma: bool,
    pub contents_aware_en: bool,
}

impl Default for Mtnr0Config {
    fn default() -> Self {
        Self {
            still_last_frame_en: false,
            l0_bypass: false,
            mvc_en: false,
            mvc_in_w: 0,
            mvc_in_h: 0,
            mvc_out_w: 0,
            mvc_out_h: 0,
            geomatch_en: false,
            mixer_en: false,
            mixer_mode: TnrMode::Prepare,
            still_en: false,
            img_l0_bit: 12,
            wgt_l0_bit: 8,
            skip_wdma: false,
            contents_aware_en: false,
        }
    }
}

impl Mtnr0Config {
    /// Forces the bit depths into what the hardware supports.
    ///
    /// Still capture always runs 12-bit image / 8-bit weight.
    pub fn sanitize(&mut self) {
        if self.still_en {
            self.img_l0_bit = 12;
            self.wgt_l0_bit = 8;
        }

        if !matches!(self.img_l0_bit, 8 | 10 | 12) {
            warn!("[MTNR0] img_l0_bit({}) is not valid", self.img_l0_bit);
            self.img_l0_bit = 12;
        }

        if !matches!(self.wgt_l0_bit, 4 | 8) {
            warn!("[MTNR0] wgt_l0_bit({}) is not valid", self.wgt_l0_bit);
            self.wgt_l0_bit = 8;
        }
    }

    /// Logs every field that differs from `old`.
    pub fn log_changes(&self, old: &Self, instance: u32, fcount: u32) {
        macro_rules! cmp {
            ($f:ident) => {
                if old.$f != self.$f {
                    info!(
                        "[MTNR0][I{}][F:{}] {}: {:?} -> {:?}",
                        instance,
                        fcount,
                        stringify!($f),
                        old.$f,
                        self.$f
                    );
                }
            };
        }

        cmp!(still_last_frame_en);
        cmp!(l0_bypass);
        cmp!(mvc_en);
        cmp!(mvc_in_w);
        cmp!(mvc_in_h);
        cmp!(mvc_out_w);
        cmp!(mvc_out_h);
        cmp!(geomatch_en);
        cmp!(mixer_en);
        cmp!(mixer_mode);
        cmp!(still_en);
        cmp!(img_l0_bit);
        cmp!(wgt_l0_bit);
        cmp!(contents_aware_en);
        debug!("[MTNR0][I{}][F:{}] skip_wdma({})", instance, fcount, self.skip_wdma);
    }
}

bitflags::bitflags! {
    /// Debug switches of one controller instance.
    pub struct DebugFlags: u32 {
        /// Dump the CR map after every shot.
        const DUMP_REG      = 1 << 0;
        /// Dump the CR map after the next shot only.
        const DUMP_REG_ONCE = 1 << 1;
        /// Request a platform debug snapshot on frame end.
        const S2D           = 1 << 2;
        const SKIP_DDK      = 1 << 3;
        const BYPASS        = 1 << 4;
        /// Replace the input with the colour-bar test pattern.
        const DTP           = 1 << 5;
        /// Drive the mixer through the TNR modes without tuning data.
        const TNR           = 1 << 6;
    }
}

impl Default for DebugFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugConfig {
    pub flags: DebugFlags,
    /// CRC seed programmed on enable; 0 leaves CRC off.
    pub crc_seed: u32,
}
