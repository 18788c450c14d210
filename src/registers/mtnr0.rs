//! Typed MTNR0 v13 register descriptors.
//!
//! Field layouts are declared with `register_bitfields!`; each `R_*`
//! descriptor binds an offset from [`consts`](super::consts) to its field
//! set.

use tock_registers::register_bitfields;

use super::{AccessTable, Reg, RegRange, consts::*};

register_bitfields! {u32,
    pub SECU_CTRL_SEQID [
        SEQID OFFSET(0) NUMBITS(3) []
    ],
    pub IP_USE_CINFIFO_NEW_FRAME_IN [
        EN OFFSET(0) NUMBITS(1) []
    ],
    pub IDLENESS_STATUS [
        IDLE OFFSET(0) NUMBITS(1) []
    ],
    pub OTF_SEG_EN [
        EN OFFSET(0) NUMBITS(1) []
    ],
    pub STILL_LAST_FRAME_EN [
        EN OFFSET(0) NUMBITS(1) []
    ],
    pub L0_BYPASS [
        BYPASS OFFSET(0) NUMBITS(1) []
    ],
    pub CRC_EN [
        EN OFFSET(0) NUMBITS(1) [],
        SEED OFFSET(8) NUMBITS(8) []
    ],
    pub IN_IMG_SZ [
        WIDTH OFFSET(0) NUMBITS(14) [],
        HEIGHT OFFSET(16) NUMBITS(14) []
    ],
    pub DATASHIFTER_LSHIFT [
        LSHIFT_Y OFFSET(0) NUMBITS(4) [],
        OFFSET_Y OFFSET(16) NUMBITS(12) []
    ],
    pub DATASHIFTER_RSHIFT [
        RSHIFT_Y OFFSET(0) NUMBITS(4) [],
        OFFSET_Y OFFSET(16) NUMBITS(12) []
    ],
    pub FIFO_CONFIG [
        STALL_BEFORE_FRAME_START_EN OFFSET(0) NUMBITS(1) [],
        AUTO_RECOVERY_EN OFFSET(1) NUMBITS(1) [],
        ROL_RESET_ON_FRAME_START OFFSET(2) NUMBITS(1) [],
        DEBUG_EN OFFSET(3) NUMBITS(1) [],
        VVALID_RISE_AT_FIRST_DATA_EN OFFSET(4) NUMBITS(1) [],
        STRGEN_MODE_EN OFFSET(8) NUMBITS(1) [],
        STRGEN_MODE_DATA_TYPE OFFSET(9) NUMBITS(1) [],
        STRGEN_MODE_DATA OFFSET(16) NUMBITS(8) []
    ],
    pub FIFO_INTERVAL_VBLANK [
        VBLANK OFFSET(0) NUMBITS(16) []
    ],
    pub FIFO_INTERVALS [
        HBLANK OFFSET(0) NUMBITS(16) [],
        PIXEL OFFSET(16) NUMBITS(16) []
    ],
    pub STREAM_CRC [
        SEED OFFSET(0) NUMBITS(8) [],
        RESULT OFFSET(8) NUMBITS(24) []
    ],
    pub DTP_CTRL [
        BYPASS OFFSET(0) NUMBITS(1) [],
        TEST_PATTERN_MODE OFFSET(4) NUMBITS(4) [],
        YUV_STANDARD OFFSET(8) NUMBITS(2) [],
        TEST_DATA_Y OFFSET(16) NUMBITS(12) []
    ],
    pub ENABLE [
        EN OFFSET(0) NUMBITS(1) []
    ],
    pub BYPASS [
        BYPASS OFFSET(0) NUMBITS(1) []
    ],
    pub TNR_MODE [
        MODE OFFSET(0) NUMBITS(2) []
    ],
    pub SIZE [
        X OFFSET(0) NUMBITS(14) [],
        Y OFFSET(16) NUMBITS(14) []
    ],
    pub MVF_RESIZE_OFFSET [
        X OFFSET(0) NUMBITS(10) [],
        Y OFFSET(16) NUMBITS(10) []
    ],
    pub MIXER_ENABLE [
        ENABLE OFFSET(0) NUMBITS(1) [],
        MERGE_BYPASS OFFSET(1) NUMBITS(1) []
    ],
    pub BINNING [
        X OFFSET(0) NUMBITS(16) [],
        Y OFFSET(16) NUMBITS(16) []
    ],
    pub RADIAL_CENTER [
        X OFFSET(0) NUMBITS(16) [],
        Y OFFSET(16) NUMBITS(16) []
    ],
    pub THRESH_PAIR [
        EVEN OFFSET(0) NUMBITS(16) [],
        ODD OFFSET(16) NUMBITS(16) []
    ]
}

pub const R_IP_VERSION: Reg = Reg::new(OFFSET_IP_VERSION);
pub const R_YUV_RDMACL_EN: Reg = Reg::new(OFFSET_YUV_RDMACL_EN);
pub const R_SECU_CTRL_SEQID: Reg<SECU_CTRL_SEQID::Register> = Reg::new(OFFSET_SECU_CTRL_SEQID);
pub const R_IP_USE_CINFIFO_NEW_FRAME_IN: Reg<IP_USE_CINFIFO_NEW_FRAME_IN::Register> =
    Reg::new(OFFSET_IP_USE_CINFIFO_NEW_FRAME_IN);
pub const R_INT_REQ_INT0: Reg = Reg::new(OFFSET_INT_REQ_INT0);
pub const R_INT_REQ_INT1: Reg = Reg::new(OFFSET_INT_REQ_INT1);
pub const R_IDLENESS_STATUS: Reg<IDLENESS_STATUS::Register> = Reg::new(OFFSET_IDLENESS_STATUS);

pub const R_OTF_SEG_EN: Reg<OTF_SEG_EN::Register> = Reg::new(OFFSET_MAIN_CTRL_OTF_SEG_EN);
pub const R_STILL_LAST_FRAME_EN: Reg<STILL_LAST_FRAME_EN::Register> =
    Reg::new(OFFSET_MAIN_CTRL_STILL_LAST_FRAME_EN);
pub const R_L0_BYPASS: Reg<L0_BYPASS::Register> = Reg::new(OFFSET_MAIN_CTRL_L0_BYPASS);
pub const R_CRC_EN: Reg<CRC_EN::Register> = Reg::new(OFFSET_MAIN_CTRL_CRC_EN);
pub const R_IN_IMG_SZ_L0: Reg<IN_IMG_SZ::Register> = Reg::new(OFFSET_MAIN_CTRL_IN_IMG_SZ_L0);
pub const R_IN_IMG_SZ_L1: Reg<IN_IMG_SZ::Register> = Reg::new(OFFSET_MAIN_CTRL_IN_IMG_SZ_L1);
pub const R_IN_IMG_SZ_L4: Reg<IN_IMG_SZ::Register> = Reg::new(OFFSET_MAIN_CTRL_IN_IMG_SZ_L4);
pub const R_DATASHIFTERRDMA_BYPASS: Reg = Reg::new(OFFSET_MAIN_CTRL_DATASHIFTERRDMA_BYPASS);
pub const R_DATASHIFTERRDMA_LSHIFT: Reg<DATASHIFTER_LSHIFT::Register> =
    Reg::new(OFFSET_MAIN_CTRL_DATASHIFTERRDMA_LSHIFT);
pub const R_DATASHIFTERWDMA_BYPASS: Reg = Reg::new(OFFSET_MAIN_CTRL_DATASHIFTERWDMA_BYPASS);
pub const R_DATASHIFTERWDMA_RSHIFT: Reg<DATASHIFTER_RSHIFT::Register> =
    Reg::new(OFFSET_MAIN_CTRL_DATASHIFTERWDMA_RSHIFT);

/// One CINFIFO/COUTFIFO register group.
#[derive(Clone, Copy, Debug)]
pub struct FifoRegs {
    base: u32,
}

impl FifoRegs {
    pub const fn enable(&self) -> Reg {
        Reg::new(self.base + OFFSET_FIFO_ENABLE)
    }

    pub const fn config(&self) -> Reg<FIFO_CONFIG::Register> {
        Reg::new(self.base + OFFSET_FIFO_CONFIG)
    }

    pub const fn interval_vblank(&self) -> Reg<FIFO_INTERVAL_VBLANK::Register> {
        Reg::new(self.base + OFFSET_FIFO_INTERVAL_VBLANK)
    }

    pub const fn intervals(&self) -> Reg<FIFO_INTERVALS::Register> {
        Reg::new(self.base + OFFSET_FIFO_INTERVALS)
    }

    pub const fn stream_crc(&self) -> Reg<STREAM_CRC::Register> {
        Reg::new(self.base + OFFSET_FIFO_STREAM_CRC)
    }
}

pub const CINFIFO_MTNR1WGT: FifoRegs = FifoRegs {
    base: OFFSET_CINFIFO_MTNR1WGT,
};
pub const COUTFIFO_MSNRL0: FifoRegs = FifoRegs {
    base: OFFSET_COUTFIFO_MSNRL0,
};

pub const R_DTPL0_CTRL: Reg<DTP_CTRL::Register> = Reg::new(OFFSET_DTPL0_CTRL);
pub const R_DTPL0_STREAM_CRC: Reg<STREAM_CRC::Register> = Reg::new(OFFSET_DTPL0_STREAM_CRC);

pub const R_GEOMATCHL0_EN: Reg<ENABLE::Register> = Reg::new(OFFSET_GEOMATCHL0_EN);
pub const R_GEOMATCHL0_BYPASS: Reg<BYPASS::Register> = Reg::new(OFFSET_GEOMATCHL0_BYPASS);
pub const R_GEOMATCHL0_MATCH_ENABLE: Reg<ENABLE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_MATCH_ENABLE);
pub const R_GEOMATCHL0_MC_LMC_TNR_MODE: Reg<TNR_MODE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_MC_LMC_TNR_MODE);
pub const R_GEOMATCHL0_TNR_WGT_EN: Reg<ENABLE::Register> = Reg::new(OFFSET_GEOMATCHL0_TNR_WGT_EN);
pub const R_GEOMATCHL0_TNR_WGT_BYPASS: Reg<BYPASS::Register> =
    Reg::new(OFFSET_GEOMATCHL0_TNR_WGT_BYPASS);
pub const R_GEOMATCHL0_REF_IMG_SIZE: Reg<SIZE::Register> = Reg::new(OFFSET_GEOMATCHL0_REF_IMG_SIZE);
pub const R_GEOMATCHL0_REF_ROI_START: Reg<SIZE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_REF_ROI_START);
pub const R_GEOMATCHL0_ROI_SIZE: Reg<SIZE::Register> = Reg::new(OFFSET_GEOMATCHL0_ROI_SIZE);
pub const R_GEOMATCHL0_SCH_IMG_SIZE: Reg<SIZE::Register> = Reg::new(OFFSET_GEOMATCHL0_SCH_IMG_SIZE);
pub const R_GEOMATCHL0_SCH_ACTIVE_START: Reg<SIZE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_SCH_ACTIVE_START);
pub const R_GEOMATCHL0_SCH_ACTIVE_SIZE: Reg<SIZE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_SCH_ACTIVE_SIZE);
pub const R_GEOMATCHL0_SCH_ROI_START: Reg<SIZE::Register> =
    Reg::new(OFFSET_GEOMATCHL0_SCH_ROI_START);

pub const R_MVCONTROLLER_ENABLE: Reg<ENABLE::Register> = Reg::new(OFFSET_MVCONTROLLER_ENABLE);
pub const R_MVCONTROLLER_MVF_RESIZE_OFFSET: Reg<MVF_RESIZE_OFFSET::Register> =
    Reg::new(OFFSET_MVCONTROLLER_MVF_RESIZE_OFFSET);
pub const R_SEGMAPPING_BYPASS: Reg<BYPASS::Register> = Reg::new(OFFSET_SEGMAPPING_BYPASS);

/// A crop unit: bypass, start and size registers.
#[derive(Clone, Copy, Debug)]
pub struct CropRegs {
    base: u32,
}

impl CropRegs {
    pub const fn bypass(&self) -> Reg<BYPASS::Register> {
        Reg::new(self.base + OFFSET_CROP_BYPASS)
    }

    pub const fn start(&self) -> Reg<SIZE::Register> {
        Reg::new(self.base + OFFSET_CROP_START)
    }

    pub const fn size(&self) -> Reg<SIZE::Register> {
        Reg::new(self.base + OFFSET_CROP_SIZE)
    }
}

pub const CROP_CLEAN_OTF: CropRegs = CropRegs {
    base: OFFSET_CROPCLEANOTFL0,
};
pub const CROP_CLEAN_DMA: CropRegs = CropRegs {
    base: OFFSET_CROPCLEANDMAL0,
};
pub const CROP_WEIGHT_DMA: CropRegs = CropRegs {
    base: OFFSET_CROPWEIGHTDMAL0,
};

pub const R_MIXERL0_ENABLE: Reg<MIXER_ENABLE::Register> = Reg::new(OFFSET_MIXERL0_ENABLE);
pub const R_MIXERL0_STILL_EN: Reg<ENABLE::Register> = Reg::new(OFFSET_MIXERL0_STILL_EN);
pub const R_MIXERL0_WGT_UPDATE_EN: Reg<ENABLE::Register> = Reg::new(OFFSET_MIXERL0_WGT_UPDATE_EN);
pub const R_MIXERL0_MODE: Reg<TNR_MODE::Register> = Reg::new(OFFSET_MIXERL0_MODE);
pub const R_MIXERL0_UPDATE_WGTTOMEM_EN: Reg<ENABLE::Register> =
    Reg::new(OFFSET_MIXERL0_UPDATE_WGTTOMEM_EN);
pub const R_MIXERL0_MC_REFINE_EN: Reg = Reg::new(OFFSET_MIXERL0_MC_REFINE_EN);
pub const R_MIXERL0_BINNING: Reg<BINNING::Register> = Reg::new(OFFSET_MIXERL0_BINNING);
pub const R_MIXERL0_RADIAL_CENTER: Reg<RADIAL_CENTER::Register> =
    Reg::new(OFFSET_MIXERL0_RADIAL_CENTER);

/// Register holding thresholds `2 * pair` and `2 * pair + 1` of a table.
pub const fn thresh_pair(table: u32, pair: u32) -> Reg<THRESH_PAIR::Register> {
    Reg::new(table + pair * 4)
}

/// MTNR0 interrupt 0 bit positions.
pub const INTR0_FRAME_START: u32 = 0;
pub const INTR0_FRAME_END: u32 = 1;
pub const INTR0_COREX_END_0: u32 = 2;
pub const INTR0_COREX_END_1: u32 = 3;
pub const INTR0_SETTING_DONE: u32 = 5;
/// Corrupted-input, overflow and DMA error causes on interrupt 0.
pub const INT0_ERR_MASK: u32 = 0x00FF_F000;
/// Rule-checker and FIFO error causes on interrupt 1.
pub const INT1_ERR_MASK: u32 = 0x0000_07FF;
pub const INT0_EN_MASK: u32 = (1 << INTR0_FRAME_START)
    | (1 << INTR0_FRAME_END)
    | (1 << INTR0_COREX_END_0)
    | (1 << INTR0_COREX_END_1)
    | (1 << INTR0_SETTING_DONE)
    | INT0_ERR_MASK;
pub const INT1_EN_MASK: u32 = INT1_ERR_MASK;

static WRITABLE: [RegRange; 12] = [
    RegRange::new(OFFSET_YUV_RDMACL_EN, OFFSET_INT_REQ_INT1_CLEAR),
    RegRange::new(OFFSET_MAIN_CTRL_OTF_SEG_EN, OFFSET_MAIN_CTRL_DATASHIFTERWDMA_RSHIFT),
    RegRange::new(OFFSET_CINFIFO_MTNR1WGT, OFFSET_CINFIFO_MTNR1WGT + OFFSET_FIFO_STREAM_CRC),
    RegRange::new(OFFSET_COUTFIFO_MSNRL0, OFFSET_COUTFIFO_MSNRL0 + OFFSET_FIFO_STREAM_CRC),
    RegRange::new(OFFSET_DTPL0_CTRL, OFFSET_DTPL0_STREAM_CRC),
    RegRange::new(OFFSET_GEOMATCHL0_EN, OFFSET_GEOMATCHL0_SCH_ROI_START),
    RegRange::new(OFFSET_MVCONTROLLER_ENABLE, OFFSET_MVCONTROLLER_MVF_RESIZE_OFFSET),
    RegRange::new(OFFSET_SEGMAPPING_BYPASS, OFFSET_SEGMAPPING_BYPASS),
    RegRange::new(OFFSET_CROPCLEANOTFL0, OFFSET_CROPWEIGHTDMAL0 + OFFSET_CROP_SIZE),
    RegRange::new(OFFSET_RDMA_BASE, OFFSET_RDMA_BASE + 7 * DMA_WINDOW_STRIDE - 4),
    RegRange::new(OFFSET_WDMA_BASE, OFFSET_WDMA_BASE + 2 * DMA_WINDOW_STRIDE - 4),
    RegRange::new(OFFSET_MIXERL0_ENABLE, OFFSET_MAX_REGISTER),
];

static VOLATILE: [RegRange; 7] = [
    RegRange::new(OFFSET_IP_VERSION, OFFSET_IP_VERSION),
    RegRange::new(OFFSET_INT_REQ_INT0, OFFSET_INT_REQ_INT1_CLEAR),
    RegRange::new(OFFSET_IDLENESS_STATUS, OFFSET_IDLENESS_STATUS),
    RegRange::new(
        OFFSET_CINFIFO_MTNR1WGT + OFFSET_FIFO_STATUS,
        OFFSET_CINFIFO_MTNR1WGT + OFFSET_FIFO_FULLNESS,
    ),
    RegRange::new(
        OFFSET_CINFIFO_MTNR1WGT + OFFSET_FIFO_INT_STATUS,
        OFFSET_CINFIFO_MTNR1WGT + OFFSET_FIFO_INT_STATUS,
    ),
    RegRange::new(
        OFFSET_COUTFIFO_MSNRL0 + OFFSET_FIFO_STATUS,
        OFFSET_COUTFIFO_MSNRL0 + OFFSET_FIFO_FULLNESS,
    ),
    RegRange::new(
        OFFSET_COUTFIFO_MSNRL0 + OFFSET_FIFO_INT_STATUS,
        OFFSET_COUTFIFO_MSNRL0 + OFFSET_FIFO_INT_STATUS,
    ),
];

pub const ACCESS_TABLE: AccessTable = AccessTable {
    writable: &WRITABLE,
    volatile: &VOLATILE,
};

/// Registers printed by the debug-state dump, in parser order.
pub const DBG_CR: &[(u32, &str)] = &[
    (0x0210, "YUV_MAIN_CTRL_IN_IMG_SZ_WIDTH_L0"),
    (0x0214, "YUV_MAIN_CTRL_IN_IMG_SZ_WIDTH_L1"),
    (0x0218, "YUV_MAIN_CTRL_IN_IMG_SZ_WIDTH_L4"),
    (0x0e00, "STAT_CINFIFOMTNR1WGT_ENABLE"),
    (0x0e04, "STAT_CINFIFOMTNR1WGT_CONFIG"),
    (0x0e08, "STAT_CINFIFOMTNR1WGT_STALL_CTRL"),
    (0x0e0c, "STAT_CINFIFOMTNR1WGT_INTERVAL_VBLANK"),
    (0x0e10, "STAT_CINFIFOMTNR1WGT_INTERVALS"),
    (0x0e14, "STAT_CINFIFOMTNR1WGT_STATUS"),
    (0x0e18, "STAT_CINFIFOMTNR1WGT_INPUT_CNT"),
    (0x0e1c, "STAT_CINFIFOMTNR1WGT_STALL_CNT"),
    (0x0e20, "STAT_CINFIFOMTNR1WGT_FIFO_FULLNESS"),
    (0x0e40, "STAT_CINFIFOMTNR1WGT_INT"),
    (0x0e44, "STAT_CINFIFOMTNR1WGT_INT_ENABLE"),
    (0x0e48, "STAT_CINFIFOMTNR1WGT_INT_STATUS"),
    (0x0e4c, "STAT_CINFIFOMTNR1WGT_INT_CLEAR"),
    (0x0e50, "STAT_CINFIFOMTNR1WGT_CORRUPTED_COND_ENABLE"),
    (0x0e54, "STAT_CINFIFOMTNR1WGT_ROL_SELECT"),
    (0x0e70, "STAT_CINFIFOMTNR1WGT_INTERVAL_VBLANK_AR"),
    (0x0e74, "STAT_CINFIFOMTNR1WGT_INTERVAL_HBLANK_AR"),
    (0x0e7c, "STAT_CINFIFOMTNR1WGT_STREAM_CRC"),
    (0x0f00, "YUV_COUTFIFOMSNRL0_ENABLE"),
    (0x0f04, "YUV_COUTFIFOMSNRL0_CONFIG"),
    (0x0f08, "YUV_COUTFIFOMSNRL0_STALL_CTRL"),
    (0x0f0c, "YUV_COUTFIFOMSNRL0_INTERVAL_VBLANK"),
    (0x0f10, "YUV_COUTFIFOMSNRL0_INTERVALS"),
    (0x0f14, "YUV_COUTFIFOMSNRL0_STATUS"),
    (0x0f18, "YUV_COUTFIFOMSNRL0_INPUT_CNT"),
    (0x0f1c, "YUV_COUTFIFOMSNRL0_STALL_CNT"),
    (0x0f20, "YUV_COUTFIFOMSNRL0_FIFO_FULLNESS"),
    (0x0f24, "YUV_COUTFIFOMSNRL0_VVALID_RISE_MODE"),
    (0x0f40, "YUV_COUTFIFOMSNRL0_INT"),
    (0x0f44, "YUV_COUTFIFOMSNRL0_INT_ENABLE"),
    (0x0f48, "YUV_COUTFIFOMSNRL0_INT_STATUS"),
    (0x0f4c, "YUV_COUTFIFOMSNRL0_INT_CLEAR"),
    (0x0f50, "YUV_COUTFIFOMSNRL0_CORRUPTED_COND_ENABLE"),
    (0x0f54, "YUV_COUTFIFOMSNRL0_ROL_SELECT"),
    (0x0f7c, "YUV_COUTFIFOMSNRL0_STREAM_CRC"),
    (0x7600, "YUV_MIXERL0_ENABLE"),
    (0x7604, "YUV_MIXERL0_STILL_EN"),
    (0x7608, "YUV_MIXERL0_WGT_UPDATE_EN"),
    (0x760c, "YUV_MIXERL0_MODE"),
    (0x7610, "YUV_MIXERL0_MINIMUM_FLIT_EN"),
    (0x7614, "YUV_MIXERL0_SAD_SHIFT"),
    (0x7618, "YUV_MIXERL0_SAD_Y_GAIN"),
];
