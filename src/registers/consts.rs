//! Raw byte offsets of the MTNR0 v13 register map.

/// Offset of the IP version register.
pub const OFFSET_IP_VERSION: u32 = 0x0000;
/// Offset of the RDMA C-loader enable register.
pub const OFFSET_YUV_RDMACL_EN: u32 = 0x0040;
/// Offset of the secure sequence id register.
pub const OFFSET_SECU_CTRL_SEQID: u32 = 0x0050;
/// Offset of the CINFIFO new-frame source select.
pub const OFFSET_IP_USE_CINFIFO_NEW_FRAME_IN: u32 = 0x0060;
/// Offset of the first interrupt request register.
pub const OFFSET_INT_REQ_INT0: u32 = 0x0080;
pub const OFFSET_INT_REQ_INT0_ENABLE: u32 = 0x0084;
pub const OFFSET_INT_REQ_INT0_STATUS: u32 = 0x0088;
pub const OFFSET_INT_REQ_INT0_CLEAR: u32 = 0x008C;
/// Offset of the second interrupt request register.
pub const OFFSET_INT_REQ_INT1: u32 = 0x0090;
pub const OFFSET_INT_REQ_INT1_ENABLE: u32 = 0x0094;
pub const OFFSET_INT_REQ_INT1_STATUS: u32 = 0x0098;
pub const OFFSET_INT_REQ_INT1_CLEAR: u32 = 0x009C;
/// Offset of the idleness status register.
pub const OFFSET_IDLENESS_STATUS: u32 = 0x00C0;

pub const OFFSET_MAIN_CTRL_OTF_SEG_EN: u32 = 0x0200;
pub const OFFSET_MAIN_CTRL_STILL_LAST_FRAME_EN: u32 = 0x0204;
pub const OFFSET_MAIN_CTRL_L0_BYPASS: u32 = 0x0208;
pub const OFFSET_MAIN_CTRL_CRC_EN: u32 = 0x020C;
pub const OFFSET_MAIN_CTRL_IN_IMG_SZ_L0: u32 = 0x0210;
pub const OFFSET_MAIN_CTRL_IN_IMG_SZ_L1: u32 = 0x0214;
pub const OFFSET_MAIN_CTRL_IN_IMG_SZ_L4: u32 = 0x0218;
pub const OFFSET_MAIN_CTRL_DATASHIFTERRDMA_BYPASS: u32 = 0x0220;
pub const OFFSET_MAIN_CTRL_DATASHIFTERRDMA_LSHIFT: u32 = 0x0224;
pub const OFFSET_MAIN_CTRL_DATASHIFTERWDMA_BYPASS: u32 = 0x0228;
pub const OFFSET_MAIN_CTRL_DATASHIFTERWDMA_RSHIFT: u32 = 0x022C;

/// Base of the MTNR1 weight CINFIFO group.
pub const OFFSET_CINFIFO_MTNR1WGT: u32 = 0x0E00;
/// Base of the MSNR L0 COUTFIFO group.
pub const OFFSET_COUTFIFO_MSNRL0: u32 = 0x0F00;

pub const OFFSET_FIFO_ENABLE: u32 = 0x00;
pub const OFFSET_FIFO_CONFIG: u32 = 0x04;
pub const OFFSET_FIFO_STALL_CTRL: u32 = 0x08;
pub const OFFSET_FIFO_INTERVAL_VBLANK: u32 = 0x0C;
pub const OFFSET_FIFO_INTERVALS: u32 = 0x10;
pub const OFFSET_FIFO_STATUS: u32 = 0x14;
pub const OFFSET_FIFO_INPUT_CNT: u32 = 0x18;
pub const OFFSET_FIFO_STALL_CNT: u32 = 0x1C;
pub const OFFSET_FIFO_FULLNESS: u32 = 0x20;
pub const OFFSET_FIFO_VVALID_RISE_MODE: u32 = 0x24;
pub const OFFSET_FIFO_INT: u32 = 0x40;
pub const OFFSET_FIFO_INT_ENABLE: u32 = 0x44;
pub const OFFSET_FIFO_INT_STATUS: u32 = 0x48;
pub const OFFSET_FIFO_INT_CLEAR: u32 = 0x4C;
pub const OFFSET_FIFO_CORRUPTED_COND_ENABLE: u32 = 0x50;
pub const OFFSET_FIFO_ROL_SELECT: u32 = 0x54;
pub const OFFSET_FIFO_INTERVAL_VBLANK_AR: u32 = 0x70;
pub const OFFSET_FIFO_INTERVAL_HBLANK_AR: u32 = 0x74;
pub const OFFSET_FIFO_STREAM_CRC: u32 = 0x7C;

pub const OFFSET_DTPL0_CTRL: u32 = 0x1000;
pub const OFFSET_DTPL0_STREAM_CRC: u32 = 0x1004;

pub const OFFSET_GEOMATCHL0_EN: u32 = 0x2000;
pub const OFFSET_GEOMATCHL0_BYPASS: u32 = 0x2004;
pub const OFFSET_GEOMATCHL0_MATCH_ENABLE: u32 = 0x2008;
pub const OFFSET_GEOMATCHL0_MC_LMC_TNR_MODE: u32 = 0x200C;
pub const OFFSET_GEOMATCHL0_TNR_WGT_EN: u32 = 0x2010;
pub const OFFSET_GEOMATCHL0_TNR_WGT_BYPASS: u32 = 0x2014;
pub const OFFSET_GEOMATCHL0_REF_IMG_SIZE: u32 = 0x2020;
pub const OFFSET_GEOMATCHL0_REF_ROI_START: u32 = 0x2024;
pub const OFFSET_GEOMATCHL0_ROI_SIZE: u32 = 0x2028;
pub const OFFSET_GEOMATCHL0_SCH_IMG_SIZE: u32 = 0x202C;
pub const OFFSET_GEOMATCHL0_SCH_ACTIVE_START: u32 = 0x2030;
pub const OFFSET_GEOMATCHL0_SCH_ACTIVE_SIZE: u32 = 0x2034;
pub const OFFSET_GEOMATCHL0_SCH_ROI_START: u32 = 0x2038;

pub const OFFSET_MVCONTROLLER_ENABLE: u32 = 0x3000;
pub const OFFSET_MVCONTROLLER_MVF_RESIZE_OFFSET: u32 = 0x3004;
pub const OFFSET_SEGMAPPING_BYPASS: u32 = 0x3100;

pub const OFFSET_CROPCLEANOTFL0: u32 = 0x4000;
pub const OFFSET_CROPCLEANDMAL0: u32 = 0x4010;
pub const OFFSET_CROPWEIGHTDMAL0: u32 = 0x4020;
pub const OFFSET_CROP_BYPASS: u32 = 0x0;
pub const OFFSET_CROP_START: u32 = 0x4;
pub const OFFSET_CROP_SIZE: u32 = 0x8;

/// First RDMA channel window; channels follow every `DMA_WINDOW_STRIDE`.
pub const OFFSET_RDMA_BASE: u32 = 0x5000;
/// First WDMA channel window.
pub const OFFSET_WDMA_BASE: u32 = 0x6000;
pub const DMA_WINDOW_STRIDE: u32 = 0x100;

pub const OFFSET_MIXERL0_ENABLE: u32 = 0x7600;
pub const OFFSET_MIXERL0_STILL_EN: u32 = 0x7604;
pub const OFFSET_MIXERL0_WGT_UPDATE_EN: u32 = 0x7608;
pub const OFFSET_MIXERL0_MODE: u32 = 0x760C;
pub const OFFSET_MIXERL0_MINIMUM_FLIT_EN: u32 = 0x7610;
pub const OFFSET_MIXERL0_SAD_SHIFT: u32 = 0x7614;
pub const OFFSET_MIXERL0_SAD_Y_GAIN: u32 = 0x7618;
pub const OFFSET_MIXERL0_UPDATE_WGTTOMEM_EN: u32 = 0x761C;
pub const OFFSET_MIXERL0_MC_REFINE_EN: u32 = 0x7620;
pub const OFFSET_MIXERL0_BINNING: u32 = 0x7630;
pub const OFFSET_MIXERL0_RADIAL_CENTER: u32 = 0x7634;
/// Four registers holding two 16-bit thresholds each.
pub const OFFSET_MIXERL0_THRESH_SLOPE: u32 = 0x7640;
pub const OFFSET_MIXERL0_THRESH: u32 = 0x7650;
pub const OFFSET_MIXERL0_SUB_THRESH: u32 = 0x7660;
pub const OFFSET_MIXERL0_SUB_THRESH_WIDTH: u32 = 0x7670;
pub const OFFSET_MIXERL0_SUB_THRESH_SLOPE: u32 = 0x7680;

/// Last programmable register of the block.
pub const OFFSET_MAX_REGISTER: u32 = 0x768C;
/// Size of one COREX register set.
pub const COREX_STRIDE: u32 = 0x8000;
