//! Functional-block programming of MTNR0.
//!
//! One function per hardware sub-block operation. They only write typed
//! fields through [`RegisterSpace`]; the controller decides the order.

use crate::{
    config::TnrMode,
    device::PccFrameConfig,
    dma::{ChannelRole, rule_for},
    err::IspError,
    geometry::{
        RadialConfig, Size, resolve_motion_vector_resize_offset, resolve_radial_binning,
        resolve_radial_center,
    },
    osal::Osal,
    registers::{
        RegisterIo, RegisterSpace,
        consts::*,
        dma::{DMA_EN, DMA_SET_ID, DmaRegs},
        mtnr0::*,
    },
};

/// Horizontal blank cycles between OTF lines.
pub const HBLANK_CYCLE: u32 = 0x20;
/// Blank cycles between OTF pixels.
pub const PBLANK_CYCLE: u32 = 0;
/// Vertical blank cycles between OTF frames.
pub const VBLANK_CYCLE: u32 = 0x32;

const MIXER_THRESH_SLOPE: [u32; 8] = [127, 84, 101, 138, 309, 309, 309, 309];
const MIXER_THRESH: [u32; 8] = [86, 96, 86, 43, 21, 21, 21, 21];
const MIXER_SUB_THRESH_WIDTH: [u32; 8] = [0; 8];
const MIXER_SUB_THRESH_SLOPE: [u32; 8] = [16383; 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Every programmable register.
    Cr,
    /// Version and the debug register list.
    DbgState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DtpPattern {
    Solid = 0,
    ColorBar = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DtpColorBar {
    Bt601 = 0,
    Bt709 = 1,
}

/// Input pyramid level of the size registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLevel {
    L0,
    L1,
    L4,
}

/// Turns on the RDMA C-loader and selects the secure sequence.
pub fn s_core<B: RegisterIo>(regs: &mut RegisterSpace<B>, set_id: u32) {
    trace!("[MTNR0] s_core set_id {}", set_id);
    regs.write_register(R_YUV_RDMACL_EN, 1);
    regs.write_field(R_SECU_CTRL_SEQID, SECU_CTRL_SEQID::SEQID.val(0));
}

/// Writes the COREX routing id of every DMA channel.
pub fn s_dma_set_id<B: RegisterIo>(regs: &mut RegisterSpace<B>, set_id: u32) {
    for role in ChannelRole::READ_ORDER.iter().chain(ChannelRole::WRITE_ORDER.iter()) {
        let win = DmaRegs::new(rule_for(*role).window);
        regs.write_field(win.set_id(), DMA_SET_ID::SET_ID.val(set_id));
    }
}

/// Enable bit of every channel, indexed by [`ChannelRole::index`].
pub fn dma_enable_mask<B: RegisterIo>(regs: &RegisterSpace<B>) -> u32 {
    let mut mask = 0;
    for role in ChannelRole::READ_ORDER.iter().chain(ChannelRole::WRITE_ORDER.iter()) {
        let win = DmaRegs::new(rule_for(*role).window);
        if regs.read_field(win.en(), DMA_EN::EN) != 0 {
            mask |= 1 << role.index();
        }
    }
    mask
}

/// Polls the idleness status until set or `try_count` polls ran out.
pub fn wait_idle<B: RegisterIo>(
    regs: &RegisterSpace<B>,
    osal: &dyn Osal,
    try_count: u32,
    poll_us: u32,
) -> Result<(), IspError> {
    let mut idle = regs.read_field(R_IDLENESS_STATUS, IDLENESS_STATUS::IDLE);
    let int0 = regs.read_register(R_INT_REQ_INT0);
    let int1 = regs.read_register(R_INT_REQ_INT1);
    info!(
        "[MTNR0] idle status before disable (idle:{}, int:{:#x}, {:#x})",
        idle, int0, int1
    );

    let mut try_cnt = 0;
    while idle == 0 {
        try_cnt += 1;
        if try_cnt >= try_count {
            error!("[MTNR0] timeout waiting idle - disable fail");
            dump(regs, DumpMode::Cr);
            return Err(IspError::Timeout);
        }
        osal.udelay(poll_us);
        idle = regs.read_field(R_IDLENESS_STATUS, IDLENESS_STATUS::IDLE);
    }

    let int0 = regs.read_register(R_INT_REQ_INT0);
    let int1 = regs.read_register(R_INT_REQ_INT1);
    info!(
        "[MTNR0] idle status after disable (idle:{}, int:{:#x}, {:#x})",
        idle, int0, int1
    );
    Ok(())
}

pub fn dump<B: RegisterIo>(regs: &RegisterSpace<B>, mode: DumpMode) {
    match mode {
        DumpMode::Cr => {
            info!("[MTNR0] CR dump");
            for range in ACCESS_TABLE.writable {
                let mut off = range.start;
                while off <= range.end {
                    let v = regs.read_raw(off);
                    if v != 0 {
                        info!("[MTNR0] [{:#06x}] {:#010x}", off, v);
                    }
                    off += 4;
                }
            }
        }
        DumpMode::DbgState => {
            let v = regs.read_register(R_IP_VERSION);
            info!(
                "[MTNR0] ver {}.{}.{}",
                (v >> 24) & 0xff,
                (v >> 16) & 0xff,
                v & 0xffff
            );
            for &(off, name) in DBG_CR {
                info!("[MTNR0] {}:[{:#06x}] {:#010x}", name, off, regs.read_raw(off));
            }
        }
    }
}

/// Puts every functional sub-block into its safe bypass state.
pub fn block_bypass<B: RegisterIo>(regs: &mut RegisterSpace<B>) {
    regs.write_field(R_OTF_SEG_EN, OTF_SEG_EN::EN.val(0));

    regs.write_field(R_GEOMATCHL0_EN, ENABLE::EN.val(0));
    regs.write_field(R_GEOMATCHL0_BYPASS, BYPASS::BYPASS.val(1));
    regs.write_field(R_GEOMATCHL0_MATCH_ENABLE, ENABLE::EN.val(0));
    regs.write_field(R_GEOMATCHL0_TNR_WGT_EN, ENABLE::EN.val(0));
    regs.write_field(R_GEOMATCHL0_TNR_WGT_BYPASS, BYPASS::BYPASS.val(1));

    regs.write_field(R_MVCONTROLLER_ENABLE, ENABLE::EN.val(0));

    regs.write_field(
        R_MIXERL0_ENABLE,
        MIXER_ENABLE::ENABLE.val(0) + MIXER_ENABLE::MERGE_BYPASS.val(1),
    );
    regs.write_field(R_MIXERL0_STILL_EN, ENABLE::EN.val(0));
    regs.write_field(R_MIXERL0_UPDATE_WGTTOMEM_EN, ENABLE::EN.val(0));
    regs.write_register(R_MIXERL0_MC_REFINE_EN, 0);

    regs.write_field(R_SEGMAPPING_BYPASS, BYPASS::BYPASS.val(1));

    for unit in [CROP_CLEAN_OTF, CROP_CLEAN_DMA, CROP_WEIGHT_DMA] {
        regs.write_field(unit.bypass(), BYPASS::BYPASS.val(1));
    }
}

/// OTF input from the MTNR1 weight path.
pub fn otf_input_mtnr1_wgt<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    enable: bool,
    frame: &mut PccFrameConfig,
) {
    let fifo = CINFIFO_MTNR1WGT;
    regs.write_register(fifo.enable(), 1);
    regs.write_field(
        fifo.config(),
        FIFO_CONFIG::STALL_BEFORE_FRAME_START_EN.val(1)
            + FIFO_CONFIG::AUTO_RECOVERY_EN.val(0)
            + FIFO_CONFIG::DEBUG_EN.val(1),
    );
    regs.write_field(
        fifo.intervals(),
        FIFO_INTERVALS::HBLANK.val(HBLANK_CYCLE) + FIFO_INTERVALS::PIXEL.val(PBLANK_CYCLE),
    );
    regs.write_field(
        R_IP_USE_CINFIFO_NEW_FRAME_IN,
        IP_USE_CINFIFO_NEW_FRAME_IN::EN.val(enable as u32),
    );

    if enable {
        frame.cotf_in = true;
    }
}

/// OTF output towards MSNR L0.
pub fn otf_output_msnr_l0<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    enable: bool,
    frame: &mut PccFrameConfig,
) {
    let fifo = COUTFIFO_MSNRL0;
    regs.write_register(fifo.enable(), enable as u32);
    regs.write_field(
        fifo.config(),
        FIFO_CONFIG::VVALID_RISE_AT_FIRST_DATA_EN.val(0) + FIFO_CONFIG::DEBUG_EN.val(1),
    );
    regs.write_field(
        fifo.interval_vblank(),
        FIFO_INTERVAL_VBLANK::VBLANK.val(VBLANK_CYCLE),
    );
    regs.write_field(
        fifo.intervals(),
        FIFO_INTERVALS::HBLANK.val(HBLANK_CYCLE) + FIFO_INTERVALS::PIXEL.val(PBLANK_CYCLE),
    );

    if enable {
        frame.cotf_out = true;
    }
}

pub fn input_size<B: RegisterIo>(regs: &mut RegisterSpace<B>, level: InputLevel, size: Size) {
    let reg = match level {
        InputLevel::L0 => R_IN_IMG_SZ_L0,
        InputLevel::L1 => R_IN_IMG_SZ_L1,
        InputLevel::L4 => R_IN_IMG_SZ_L4,
    };
    regs.write_field(
        reg,
        IN_IMG_SZ::WIDTH.val(size.w) + IN_IMG_SZ::HEIGHT.val(size.h),
    );
}

/// Reference and search windows of the geometry matcher.
pub fn geomatch_size<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    frame_width: u32,
    dma_width: u32,
    height: u32,
    strip_start_pos: u32,
) {
    let size = |x: u32, y: u32| SIZE::X.val(x) + SIZE::Y.val(y);

    regs.write_field(R_GEOMATCHL0_REF_IMG_SIZE, size(dma_width, height));
    regs.write_field(R_GEOMATCHL0_REF_ROI_START, size(0, 0));
    regs.write_field(R_GEOMATCHL0_ROI_SIZE, size(frame_width, height));
    regs.write_field(R_GEOMATCHL0_SCH_IMG_SIZE, size(frame_width, height));
    regs.write_field(R_GEOMATCHL0_SCH_ACTIVE_START, size(strip_start_pos, 0));
    regs.write_field(R_GEOMATCHL0_SCH_ACTIVE_SIZE, size(dma_width, height));
    regs.write_field(R_GEOMATCHL0_SCH_ROI_START, size(0, 0));
}

/// Radial binning and centre of the mixer.
pub fn mixer_size<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    radial: &RadialConfig,
    frame_width: u32,
    height: u32,
    strip_start_pos: u32,
) {
    let (bin_x, bin_y) = resolve_radial_binning(radial, frame_width, height);
    let (center_x, center_y) = resolve_radial_center(radial, strip_start_pos);

    debug!(
        "[MTNR0] radial binning ({}, {}) center ({}, {})",
        bin_x, bin_y, center_x, center_y
    );

    regs.write_field(
        R_MIXERL0_BINNING,
        BINNING::X.val(bin_x) + BINNING::Y.val(bin_y),
    );
    regs.write_field(
        R_MIXERL0_RADIAL_CENTER,
        RADIAL_CENTER::X.val(center_x as u32) + RADIAL_CENTER::Y.val(center_y as u32),
    );
}

/// Programs one crop unit; a bypassed unit keeps its window registers.
pub fn crop<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    unit: CropRegs,
    x: u32,
    width: u32,
    height: u32,
    bypass: bool,
) {
    regs.write_field(unit.bypass(), BYPASS::BYPASS.val(bypass as u32));
    if bypass {
        return;
    }
    regs.write_field(unit.start(), SIZE::X.val(x) + SIZE::Y.val(0));
    regs.write_field(unit.size(), SIZE::X.val(width) + SIZE::Y.val(height));
}

/// Left shift on read and right shift on write; 0 bypasses both shifters.
pub fn img_bitshift<B: RegisterIo>(regs: &mut RegisterSpace<B>, shift: u32) {
    if shift == 0 {
        regs.write_register(R_DATASHIFTERRDMA_BYPASS, 1);
        regs.write_register(R_DATASHIFTERWDMA_BYPASS, 1);
        return;
    }

    regs.write_register(R_DATASHIFTERRDMA_BYPASS, 0);
    regs.write_field(
        R_DATASHIFTERRDMA_LSHIFT,
        DATASHIFTER_LSHIFT::LSHIFT_Y.val(shift) + DATASHIFTER_LSHIFT::OFFSET_Y.val(0),
    );
    regs.write_register(R_DATASHIFTERWDMA_BYPASS, 0);
    regs.write_field(
        R_DATASHIFTERWDMA_RSHIFT,
        DATASHIFTER_RSHIFT::RSHIFT_Y.val(shift) + DATASHIFTER_RSHIFT::OFFSET_Y.val(0),
    );
}

pub fn mvf_resize_offset<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    in_w: u32,
    in_h: u32,
    out_w: u32,
    out_h: u32,
    strip_start_pos: u32,
) {
    let offset = resolve_motion_vector_resize_offset(in_w, in_h, out_w, out_h, strip_start_pos);
    let (x, y) = offset.fields();
    regs.write_field(
        R_MVCONTROLLER_MVF_RESIZE_OFFSET,
        MVF_RESIZE_OFFSET::X.val(x) + MVF_RESIZE_OFFSET::Y.val(y),
    );
}

pub fn crc<B: RegisterIo>(regs: &mut RegisterSpace<B>, seed: u32) {
    regs.write_field(R_CRC_EN, CRC_EN::SEED.val(seed));
    regs.write_field(R_DTPL0_STREAM_CRC, STREAM_CRC::SEED.val(seed));
    regs.write_field(CINFIFO_MTNR1WGT.stream_crc(), STREAM_CRC::SEED.val(seed));
    regs.write_field(COUTFIFO_MSNRL0.stream_crc(), STREAM_CRC::SEED.val(seed));
}

/// Test pattern generator in front of L0.
pub fn dtp<B: RegisterIo>(
    regs: &mut RegisterSpace<B>,
    enable: bool,
    pattern: DtpPattern,
    y: u32,
    color_bar: DtpColorBar,
) {
    if !enable {
        regs.write_field(R_DTPL0_CTRL, DTP_CTRL::BYPASS.val(1));
        return;
    }

    regs.write_field(R_DTPL0_CTRL, DTP_CTRL::TEST_PATTERN_MODE.val(pattern as u32));
    match pattern {
        DtpPattern::Solid => regs.write_field(R_DTPL0_CTRL, DTP_CTRL::TEST_DATA_Y.val(y)),
        DtpPattern::ColorBar => {
            regs.write_field(R_DTPL0_CTRL, DTP_CTRL::YUV_STANDARD.val(color_bar as u32))
        }
    }
    regs.write_field(R_DTPL0_CTRL, DTP_CTRL::BYPASS.val(0));
}

/// Geometry matcher setup for mixer debugging without tuning data.
pub fn debug_geomatch_mode<B: RegisterIo>(regs: &mut RegisterSpace<B>, mode: TnrMode) {
    regs.write_field(
        R_GEOMATCHL0_EN,
        ENABLE::EN.val((mode != TnrMode::Prepare) as u32),
    );
    regs.write_field(R_GEOMATCHL0_MC_LMC_TNR_MODE, TNR_MODE::MODE.val(mode as u32));
    regs.write_field(R_GEOMATCHL0_MATCH_ENABLE, ENABLE::EN.val(0));
}

fn thresh_table<B: RegisterIo>(regs: &mut RegisterSpace<B>, table: u32, values: &[u32; 8]) {
    for pair in 0..4u32 {
        let i = (pair * 2) as usize;
        regs.write_field(
            thresh_pair(table, pair),
            THRESH_PAIR::EVEN.val(values[i]) + THRESH_PAIR::ODD.val(values[i + 1]),
        );
    }
}

/// Mixer setup with the default threshold curves.
pub fn debug_mixer_mode<B: RegisterIo>(regs: &mut RegisterSpace<B>, mode: TnrMode) {
    regs.write_field(R_MIXERL0_ENABLE, MIXER_ENABLE::ENABLE.val(1));
    regs.write_field(R_MIXERL0_MODE, TNR_MODE::MODE.val(mode as u32));
    regs.write_field(
        CINFIFO_MTNR1WGT.config(),
        FIFO_CONFIG::ROL_RESET_ON_FRAME_START.val(0),
    );

    thresh_table(regs, OFFSET_MIXERL0_THRESH_SLOPE, &MIXER_THRESH_SLOPE);
    thresh_table(regs, OFFSET_MIXERL0_THRESH, &MIXER_THRESH);
    thresh_table(regs, OFFSET_MIXERL0_SUB_THRESH, &MIXER_THRESH);
    thresh_table(regs, OFFSET_MIXERL0_SUB_THRESH_WIDTH, &MIXER_SUB_THRESH_WIDTH);
    thresh_table(regs, OFFSET_MIXERL0_SUB_THRESH_SLOPE, &MIXER_SUB_THRESH_SLOPE);

    let wgt_update = !matches!(mode, TnrMode::Prepare | TnrMode::Fusion);
    regs.write_field(R_MIXERL0_WGT_UPDATE_EN, ENABLE::EN.val(wgt_update as u32));
}

/// Constant stream generator on the OTF input.
pub fn strgen<B: RegisterIo>(regs: &mut RegisterSpace<B>) {
    regs.write_field(
        CINFIFO_MTNR1WGT.config(),
        FIFO_CONFIG::STRGEN_MODE_EN.val(1)
            + FIFO_CONFIG::STRGEN_MODE_DATA_TYPE.val(1)
            + FIFO_CONFIG::STRGEN_MODE_DATA.val(255),
    );
}

pub fn seg_otf<B: RegisterIo>(regs: &mut RegisterSpace<B>, enable: bool) {
    regs.write_field(R_OTF_SEG_EN, OTF_SEG_EN::EN.val(enable as u32));
}

pub fn still_last_frame<B: RegisterIo>(regs: &mut RegisterSpace<B>, enable: bool) {
    regs.write_field(
        R_STILL_LAST_FRAME_EN,
        STILL_LAST_FRAME_EN::EN.val(enable as u32),
    );
}

pub fn l0_bypass<B: RegisterIo>(regs: &mut RegisterSpace<B>, bypass: bool) {
    regs.write_field(R_L0_BYPASS, L0_BYPASS::BYPASS.val(bypass as u32));
}
