//! DMA channel descriptor builder.
//!
//! [`build_transfer_config`] turns a channel role, the frame geometry and
//! the caller's [`DmaParam`] into a fully resolved [`DmaTransferConfig`]
//! without touching hardware. The resolved descriptor is written into its
//! channel window later by [`DmaTransferConfig::commit`], so a frame whose
//! descriptors cannot all be built never reaches the registers.

use core::fmt;

use crate::{
    config::Mtnr0Config,
    err::IspError,
    geometry::StripeInput,
    osal::DmaAddr,
    registers::{
        RegisterIo, RegisterSpace,
        dma::{DMA_COMP_CTRL, DMA_DATA_FORMAT, DMA_EN, DMA_SET_ID, DmaRegs, MAX_BATCH},
    },
};

mod rules;
mod stride;

pub use rules::{CustomSbwcMap, Extent, RULES, RoleRule, RuleInput, find_rule, rule_for};
pub use stride::{align_down, align_up, header_stride, image_stride, payload_size, payload_stride};

pub type Result<T> = core::result::Result<T, IspError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Every DMA engine of the MTNR0 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelRole {
    RdmaCurL0Y,
    RdmaCurL4Y,
    RdmaPrevL0Y,
    RdmaPrevL0Y1,
    RdmaPrevL0Wgt,
    RdmaSegL0,
    RdmaMvGeomatch,
    WdmaPrevL0Y,
    WdmaPrevL0Wgt,
}

impl ChannelRole {
    pub const COUNT: usize = 9;

    /// Read channels in programming order.
    pub const READ_ORDER: [ChannelRole; 7] = [
        ChannelRole::RdmaCurL0Y,
        ChannelRole::RdmaCurL4Y,
        ChannelRole::RdmaPrevL0Y,
        ChannelRole::RdmaPrevL0Y1,
        ChannelRole::RdmaPrevL0Wgt,
        ChannelRole::RdmaSegL0,
        ChannelRole::RdmaMvGeomatch,
    ];

    pub const WRITE_ORDER: [ChannelRole; 2] = [ChannelRole::WdmaPrevL0Y, ChannelRole::WdmaPrevL0Wgt];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn direction(self) -> Direction {
        match self {
            ChannelRole::WdmaPrevL0Y | ChannelRole::WdmaPrevL0Wgt => Direction::Write,
            _ => Direction::Read,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChannelRole::RdmaCurL0Y => "MTNR0_RDMA_C_L0_Y",
            ChannelRole::RdmaCurL4Y => "MTNR0_RDMA_C_L4_Y",
            ChannelRole::RdmaPrevL0Y => "MTNR0_RDMA_P_L0_Y_0",
            ChannelRole::RdmaPrevL0Y1 => "MTNR0_RDMA_P_L0_Y_1",
            ChannelRole::RdmaPrevL0Wgt => "MTNR0_RDMA_P_L0_WGT",
            ChannelRole::RdmaSegL0 => "MTNR0_RDMA_SEG_L0",
            ChannelRole::RdmaMvGeomatch => "MTNR0_RDMA_MV_GEOMATCH",
            ChannelRole::WdmaPrevL0Y => "MTNR0_WDMA_P_L0_Y",
            ChannelRole::WdmaPrevL0Wgt => "MTNR0_WDMA_P_L0_WGT",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel layout in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DmaFormat {
    Bayer = 0,
    BayerPacked = 1,
    #[default]
    Y = 2,
    Yuv422 = 3,
    Yuv444 = 4,
}

impl DmaFormat {
    pub fn is_packed(self) -> bool {
        matches!(self, DmaFormat::BayerPacked)
    }

    pub fn caps(self) -> FormatCaps {
        match self {
            DmaFormat::Bayer => FormatCaps::BAYER,
            DmaFormat::BayerPacked => FormatCaps::BAYER_PACKED,
            DmaFormat::Y => FormatCaps::Y,
            DmaFormat::Yuv422 => FormatCaps::YUV422,
            DmaFormat::Yuv444 => FormatCaps::YUV444,
        }
    }
}

bitflags::bitflags! {
    /// Formats a channel accepts.
    pub struct FormatCaps: u32 {
        const BAYER        = 1 << 0;
        const BAYER_PACKED = 1 << 1;
        const Y            = 1 << 2;
        const YUV422       = 1 << 3;
        const YUV444       = 1 << 4;
        const YUV = Self::Y.bits | Self::YUV422.bits | Self::YUV444.bits;
    }
}

/// Requested SBWC compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SbwcType {
    #[default]
    Disable = 0,
    Lossless32 = 1,
    Lossless64 = 2,
    Lossy32 = 3,
    Lossy64 = 4,
    /// Lossy luma, lossless chroma.
    LossyCustom32 = 5,
    LossyCustom64 = 6,
}

impl TryFrom<u32> for SbwcType {
    type Error = IspError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => SbwcType::Disable,
            1 => SbwcType::Lossless32,
            2 => SbwcType::Lossless64,
            3 => SbwcType::Lossy32,
            4 => SbwcType::Lossy64,
            5 => SbwcType::LossyCustom32,
            6 => SbwcType::LossyCustom64,
            _ => return Err(IspError::UnsupportedCompression(value)),
        })
    }
}

impl SbwcType {
    pub fn is_custom(self) -> bool {
        matches!(self, SbwcType::LossyCustom32 | SbwcType::LossyCustom64)
    }

    /// Hardware compression enable and 64-byte alignment.
    pub fn comp_sbwc_en(self) -> (CompMode, bool) {
        match self {
            SbwcType::Disable => (CompMode::None, false),
            SbwcType::Lossless32 => (CompMode::Lossless, false),
            SbwcType::Lossless64 => (CompMode::Lossless, true),
            SbwcType::Lossy32 | SbwcType::LossyCustom32 => (CompMode::Lossy, false),
            SbwcType::Lossy64 | SbwcType::LossyCustom64 => (CompMode::Lossy, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CompMode {
    #[default]
    None = 0,
    Lossless = 1,
    Lossy = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum LossyQuality {
    #[default]
    Visual = 0,
    Footprint = 1,
}

impl LossyQuality {
    /// Compressed size relative to the raw block.
    pub const fn ratio(self) -> (u32, u32) {
        match self {
            LossyQuality::Visual => (3, 4),
            LossyQuality::Footprint => (1, 2),
        }
    }
}

/// Caller request for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaParam {
    pub cmd: bool,
    pub format: DmaFormat,
    pub bitwidth: u32,
    /// Most significant bit index; pixel size is `msb + 1`.
    pub msb: u32,
    /// Raw SBWC request, validated when the descriptor is built.
    pub sbwc_type: u32,
    pub width: u32,
    pub height: u32,
    pub crop_offset_x: u32,
    pub crop_width: u32,
}

impl Default for DmaParam {
    fn default() -> Self {
        Self {
            cmd: false,
            format: DmaFormat::Y,
            bitwidth: 8,
            msb: 7,
            sbwc_type: 0,
            width: 0,
            height: 0,
            crop_offset_x: 0,
            crop_width: 0,
        }
    }
}

/// Frame size seen by one channel plus the stripe it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameGeometry {
    pub frame_width: u32,
    pub frame_height: u32,
    pub stripe: StripeInput,
}

/// Block-wide inputs of the descriptor builder.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub block: &'a Mtnr0Config,
    pub cache_32b_pa: bool,
    pub comp_block_width: u32,
    pub comp_block_height: u32,
}

/// Fully resolved DMA descriptor of one channel for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTransferConfig {
    pub role: ChannelRole,
    pub enable: bool,
    pub format: DmaFormat,
    pub bitwidth: u32,
    pub pixelsize: u32,
    pub comp: CompMode,
    pub comp_64b_align: bool,
    pub quality: LossyQuality,
    pub cache_32b_pa: bool,
    pub msb_align: bool,
    pub bus_info: u32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub header_stride: u32,
    pub payload_size: u32,
    /// Byte offset of the stripe start inside the payload plane.
    pub strip_offset: u32,
    /// Byte offset of the stripe start inside the header plane.
    pub header_offset: u32,
}

impl DmaTransferConfig {
    pub fn disabled(role: ChannelRole) -> Self {
        Self {
            role,
            enable: false,
            format: DmaFormat::Y,
            bitwidth: 0,
            pixelsize: 0,
            comp: CompMode::None,
            comp_64b_align: false,
            quality: LossyQuality::Visual,
            cache_32b_pa: false,
            msb_align: false,
            bus_info: 0,
            width: 0,
            height: 0,
            stride: 0,
            header_stride: 0,
            payload_size: 0,
            strip_offset: 0,
            header_offset: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.comp != CompMode::None
    }

    /// Image and header base address of one batch buffer.
    pub fn addresses(&self, base: DmaAddr) -> (DmaAddr, Option<DmaAddr>) {
        let rule = rule_for(self.role);
        let img = if rule.offset_on_addr {
            base + self.strip_offset as DmaAddr
        } else {
            base
        };
        let header = (self.is_compressed() && rule.has_header)
            .then(|| base + self.payload_size as DmaAddr + self.header_offset as DmaAddr);

        (img, header)
    }

    /// Writes the descriptor into its channel window.
    pub fn commit<B: RegisterIo>(&self, regs: &mut RegisterSpace<B>, set_id: u32) {
        let rule = rule_for(self.role);
        let win = DmaRegs::new(rule.window);

        regs.write_field(win.set_id(), DMA_SET_ID::SET_ID.val(set_id));
        regs.write_field(win.en(), DMA_EN::EN.val(self.enable as u32));
        if !self.enable {
            return;
        }

        regs.write_field(
            win.data_format(),
            DMA_DATA_FORMAT::FORMAT.val(self.format as u32)
                + DMA_DATA_FORMAT::BITWIDTH.val(self.bitwidth)
                + DMA_DATA_FORMAT::PIXELSIZE.val(self.pixelsize),
        );
        regs.write_field(
            win.comp_ctrl(),
            DMA_COMP_CTRL::SBWC_EN.val(self.comp as u32)
                + DMA_COMP_CTRL::QUALITY_CONTROL.val(self.quality as u32),
        );
        regs.write_register(win.width(), self.width);
        regs.write_register(win.height(), self.height);
        regs.write_register(win.stride(), self.stride);
        regs.write_register(win.votf_en(), 0);
        regs.write_register(win.bus_info(), self.bus_info);
        regs.write_field(
            win.comp_ctrl(),
            DMA_COMP_CTRL::CACHE_32B_PA.val(self.cache_32b_pa as u32),
        );
        if self.role.direction() == Direction::Read {
            regs.write_field(
                win.data_format(),
                DMA_DATA_FORMAT::MSB_ALIGN.val(self.msb_align as u32),
            );
        }

        if self.is_compressed() {
            regs.write_field(
                win.comp_ctrl(),
                DMA_COMP_CTRL::ALIGN_64B.val(self.comp_64b_align as u32),
            );
            regs.write_register(win.header_stride(), self.header_stride);
        }

        debug!(
            "[MTNR0] {}: {}x{} fmt {:?} bit {}/{} comp {:?} align64 {} stride {}/{} payload {} ofs {}/{}",
            self.role,
            self.width,
            self.height,
            self.format,
            self.bitwidth,
            self.pixelsize,
            self.comp,
            self.comp_64b_align,
            self.stride,
            self.header_stride,
            self.payload_size,
            self.strip_offset,
            self.header_offset
        );
    }

    /// Programs one address slot per batch buffer.
    pub fn program_addresses<B: RegisterIo>(&self, regs: &mut RegisterSpace<B>, addrs: &[DmaAddr]) {
        if !self.enable {
            return;
        }

        let win = DmaRegs::new(rule_for(self.role).window);
        for (idx, &base) in addrs.iter().take(MAX_BATCH).enumerate() {
            let (img, header) = self.addresses(base);
            regs.write_dma_addr(win.img_addr(idx), img);
            if let Some(header) = header {
                regs.write_dma_addr(win.header_addr(idx), header);
            }
        }
    }
}

/// Seam for the descriptor builder used by the shot path.
pub trait DescriptorBuilder: Send {
    fn build(
        &self,
        role: ChannelRole,
        geom: &FrameGeometry,
        param: &DmaParam,
        ctx: &BuildContext<'_>,
    ) -> Result<DmaTransferConfig>;
}

/// Builder driven by the static [`RULES`] table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleTableBuilder;

impl DescriptorBuilder for RuleTableBuilder {
    fn build(
        &self,
        role: ChannelRole,
        geom: &FrameGeometry,
        param: &DmaParam,
        ctx: &BuildContext<'_>,
    ) -> Result<DmaTransferConfig> {
        build_transfer_config(role, geom, param, ctx)
    }
}

/// Resolves the descriptor of `role` for one frame.
pub fn build_transfer_config(
    role: ChannelRole,
    geom: &FrameGeometry,
    param: &DmaParam,
    ctx: &BuildContext<'_>,
) -> Result<DmaTransferConfig> {
    if !param.cmd {
        return Ok(DmaTransferConfig::disabled(role));
    }

    if ctx.comp_block_width == 0 || ctx.comp_block_height == 0 {
        error!(
            "[MTNR0] {}: invalid compression block {}x{}",
            role, ctx.comp_block_width, ctx.comp_block_height
        );
        return Err(IspError::InvalidGeometry("zero compression block"));
    }

    let Some(rule) = find_rule(&RULES, role) else {
        error!("[MTNR0] {}: no rule", role);
        return Err(IspError::UnsupportedChannel(role));
    };
    let input = RuleInput::new(geom, param, ctx);
    let extent = (rule.size)(&input);
    if extent.width == 0 || extent.height == 0 {
        error!(
            "[MTNR0] {}: zero size {}x{}",
            role, extent.width, extent.height
        );
        return Err(IspError::InvalidGeometry("zero channel size"));
    }

    let requested = SbwcType::try_from(param.sbwc_type)?;
    let en_32b_pa = rule.feedback_32b_pa && ctx.cache_32b_pa && requested != SbwcType::Disable;
    let sbwc = rule.custom.resolve(requested, en_32b_pa);
    let format = rule.format.unwrap_or(param.format);
    if !rule.caps.contains(format.caps()) {
        error!("[MTNR0] {}: format {:?} not supported", role, format);
        return Err(IspError::UnsupportedFormat(format as u32));
    }

    let (bitwidth, pixelsize) = (rule.depth)(&input);
    if !matches!(bitwidth, 8 | 10 | 12 | 16) || pixelsize == 0 || pixelsize > bitwidth {
        error!(
            "[MTNR0] {}: invalid depth bit {} pix {}",
            role, bitwidth, pixelsize
        );
        return Err(IspError::UnsupportedFormat(format as u32));
    }

    let (comp, align_64b) = sbwc.comp_sbwc_en();
    let comp_64b_align = align_64b || en_32b_pa;
    let quality = if comp == CompMode::Lossy {
        LossyQuality::Footprint
    } else {
        LossyQuality::Visual
    };
    let (bw, bh) = (ctx.comp_block_width, ctx.comp_block_height);

    let mut strip_offset = extent.fixed_offset_bytes;
    let mut header_offset = 0;
    let (stride, hdr_stride) = match comp {
        CompMode::None => {
            let stride = image_stride(
                bitwidth,
                pixelsize,
                format,
                extent.full_width,
                16,
                rule.is_image,
            );
            if input.strip_enable && extent.offset_px != 0 {
                strip_offset =
                    image_stride(bitwidth, pixelsize, format, extent.offset_px, 16, true);
            }
            (stride, 0)
        }
        CompMode::Lossless | CompMode::Lossy => {
            let stride = payload_stride(
                comp,
                pixelsize,
                extent.full_width,
                comp_64b_align,
                quality,
                bw,
                bh,
            );
            if input.strip_enable && extent.offset_px != 0 {
                strip_offset = payload_stride(
                    comp,
                    pixelsize,
                    extent.offset_px,
                    comp_64b_align,
                    quality,
                    bw,
                    bh,
                );
                header_offset = header_stride(extent.offset_px, bw, 0);
            }
            (stride, header_stride(extent.full_width, bw, 16))
        }
    };

    if stride & 1 != 0 {
        error!("[MTNR0] {}: odd stride {}", role, stride);
        return Err(IspError::InvalidGeometry("odd stride"));
    }

    let compressed = comp != CompMode::None;
    let payload = if compressed {
        payload_size(extent.height, bh, stride)
    } else {
        0
    };

    let mut bus_info = 0;
    if rule.write_alloc_on_32b_pa && en_32b_pa {
        bus_info |= crate::registers::dma::BUS_INFO_WRITE_ALLOC;
    }

    Ok(DmaTransferConfig {
        role,
        enable: true,
        format,
        bitwidth,
        pixelsize,
        comp,
        comp_64b_align: compressed && comp_64b_align,
        quality,
        cache_32b_pa: en_32b_pa,
        msb_align: rule.msb_align,
        bus_info,
        width: extent.width,
        height: extent.height,
        stride,
        header_stride: hdr_stride,
        payload_size: payload,
        strip_offset,
        header_offset,
    })
}
