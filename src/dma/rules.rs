//! Role rule table of the MTNR0 DMA channels.
//!
//! Each channel role maps to one [`RoleRule`]: where its register window
//! lives, which formats it accepts and how its size, depth and compression
//! are derived from the request. Adding a channel is a new table row.

use super::{BuildContext, ChannelRole, Direction, DmaFormat, DmaParam, FormatCaps, FrameGeometry, SbwcType};
use crate::{
    config::Mtnr0Config,
    registers::consts::{DMA_WINDOW_STRIDE, OFFSET_RDMA_BASE, OFFSET_WDMA_BASE},
};

/// Inputs a size or depth rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub param: &'a DmaParam,
    pub block: &'a Mtnr0Config,
    pub frame_width: u32,
    pub frame_height: u32,
    pub strip_enable: bool,
    /// Stripe start, 0 for the first stripe.
    pub strip_start_pos: u32,
    /// Width of the whole frame the stripe is cut from.
    pub full_frame_width: u32,
}

impl<'a> RuleInput<'a> {
    pub fn new(geom: &FrameGeometry, param: &'a DmaParam, ctx: &BuildContext<'a>) -> Self {
        let strip_enable = geom.stripe.is_enabled();
        Self {
            param,
            block: ctx.block,
            frame_width: geom.frame_width,
            frame_height: geom.frame_height,
            strip_enable,
            strip_start_pos: geom.stripe.start_pos(),
            full_frame_width: if strip_enable {
                geom.stripe.full_width
            } else {
                geom.frame_width
            },
        }
    }
}

/// Transfer size of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    /// Line length the stride is computed from.
    pub full_width: u32,
    /// Stripe start in pixels, converted to bytes by the stride functions.
    pub offset_px: u32,
    /// Stripe start already known in bytes.
    pub fixed_offset_bytes: u32,
}

/// How a "lossy custom" request is narrowed for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomSbwcMap {
    /// The channel never compresses.
    Never,
    /// Custom 32B/64B map to plain lossy 32B/64B.
    Lossy,
    /// Custom 32B maps to lossy 64B on 32-byte partial access engines.
    Feedback,
}

impl CustomSbwcMap {
    pub fn resolve(self, requested: SbwcType, en_32b_pa: bool) -> SbwcType {
        match (self, requested) {
            (CustomSbwcMap::Never, _) => SbwcType::Disable,
            (CustomSbwcMap::Lossy, SbwcType::LossyCustom32) => SbwcType::Lossy32,
            (CustomSbwcMap::Feedback, SbwcType::LossyCustom32) if en_32b_pa => SbwcType::Lossy64,
            (CustomSbwcMap::Feedback, SbwcType::LossyCustom32) => SbwcType::Lossy32,
            (_, SbwcType::LossyCustom64) => SbwcType::Lossy64,
            (_, other) => other,
        }
    }
}

#[derive(Clone, Copy)]
pub struct RoleRule {
    pub role: ChannelRole,
    pub direction: Direction,
    /// Base offset of the channel register window.
    pub window: u32,
    pub caps: FormatCaps,
    /// Format forced regardless of the request.
    pub format: Option<DmaFormat>,
    pub is_image: bool,
    /// The stripe byte offset is added to the image address.
    pub offset_on_addr: bool,
    /// A header plane follows the payload when compressed.
    pub has_header: bool,
    pub msb_align: bool,
    /// The channel may use 32-byte partial accesses on compressed data.
    pub feedback_32b_pa: bool,
    pub write_alloc_on_32b_pa: bool,
    pub custom: CustomSbwcMap,
    pub size: fn(&RuleInput<'_>) -> Extent,
    pub depth: fn(&RuleInput<'_>) -> (u32, u32),
}

impl core::fmt::Debug for RoleRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleRule")
            .field("role", &self.role)
            .field("window", &format_args!("{:#x}", self.window))
            .field("caps", &self.caps)
            .field("custom", &self.custom)
            .finish()
    }
}

const fn rdma_window(idx: u32) -> u32 {
    OFFSET_RDMA_BASE + idx * DMA_WINDOW_STRIDE
}

const fn wdma_window(idx: u32) -> u32 {
    OFFSET_WDMA_BASE + idx * DMA_WINDOW_STRIDE
}

/// Weight maps are half resolution, 16-pixel aligned, two bytes wide.
const fn wgt_width(width: u32) -> u32 {
    (width / 2 + 15) / 16 * 16 * 2
}

const fn wgt_height(height: u32) -> u32 {
    (height / 2 + 1) / 2
}

fn cur_size(i: &RuleInput<'_>) -> Extent {
    Extent {
        width: i.param.crop_width,
        height: i.frame_height,
        full_width: i.full_frame_width,
        offset_px: i.param.crop_offset_x,
        fixed_offset_bytes: 0,
    }
}

fn prev_size(i: &RuleInput<'_>) -> Extent {
    Extent {
        width: i.full_frame_width,
        height: i.frame_height,
        full_width: i.full_frame_width,
        ..Default::default()
    }
}

fn prev_wgt_size(i: &RuleInput<'_>) -> Extent {
    let width = wgt_width(i.full_frame_width);
    Extent {
        width,
        height: wgt_height(i.frame_height),
        full_width: width,
        ..Default::default()
    }
}

fn mv_size(i: &RuleInput<'_>) -> Extent {
    let mv_width = i.block.mvc_in_w * 4;
    let fixed_offset_bytes = if mv_width == 0 {
        0
    } else {
        (i.strip_start_pos / mv_width) * mv_width / 8
    };
    Extent {
        width: mv_width,
        height: i.block.mvc_in_h,
        full_width: mv_width,
        offset_px: 0,
        fixed_offset_bytes,
    }
}

fn seg_size(i: &RuleInput<'_>) -> Extent {
    Extent {
        width: i.frame_width,
        height: i.frame_height,
        full_width: i.full_frame_width,
        offset_px: i.strip_start_pos,
        fixed_offset_bytes: 0,
    }
}

fn out_wgt_size(i: &RuleInput<'_>) -> Extent {
    Extent {
        width: wgt_width(i.param.crop_width),
        height: wgt_height(i.frame_height),
        full_width: wgt_width(i.full_frame_width),
        offset_px: i.param.crop_offset_x,
        fixed_offset_bytes: 0,
    }
}

fn param_depth(i: &RuleInput<'_>) -> (u32, u32) {
    (i.param.bitwidth, i.param.msb + 1)
}

fn cur_l4_depth(i: &RuleInput<'_>) -> (u32, u32) {
    if i.block.still_en {
        (16, 12)
    } else {
        param_depth(i)
    }
}

fn img_l0_depth(i: &RuleInput<'_>) -> (u32, u32) {
    (i.block.img_l0_bit, i.block.img_l0_bit)
}

fn depth_8bit(_: &RuleInput<'_>) -> (u32, u32) {
    (8, 8)
}

const CUR_IMAGE: RoleRule = RoleRule {
    role: ChannelRole::RdmaCurL0Y,
    direction: Direction::Read,
    window: rdma_window(0),
    caps: FormatCaps::YUV,
    format: None,
    is_image: true,
    offset_on_addr: true,
    has_header: true,
    msb_align: true,
    feedback_32b_pa: false,
    write_alloc_on_32b_pa: false,
    custom: CustomSbwcMap::Lossy,
    size: cur_size,
    depth: param_depth,
};

const PREV_IMAGE: RoleRule = RoleRule {
    role: ChannelRole::RdmaPrevL0Y,
    direction: Direction::Read,
    window: rdma_window(2),
    caps: FormatCaps::YUV,
    format: Some(DmaFormat::Y),
    is_image: true,
    offset_on_addr: false,
    has_header: true,
    msb_align: true,
    feedback_32b_pa: true,
    write_alloc_on_32b_pa: false,
    custom: CustomSbwcMap::Feedback,
    size: prev_size,
    depth: img_l0_depth,
};

const DATA_8BIT: RoleRule = RoleRule {
    role: ChannelRole::RdmaPrevL0Wgt,
    direction: Direction::Read,
    window: rdma_window(4),
    caps: FormatCaps::Y,
    format: Some(DmaFormat::Y),
    is_image: true,
    offset_on_addr: true,
    has_header: false,
    msb_align: false,
    feedback_32b_pa: false,
    write_alloc_on_32b_pa: false,
    custom: CustomSbwcMap::Never,
    size: prev_wgt_size,
    depth: depth_8bit,
};

/// Rules indexed by [`ChannelRole::index`].
pub static RULES: [RoleRule; ChannelRole::COUNT] = [
    CUR_IMAGE,
    RoleRule {
        role: ChannelRole::RdmaCurL4Y,
        window: rdma_window(1),
        depth: cur_l4_depth,
        ..CUR_IMAGE
    },
    PREV_IMAGE,
    RoleRule {
        role: ChannelRole::RdmaPrevL0Y1,
        window: rdma_window(3),
        ..PREV_IMAGE
    },
    DATA_8BIT,
    RoleRule {
        role: ChannelRole::RdmaSegL0,
        window: rdma_window(5),
        size: seg_size,
        ..DATA_8BIT
    },
    RoleRule {
        role: ChannelRole::RdmaMvGeomatch,
        window: rdma_window(6),
        is_image: false,
        size: mv_size,
        ..DATA_8BIT
    },
    RoleRule {
        role: ChannelRole::WdmaPrevL0Y,
        direction: Direction::Write,
        window: wdma_window(0),
        format: Some(DmaFormat::Yuv422),
        offset_on_addr: true,
        msb_align: false,
        write_alloc_on_32b_pa: true,
        size: cur_size,
        ..PREV_IMAGE
    },
    RoleRule {
        role: ChannelRole::WdmaPrevL0Wgt,
        direction: Direction::Write,
        window: wdma_window(1),
        size: out_wgt_size,
        ..DATA_8BIT
    },
];

pub fn rule_for(role: ChannelRole) -> &'static RoleRule {
    &RULES[role.index()]
}

/// Searches `table` for the rule of `role`.
pub fn find_rule(table: &'static [RoleRule], role: ChannelRole) -> Option<&'static RoleRule> {
    table.iter().find(|rule| rule.role == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_role() {
        for role in ChannelRole::READ_ORDER
            .iter()
            .chain(ChannelRole::WRITE_ORDER.iter())
        {
            let rule = rule_for(*role);
            assert_eq!(rule.role, *role);
            assert_eq!(rule.direction, role.direction());
        }
    }

    #[test]
    fn missing_rule_is_not_found() {
        assert!(find_rule(&RULES, ChannelRole::WdmaPrevL0Wgt).is_some());
        assert!(find_rule(&RULES[..4], ChannelRole::WdmaPrevL0Wgt).is_none());
    }

    #[test]
    fn windows_do_not_overlap() {
        let mut windows: alloc::vec::Vec<u32> = RULES.iter().map(|r| r.window).collect();
        windows.sort_unstable();
        windows.dedup();
        assert_eq!(windows.len(), ChannelRole::COUNT);
    }

    #[test]
    fn headers_only_on_image_planes() {
        for rule in RULES.iter() {
            if rule.has_header {
                assert_ne!(rule.custom, CustomSbwcMap::Never, "{:?}", rule.role);
            }
        }
        assert!(!rule_for(ChannelRole::WdmaPrevL0Wgt).has_header);
        assert!(rule_for(ChannelRole::WdmaPrevL0Y).has_header);
    }

    #[test]
    fn custom_map_table() {
        use SbwcType::*;
        assert_eq!(CustomSbwcMap::Lossy.resolve(LossyCustom32, true), Lossy32);
        assert_eq!(CustomSbwcMap::Lossy.resolve(LossyCustom64, false), Lossy64);
        assert_eq!(CustomSbwcMap::Feedback.resolve(LossyCustom32, true), Lossy64);
        assert_eq!(CustomSbwcMap::Feedback.resolve(LossyCustom32, false), Lossy32);
        assert_eq!(CustomSbwcMap::Feedback.resolve(Lossless32, true), Lossless32);
        assert_eq!(CustomSbwcMap::Never.resolve(Lossy64, true), Disable);
    }

    #[test]
    fn weight_rounding() {
        assert_eq!(wgt_width(1920), 1920);
        assert_eq!(wgt_width(1000), 1024);
        assert_eq!(wgt_height(1080), 270);
        assert_eq!(wgt_height(1081), 270);
    }
}
