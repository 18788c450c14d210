//! Per-frame inputs of the shot path and the planning steps run on them
//! before any register is touched.

use alloc::vec::Vec;

use crate::{
    config::{Mtnr0Config, TnrMode},
    dma::{ChannelRole, DmaParam, FrameGeometry},
    err::IspError,
    geometry::{
        RadialConfig, Size, StripeCrop, StripeInput, otf_margin_crop, resolve_stripe_crop,
        verify_l1_size,
    },
    osal::DmaAddr,
};

/// Channel requests and OTF switches of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    pub stripe: StripeInput,
    /// Indexed by [`ChannelRole::index`].
    pub dma: [DmaParam; ChannelRole::COUNT],
    /// L1 input; must be half of L0 rounded up to even.
    pub cur_l1: Size,
    /// OTF weight input from MTNR1.
    pub otf_in: bool,
    /// OTF output towards MSNR L0.
    pub otf_out: bool,
    /// Internal stream generator instead of a real input.
    pub strgen: bool,
}

impl ParamSet {
    pub fn dma(&self, role: ChannelRole) -> &DmaParam {
        &self.dma[role.index()]
    }

    pub fn dma_mut(&mut self, role: ChannelRole) -> &mut DmaParam {
        &mut self.dma[role.index()]
    }

    fn set_cmd(&mut self, role: ChannelRole, on: bool) {
        self.dma_mut(role).cmd = on;
    }
}

/// Feedback buffers owned by the caller instead of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalFeedback {
    pub prev_image: DmaAddr,
    pub cur_image: DmaAddr,
    pub prev_weight: DmaAddr,
    pub cur_weight: DmaAddr,
}

/// Everything the frame scheduler hands over for one shot.
#[derive(Debug, Clone, Default)]
pub struct FrameRequest {
    pub instance: u32,
    pub fcount: u32,
    /// Buffers in this batch; 1 outside FRO.
    pub num_buffers: u32,
    pub cur_buf_index: u32,
    pub params: ParamSet,
    pub radial: RadialConfig,
    /// Base addresses per role, one per batch buffer. Only the current,
    /// L4, segmentation and motion-vector reads are taken from here.
    pub dva: [Vec<DmaAddr>; ChannelRole::COUNT],
    pub external_feedback: Option<ExternalFeedback>,
    /// Second pass of a recursive 2NR frame.
    pub recursive_nr_2nd: bool,
}

impl FrameRequest {
    pub fn new(instance: u32, fcount: u32, params: ParamSet) -> Self {
        Self {
            instance,
            fcount,
            num_buffers: 1,
            params,
            ..Default::default()
        }
    }

    pub fn with_dva(mut self, role: ChannelRole, addrs: &[DmaAddr]) -> Self {
        self.dva[role.index()] = addrs.to_vec();
        self
    }
}

/// Derives the channel enables from the mixer mode.
///
/// Requests of roles the mixer does not steer are kept as given.
pub fn derive_dma_cmds(params: &mut ParamSet, cfg: &Mtnr0Config) {
    use ChannelRole::*;

    if cfg.mixer_en {
        if cfg.still_en {
            params.set_cmd(RdmaPrevL0Wgt, true);
            params.set_cmd(WdmaPrevL0Wgt, true);
        } else {
            params.set_cmd(WdmaPrevL0Y, true);
            match cfg.mixer_mode {
                TnrMode::Prepare => {
                    params.set_cmd(RdmaMvGeomatch, false);
                    params.set_cmd(RdmaPrevL0Y, false);
                    params.set_cmd(RdmaPrevL0Wgt, false);
                    params.set_cmd(WdmaPrevL0Wgt, false);
                }
                TnrMode::First => {
                    params.set_cmd(RdmaPrevL0Y, true);
                    params.set_cmd(RdmaPrevL0Wgt, false);
                    params.set_cmd(WdmaPrevL0Wgt, true);
                }
                TnrMode::Normal => {
                    params.set_cmd(RdmaPrevL0Y, true);
                    params.set_cmd(RdmaPrevL0Wgt, true);
                    params.set_cmd(WdmaPrevL0Wgt, true);
                }
                TnrMode::Fusion => {}
            }

            if cfg.skip_wdma && cfg.mixer_mode == TnrMode::Normal {
                params.set_cmd(WdmaPrevL0Y, false);
                params.set_cmd(WdmaPrevL0Wgt, false);
            }
        }
    } else {
        params.set_cmd(RdmaPrevL0Y, false);
        params.set_cmd(RdmaPrevL0Wgt, false);
        params.set_cmd(RdmaMvGeomatch, false);
        params.set_cmd(WdmaPrevL0Y, false);
        params.set_cmd(WdmaPrevL0Wgt, false);
    }

    let prev = params.dma(RdmaPrevL0Y).cmd;
    params.set_cmd(RdmaPrevL0Y1, prev);

    let cur = if !cfg.mixer_en {
        Some(false)
    } else if cfg.still_en {
        Some(true)
    } else {
        match cfg.mixer_mode {
            TnrMode::Prepare => Some(false),
            TnrMode::First | TnrMode::Normal => Some(true),
            TnrMode::Fusion => None,
        }
    };
    if let Some(on) = cur {
        params.set_cmd(RdmaCurL4Y, on);
        params.otf_in = on;
    }
}

/// Size and crop registers of one frame, resolved up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePlan {
    pub l0: Size,
    pub l1: Size,
    pub l4: Size,
    pub frame_width: u32,
    pub strip_enable: bool,
    pub strip_start_pos: u32,
    /// OTF clean-image crop `(x, width)`; bypassed unless a margin is cut.
    pub otf_crop: (u32, u32),
    pub otf_crop_bypass: bool,
    pub crop: StripeCrop,
    pub img_shift: u32,
}

impl SizePlan {
    /// Comp block width of the write channels, doubled.
    pub const STRIPE_ALIGN: u32 = 64;

    pub fn resolve(
        params: &ParamSet,
        cfg: &Mtnr0Config,
        otf_margin: Option<u32>,
    ) -> Result<Self, IspError> {
        let cur_l0 = params.dma(ChannelRole::RdmaCurL0Y);
        let cur_l4 = params.dma(ChannelRole::RdmaCurL4Y);
        let l0 = Size::new(cur_l0.width, cur_l0.height);
        let l4 = Size::new(cur_l4.width, cur_l4.height);

        if l0.w == 0 || l0.h == 0 {
            error!("[MTNR0] zero l0 input {}x{}", l0.w, l0.h);
            return Err(IspError::InvalidGeometry("zero l0 input"));
        }
        verify_l1_size(l0, params.cur_l1)?;

        let stripe = &params.stripe;
        let strip_enable = stripe.is_enabled();
        let frame_width = if strip_enable { stripe.full_width } else { l0.w };
        let strip_start_pos = stripe.start_pos();

        let (otf_crop, otf_crop_bypass) = match otf_margin {
            Some(margin) if strip_enable => (otf_margin_crop(l0.w, stripe, margin), false),
            _ => ((0, l0.w), true),
        };

        let crop = resolve_stripe_crop(frame_width, l0.w, stripe, Self::STRIPE_ALIGN);

        Ok(Self {
            l0,
            l1: params.cur_l1,
            l4,
            frame_width,
            strip_enable,
            strip_start_pos,
            otf_crop,
            otf_crop_bypass,
            crop,
            img_shift: 12u32.saturating_sub(cfg.img_l0_bit),
        })
    }

    /// Weight crop `(x, width)`, half of the image crop.
    pub fn weight_crop(&self) -> (u32, u32) {
        self.crop.weight()
    }

    /// Writes the resolved crop into the channel requests the builder reads.
    pub fn apply_dma_crops(&self, params: &mut ParamSet) {
        let margins = params.stripe.left_margin + params.stripe.right_margin;

        for role in [ChannelRole::WdmaPrevL0Y, ChannelRole::WdmaPrevL0Wgt] {
            let p = params.dma_mut(role);
            p.crop_offset_x = self.crop.start_x;
            p.crop_width = self.crop.width;
        }

        let cur = params.dma_mut(ChannelRole::RdmaCurL0Y);
        cur.crop_offset_x = self.strip_start_pos;
        cur.crop_width = self.crop.width + margins;
    }

    pub fn geometry(&self, stripe: StripeInput) -> FrameGeometry {
        FrameGeometry {
            frame_width: self.l0.w,
            frame_height: self.l0.h,
            stripe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmds(params: &ParamSet) -> [bool; ChannelRole::COUNT] {
        core::array::from_fn(|i| params.dma[i].cmd)
    }

    fn with_all_on() -> ParamSet {
        let mut p = ParamSet::default();
        for d in p.dma.iter_mut() {
            d.cmd = true;
        }
        p.otf_in = true;
        p
    }

    fn video(mode: TnrMode) -> Mtnr0Config {
        Mtnr0Config {
            mixer_en: true,
            mixer_mode: mode,
            ..Default::default()
        }
    }

    #[test]
    fn mixer_off_disables_feedback() {
        let mut p = with_all_on();
        derive_dma_cmds(&mut p, &Mtnr0Config::default());

        use ChannelRole::*;
        for role in [RdmaPrevL0Y, RdmaPrevL0Y1, RdmaPrevL0Wgt, RdmaMvGeomatch, WdmaPrevL0Y, WdmaPrevL0Wgt, RdmaCurL4Y] {
            assert!(!p.dma(role).cmd, "{role}");
        }
        assert!(p.dma(RdmaCurL0Y).cmd);
        assert!(p.dma(RdmaSegL0).cmd);
        assert!(!p.otf_in);
    }

    #[test]
    fn prepare_reads_nothing_back() {
        let mut p = with_all_on();
        derive_dma_cmds(&mut p, &video(TnrMode::Prepare));

        use ChannelRole::*;
        assert!(p.dma(WdmaPrevL0Y).cmd);
        assert!(!p.dma(WdmaPrevL0Wgt).cmd);
        assert!(!p.dma(RdmaPrevL0Y).cmd);
        assert!(!p.dma(RdmaPrevL0Y1).cmd);
        assert!(!p.dma(RdmaPrevL0Wgt).cmd);
        assert!(!p.dma(RdmaMvGeomatch).cmd);
        assert!(!p.dma(RdmaCurL4Y).cmd);
    }

    #[test]
    fn first_and_normal() {
        use ChannelRole::*;

        let mut p = ParamSet::default();
        derive_dma_cmds(&mut p, &video(TnrMode::First));
        assert!(p.dma(RdmaPrevL0Y).cmd && p.dma(RdmaPrevL0Y1).cmd);
        assert!(!p.dma(RdmaPrevL0Wgt).cmd);
        assert!(p.dma(WdmaPrevL0Y).cmd && p.dma(WdmaPrevL0Wgt).cmd);
        assert!(p.dma(RdmaCurL4Y).cmd && p.otf_in);

        let mut p = ParamSet::default();
        derive_dma_cmds(&mut p, &video(TnrMode::Normal));
        for role in [RdmaPrevL0Y, RdmaPrevL0Y1, RdmaPrevL0Wgt, WdmaPrevL0Y, WdmaPrevL0Wgt, RdmaCurL4Y] {
            assert!(p.dma(role).cmd, "{role}");
        }
    }

    #[test]
    fn skip_wdma_drops_writes_in_normal_only() {
        let mut cfg = video(TnrMode::Normal);
        cfg.skip_wdma = true;
        let mut p = ParamSet::default();
        derive_dma_cmds(&mut p, &cfg);
        assert!(!p.dma(ChannelRole::WdmaPrevL0Y).cmd);
        assert!(!p.dma(ChannelRole::WdmaPrevL0Wgt).cmd);
        assert!(p.dma(ChannelRole::RdmaPrevL0Y).cmd);

        cfg.mixer_mode = TnrMode::First;
        let mut p = ParamSet::default();
        derive_dma_cmds(&mut p, &cfg);
        assert!(p.dma(ChannelRole::WdmaPrevL0Y).cmd);
    }

    #[test]
    fn still_uses_weight_only() {
        let cfg = Mtnr0Config {
            mixer_en: true,
            still_en: true,
            ..Default::default()
        };
        let mut p = ParamSet::default();
        derive_dma_cmds(&mut p, &cfg);

        use ChannelRole::*;
        assert!(p.dma(RdmaPrevL0Wgt).cmd && p.dma(WdmaPrevL0Wgt).cmd);
        assert!(!p.dma(WdmaPrevL0Y).cmd);
        assert!(p.dma(RdmaCurL4Y).cmd);
    }

    #[test]
    fn fusion_keeps_requests() {
        let mut p = with_all_on();
        p.dma_mut(ChannelRole::RdmaPrevL0Wgt).cmd = false;
        let before = cmds(&p);
        derive_dma_cmds(&mut p, &video(TnrMode::Fusion));
        assert_eq!(cmds(&p), before);
        assert!(p.otf_in);
    }

    fn sized(w: u32, h: u32) -> ParamSet {
        let mut p = ParamSet::default();
        let cur = p.dma_mut(ChannelRole::RdmaCurL0Y);
        cur.width = w;
        cur.height = h;
        p.cur_l1 = Size::new(w.div_ceil(4) * 2, h.div_ceil(4) * 2);
        p
    }

    #[test]
    fn unstriped_plan_covers_frame() {
        let mut p = sized(1920, 1080);
        let plan = SizePlan::resolve(&p, &Mtnr0Config::default(), Some(16)).unwrap();
        assert!(!plan.strip_enable);
        assert_eq!(plan.frame_width, 1920);
        assert!(plan.otf_crop_bypass);
        assert_eq!(plan.crop, StripeCrop { start_x: 0, img_x: 0, width: 1920 });
        assert_eq!(plan.img_shift, 0);

        plan.apply_dma_crops(&mut p);
        assert_eq!(p.dma(ChannelRole::WdmaPrevL0Y).crop_width, 1920);
        assert_eq!(p.dma(ChannelRole::RdmaCurL0Y).crop_offset_x, 0);
        assert_eq!(p.dma(ChannelRole::RdmaCurL0Y).crop_width, 1920);
    }

    #[test]
    fn middle_stripe_plan() {
        let mut p = sized(1088, 544);
        p.stripe = StripeInput {
            index: 1,
            total_count: 3,
            start_pos_x: 900,
            full_width: 4000,
            left_margin: 64,
            right_margin: 64,
            ..Default::default()
        };
        let cfg = Mtnr0Config {
            img_l0_bit: 10,
            ..Default::default()
        };
        let plan = SizePlan::resolve(&p, &cfg, Some(16)).unwrap();
        assert_eq!(plan.frame_width, 4000);
        assert_eq!(plan.strip_start_pos, 900);
        assert!(!plan.otf_crop_bypass);
        assert_eq!(plan.otf_crop, (16, 1056));
        // 964 aligns down to 960; the 4 pixels pulled in stay in the crop.
        assert_eq!(plan.crop, StripeCrop { start_x: 960, img_x: 60, width: 964 });
        assert_eq!(plan.weight_crop(), (30, 482));
        assert_eq!(plan.img_shift, 2);

        plan.apply_dma_crops(&mut p);
        let wdma = p.dma(ChannelRole::WdmaPrevL0Wgt);
        assert_eq!((wdma.crop_offset_x, wdma.crop_width), (960, 964));
        let cur = p.dma(ChannelRole::RdmaCurL0Y);
        assert_eq!((cur.crop_offset_x, cur.crop_width), (900, 1092));
    }

    #[test]
    fn bad_l1_or_zero_l0_rejected() {
        let mut p = sized(1920, 1080);
        p.cur_l1 = Size::new(960, 538);
        let err = SizePlan::resolve(&p, &Mtnr0Config::default(), None).unwrap_err();
        assert!(err.is_configuration());

        let p = sized(0, 1080);
        assert!(SizePlan::resolve(&p, &Mtnr0Config::default(), None).is_err());
    }
}
