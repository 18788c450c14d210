//! Shot path: everything is staged first, registers are only touched once
//! every descriptor of the frame resolved.

use alloc::vec::Vec;

use super::{COREX_DIRECT, HwState, Mtnr0};
use crate::{
    config::{DebugFlags, Mtnr0Config},
    device::{CloaderCmd, CloaderMode, DmaBuffer, PccFrameConfig},
    dma::{BuildContext, ChannelRole, DmaTransferConfig, SbwcType},
    err::IspError,
    feedback::{BufInfo, FeedbackSet, Subdev, SwapConditions, fill_batch_addresses},
    geometry::{RadialConfig, is_first_shot},
    hal::{self, DtpColorBar, DtpPattern, InputLevel},
    mtnr0::params::{FrameRequest, ParamSet, SizePlan, derive_dma_cmds},
    osal::DmaAddr,
    registers::{
        RegisterIo,
        dma::MAX_BATCH,
        mtnr0::{CROP_CLEAN_DMA, CROP_CLEAN_OTF, CROP_WEIGHT_DMA},
    },
};

/// Reads fed from the caller's buffers.
const INPUT_ROLES: [ChannelRole; 4] = [
    ChannelRole::RdmaCurL0Y,
    ChannelRole::RdmaCurL4Y,
    ChannelRole::RdmaSegL0,
    ChannelRole::RdmaMvGeomatch,
];

/// Channels fed from the feedback arenas.
const FEEDBACK_ROLES: [ChannelRole; 5] = [
    ChannelRole::RdmaPrevL0Y,
    ChannelRole::RdmaPrevL0Y1,
    ChannelRole::RdmaPrevL0Wgt,
    ChannelRole::WdmaPrevL0Y,
    ChannelRole::WdmaPrevL0Wgt,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedbackPath {
    Normal,
    Recursive2nr,
}

#[derive(Debug, Clone, Copy)]
struct FeedbackPlan {
    path: FeedbackPath,
    /// Flip the arena roles once the frame is triggered.
    swap: bool,
    /// The mixer is off; the arenas of the path are handed back.
    release: bool,
}

/// One frame, fully resolved and not yet programmed.
struct StagedFrame {
    config: Mtnr0Config,
    params: ParamSet,
    plan: SizePlan,
    radial: RadialConfig,
    addrs: [Vec<DmaAddr>; ChannelRole::COUNT],
    descriptors: Vec<DmaTransferConfig>,
    feedback: FeedbackPlan,
    num_buffers: u32,
}

impl<B: RegisterIo> Mtnr0<B> {
    /// Programs and triggers one frame.
    ///
    /// Nothing reaches the registers unless every channel descriptor of the
    /// frame was built. While a config-lock block has not latched the last
    /// frame yet, `Busy` is returned.
    pub fn shot(&mut self, req: &FrameRequest) -> Result<(), IspError> {
        let instance = req.instance;
        let fcount = req.fcount;

        if !self.state.contains(HwState::INIT) {
            error!("[MTNR0][I{}][F:{}] not initialized!!", instance, fcount);
            return Err(IspError::NotInitialized);
        }
        let idx = self.stream_index(instance)?;

        if let Some(pending) = self.config_pending {
            warn!(
                "[MTNR0][I{}][F:{}] F:{} not latched yet",
                instance, fcount, pending
            );
            return Err(IspError::Busy);
        }

        let staged = match self.stage(idx, req) {
            Ok(staged) => staged,
            Err(e) => {
                error!(
                    "[MTNR0][I{}][F:{}] frame configuration failed: {}",
                    instance, fcount, e
                );
                return Err(e);
            }
        };

        let repeat_skip = self.track_repeat(req, staged.num_buffers);
        self.commit(idx, req, staged, repeat_skip)
    }

    /// Counts the shots of a batch, stripe or repeat run. Past the first
    /// run, only its first shot reprograms the tuning registers.
    fn track_repeat(&mut self, req: &FrameRequest, nb: u32) -> bool {
        let stripe = &req.params.stripe;

        if self.repeat_instance != req.instance {
            self.repeat_state = 0;
        }
        if nb > 1 || stripe.total_count > 1 || stripe.repeat_num > 1 {
            self.repeat_state = self.repeat_state.saturating_add(1);
        } else {
            self.repeat_state = 0;
        }
        self.repeat_instance = req.instance;

        let skip = self.repeat_state > 1
            && (!is_first_shot(nb, req.cur_buf_index)
                || !is_first_shot(stripe.total_count, stripe.index)
                || !is_first_shot(stripe.repeat_num, stripe.repeat_idx));
        debug!(
            "[MTNR0][I{}][F:{}] repeat_state({}), batch({}, {}), strip({}, {}), repeat({}, {}), skip({})",
            req.instance,
            req.fcount,
            self.repeat_state,
            nb,
            req.cur_buf_index,
            stripe.total_count,
            stripe.index,
            stripe.repeat_num,
            stripe.repeat_idx,
            skip
        );
        skip
    }

    fn active_config(&self, idx: usize) -> Mtnr0Config {
        let mut cfg = self.streams[idx].config;
        if self.debug.flags.contains(DebugFlags::TNR) {
            info!("[MTNR0][TNR] mixer mode {:?}", self.debug_tnr_mode);
            cfg.still_en = false;
            cfg.mixer_en = true;
            cfg.mixer_mode = self.debug_tnr_mode;
        }
        cfg
    }

    fn stage(&mut self, idx: usize, req: &FrameRequest) -> Result<StagedFrame, IspError> {
        let instance = req.instance;
        let fcount = req.fcount;
        let nb = req.num_buffers.clamp(1, MAX_BATCH as u32);
        let cfg = self.active_config(idx);
        let mut params = req.params.clone();

        if self.debug.flags.contains(DebugFlags::TNR) {
            let cur = *params.dma(ChannelRole::RdmaCurL0Y);
            let out = params.dma_mut(ChannelRole::WdmaPrevL0Y);
            out.width = cur.width;
            out.height = cur.height;
            out.sbwc_type = cur.sbwc_type;
        }

        let mv = ChannelRole::RdmaMvGeomatch;
        let mv_buffer = req.params.dma(mv).cmd && first_addr(&req.dva[mv.index()]) != 0;
        if cfg.mvc_en && !mv_buffer {
            warn!(
                "[MTNR0][I{}][F:{}] MVC is enabled, but mv buffer is disabled",
                instance, fcount
            );
            return Err(IspError::InvalidArgument);
        }

        derive_dma_cmds(&mut params, &cfg);

        let mut addrs: [Vec<DmaAddr>; ChannelRole::COUNT] = Default::default();
        for role in INPUT_ROLES {
            if !params.dma(role).cmd {
                continue;
            }
            let given = &req.dva[role.index()];
            if first_addr(given) == 0 {
                warn!(
                    "[MTNR0][I{}][F:{}] {}: no buffer, channel off",
                    instance, fcount, role
                );
                params.dma_mut(role).cmd = false;
                continue;
            }
            addrs[role.index()] = given.iter().take(nb as usize).copied().collect();
        }

        let plan = SizePlan::resolve(&params, &cfg, self.hw.strip_otf_margin_crop)?;
        plan.apply_dma_crops(&mut params);

        let feedback = self.plan_feedback(idx, req, &cfg, &plan, &mut params, &mut addrs, nb)?;
        let descriptors = self.build_descriptors(&cfg, &plan, &params)?;

        Ok(StagedFrame {
            config: cfg,
            params,
            plan,
            radial: req.radial,
            addrs,
            descriptors,
            feedback,
            num_buffers: nb,
        })
    }

    fn feedback_set(&self, idx: usize, path: FeedbackPath) -> &FeedbackSet {
        match path {
            FeedbackPath::Normal => &self.streams[idx].feedback,
            FeedbackPath::Recursive2nr => &self.streams[idx].feedback_2nr,
        }
    }

    /// Picks the feedback buffers of the frame and fills their addresses.
    ///
    /// The current frame always reads `prev` and writes `cur`; the role
    /// flip for the next frame is only recorded here.
    #[allow(clippy::too_many_arguments)]
    fn plan_feedback(
        &mut self,
        idx: usize,
        req: &FrameRequest,
        cfg: &Mtnr0Config,
        plan: &SizePlan,
        params: &mut ParamSet,
        addrs: &mut [Vec<DmaAddr>; ChannelRole::COUNT],
        nb: u32,
    ) -> Result<FeedbackPlan, IspError> {
        let path = if req.recursive_nr_2nd {
            FeedbackPath::Recursive2nr
        } else {
            FeedbackPath::Normal
        };

        let out_sbwc = params.dma(ChannelRole::WdmaPrevL0Y).sbwc_type;
        params.dma_mut(ChannelRole::RdmaPrevL0Y).sbwc_type = out_sbwc;
        params.dma_mut(ChannelRole::RdmaPrevL0Y1).sbwc_type = out_sbwc;

        if !cfg.mixer_en {
            return Ok(FeedbackPlan {
                path,
                swap: false,
                release: true,
            });
        }

        let external = match path {
            FeedbackPath::Normal => req.external_feedback,
            FeedbackPath::Recursive2nr => None,
        };
        let ext_image = external
            .filter(|e| e.prev_image != 0 && e.cur_image != 0)
            .map(|e| (e.prev_image, e.cur_image));
        let ext_weight = external
            .filter(|e| e.prev_weight != 0 && e.cur_weight != 0)
            .map(|e| (e.prev_weight, e.cur_weight));

        if ext_image.is_none() || ext_weight.is_none() {
            let info = BufInfo {
                width: plan.frame_width,
                height: plan.l0.h,
                bits: cfg.img_l0_bit,
                sbwc: SbwcType::try_from(out_sbwc)?,
                still: cfg.still_en,
                cache_32b_pa: self.hw.cache_32b_pa,
            };
            let alloc = self.alloc.as_mut();
            let stream = &mut self.streams[idx];
            let (set, subdevs) = match path {
                FeedbackPath::Normal => (&mut stream.feedback, Subdev::NORMAL),
                FeedbackPath::Recursive2nr => (&mut stream.feedback_2nr, Subdev::RECURSIVE_2NR),
            };
            if let Err(e) = set.alloc(&subdevs, &info, alloc) {
                error!("[MTNR0][I{}][F:{}] feedback alloc fail", req.instance, req.fcount);
                if path == FeedbackPath::Recursive2nr {
                    set.free_all(alloc);
                }
                return Err(e);
            }
        }

        let cond = SwapConditions::new(cfg, &params.stripe, nb);
        let set = self.feedback_set(idx, path);
        let dva = |buf: Option<&DmaBuffer>| buf.map_or(0, |b| b.dva);
        let (img_prev, img_cur) =
            ext_image.unwrap_or_else(|| (dva(set.image.prev()), dva(set.image.cur())));
        let (wgt_prev, wgt_cur) =
            ext_weight.unwrap_or_else(|| (dva(set.weight.prev()), dva(set.weight.cur())));

        let image = fill_batch_addresses(img_prev, img_cur, nb, cond.swap_fro());
        let weight = fill_batch_addresses(wgt_prev, wgt_cur, nb, cond.swap_fro());
        addrs[ChannelRole::RdmaPrevL0Y.index()] = image.read.clone();
        addrs[ChannelRole::RdmaPrevL0Y1.index()] = image.read;
        addrs[ChannelRole::WdmaPrevL0Y.index()] = image.write;
        addrs[ChannelRole::RdmaPrevL0Wgt.index()] = weight.read;
        addrs[ChannelRole::WdmaPrevL0Wgt.index()] = weight.write;

        for role in FEEDBACK_ROLES {
            if params.dma(role).cmd && first_addr(&addrs[role.index()]) == 0 {
                warn!(
                    "[MTNR0][I{}][F:{}] {}: no feedback buffer, channel off",
                    req.instance, req.fcount, role
                );
                params.dma_mut(role).cmd = false;
            }
        }

        debug!(
            "[MTNR0][I{}][F:{}] feedback {:?}: img {:#x}->{:#x} wgt {:#x}->{:#x} {:?}",
            req.instance, req.fcount, path, img_prev, img_cur, wgt_prev, wgt_cur, cond
        );

        Ok(FeedbackPlan {
            path,
            swap: cond.swap_frame(),
            release: false,
        })
    }

    /// Read channels first, then writes.
    fn build_descriptors(
        &self,
        cfg: &Mtnr0Config,
        plan: &SizePlan,
        params: &ParamSet,
    ) -> Result<Vec<DmaTransferConfig>, IspError> {
        let geom = plan.geometry(params.stripe);
        let ctx = BuildContext {
            block: cfg,
            cache_32b_pa: self.hw.cache_32b_pa,
            comp_block_width: self.hw.comp_block_width,
            comp_block_height: self.hw.comp_block_height,
        };

        let mut out = Vec::with_capacity(ChannelRole::COUNT);
        for &role in ChannelRole::READ_ORDER.iter().chain(ChannelRole::WRITE_ORDER.iter()) {
            let desc = self
                .builder
                .build(role, &geom, params.dma(role), &ctx)
                .map_err(|e| {
                    error!("[MTNR0] {}: descriptor fail: {}", role, e);
                    e
                })?;
            out.push(desc);
        }
        Ok(out)
    }

    fn commit(
        &mut self,
        idx: usize,
        req: &FrameRequest,
        staged: StagedFrame,
        repeat_skip: bool,
    ) -> Result<(), IspError> {
        let instance = req.instance;
        let fcount = req.fcount;
        let nb = staged.num_buffers;
        let cfg = staged.config;

        self.pcc.set_queue_channel_gate(true);
        if self.hw.irq.config_lock.is_none() {
            self.cloader.release_processed();
        }

        hal::s_core(&mut self.regs, COREX_DIRECT);
        hal::s_dma_set_id(&mut self.regs, COREX_DIRECT);

        let skip_iq = self
            .debug
            .flags
            .intersects(DebugFlags::SKIP_DDK | DebugFlags::BYPASS);
        if repeat_skip {
            trace!("[MTNR0][I{}][F:{}] tuning kept from the run", instance, fcount);
        } else if skip_iq || !self.apply_iq_set(instance, fcount) {
            hal::block_bypass(&mut self.regs);
            if self.debug.flags.contains(DebugFlags::TNR) {
                hal::debug_geomatch_mode(&mut self.regs, cfg.mixer_mode);
                hal::debug_mixer_mode(&mut self.regs, cfg.mixer_mode);
            }
        }

        let fro = self.hw.int_grp_en_fro;
        let mut frame = PccFrameConfig {
            fcount,
            num_buffers: nb,
            int_grp_en: self.hw.int_grp_en,
            fro_int_grp_en: (nb > 1).then_some([fro.first, fro.middle, fro.last]),
            ..Default::default()
        };

        self.program_sizes(&staged, &mut frame);

        if self.debug.flags.contains(DebugFlags::DTP) {
            hal::dtp(
                &mut self.regs,
                true,
                DtpPattern::ColorBar,
                0,
                DtpColorBar::Bt601,
            );
        }

        for desc in staged.descriptors.iter() {
            desc.commit(&mut self.regs, COREX_DIRECT);
            desc.program_addresses(&mut self.regs, &staged.addrs[desc.role.index()]);
        }

        let params = &staged.params;
        hal::seg_otf(&mut self.regs, params.dma(ChannelRole::RdmaSegL0).cmd);
        hal::still_last_frame(&mut self.regs, cfg.still_last_frame_en);

        let prev_in = params.dma(ChannelRole::RdmaPrevL0Y).cmd;
        let prev_out = params.dma(ChannelRole::WdmaPrevL0Y).cmd;
        if cfg.l0_bypass
            && (cfg.mixer_mode as u32 != 0
                || cfg.mixer_en
                || cfg.geomatch_en
                || prev_in
                || prev_out)
        {
            error!(
                "[MTNR0][I{}][F:{}] L0_bypass setting mismatched, [{:?}, {}, {}, {}, {}]",
                instance, fcount, cfg.mixer_mode, cfg.mixer_en, cfg.geomatch_en, prev_in, prev_out
            );
        }

        if params.strgen {
            debug!("[MTNR0][I{}] STRGEN input", instance);
            hal::strgen(&mut self.regs);
        }

        let (cloader, slot) = self.flush_registers(instance, fcount);
        frame.cloader = cloader;

        if let Err(e) = self.pcc.shot(&frame) {
            error!("[MTNR0][I{}][F:{}] pcc shot fail: {}", instance, fcount, e);
            if let Some(slot) = slot {
                self.cloader.release(slot);
            }
            self.pcc.set_queue_channel_gate(false);
            return Err(e);
        }

        let feedback = staged.feedback;
        let alloc = self.alloc.as_mut();
        let stream = &mut self.streams[idx];
        let set = match feedback.path {
            FeedbackPath::Normal => &mut stream.feedback,
            FeedbackPath::Recursive2nr => &mut stream.feedback_2nr,
        };
        if feedback.release {
            set.free_all(alloc);
        } else if feedback.swap {
            set.swap_feedback_slots();
        }

        self.last_descriptors = staged.descriptors;
        self.instance = instance;
        self.fcount = fcount;
        self.num_buffers = nb;
        if self.hw.irq.config_lock.is_some() {
            self.config_pending = Some(fcount);
        }

        if self.debug.flags.contains(DebugFlags::TNR) {
            self.debug_tnr_mode = self.debug_tnr_mode.next_debug_cycle();
        }

        if self
            .debug
            .flags
            .intersects(DebugFlags::DUMP_REG | DebugFlags::DUMP_REG_ONCE)
        {
            hal::dump(&self.regs, hal::DumpMode::Cr);
            self.debug.flags.remove(DebugFlags::DUMP_REG_ONCE);
        }

        self.state.insert(HwState::CONFIG);
        self.pcc.set_queue_channel_gate(false);
        Ok(())
    }

    /// Writes the tuning set handed over for this shot. `false` when none
    /// was handed over.
    fn apply_iq_set(&mut self, instance: u32, fcount: u32) -> bool {
        let Some(set) = self.iq.consume() else {
            warn!("[MTNR0][I{}][F:{}] no iq set, bypass", instance, fcount);
            return false;
        };

        for reg in set {
            if !self.regs.is_writable(reg.reg_addr) {
                warn!(
                    "[MTNR0][I{}][F:{}] iq write to {:#x} skipped",
                    instance, fcount, reg.reg_addr
                );
                continue;
            }
            self.regs.write_raw(reg.reg_addr, reg.reg_data);
        }
        trace!("[MTNR0][I{}][F:{}] iq set applied ({})", instance, fcount, set.len());
        true
    }

    fn program_sizes(&mut self, staged: &StagedFrame, frame: &mut PccFrameConfig) {
        let plan = &staged.plan;
        let cfg = &staged.config;
        let regs = &mut self.regs;

        hal::otf_input_mtnr1_wgt(regs, staged.params.otf_in, frame);
        hal::otf_output_msnr_l0(regs, staged.params.otf_out, frame);

        hal::input_size(regs, InputLevel::L0, plan.l0);
        hal::input_size(regs, InputLevel::L1, plan.l1);
        hal::input_size(regs, InputLevel::L4, plan.l4);

        hal::geomatch_size(
            regs,
            plan.frame_width,
            plan.l0.w,
            plan.l0.h,
            plan.strip_start_pos,
        );
        hal::mixer_size(
            regs,
            &staged.radial,
            plan.frame_width,
            plan.l0.h,
            plan.strip_start_pos,
        );

        let (otf_x, otf_w) = plan.otf_crop;
        hal::crop(regs, CROP_CLEAN_OTF, otf_x, otf_w, plan.l0.h, plan.otf_crop_bypass);
        let bypass = !plan.strip_enable;
        hal::crop(
            regs,
            CROP_CLEAN_DMA,
            plan.crop.img_x,
            plan.crop.width,
            plan.l0.h,
            bypass,
        );
        let (wgt_x, wgt_w) = plan.weight_crop();
        hal::crop(regs, CROP_WEIGHT_DMA, wgt_x, wgt_w, plan.l0.h >> 1, bypass);

        hal::img_bitshift(regs, plan.img_shift);
        hal::l0_bypass(regs, cfg.l0_bypass);

        if cfg.mvc_out_w != 0 && cfg.mvc_out_h != 0 {
            hal::mvf_resize_offset(
                regs,
                cfg.mvc_in_w,
                cfg.mvc_in_h,
                cfg.mvc_out_w,
                cfg.mvc_out_h,
                plan.strip_start_pos,
            );
        }
    }

    /// Moves the pending register writes to hardware: through a C-loader
    /// list when one is free, over APB otherwise.
    fn flush_registers(&mut self, instance: u32, fcount: u32) -> (CloaderCmd, Option<usize>) {
        let Some(idx) = self.cloader.acquire() else {
            warn!("[MTNR0][I{}][F:{}] no free c-loader list", instance, fcount);
            self.regs.sync();
            return (CloaderCmd::default(), None);
        };
        let Some(slot) = self.cloader.get_mut(idx) else {
            self.regs.sync();
            return (CloaderCmd::default(), None);
        };

        let pairs = self.regs.fsync(&mut slot.list);
        if pairs == 0 {
            self.cloader.release(idx);
            return (CloaderCmd::default(), None);
        }

        let payload = slot.list.payload_bytes();
        let header = slot.list.header_bytes();
        let written = match self.alloc.write_for_device(&slot.payload, 0, &payload) {
            Ok(()) => self.alloc.write_for_device(&slot.header, 0, &header),
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            error!(
                "[MTNR0][I{}][F:{}] c-loader sync fail ({}), direct write",
                instance, fcount, e
            );
            let io = self.regs.io_mut();
            for &(addr, value) in slot.list.pairs() {
                io.write(addr, value);
            }
            self.cloader.release(idx);
            return (CloaderCmd::default(), None);
        }

        let cmd = CloaderCmd {
            mode: CloaderMode::DmaDirect,
            header_dva: slot.list.header_dva(),
            header_num: slot.list.num_headers() as u32,
        };
        trace!(
            "[MTNR0][I{}][F:{}] c-loader {} pairs, {} headers",
            instance, fcount, pairs, cmd.header_num
        );
        (cmd, Some(idx))
    }
}

fn first_addr(addrs: &[DmaAddr]) -> DmaAddr {
    addrs.first().copied().unwrap_or(0)
}
