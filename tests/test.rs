use std::{
    cell::Cell,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use pablo_isp::{
    Collaborators, DebugConfig, DebugFlags, DmaAddr, ExternalFeedback, FrameRequest, HwConfig,
    HwState, IspBlock, IspError, Mtnr0, Mtnr0Config, Osal, ParamSet, TimeStamp, TnrMode,
    device::{
        Allocator, CloaderMode, DmaBuffer, DoneReason, FrameManager, Pcc, PccDumpLevel,
        PccEnableConfig, PccFrameConfig,
    },
    dma::{
        BuildContext, ChannelRole, DescriptorBuilder, DmaParam, DmaTransferConfig, FrameGeometry,
        RuleTableBuilder, rule_for,
    },
    geometry::Size,
    hal::dma_enable_mask,
    registers::{
        RegisterIo,
        consts::{OFFSET_IDLENESS_STATUS, OFFSET_IP_VERSION, OFFSET_MIXERL0_MC_REFINE_EN},
        dma::DmaRegs,
        mtnr0::R_MIXERL0_MODE,
        rgbp,
    },
    tuning::IqRegister,
};

use ChannelRole::*;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct FakeIo {
    regs: std::collections::BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
}

impl FakeIo {
    fn idle() -> Self {
        let mut io = Self::default();
        io.regs.insert(OFFSET_IDLENESS_STATUS, 1);
        io
    }
}

impl RegisterIo for FakeIo {
    fn read(&self, offset: u32) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.regs.insert(offset, value);
        self.writes.push((offset, value));
    }
}

#[derive(Default)]
struct PccLog {
    enabled: usize,
    disabled: usize,
    resets: usize,
    dumps: usize,
    shots: Vec<PccFrameConfig>,
    status: [u32; 2],
}

struct FakePcc(Arc<Mutex<PccLog>>);

impl Pcc for FakePcc {
    fn enable(&mut self, _cfg: &PccEnableConfig) -> Result<(), IspError> {
        self.0.lock().unwrap().enabled += 1;
        Ok(())
    }

    fn disable(&mut self) {
        self.0.lock().unwrap().disabled += 1;
    }

    fn shot(&mut self, frame: &PccFrameConfig) -> Result<(), IspError> {
        self.0.lock().unwrap().shots.push(*frame);
        Ok(())
    }

    fn get_interrupt_status(&mut self, line: usize, clear: bool) -> u32 {
        let mut log = self.0.lock().unwrap();
        let status = log.status[line];
        if clear {
            log.status[line] = 0;
        }
        status
    }

    fn reset(&mut self) -> Result<(), IspError> {
        self.0.lock().unwrap().resets += 1;
        Ok(())
    }

    fn set_queue_channel_gate(&mut self, _on: bool) {}

    fn dump(&self, _level: PccDumpLevel) {
        self.0.lock().unwrap().dumps += 1;
    }
}

#[derive(Default)]
struct FrameLog {
    starts: Vec<(u32, u32, u32)>,
    done: Vec<(u32, u32, DoneReason)>,
    locks: Vec<u32>,
    errors: Vec<(u32, usize, u32)>,
}

struct FakeFrames(Arc<Mutex<FrameLog>>);

impl FrameManager for FakeFrames {
    fn frame_start(&mut self, instance: u32, fcount: u32, num_buffers: u32) {
        self.0.lock().unwrap().starts.push((instance, fcount, num_buffers));
    }

    fn frame_done(&mut self, instance: u32, fcount: u32, reason: DoneReason) {
        self.0.lock().unwrap().done.push((instance, fcount, reason));
    }

    fn config_lock(&mut self, _instance: u32, fcount: u32) {
        self.0.lock().unwrap().locks.push(fcount);
    }

    fn notify_error(&mut self, instance: u32, line: usize, status: u32) {
        self.0.lock().unwrap().errors.push((instance, line, status));
    }
}

#[derive(Default)]
struct MemLog {
    next: DmaAddr,
    live: Vec<DmaAddr>,
    uploads: Vec<(DmaAddr, usize)>,
    fail_uploads: bool,
}

struct FakeAlloc(Arc<Mutex<MemLog>>);

impl Allocator for FakeAlloc {
    fn alloc(&mut self, size: usize, name: &'static str) -> Result<DmaBuffer, IspError> {
        let mut mem = self.0.lock().unwrap();
        mem.next += 0x0100_0000;
        let dva = 0x1000_0000 + mem.next;
        mem.live.push(dva);
        Ok(DmaBuffer {
            dva,
            size,
            name,
            handle: dva,
        })
    }

    fn free(&mut self, buf: DmaBuffer) {
        self.0.lock().unwrap().live.retain(|&d| d != buf.dva);
    }

    fn write_for_device(&mut self, buf: &DmaBuffer, offset: usize, data: &[u8]) -> Result<(), IspError> {
        let mut mem = self.0.lock().unwrap();
        if mem.fail_uploads {
            return Err(IspError::NoMemory);
        }
        assert!(offset + data.len() <= buf.size);
        mem.uploads.push((buf.dva, data.len()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeClock {
    now: Cell<TimeStamp>,
}

impl Osal for FakeClock {
    fn get_time_us(&self) -> TimeStamp {
        self.now.get()
    }

    fn udelay(&self, us: u32) {
        self.now.set(self.now.get() + u64::from(us));
    }

    fn msleep(&self, ms: u32) {
        self.now.set(self.now.get() + u64::from(ms) * 1000);
    }
}

/// Descriptor builder failing on the n-th channel it is asked for.
struct FailAt {
    calls: Arc<AtomicUsize>,
    fail_at: Arc<AtomicUsize>,
}

impl DescriptorBuilder for FailAt {
    fn build(
        &self,
        role: ChannelRole,
        geom: &FrameGeometry,
        param: &DmaParam,
        ctx: &BuildContext<'_>,
    ) -> Result<DmaTransferConfig, IspError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_at.load(Ordering::SeqCst) {
            return Err(IspError::InvalidGeometry("injected"));
        }
        RuleTableBuilder.build(role, geom, param, ctx)
    }
}

struct Rig {
    ctrl: Mtnr0<FakeIo>,
    pcc: Arc<Mutex<PccLog>>,
    frames: Arc<Mutex<FrameLog>>,
    mem: Arc<Mutex<MemLog>>,
}

fn rig_with(hw: HwConfig) -> Rig {
    rig_with_io(FakeIo::idle(), hw)
}

fn rig_with_io(io: FakeIo, hw: HwConfig) -> Rig {
    init_log();
    let pcc = Arc::new(Mutex::new(PccLog::default()));
    let frames = Arc::new(Mutex::new(FrameLog::default()));
    let mem = Arc::new(Mutex::new(MemLog::default()));

    let ctrl = Mtnr0::new(
        io,
        hw,
        DebugConfig::default(),
        Collaborators {
            pcc: Box::new(FakePcc(pcc.clone())),
            frames: Box::new(FakeFrames(frames.clone())),
            alloc: Box::new(FakeAlloc(mem.clone())),
            osal: Box::new(FakeClock::default()),
        },
    );

    Rig {
        ctrl,
        pcc,
        frames,
        mem,
    }
}

fn rig() -> Rig {
    rig_with(HwConfig::new(IspBlock::Mtnr0V13))
}

/// Opened, initialized and enabled for stream 0 with the given config.
fn running(mut rig: Rig, cfg: Mtnr0Config) -> Rig {
    rig.ctrl.open().unwrap();
    rig.ctrl.init().unwrap();
    rig.ctrl.enable(0).unwrap();
    rig.ctrl.set_config(0, 0, cfg).unwrap();
    rig
}

fn video(mode: TnrMode) -> Mtnr0Config {
    Mtnr0Config {
        mixer_en: true,
        mixer_mode: mode,
        ..Default::default()
    }
}

const CUR_L0: DmaAddr = 0x8000_0000;
const CUR_L4: DmaAddr = 0x8800_0000;

fn request(fcount: u32, w: u32, h: u32) -> FrameRequest {
    let mut params = ParamSet::default();
    for role in [RdmaCurL0Y, RdmaCurL4Y] {
        let d = params.dma_mut(role);
        d.cmd = true;
        d.width = w;
        d.height = h;
        d.crop_width = w;
        d.bitwidth = 16;
        d.msb = 11;
    }
    params.cur_l1 = Size::new(w.div_ceil(4) * 2, h.div_ceil(4) * 2);
    params.otf_out = true;

    FrameRequest::new(0, fcount, params)
        .with_dva(RdmaCurL0Y, &[CUR_L0])
        .with_dva(RdmaCurL4Y, &[CUR_L4])
}

fn batch_request(fcount: u32, nb: u32) -> FrameRequest {
    let cur: Vec<DmaAddr> = (0..nb as u64).map(|b| CUR_L0 + b * 0x40_0000).collect();
    let l4: Vec<DmaAddr> = (0..nb as u64).map(|b| CUR_L4 + b * 0x10_0000).collect();
    let mut req = request(fcount, 1920, 1080)
        .with_dva(RdmaCurL0Y, &cur)
        .with_dva(RdmaCurL4Y, &l4);
    req.num_buffers = nb;
    req
}

fn img_addr(ctrl: &Mtnr0<FakeIo>, role: ChannelRole, slot: usize) -> u32 {
    let win = DmaRegs::new(rule_for(role).window);
    ctrl.regs().read_register(win.img_addr(slot))
}

fn set_status(rig: &Rig, line: usize, status: u32) {
    rig.pcc.lock().unwrap().status[line] = status;
}

const FS: u32 = 1 << 0;
const FE: u32 = 1 << 1;

#[test]
fn lifecycle_is_ordered_and_refcounted() {
    let mut rig = rig();

    assert_eq!(rig.ctrl.init(), Err(IspError::NotOpened));
    assert_eq!(rig.ctrl.enable(0), Err(IspError::NotInitialized));

    rig.ctrl.open().unwrap();
    rig.ctrl.open().unwrap();
    // Two c-loader lists, header and payload each.
    assert_eq!(rig.mem.lock().unwrap().live.len(), 4);

    rig.ctrl.init().unwrap();
    rig.ctrl.enable(0).unwrap();
    rig.ctrl.enable(1).unwrap();
    assert!(rig.ctrl.state().contains(HwState::RUN));
    assert_eq!(rig.pcc.lock().unwrap().enabled, 1);
    assert_eq!(rig.pcc.lock().unwrap().resets, 1);

    rig.ctrl.disable(0).unwrap();
    assert!(rig.ctrl.state().contains(HwState::RUN));
    assert_eq!(rig.pcc.lock().unwrap().disabled, 0);

    rig.ctrl.disable(1).unwrap();
    assert!(!rig.ctrl.state().contains(HwState::RUN));
    assert_eq!(rig.pcc.lock().unwrap().disabled, 1);

    rig.ctrl.close().unwrap();
    assert!(rig.ctrl.state().is_empty());
    assert!(rig.mem.lock().unwrap().live.is_empty());
}

#[test]
fn out_of_range_stream_is_rejected() {
    let mut rig = running(rig(), Mtnr0Config::default());
    assert_eq!(rig.ctrl.enable(7), Err(IspError::InvalidArgument));
    assert!(rig.ctrl.set_config(7, 0, Mtnr0Config::default()).is_err());
}

#[test]
fn shot_before_init_is_rejected() {
    let mut rig = rig();
    rig.ctrl.open().unwrap();
    let err = rig.ctrl.shot(&request(1, 1920, 1080)).unwrap_err();
    assert_eq!(err, IspError::NotInitialized);
    assert!(rig.pcc.lock().unwrap().shots.is_empty());
}

#[test]
fn shot_goes_through_the_cloader() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    rig.ctrl.shot(&request(10, 1920, 1080)).unwrap();

    let pcc = rig.pcc.lock().unwrap();
    assert_eq!(pcc.shots.len(), 1);
    let frame = pcc.shots[0];
    assert_eq!(frame.fcount, 10);
    assert_eq!(frame.num_buffers, 1);
    assert_eq!(frame.fro_int_grp_en, None);
    assert!(frame.cotf_out);
    assert!(frame.cotf_in);
    assert_eq!(frame.cloader.mode, CloaderMode::DmaDirect);
    assert!(frame.cloader.header_num > 0);

    // Payload rows then their headers, one row per header.
    let mem = rig.mem.lock().unwrap();
    let rows = frame.cloader.header_num as usize;
    assert_eq!(mem.uploads.len(), 2);
    assert_eq!(mem.uploads[0].1, rows * 64);
    assert_eq!(mem.uploads[1], (frame.cloader.header_dva, rows * 16));

    assert!(rig.ctrl.state().contains(HwState::CONFIG));
    assert_eq!(rig.ctrl.regs().dirty_count(), 0);

    let mask = dma_enable_mask(rig.ctrl.regs());
    for role in [RdmaCurL0Y, RdmaCurL4Y, RdmaPrevL0Y, RdmaPrevL0Y1, RdmaPrevL0Wgt, WdmaPrevL0Y, WdmaPrevL0Wgt] {
        assert_ne!(mask & (1 << role.index()), 0, "{role}");
    }
    for role in [RdmaSegL0, RdmaMvGeomatch] {
        assert_eq!(mask & (1 << role.index()), 0, "{role}");
    }
}

#[test]
fn failed_upload_falls_back_to_apb() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.mem.lock().unwrap().fail_uploads = true;
    let before = rig.ctrl.regs().io().writes.len();

    rig.ctrl.shot(&request(3, 1920, 1080)).unwrap();

    let frame = rig.pcc.lock().unwrap().shots[0];
    assert_eq!(frame.cloader.mode, CloaderMode::ApbDirect);
    assert!(rig.ctrl.regs().io().writes.len() > before);
}

#[test]
fn feedback_roles_flip_between_frames() {
    let mut rig = running(rig(), video(TnrMode::Normal));

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    let written = img_addr(&rig.ctrl, WdmaPrevL0Y, 0);
    let fb = rig.ctrl.feedback(0).unwrap();
    assert_eq!(fb.allocated_count(), 4);
    // The frame just written is the next frame's previous one.
    let prev = fb.image.prev().unwrap().dva;
    assert_eq!(written, (prev >> 4) as u32);

    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    assert_eq!(img_addr(&rig.ctrl, RdmaPrevL0Y, 0), written);
    assert_eq!(img_addr(&rig.ctrl, RdmaPrevL0Y1, 0), written);
    assert_ne!(img_addr(&rig.ctrl, WdmaPrevL0Y, 0), written);
}

#[test]
fn skip_mix_keeps_feedback_in_place() {
    let cfg = Mtnr0Config {
        skip_wdma: true,
        ..video(TnrMode::Normal)
    };
    let mut rig = running(rig(), cfg);

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    let fb = rig.ctrl.feedback(0).unwrap();
    let (prev, cur) = (fb.image.prev().unwrap().dva, fb.image.cur().unwrap().dva);

    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    let fb = rig.ctrl.feedback(0).unwrap();
    assert_eq!(fb.image.prev().unwrap().dva, prev);
    assert_eq!(fb.image.cur().unwrap().dva, cur);

    let mask = dma_enable_mask(rig.ctrl.regs());
    assert_eq!(mask & (1 << WdmaPrevL0Y.index()), 0);
}

#[test]
fn even_batch_alternates_inside_the_batch() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    rig.ctrl.shot(&batch_request(1, 4)).unwrap();

    let frame = rig.pcc.lock().unwrap().shots[0];
    assert_eq!(frame.num_buffers, 4);
    assert_eq!(frame.fro_int_grp_en, Some([1 << 0, 0, 1 << 1]));

    // An even batch ends where it started: no swap after the frame.
    let fb = rig.ctrl.feedback(0).unwrap();
    let prev = (fb.image.prev().unwrap().dva >> 4) as u32;
    let cur = (fb.image.cur().unwrap().dva >> 4) as u32;
    let writes: Vec<u32> = (0..4).map(|b| img_addr(&rig.ctrl, WdmaPrevL0Y, b)).collect();
    let reads: Vec<u32> = (0..4).map(|b| img_addr(&rig.ctrl, RdmaPrevL0Y, b)).collect();
    assert_eq!(writes, vec![cur, prev, cur, prev]);
    assert_eq!(reads, vec![prev, cur, prev, cur]);

    let cur_l0: Vec<u32> = (0..4).map(|b| img_addr(&rig.ctrl, RdmaCurL0Y, b)).collect();
    assert_eq!(cur_l0[3], ((CUR_L0 + 3 * 0x40_0000) >> 4) as u32);
}

#[test]
fn external_feedback_overrides_one_plane() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    let mut req = request(1, 1920, 1080);
    req.external_feedback = Some(ExternalFeedback {
        prev_image: 0xA000_0000,
        cur_image: 0xB000_0000,
        ..Default::default()
    });
    rig.ctrl.shot(&req).unwrap();

    assert_eq!(img_addr(&rig.ctrl, RdmaPrevL0Y, 0), 0xA000_0000 >> 4);
    assert_eq!(img_addr(&rig.ctrl, WdmaPrevL0Y, 0), 0xB000_0000 >> 4);

    let fb = rig.ctrl.feedback(0).unwrap();
    let wgt_prev = fb.weight.prev().map(|b| b.dva);
    assert!(wgt_prev.is_some());
}

#[test]
fn recursive_2nr_uses_its_own_buffers() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    let mut req = request(1, 1920, 1080);
    req.recursive_nr_2nd = true;
    rig.ctrl.shot(&req).unwrap();

    assert_eq!(rig.ctrl.feedback(0).unwrap().allocated_count(), 0);
    assert_eq!(rig.ctrl.feedback_2nr(0).unwrap().allocated_count(), 4);
}

#[test]
fn still_capture_keeps_weight_planes_only() {
    let cfg = Mtnr0Config {
        still_en: true,
        img_l0_bit: 10,
        ..video(TnrMode::Normal)
    };
    let mut rig = running(rig(), cfg);
    assert_eq!(rig.ctrl.config(0).unwrap().img_l0_bit, 12);

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.feedback(0).unwrap().allocated_count(), 2);

    let mask = dma_enable_mask(rig.ctrl.regs());
    assert_ne!(mask & (1 << RdmaPrevL0Wgt.index()), 0);
    assert_ne!(mask & (1 << WdmaPrevL0Wgt.index()), 0);
    assert_eq!(mask & (1 << WdmaPrevL0Y.index()), 0);
}

#[test]
fn mixer_off_releases_feedback() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.feedback(0).unwrap().allocated_count(), 4);

    rig.ctrl.set_config(0, 2, Mtnr0Config::default()).unwrap();
    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.feedback(0).unwrap().allocated_count(), 0);
    // Only the c-loader scratch is left.
    assert_eq!(rig.mem.lock().unwrap().live.len(), 4);
}

#[test]
fn failing_channel_leaves_registers_untouched() {
    for n in 0..ChannelRole::COUNT {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail_at = Arc::new(AtomicUsize::new(usize::MAX));
        let mut rig = rig();
        rig.ctrl = rig.ctrl.with_descriptor_builder(Box::new(FailAt {
            calls: calls.clone(),
            fail_at: fail_at.clone(),
        }));
        let mut rig = running(rig, video(TnrMode::Prepare));

        rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
        let mask = dma_enable_mask(rig.ctrl.regs());
        let prev = rig.ctrl.feedback(0).unwrap().image.prev().unwrap().dva;

        rig.ctrl.set_config(0, 2, video(TnrMode::Normal)).unwrap();
        fail_at.store(calls.load(Ordering::SeqCst) + n, Ordering::SeqCst);
        let err = rig.ctrl.shot(&request(2, 1920, 1080)).unwrap_err();
        assert!(err.is_configuration(), "channel {n}");

        assert_eq!(dma_enable_mask(rig.ctrl.regs()), mask, "channel {n}");
        assert_eq!(rig.ctrl.regs().dirty_count(), 0, "channel {n}");
        assert_eq!(rig.pcc.lock().unwrap().shots.len(), 1, "channel {n}");
        let fb = rig.ctrl.feedback(0).unwrap();
        assert_eq!(fb.image.prev().unwrap().dva, prev, "channel {n}");

        rig.ctrl.shot(&request(3, 1920, 1080)).unwrap();
        assert_ne!(dma_enable_mask(rig.ctrl.regs()), mask, "channel {n}");
    }
}

#[test]
fn mvc_without_motion_vectors_is_rejected() {
    let cfg = Mtnr0Config {
        mvc_en: true,
        mvc_in_w: 120,
        mvc_in_h: 68,
        mvc_out_w: 240,
        mvc_out_h: 136,
        ..video(TnrMode::Normal)
    };
    let mut rig = running(rig(), cfg);
    let err = rig.ctrl.shot(&request(1, 1920, 1080)).unwrap_err();
    assert_eq!(err, IspError::InvalidArgument);
    assert!(rig.pcc.lock().unwrap().shots.is_empty());

    let mut req = request(2, 1920, 1080).with_dva(RdmaMvGeomatch, &[0x9000_0000]);
    req.params.dma_mut(RdmaMvGeomatch).cmd = true;
    rig.ctrl.shot(&req).unwrap();
    let mask = dma_enable_mask(rig.ctrl.regs());
    assert_ne!(mask & (1 << RdmaMvGeomatch.index()), 0);
}

#[test]
fn bad_l1_size_fails_before_trigger() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    let mut req = request(1, 1920, 1080);
    req.params.cur_l1 = Size::new(960, 538);
    let err = rig.ctrl.shot(&req).unwrap_err();
    assert!(err.is_configuration());
    assert!(rig.pcc.lock().unwrap().shots.is_empty());
    assert_eq!(rig.ctrl.regs().dirty_count(), 0);
}

#[test]
fn iq_set_is_applied_once() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    let set = [
        IqRegister {
            reg_addr: OFFSET_MIXERL0_MC_REFINE_EN,
            reg_data: 5,
        },
        // Read-only; skipped with a warning.
        IqRegister {
            reg_addr: OFFSET_IP_VERSION,
            reg_data: 1,
        },
    ];
    rig.ctrl.set_iq_regs(1, &set).unwrap();
    assert_eq!(rig.ctrl.set_iq_regs(1, &set), Err(IspError::Busy));

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.regs().read_raw(OFFSET_MIXERL0_MC_REFINE_EN), 5);

    // No new set: the frame runs with every sub-block bypassed.
    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.regs().read_raw(OFFSET_MIXERL0_MC_REFINE_EN), 0);
}

#[test]
fn repeat_run_keeps_the_tuning_of_its_first_shot() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    let set = [IqRegister {
        reg_addr: OFFSET_MIXERL0_MC_REFINE_EN,
        reg_data: 5,
    }];
    rig.ctrl.set_iq_regs(1, &set).unwrap();

    for idx in 0..3 {
        let mut req = request(1, 1920, 1080);
        req.params.stripe.repeat_num = 3;
        req.params.stripe.repeat_idx = idx;
        rig.ctrl.shot(&req).unwrap();
        // Later passes neither consume a set nor fall back to bypass.
        assert_eq!(rig.ctrl.regs().read_raw(OFFSET_MIXERL0_MC_REFINE_EN), 5);
    }
    assert_eq!(rig.pcc.lock().unwrap().shots.len(), 3);

    // A plain shot ends the run and bypasses again without a new set.
    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.regs().read_raw(OFFSET_MIXERL0_MC_REFINE_EN), 0);
}

#[test]
fn debug_tnr_cycles_mixer_modes() {
    let mut rig = running(rig(), Mtnr0Config::default());
    rig.ctrl.debug_config_mut().flags.insert(DebugFlags::TNR);

    let mut modes = Vec::new();
    for f in 1..=4 {
        rig.ctrl.shot(&request(f, 1920, 1080)).unwrap();
        modes.push(rig.ctrl.regs().read_register(R_MIXERL0_MODE) & 0x3);
    }
    assert_eq!(modes, vec![0, 1, 2, 0]);
}

#[test]
fn dump_once_clears_itself() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.debug_config_mut().flags.insert(DebugFlags::DUMP_REG_ONCE);
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    assert!(!rig.ctrl.debug_config().flags.contains(DebugFlags::DUMP_REG_ONCE));
}

#[test]
fn interrupts_drive_the_frame_manager() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.shot(&batch_request(7, 4)).unwrap();

    set_status(&rig, 0, FS);
    assert_eq!(rig.ctrl.handle_interrupt(0), Ok(FS));
    set_status(&rig, 0, FE);
    rig.ctrl.handle_interrupt(0).unwrap();

    let c = rig.ctrl.counters();
    assert_eq!(c.frame_start, 4);
    assert_eq!(c.frame_end, 4);
    assert_eq!(c.violations, 0);

    let frames = rig.frames.lock().unwrap();
    assert_eq!(frames.starts, vec![(0, 7, 4)]);
    assert_eq!(frames.done, vec![(0, 7, DoneReason::Success)]);
}

#[test]
fn end_before_start_is_logged_not_fatal() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();

    set_status(&rig, 0, FE);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.counters().violations, 1);

    set_status(&rig, 0, FS | FE);
    rig.ctrl.handle_interrupt(0).unwrap();
    let c = rig.ctrl.counters();
    assert_eq!((c.frame_start, c.frame_end, c.overlaps), (1, 2, 1));
}

#[test]
fn interrupts_before_first_shot_are_dropped() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    set_status(&rig, 0, FS);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.counters().frame_start, 0);

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    rig.ctrl.set_overflow_recovery(true);
    set_status(&rig, 0, FS);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.counters().frame_start, 0);
    assert!(rig.frames.lock().unwrap().starts.is_empty());
}

#[test]
fn interrupts_after_disable_are_dropped() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.disable(0).unwrap();

    // A shot on the stopped block marks it configured but not running.
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    set_status(&rig, 0, FS);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.counters().frame_start, 0);
    assert!(rig.frames.lock().unwrap().starts.is_empty());
}

#[test]
fn queued_events_are_processed_in_order() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.shot(&request(4, 1920, 1080)).unwrap();

    let handle = rig.ctrl.irq_handle();
    for status in [FS, FE, FS] {
        assert!(handle.push(pablo_isp::irq::IrqEvent {
            line: 0,
            status,
            fcount: 4,
        }));
    }
    assert_eq!(rig.ctrl.process_pending_events(), 3);
    assert_eq!(rig.frames.lock().unwrap().starts.len(), 2);
    assert_eq!(rig.frames.lock().unwrap().done.len(), 1);
}

#[test]
fn error_interrupt_is_reported() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();

    set_status(&rig, 1, 0x1);
    rig.ctrl.handle_interrupt(1).unwrap();
    assert_eq!(rig.frames.lock().unwrap().errors, vec![(0, 1, 0x1)]);
}

const FR: u32 = 1 << rgbp::INTR0_ROW_COL;

#[test]
fn config_lock_layout_holds_the_next_shot() {
    let hw = HwConfig::new(IspBlock::RgbpV13);
    let mut rig = running(rig_with(hw), video(TnrMode::Prepare));

    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    assert_eq!(rig.ctrl.shot(&request(2, 1920, 1080)), Err(IspError::Busy));
    assert_eq!(rig.pcc.lock().unwrap().shots.len(), 1);

    // Frame start and frame row arrive together.
    set_status(&rig, 0, FS | FR);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.counters().config_lock, 1);
    assert_eq!(rig.frames.lock().unwrap().locks, vec![1]);

    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    let pcc = rig.pcc.lock().unwrap();
    let shots = &pcc.shots;
    assert_eq!(shots.len(), 2);
    assert_eq!(shots[0].cloader.header_dva, shots[1].cloader.header_dva);
}

#[test]
fn row_line_latches_between_start_and_end() {
    let hw = HwConfig::new(IspBlock::RgbpV13);
    let mut rig = running(rig_with(hw), video(TnrMode::Normal));
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();

    set_status(&rig, 0, FS);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert_eq!(rig.ctrl.shot(&request(2, 1920, 1080)), Err(IspError::Busy));

    // The loader finishing is not the latch.
    set_status(&rig, 0, 1 << rgbp::INTR0_C_LOADER_END);
    rig.ctrl.handle_interrupt(0).unwrap();
    assert!(rig.frames.lock().unwrap().locks.is_empty());

    set_status(&rig, 0, FR);
    rig.ctrl.handle_interrupt(0).unwrap();
    set_status(&rig, 0, FE);
    rig.ctrl.handle_interrupt(0).unwrap();

    {
        let frames = rig.frames.lock().unwrap();
        assert_eq!(frames.starts, vec![(0, 1, 1)]);
        assert_eq!(frames.locks, vec![1]);
        assert_eq!(frames.done, vec![(0, 1, DoneReason::Success)]);
    }
    let c = rig.ctrl.counters();
    assert_eq!((c.frame_start, c.config_lock, c.frame_end), (1, 1, 1));

    rig.ctrl.shot(&request(2, 1920, 1080)).unwrap();
    assert_eq!(rig.pcc.lock().unwrap().shots.len(), 2);
}

#[test]
fn disable_waits_for_the_running_frame() {
    let mut rig = running(rig(), video(TnrMode::Normal));
    rig.ctrl.shot(&request(1, 1920, 1080)).unwrap();
    set_status(&rig, 0, FS);
    rig.ctrl.handle_interrupt(0).unwrap();

    // The frame never ends; disable gives up after the stop timeout.
    rig.ctrl.disable(0).unwrap();
    assert!(!rig.ctrl.state().contains(HwState::RUN));
    assert_eq!(rig.ctrl.feedback(0).unwrap().allocated_count(), 0);

    rig.ctrl.close().unwrap();
    assert!(rig.mem.lock().unwrap().live.is_empty());
}

#[test]
fn timeout_dumps_and_ndone_completes() {
    let mut rig = running(rig(), video(TnrMode::Prepare));
    rig.ctrl.notify_timeout(0);
    assert_eq!(rig.pcc.lock().unwrap().dumps, 1);

    rig.ctrl.frame_ndone(0, 9, DoneReason::Drop);
    assert_eq!(rig.frames.lock().unwrap().done, vec![(0, 9, DoneReason::Drop)]);
}

#[test]
fn restore_requires_open_and_resets() {
    let mut rig = rig();
    assert_eq!(rig.ctrl.restore(), Err(IspError::NotOpened));
    let mut rig = running(rig, Mtnr0Config::default());
    rig.ctrl.restore().unwrap();
    assert_eq!(rig.pcc.lock().unwrap().resets, 2);
}

#[test]
fn driver_generic_opens_and_inits() {
    use rdif_base::DriverGeneric;

    let mut rig = rig();
    DriverGeneric::open(&mut rig.ctrl).unwrap();
    assert!(rig.ctrl.state().contains(HwState::OPEN | HwState::INIT));

    DriverGeneric::close(&mut rig.ctrl).unwrap();
    assert!(rig.ctrl.state().is_empty());
}

#[test]
fn reset_times_out_when_never_idle() {
    let mut rig = rig_with_io(FakeIo::default(), HwConfig::new(IspBlock::Mtnr0V13));
    rig.ctrl.open().unwrap();
    rig.ctrl.init().unwrap();

    assert_eq!(rig.ctrl.enable(0), Err(IspError::Timeout));
    assert!(!rig.ctrl.state().contains(HwState::RUN));
    assert_eq!(rig.pcc.lock().unwrap().enabled, 0);

    // Close still hands every buffer back.
    assert_eq!(rig.ctrl.close(), Err(IspError::Timeout));
    assert!(rig.mem.lock().unwrap().live.is_empty());
}
