//! Hardware lifecycle controller of one MTNR0 block.
//!
//! [`Mtnr0`] owns the register space, the C-loader scratch, the feedback
//! buffers of every stream and the interrupt event channel. Its outside
//! services (PCC, frame manager, allocator, clock) are injected as
//! trait objects through [`Collaborators`].

use alloc::{boxed::Box, vec::Vec};

use crate::{
    cloader::{CloaderPool, CloaderSlot},
    config::{DebugConfig, HwConfig, Mtnr0Config, TnrMode},
    device::{Allocator, DoneReason, FrameManager, Pcc, PccDumpLevel, PccEnableConfig},
    dma::{DescriptorBuilder, DmaTransferConfig, RuleTableBuilder},
    err::IspError,
    feedback::FeedbackSet,
    hal::{self, DumpMode},
    irq::{EventChannel, FrameCounters, FrameStateMachine, IrqHandle},
    osal::Osal,
    registers::{CachePolicy, RegisterIo, RegisterSpace},
    tuning::{IqRegister, IqSetSlot},
};

mod isr;
mod params;
mod shot;

pub use params::{ExternalFeedback, FrameRequest, ParamSet, SizePlan, derive_dma_cmds};

/// COREX set the shot path programs; the block runs without COREX.
const COREX_DIRECT: u32 = 0;
/// C-loader lists kept per block, so one can be staged while the other
/// is fetched.
const CLOADER_SLOTS: usize = 2;
const EVENT_QUEUE_DEPTH: usize = 32;

bitflags::bitflags! {
    /// Lifecycle flags of the block.
    pub struct HwState: u32 {
        const OPEN   = 1 << 0;
        const INIT   = 1 << 1;
        const RUN    = 1 << 2;
        /// At least one shot was committed since enable.
        const CONFIG = 1 << 3;
    }
}

/// Services the block core runs on.
pub struct Collaborators {
    pub pcc: Box<dyn Pcc>,
    pub frames: Box<dyn FrameManager>,
    pub alloc: Box<dyn Allocator>,
    pub osal: Box<dyn Osal + Send>,
}

/// What [`Mtnr0::dump_regs`] prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegDump {
    /// Debug state and every CR.
    Log,
    /// The descriptors of the last committed shot.
    Dma,
}

#[derive(Debug, Default)]
struct StreamState {
    config: Mtnr0Config,
    feedback: FeedbackSet,
    feedback_2nr: FeedbackSet,
}

pub struct Mtnr0<B: RegisterIo> {
    regs: RegisterSpace<B>,
    hw: HwConfig,
    debug: DebugConfig,
    pcc: Box<dyn Pcc>,
    frames: Box<dyn FrameManager>,
    alloc: Box<dyn Allocator>,
    osal: Box<dyn Osal + Send>,
    builder: Box<dyn DescriptorBuilder>,
    state: HwState,
    streams: Vec<StreamState>,
    /// One bit per stream holding the block enabled.
    run_rsc: u32,
    cloader: CloaderPool,
    iq: IqSetSlot,
    events: EventChannel,
    frame_sm: FrameStateMachine,
    instance: u32,
    fcount: u32,
    num_buffers: u32,
    /// Frame whose configuration the block has not latched yet.
    config_pending: Option<u32>,
    /// Consecutive shots of one multi-shot run, and the stream it belongs to.
    repeat_state: u32,
    repeat_instance: u32,
    overflow_recovery: bool,
    debug_tnr_mode: TnrMode,
    last_descriptors: Vec<DmaTransferConfig>,
}

impl<B: RegisterIo> Mtnr0<B> {
    pub fn new(io: B, hw: HwConfig, debug: DebugConfig, services: Collaborators) -> Self {
        let regs = RegisterSpace::new(io, hw.space_layout());
        let streams = (0..hw.stream_count).map(|_| StreamState::default()).collect();
        let frame_sm = FrameStateMachine::new(hw.irq);

        Self {
            regs,
            hw,
            debug,
            pcc: services.pcc,
            frames: services.frames,
            alloc: services.alloc,
            osal: services.osal,
            builder: Box::new(RuleTableBuilder),
            state: HwState::empty(),
            streams,
            run_rsc: 0,
            cloader: CloaderPool::new(),
            iq: IqSetSlot::new(),
            events: EventChannel::new(EVENT_QUEUE_DEPTH),
            frame_sm,
            instance: 0,
            fcount: 0,
            num_buffers: 1,
            config_pending: None,
            repeat_state: 0,
            repeat_instance: 0,
            overflow_recovery: false,
            debug_tnr_mode: TnrMode::Prepare,
            last_descriptors: Vec::new(),
        }
    }

    /// Replaces the table-driven descriptor builder.
    pub fn with_descriptor_builder(mut self, builder: Box<dyn DescriptorBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn state(&self) -> HwState {
        self.state
    }

    pub fn hw_config(&self) -> &HwConfig {
        &self.hw
    }

    pub fn regs(&self) -> &RegisterSpace<B> {
        &self.regs
    }

    pub fn counters(&self) -> FrameCounters {
        self.frame_sm.counters()
    }

    /// Handle for the interrupt context to queue events with.
    pub fn irq_handle(&self) -> IrqHandle {
        self.events.handle()
    }

    pub fn debug_config(&self) -> &DebugConfig {
        &self.debug
    }

    pub fn debug_config_mut(&mut self) -> &mut DebugConfig {
        &mut self.debug
    }

    pub fn set_debug_config(&mut self, debug: DebugConfig) {
        info!("[MTNR0] debug flags {:?} -> {:?}", self.debug.flags, debug.flags);
        self.debug = debug;
    }

    /// Set by the chain coordinator while it recovers from an overflow;
    /// interrupts are dropped meanwhile.
    pub fn set_overflow_recovery(&mut self, on: bool) {
        self.overflow_recovery = on;
    }

    pub fn config(&self, instance: u32) -> Option<&Mtnr0Config> {
        self.streams.get(instance as usize).map(|s| &s.config)
    }

    pub fn feedback(&self, instance: u32) -> Option<&FeedbackSet> {
        self.streams.get(instance as usize).map(|s| &s.feedback)
    }

    pub fn feedback_2nr(&self, instance: u32) -> Option<&FeedbackSet> {
        self.streams.get(instance as usize).map(|s| &s.feedback_2nr)
    }

    fn stream_index(&self, instance: u32) -> Result<usize, IspError> {
        let idx = instance as usize;
        if idx >= self.streams.len() {
            error!("[MTNR0][I{}] instance out of range", instance);
            return Err(IspError::InvalidArgument);
        }
        Ok(idx)
    }

    /// Allocates the C-loader scratch. Idempotent.
    pub fn open(&mut self) -> Result<(), IspError> {
        if self.state.contains(HwState::OPEN) {
            return Ok(());
        }

        for _ in 0..CLOADER_SLOTS {
            match self.alloc_cloader_slot() {
                Ok(slot) => self.cloader.add(slot),
                Err(e) => {
                    error!("[MTNR0] failed to allocate c-loader buffers");
                    self.free_cloader();
                    return Err(e);
                }
            }
        }

        self.events.clear();
        self.frame_sm.reset();
        self.state.insert(HwState::OPEN);
        debug!("[MTNR0] open: {} c-loader slots", self.cloader.len());
        Ok(())
    }

    fn alloc_cloader_slot(&mut self) -> Result<CloaderSlot, IspError> {
        let payload = self
            .alloc
            .alloc(self.hw.cloader_payload_size, "MTNR0_CLD_PAYLOAD")?;
        let header = match self
            .alloc
            .alloc(self.hw.cloader_header_size, "MTNR0_CLD_HEADER")
        {
            Ok(header) => header,
            Err(e) => {
                self.alloc.free(payload);
                return Err(e);
            }
        };
        debug!(
            "[MTNR0] c-loader header {:#x}, payload {:#x}",
            header.dva, payload.dva
        );
        Ok(CloaderSlot::new(header, payload))
    }

    fn free_cloader(&mut self) {
        for slot in self.cloader.drain() {
            self.alloc.free(slot.header);
            self.alloc.free(slot.payload);
        }
    }

    /// Binds every DMA channel to the direct register set. Idempotent.
    pub fn init(&mut self) -> Result<(), IspError> {
        if !self.state.contains(HwState::OPEN) {
            error!("[MTNR0] init: not opened");
            return Err(IspError::NotOpened);
        }
        if self.state.contains(HwState::INIT) {
            return Ok(());
        }

        hal::s_dma_set_id(&mut self.regs, COREX_DIRECT);
        self.state.insert(HwState::INIT);
        Ok(())
    }

    /// Soft reset through the PCC plus the CRC seed.
    fn s_common_reg(&mut self) -> Result<(), IspError> {
        info!("[MTNR0] reset");
        self.reset()?;

        if self.debug.crc_seed != 0 {
            hal::crc(&mut self.regs, self.debug.crc_seed);
        }
        Ok(())
    }

    /// Soft reset through the PCC, then a bounded wait for the idleness
    /// status. `Timeout` when the block never goes idle.
    pub fn reset(&mut self) -> Result<(), IspError> {
        self.iq.reset();
        self.pcc.reset().map_err(|e| {
            error!("[MTNR0] sw reset fail");
            e
        })?;

        hal::wait_idle(
            &self.regs,
            self.osal.as_ref(),
            self.hw.idle_try_count,
            self.hw.idle_poll_us,
        )
    }

    /// Brings the block up for `instance`; later streams only take a
    /// reference on the running block.
    pub fn enable(&mut self, instance: u32) -> Result<(), IspError> {
        if !self.state.contains(HwState::INIT) {
            error!("[MTNR0][I{}] not initialized!!", instance);
            return Err(IspError::NotInitialized);
        }
        let idx = self.stream_index(instance)?;

        if self.state.contains(HwState::RUN) {
            self.run_rsc |= 1 << idx;
            return Ok(());
        }

        debug!("[MTNR0][I{}] enable: start", instance);
        self.regs.set_policy(CachePolicy::Direct);
        self.regs.reinit_cache();
        self.s_common_reg()?;

        self.pcc.enable(&PccEnableConfig {
            int_en: self.hw.int_en,
        })?;

        self.regs.set_policy(CachePolicy::CacheOnly);
        self.streams[idx].config = Mtnr0Config::default();
        self.frame_sm.reset();
        self.events.clear();
        self.config_pending = None;
        self.repeat_state = 0;
        self.run_rsc |= 1 << idx;
        self.state.insert(HwState::RUN);
        debug!("[MTNR0][I{}] enable: done", instance);
        Ok(())
    }

    /// Drops the reference of `instance`; the last one stops the block.
    pub fn disable(&mut self, instance: u32) -> Result<(), IspError> {
        if !self.state.contains(HwState::INIT) {
            error!("[MTNR0][I{}] not initialized!!", instance);
            return Err(IspError::NotInitialized);
        }
        let idx = self.stream_index(instance)?;

        info!(
            "[MTNR0][I{}] disable: Vvalid({})",
            instance,
            self.frame_sm.in_vvalid()
        );
        if self.wait_frame_end().is_err() {
            error!("[MTNR0][I{}] wait FRAME_END timeout", instance);
        }

        let stream = &mut self.streams[idx];
        stream.feedback.free_all(self.alloc.as_mut());
        stream.feedback_2nr.free_all(self.alloc.as_mut());

        self.run_rsc &= !(1 << idx);
        if self.run_rsc != 0 {
            return Ok(());
        }

        self.pcc.disable();
        self.regs.set_policy(CachePolicy::Direct);
        self.config_pending = None;
        self.state.remove(HwState::RUN | HwState::CONFIG);
        Ok(())
    }

    /// Drains queued interrupts until the Vvalid window closes.
    fn wait_frame_end(&mut self) -> Result<(), IspError> {
        let timeout_us = self.hw.stop_timeout_ms.saturating_mul(1000);
        let start = self.osal.get_time_us();

        loop {
            self.process_pending_events();
            if !self.frame_sm.in_vvalid() {
                return Ok(());
            }
            if self.osal.timeout_check(start, timeout_us) {
                return Err(IspError::Timeout);
            }
            self.osal.msleep(1);
        }
    }

    /// Resets, waits idle and frees everything `open` allocated.
    pub fn close(&mut self) -> Result<(), IspError> {
        if !self.state.contains(HwState::OPEN) {
            return Ok(());
        }

        let res = self.clear_common();

        self.free_cloader();
        for stream in self.streams.iter_mut() {
            stream.feedback.free_all(self.alloc.as_mut());
            stream.feedback_2nr.free_all(self.alloc.as_mut());
        }
        self.events.clear();
        self.run_rsc = 0;
        self.config_pending = None;
        self.state = HwState::empty();
        res
    }

    fn clear_common(&mut self) -> Result<(), IspError> {
        let res = self.reset();
        if res.is_err() {
            error!("[MTNR0] failed to wait idle");
        }
        info!("[MTNR0] final finished mtnr");
        res
    }

    /// Re-applies the common registers after a chain recovery.
    pub fn restore(&mut self) -> Result<(), IspError> {
        if !self.state.contains(HwState::OPEN) {
            return Err(IspError::NotOpened);
        }

        self.s_common_reg()?;
        self.regs.reinit_cache();
        Ok(())
    }

    /// Takes over the tuning side's block configuration for `instance`.
    pub fn set_config(
        &mut self,
        instance: u32,
        fcount: u32,
        mut config: Mtnr0Config,
    ) -> Result<(), IspError> {
        let idx = self.stream_index(instance)?;
        config.sanitize();
        config.log_changes(&self.streams[idx].config, instance, fcount);
        self.streams[idx].config = config;
        Ok(())
    }

    /// Hands over the tuning register batch for the next shot.
    pub fn set_iq_regs(&mut self, fcount: u32, regs: &[IqRegister]) -> Result<(), IspError> {
        self.iq.set_regs(fcount, regs)
    }

    pub fn dump_regs(&mut self, kind: RegDump) {
        self.pcc.set_queue_channel_gate(true);
        match kind {
            RegDump::Log => {
                hal::dump(&self.regs, DumpMode::DbgState);
                hal::dump(&self.regs, DumpMode::Cr);
            }
            RegDump::Dma => {
                for d in self.last_descriptors.iter() {
                    info!("[MTNR0] {:?}", d);
                }
            }
        }
        self.pcc.set_queue_channel_gate(false);
    }

    /// Diagnostics when the frame scheduler gave up on the block.
    pub fn notify_timeout(&mut self, instance: u32) {
        let c = self.frame_sm.counters();
        error!(
            "[MTNR0][I{}][F:{}] timeout: fs({}), fe({}), cl({})",
            instance, self.fcount, c.frame_start, c.frame_end, c.config_lock
        );

        self.pcc.set_queue_channel_gate(true);
        self.pcc.dump(PccDumpLevel::Full);
        hal::dump(&self.regs, DumpMode::DbgState);
        self.pcc.set_queue_channel_gate(false);
    }

    /// Completes a frame the block will not process.
    pub fn frame_ndone(&mut self, instance: u32, fcount: u32, reason: DoneReason) {
        self.frames.frame_done(instance, fcount, reason);
    }
}

impl<B: RegisterIo + Send + 'static> rdif_base::DriverGeneric for Mtnr0<B> {
    fn open(&mut self) -> Result<(), rdif_base::KError> {
        Self::open(self)
            .and_then(|_| Self::init(self))
            .map_err(|_| rdif_base::KError::Unknown("open fail"))
    }

    fn close(&mut self) -> Result<(), rdif_base::KError> {
        Self::close(self).map_err(|_| rdif_base::KError::Unknown("close fail"))
    }
}
