//! Interrupt events and the frame state machine.
//!
//! The interrupt path only reads the status through the PCC and pushes an
//! [`IrqEvent`] into the [`EventChannel`]. The controller drains the
//! channel and feeds each event to the [`FrameStateMachine`], which keeps
//! the frame counters and tells the controller what to notify.

use alloc::{collections::VecDeque, sync::Arc, vec::Vec};

use spin::Mutex;

use crate::registers::{
    mtnr0::{
        INT0_ERR_MASK, INT1_ERR_MASK, INTR0_COREX_END_0, INTR0_COREX_END_1, INTR0_FRAME_END,
        INTR0_FRAME_START, INTR0_SETTING_DONE,
    },
    rgbp,
};

/// Bit positions of the frame interrupts of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqLayout {
    pub frame_start: u32,
    pub frame_end: u32,
    /// Frame-row interrupt that latches the configuration, when the block
    /// has one.
    pub config_lock: Option<u32>,
    pub setting_done: u32,
    pub corex_end: [u32; 2],
    /// Known line 0 bits that need no handling.
    pub info_mask: u32,
    /// Error causes of interrupt lines 0 and 1.
    pub err_mask: [u32; 2],
}

impl IrqLayout {
    fn bit(pos: u32) -> u32 {
        1 << pos
    }

    /// Every non-error bit of line 0 a handler exists for.
    fn known_mask(&self) -> u32 {
        let mut mask = self.info_mask
            | Self::bit(self.frame_start)
            | Self::bit(self.frame_end)
            | Self::bit(self.setting_done)
            | Self::bit(self.corex_end[0])
            | Self::bit(self.corex_end[1]);
        if let Some(fr) = self.config_lock {
            mask |= Self::bit(fr);
        }
        mask
    }
}

pub const MTNR0_IRQ_LAYOUT: IrqLayout = IrqLayout {
    frame_start: INTR0_FRAME_START,
    frame_end: INTR0_FRAME_END,
    config_lock: None,
    setting_done: INTR0_SETTING_DONE,
    corex_end: [INTR0_COREX_END_0, INTR0_COREX_END_1],
    info_mask: 0,
    err_mask: [INT0_ERR_MASK, INT1_ERR_MASK],
};

/// RGBP latches the frame on its row line and releases the C-loader list
/// there.
pub const RGBP_IRQ_LAYOUT: IrqLayout = IrqLayout {
    frame_start: rgbp::INTR0_FRAME_START,
    frame_end: rgbp::INTR0_FRAME_END,
    config_lock: Some(rgbp::INTR0_ROW_COL),
    setting_done: rgbp::INTR0_SETTING_DONE,
    corex_end: [rgbp::INTR0_COREX_END_0, rgbp::INTR0_COREX_END_1],
    info_mask: rgbp::INT0_INFO_MASK,
    err_mask: [rgbp::INT0_ERR_MASK, rgbp::INT1_ERR_MASK],
};

/// One interrupt as read from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqEvent {
    pub line: usize,
    pub status: u32,
    pub fcount: u32,
}

struct ChannelInner {
    queue: VecDeque<IrqEvent>,
    capacity: usize,
    dropped: u64,
}

/// Bounded queue between the interrupt path and the controller.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                queue: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                dropped: 0,
            })),
        }
    }

    /// Producer side for the interrupt context.
    pub fn handle(&self) -> IrqHandle {
        IrqHandle {
            inner: self.inner.clone(),
        }
    }

    pub fn pop(&self) -> Option<IrqEvent> {
        self.inner.lock().queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn clear(&self) {
        self.inner.lock().queue.clear();
    }
}

/// Cloneable producer end of an [`EventChannel`].
#[derive(Clone)]
pub struct IrqHandle {
    inner: Arc<Mutex<ChannelInner>>,
}

impl IrqHandle {
    /// Queues an event; a full queue drops it and counts the drop.
    pub fn push(&self, event: IrqEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.queue.len() >= inner.capacity {
            inner.dropped += 1;
            error!(
                "[MTNR0] irq event dropped: line {} status {:#x} (dropped {})",
                event.line, event.status, inner.dropped
            );
            return false;
        }
        inner.queue.push_back(event);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Started,
    ConfigLocked,
}

/// What the controller must do for one processed interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Start { fcount: u32, num_buffers: u32 },
    ConfigLock { fcount: u32 },
    End { fcount: u32 },
    Error { line: usize, status: u32 },
}

/// Cumulative counters since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounters {
    pub frame_start: u64,
    pub frame_end: u64,
    pub config_lock: u64,
    /// Times the end count ran ahead of the start count.
    pub violations: u64,
    pub overlaps: u64,
}

#[derive(Debug)]
pub struct FrameStateMachine {
    layout: IrqLayout,
    phase: FramePhase,
    counters: FrameCounters,
    vvalid: bool,
}

impl FrameStateMachine {
    pub fn new(layout: IrqLayout) -> Self {
        Self {
            layout,
            phase: FramePhase::Idle,
            counters: FrameCounters::default(),
            vvalid: false,
        }
    }

    pub fn layout(&self) -> &IrqLayout {
        &self.layout
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    /// A frame is between its start and its end.
    pub fn in_vvalid(&self) -> bool {
        self.vvalid
    }

    pub fn reset(&mut self) {
        self.phase = FramePhase::Idle;
        self.counters = FrameCounters::default();
        self.vvalid = false;
    }

    fn has(&self, status: u32, pos: u32) -> bool {
        status & (1 << pos) != 0
    }

    /// Applies one interrupt status. Start is always handled before end
    /// when both are set.
    pub fn handle(
        &mut self,
        instance: u32,
        event: &IrqEvent,
        num_buffers: u32,
    ) -> Vec<FrameEvent> {
        let mut out = Vec::new();
        let status = event.status;
        let fcount = event.fcount;
        let nb = num_buffers.max(1);
        let line = event.line;

        if line >= self.layout.err_mask.len() {
            warn!("[MTNR0][I{}] invalid interrupt line {}", instance, line);
            return out;
        }

        if line == 0 {
            let fs = self.has(status, self.layout.frame_start);
            let fe = self.has(status, self.layout.frame_end);
            let fr = self.layout.config_lock.is_some_and(|pos| self.has(status, pos));

            if self.has(status, self.layout.setting_done) {
                trace!("[MTNR0][I{}][F:{}] setting done", instance, fcount);
            }

            if fs && fe {
                self.counters.overlaps += 1;
                warn!(
                    "[MTNR0][I{}][F:{}] start/end overlapped!! ({:#x})",
                    instance, fcount, status
                );
            }
            if fr && (fs || fe) {
                self.counters.overlaps += 1;
                warn!(
                    "[MTNR0][I{}][F:{}] line overlapped!! ({:#x})",
                    instance, fcount, status
                );
            }

            if fs {
                self.counters.frame_start += u64::from(nb);
                self.phase = FramePhase::Started;
                self.vvalid = true;
                out.push(FrameEvent::Start {
                    fcount,
                    num_buffers: nb,
                });
            }

            if fr {
                if self.phase == FramePhase::Started {
                    self.counters.config_lock += 1;
                    self.phase = FramePhase::ConfigLocked;
                    out.push(FrameEvent::ConfigLock { fcount });
                } else {
                    warn!(
                        "[MTNR0][I{}][F:{}] config lock in {:?} ignored",
                        instance, fcount, self.phase
                    );
                }
            }

            if fe {
                self.counters.frame_end += u64::from(nb);
                self.phase = FramePhase::Idle;
                self.vvalid = false;
                if self.counters.frame_start < self.counters.frame_end {
                    self.counters.violations += 1;
                    error!(
                        "[MTNR0][I{}][F:{}] fs({}), fe({})",
                        instance, fcount, self.counters.frame_start, self.counters.frame_end
                    );
                }
                out.push(FrameEvent::End { fcount });
            }

            let unknown = status & !(self.layout.known_mask() | self.layout.err_mask[0]);
            if unknown != 0 {
                warn!(
                    "[MTNR0][I{}][F:{}] invalid interrupt: {:#x}",
                    instance, fcount, unknown
                );
            }
        } else {
            let unknown = status & !self.layout.err_mask[line];
            if unknown != 0 {
                warn!(
                    "[MTNR0][I{}][F:{}] invalid interrupt{}: {:#x}",
                    instance, fcount, line, unknown
                );
            }
        }

        let err = status & self.layout.err_mask[line];
        if err != 0 {
            error!(
                "[MTNR0][I{}][F:{}] err interrupt{}: {:#x}",
                instance, fcount, line, err
            );
            out.push(FrameEvent::Error { line, status: err });
        }

        out
    }
}
