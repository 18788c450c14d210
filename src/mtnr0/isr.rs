use super::{HwState, Mtnr0};
use crate::{
    config::DebugFlags,
    device::DoneReason,
    err::IspError,
    hal::{self, DumpMode},
    irq::{FrameEvent, IrqEvent},
    registers::RegisterIo,
};

impl<B: RegisterIo> Mtnr0<B> {
    /// Interrupt entry of `line`: reads and clears the status through the
    /// PCC, queues it and drains the queue. Returns the raw status.
    pub fn handle_interrupt(&mut self, line: usize) -> Result<u32, IspError> {
        if !self.state.contains(HwState::OPEN) {
            warn!("[MTNR0] interrupt{} while not opened", line);
            return Err(IspError::NotOpened);
        }

        self.pcc.set_queue_channel_gate(true);
        let status = self.pcc.get_interrupt_status(line, true);
        self.events.handle().push(IrqEvent {
            line,
            status,
            fcount: self.fcount,
        });
        self.process_pending_events();
        self.pcc.set_queue_channel_gate(false);

        Ok(status)
    }

    /// Feeds every queued event to the frame state machine. Returns how
    /// many were handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;

        while let Some(event) = self.events.pop() {
            if !self.state.contains(HwState::OPEN) {
                continue;
            }
            if self.overflow_recovery {
                error!(
                    "[MTNR0][I{}][F:{}] interrupt{} {:#x} during overflow recovery",
                    self.instance, event.fcount, event.line, event.status
                );
                continue;
            }
            if !self.state.contains(HwState::RUN) {
                error!(
                    "[MTNR0] HW disabled!! interrupt{} ({:#x})",
                    event.line, event.status
                );
                continue;
            }
            // Nothing is in flight until a shot programmed the block.
            if !self.state.contains(HwState::CONFIG) {
                debug!(
                    "[MTNR0] interrupt{} {:#x} before the first shot",
                    event.line, event.status
                );
                continue;
            }

            let actions = self.frame_sm.handle(self.instance, &event, self.num_buffers);
            for action in actions {
                self.dispatch(action);
            }
            handled += 1;
        }

        handled
    }

    fn dispatch(&mut self, action: FrameEvent) {
        let instance = self.instance;

        match action {
            FrameEvent::Start {
                fcount,
                num_buffers,
            } => {
                trace!("[MTNR0][I{}][F:{}] FS", instance, fcount);
                self.frames.frame_start(instance, fcount, num_buffers);
            }
            FrameEvent::ConfigLock { fcount } => {
                let released = self.cloader.release_processed();
                trace!(
                    "[MTNR0][I{}][F:{}] FR, {} c-loader lists free",
                    instance, fcount, released
                );
                self.config_pending = None;
                self.frames.config_lock(instance, fcount);
            }
            FrameEvent::End { fcount } => {
                trace!("[MTNR0][I{}][F:{}] FE", instance, fcount);
                self.frames.frame_done(instance, fcount, DoneReason::Success);
                if self.debug.flags.contains(DebugFlags::S2D) {
                    self.frames.request_snapshot(instance);
                }
            }
            FrameEvent::Error { line, status } => {
                if line == 0 {
                    hal::dump(&self.regs, DumpMode::DbgState);
                    hal::dump(&self.regs, DumpMode::Cr);
                }
                self.frames.notify_error(instance, line, status);
            }
        }
    }
}
