//! Single-slot hand-off of the tuning register batch.

use alloc::vec::Vec;

use crate::err::IspError;

/// One register write produced by the tuning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IqRegister {
    pub reg_addr: u32,
    pub reg_data: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IqSetState {
    #[default]
    Empty,
    /// A new set waits for the next shot.
    Config,
    /// The last set was applied; a new one may be handed over.
    Consumed,
}

#[derive(Debug, Default)]
pub struct IqSetSlot {
    state: IqSetState,
    fcount: u32,
    regs: Vec<IqRegister>,
}

impl IqSetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> IqSetState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Stores the set for the next shot.
    ///
    /// Fails with `Busy` while the previous set has not been consumed.
    pub fn set_regs(&mut self, fcount: u32, regs: &[IqRegister]) -> Result<(), IspError> {
        if self.state == IqSetState::Config {
            warn!(
                "[MTNR0][F:{}] iq set of F:{} not consumed yet",
                fcount, self.fcount
            );
            return Err(IspError::Busy);
        }

        self.regs.clear();
        self.regs.extend_from_slice(regs);
        self.fcount = fcount;
        self.state = IqSetState::Config;
        Ok(())
    }

    /// Hands out the pending set. `None` is a missed hand-off.
    pub fn consume(&mut self) -> Option<&[IqRegister]> {
        if self.state != IqSetState::Config {
            return None;
        }
        self.state = IqSetState::Consumed;
        Some(&self.regs)
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.fcount = 0;
        self.state = IqSetState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET: [IqRegister; 2] = [
        IqRegister {
            reg_addr: 0x7610,
            reg_data: 1,
        },
        IqRegister {
            reg_addr: 0x7614,
            reg_data: 3,
        },
    ];

    #[test]
    fn handoff_cycle() {
        let mut slot = IqSetSlot::new();
        assert!(slot.consume().is_none());

        slot.set_regs(1, &SET).unwrap();
        assert_eq!(slot.state(), IqSetState::Config);
        assert_eq!(slot.set_regs(2, &SET), Err(IspError::Busy));

        assert_eq!(slot.consume().unwrap(), &SET);
        assert_eq!(slot.state(), IqSetState::Consumed);
        assert!(slot.consume().is_none());

        slot.set_regs(2, &SET[..1]).unwrap();
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn reset_drops_pending_set() {
        let mut slot = IqSetSlot::new();
        slot.set_regs(1, &SET).unwrap();
        slot.reset();
        assert_eq!(slot.state(), IqSetState::Empty);
        assert!(slot.is_empty());
        assert!(slot.consume().is_none());
    }
}
