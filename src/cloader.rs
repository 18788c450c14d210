//! C-loader register lists.
//!
//! The C-loader applies a frame's register set in one DMA burst. Pairs of
//! `(address, value)` are packed eight to a 64-byte payload row, and every
//! row is described by one 16-byte header the loader walks.

use alloc::vec::Vec;

use crate::{device::DmaBuffer, err::IspError, osal::DmaAddr};

/// Bytes of one payload row.
pub const PAYLOAD_ROW_BYTES: usize = 64;
/// Address/value pairs in one payload row.
pub const PAIRS_PER_ROW: usize = PAYLOAD_ROW_BYTES / 8;
/// Bytes of one row header.
pub const HEADER_BYTES: usize = 16;
/// Header format code for "address/value pairs".
pub const HEADER_FORMAT_PAIRS: u32 = 0x2;

/// Register list of one frame.
#[derive(Debug, Clone)]
pub struct CloaderBuffer {
    header_dva: DmaAddr,
    payload_dva: DmaAddr,
    capacity: usize,
    pairs: Vec<(u32, u32)>,
}

impl CloaderBuffer {
    /// A list backed by header and payload scratch at the given addresses.
    ///
    /// The pair capacity is bounded by both scratch sizes.
    pub fn new(
        header_dva: DmaAddr,
        header_size: usize,
        payload_dva: DmaAddr,
        payload_size: usize,
    ) -> Self {
        let rows = (payload_size / PAYLOAD_ROW_BYTES).min(header_size / HEADER_BYTES);
        Self {
            header_dva,
            payload_dva,
            capacity: rows * PAIRS_PER_ROW,
            pairs: Vec::new(),
        }
    }

    pub fn header_dva(&self) -> DmaAddr {
        self.header_dva
    }

    pub fn payload_dva(&self) -> DmaAddr {
        self.payload_dva
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(u32, u32)] {
        &self.pairs
    }

    /// Full rows plus one for a trailing partial row.
    pub fn num_headers(&self) -> usize {
        self.pairs.len().div_ceil(PAIRS_PER_ROW)
    }

    pub fn reset(&mut self) {
        self.pairs.clear();
    }

    /// Queues one register write.
    pub fn push(&mut self, addr: u32, value: u32) -> Result<(), IspError> {
        if self.pairs.len() >= self.capacity {
            return Err(IspError::NoMemory);
        }
        self.pairs.push((addr, value));
        Ok(())
    }

    /// Payload rows as the loader reads them, unused pair slots zeroed.
    pub fn payload_bytes(&self) -> Vec<u8> {
        let mut out = alloc::vec![0u8; self.num_headers() * PAYLOAD_ROW_BYTES];
        for (i, &(addr, value)) in self.pairs.iter().enumerate() {
            let at = i * 8;
            out[at..at + 4].copy_from_slice(&addr.to_le_bytes());
            out[at + 4..at + 8].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// One header per payload row: row address, pair count and format.
    pub fn header_bytes(&self) -> Vec<u8> {
        let rows = self.num_headers();
        let mut out = Vec::with_capacity(rows * HEADER_BYTES);
        for row in 0..rows {
            let dva = self.payload_dva + (row * PAYLOAD_ROW_BYTES) as DmaAddr;
            let count = (self.pairs.len() - row * PAIRS_PER_ROW).min(PAIRS_PER_ROW) as u32;
            out.extend_from_slice(&(dva as u32).to_le_bytes());
            out.extend_from_slice(&((dva >> 32) as u32).to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&HEADER_FORMAT_PAIRS.to_le_bytes());
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloaderState {
    Free,
    /// Handed to hardware, waiting for the config lock of its frame.
    Process,
}

#[derive(Debug)]
pub struct CloaderSlot {
    pub header: DmaBuffer,
    pub payload: DmaBuffer,
    pub list: CloaderBuffer,
    state: CloaderState,
}

impl CloaderSlot {
    pub fn new(header: DmaBuffer, payload: DmaBuffer) -> Self {
        let list = CloaderBuffer::new(header.dva, header.size, payload.dva, payload.size);
        Self {
            header,
            payload,
            list,
            state: CloaderState::Free,
        }
    }

    pub fn state(&self) -> CloaderState {
        self.state
    }
}

/// Scratch buffers cycled between the shot path and the config lock.
#[derive(Debug, Default)]
pub struct CloaderPool {
    slots: Vec<CloaderSlot>,
}

impl CloaderPool {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn add(&mut self, slot: CloaderSlot) {
        self.slots.push(slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn count(&self, state: CloaderState) -> usize {
        self.slots.iter().filter(|s| s.state == state).count()
    }

    /// Takes a free slot, emptied and marked in process.
    pub fn acquire(&mut self) -> Option<usize> {
        let idx = self.slots.iter().position(|s| s.state == CloaderState::Free)?;
        let slot = &mut self.slots[idx];
        slot.state = CloaderState::Process;
        slot.list.reset();
        Some(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut CloaderSlot> {
        self.slots.get_mut(idx)
    }

    /// Returns a slot that will not reach hardware after all.
    pub fn release(&mut self, idx: usize) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.state = CloaderState::Free;
        }
    }

    /// Hardware latched the configuration: every in-process list is free
    /// again. Returns how many were released.
    pub fn release_processed(&mut self) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut().filter(|s| s.state == CloaderState::Process) {
            slot.state = CloaderState::Free;
            released += 1;
        }
        released
    }

    /// Empties the pool, handing the scratch buffers back.
    pub fn drain(&mut self) -> impl Iterator<Item = CloaderSlot> + '_ {
        self.slots.drain(..)
    }
}
