//! Register access layer for Pablo ISP blocks.
//!
//! Every register is described by a [`Reg`] descriptor carrying its byte
//! offset and, as a phantom type, the `register_bitfields!` register it
//! belongs to. [`RegisterSpace`] only accepts fields of the matching
//! register, so a field/register mismatch is a compile error instead of a
//! silent corruption of a neighbouring register.
//!
//! The space sits on top of a raw [`RegisterIo`] backend (MMIO in a real
//! system, an in-memory map in tests) and adds the shadow cache used while
//! building a frame: in [`CachePolicy::CacheOnly`] writes only land in the
//! shadow and are later pushed out either register by register
//! ([`RegisterSpace::sync`]) or as C-loader pairs ([`RegisterSpace::fsync`]).

use alloc::collections::{BTreeMap, BTreeSet};
use core::{fmt, marker::PhantomData, ptr::NonNull};

use tock_registers::{
    RegisterLongName,
    fields::{Field, FieldValue},
};

use crate::{cloader::CloaderBuffer, osal::DmaAddr};

pub mod consts;
pub mod dma;
pub mod mtnr0;
pub mod rgbp;

/// Typed register descriptor.
pub struct Reg<R: RegisterLongName = ()> {
    offset: u32,
    _reg: PhantomData<R>,
}

impl<R: RegisterLongName> Reg<R> {
    pub const fn new(offset: u32) -> Self {
        Self {
            offset,
            _reg: PhantomData,
        }
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }
}

impl<R: RegisterLongName> Clone for Reg<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: RegisterLongName> Copy for Reg<R> {}

impl<R: RegisterLongName> fmt::Debug for Reg<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reg({:#06x})", self.offset)
    }
}

/// Raw 32-bit register backend.
pub trait RegisterIo {
    fn read(&self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);
}

/// Volatile MMIO backend over a mapped register file.
pub struct MmioRegion {
    base: NonNull<u8>,
    size: usize,
}

unsafe impl Send for MmioRegion {}

impl MmioRegion {
    /// Creates a backend over a mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must point to a device mapping of at least `size` bytes that
    /// stays valid for the lifetime of the returned value.
    pub const unsafe fn new(base: NonNull<u8>, size: usize) -> Self {
        Self { base, size }
    }

    fn in_bounds(&self, offset: u32) -> bool {
        offset % 4 == 0 && (offset as usize) + 4 <= self.size
    }
}

impl RegisterIo for MmioRegion {
    fn read(&self, offset: u32) -> u32 {
        if !self.in_bounds(offset) {
            error!("mmio read out of window: {:#x}", offset);
            return 0;
        }
        // SAFETY: bounds and alignment checked above, mapping guaranteed by `new`.
        unsafe {
            self.base
                .add(offset as usize)
                .cast::<u32>()
                .as_ptr()
                .read_volatile()
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        if !self.in_bounds(offset) {
            error!("mmio write out of window: {:#x}", offset);
            return;
        }
        // SAFETY: bounds and alignment checked above, mapping guaranteed by `new`.
        unsafe {
            self.base
                .add(offset as usize)
                .cast::<u32>()
                .as_ptr()
                .write_volatile(value)
        }
    }
}

/// Inclusive byte range of registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegRange {
    pub start: u32,
    pub end: u32,
}

impl RegRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset <= self.end
    }
}

/// Declared access ranges of a block register map.
#[derive(Clone, Copy, Debug)]
pub struct AccessTable {
    /// Registers software may program.
    pub writable: &'static [RegRange],
    /// Status registers which must always be read from hardware.
    pub volatile: &'static [RegRange],
}

impl AccessTable {
    pub fn is_writable(&self, offset: u32) -> bool {
        self.writable.iter().any(|r| r.contains(offset))
    }

    pub fn is_volatile(&self, offset: u32) -> bool {
        self.volatile.iter().any(|r| r.contains(offset))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every access hits hardware, the shadow is left alone.
    Direct,
    /// Writes only land in the shadow and are flushed later.
    CacheOnly,
    /// Writes go to hardware and to the shadow.
    CacheBypass,
}

/// COREX register set selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorexSet {
    Direct,
    Set(u32),
}

/// Static layout parameters of a block register space.
#[derive(Clone, Copy, Debug)]
pub struct SpaceLayout {
    pub num_corexs: u32,
    pub corex_stride: u32,
    pub dma_addr_shift: u32,
    pub access: AccessTable,
}

pub struct RegisterSpace<B: RegisterIo> {
    io: B,
    layout: SpaceLayout,
    policy: CachePolicy,
    corex: CorexSet,
    shadow: BTreeMap<u32, u32>,
    dirty: BTreeSet<u32>,
}

impl<B: RegisterIo> RegisterSpace<B> {
    pub fn new(io: B, layout: SpaceLayout) -> Self {
        Self {
            io,
            layout,
            policy: CachePolicy::Direct,
            corex: CorexSet::Direct,
            shadow: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn io(&self) -> &B {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut B {
        &mut self.io
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: CachePolicy) {
        trace!("register cache policy {:?} -> {:?}", self.policy, policy);
        self.policy = policy;
    }

    pub fn corex(&self) -> CorexSet {
        self.corex
    }

    /// Selects the COREX window following accesses are routed to.
    pub fn set_corex(&mut self, set: CorexSet) {
        if let CorexSet::Set(n) = set {
            if n >= self.layout.num_corexs {
                error!("corex set {} out of range (num_corexs {})", n, self.layout.num_corexs);
                debug_assert!(false, "corex set {n} out of range");
                return;
            }
        }
        self.corex = set;
    }

    fn translate(&self, offset: u32) -> u32 {
        match self.corex {
            CorexSet::Direct => offset,
            CorexSet::Set(n) => offset + n * self.layout.corex_stride,
        }
    }

    /// Drops every shadowed value and pending write.
    pub fn reinit_cache(&mut self) {
        self.shadow.clear();
        self.dirty.clear();
    }

    pub fn is_writable(&self, offset: u32) -> bool {
        self.layout.access.is_writable(offset)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn read_raw(&self, offset: u32) -> u32 {
        let phys = self.translate(offset);
        match self.policy {
            CachePolicy::Direct | CachePolicy::CacheBypass => self.io.read(phys),
            CachePolicy::CacheOnly => {
                if self.layout.access.is_volatile(offset) {
                    self.io.read(phys)
                } else {
                    self.shadow.get(&phys).copied().unwrap_or(0)
                }
            }
        }
    }

    pub fn write_raw(&mut self, offset: u32, value: u32) {
        if !self.layout.access.is_writable(offset) {
            error!("write to unmapped register {:#x} dropped", offset);
            debug_assert!(false, "write to unmapped register {offset:#x}");
            return;
        }

        let phys = self.translate(offset);
        match self.policy {
            CachePolicy::Direct => self.io.write(phys, value),
            CachePolicy::CacheOnly => {
                self.shadow.insert(phys, value);
                self.dirty.insert(phys);
            }
            CachePolicy::CacheBypass => {
                self.io.write(phys, value);
                self.shadow.insert(phys, value);
            }
        }
    }

    pub fn read_register<R: RegisterLongName>(&self, reg: Reg<R>) -> u32 {
        self.read_raw(reg.offset())
    }

    pub fn write_register<R: RegisterLongName>(&mut self, reg: Reg<R>, value: u32) {
        self.write_raw(reg.offset(), value);
    }

    pub fn read_field<R: RegisterLongName>(&self, reg: Reg<R>, field: Field<u32, R>) -> u32 {
        field.read(self.read_raw(reg.offset()))
    }

    /// Read-modify-write of the bits covered by `value`.
    pub fn write_field<R: RegisterLongName>(&mut self, reg: Reg<R>, value: FieldValue<u32, R>) {
        let current = self.read_raw(reg.offset());
        self.write_raw(reg.offset(), value.modify(current));
    }

    /// Writes a DMA base address, scaled to the register's address unit.
    pub fn write_dma_addr(&mut self, reg: Reg, addr: DmaAddr) {
        let value = (addr >> self.layout.dma_addr_shift) as u32;
        self.write_raw(reg.offset(), value);
    }

    /// Flushes pending cached writes to hardware in ascending offset order.
    pub fn sync(&mut self) -> usize {
        let dirty = core::mem::take(&mut self.dirty);
        for &phys in dirty.iter() {
            let value = self.shadow.get(&phys).copied().unwrap_or(0);
            self.io.write(phys, value);
        }
        dirty.len()
    }

    /// Moves pending cached writes into C-loader pairs.
    ///
    /// A dirty set larger than the free loader payload is written directly,
    /// in order, and nothing is queued. Returns the number of pairs queued.
    pub fn fsync(&mut self, clb: &mut CloaderBuffer) -> usize {
        let free = clb.capacity().saturating_sub(clb.num_pairs());
        if self.dirty.len() > free {
            warn!(
                "c-loader payload full ({} > {}), direct write",
                self.dirty.len(),
                free
            );
            clb.reset();
            self.sync();
            return 0;
        }

        let dirty = core::mem::take(&mut self.dirty);
        for &phys in dirty.iter() {
            let value = self.shadow.get(&phys).copied().unwrap_or(0);
            // Room was checked above.
            let _ = clb.push(phys, value);
        }
        dirty.len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use alloc::{collections::BTreeMap, vec::Vec};

    use super::RegisterIo;

    /// In-memory register file recording every hardware write.
    #[derive(Default)]
    pub struct FakeIo {
        pub regs: BTreeMap<u32, u32>,
        pub writes: Vec<(u32, u32)>,
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
}
