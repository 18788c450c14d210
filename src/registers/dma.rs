//! Per-channel DMA register window.
//!
//! Every RDMA/WDMA engine of a block exposes the same window layout at its
//! own base offset; [`DmaRegs`] hands out typed descriptors into it.

use tock_registers::register_bitfields;

use super::Reg;

/// Maximum number of buffers one FRO shot can address.
pub const MAX_BATCH: usize = 8;

const OFFSET_EN: u32 = 0x00;
const OFFSET_DATA_FORMAT: u32 = 0x04;
const OFFSET_WIDTH: u32 = 0x08;
const OFFSET_HEIGHT: u32 = 0x0C;
const OFFSET_STRIDE_1P: u32 = 0x10;
const OFFSET_COMP_CTRL: u32 = 0x14;
const OFFSET_HEADER_STRIDE_1P: u32 = 0x18;
const OFFSET_BUS_INFO: u32 = 0x1C;
const OFFSET_VOTF_EN: u32 = 0x20;
const OFFSET_SET_ID: u32 = 0x24;
const OFFSET_IMG_BASE_ADDR_1P: u32 = 0x40;
const OFFSET_HEADER_BASE_ADDR_1P: u32 = 0x60;

/// Write-allocate hint on the AXI bus-info register.
pub const BUS_INFO_WRITE_ALLOC: u32 = 1 << 4;

register_bitfields! {u32,
    pub DMA_EN [
        EN OFFSET(0) NUMBITS(1) []
    ],
    pub DMA_DATA_FORMAT [
        FORMAT OFFSET(0) NUMBITS(5) [],
        BITWIDTH OFFSET(8) NUMBITS(5) [],
        PIXELSIZE OFFSET(16) NUMBITS(5) [],
        MSB_ALIGN OFFSET(24) NUMBITS(1) []
    ],
    pub DMA_COMP_CTRL [
        SBWC_EN OFFSET(0) NUMBITS(2) [],
        ALIGN_64B OFFSET(4) NUMBITS(1) [],
        QUALITY_CONTROL OFFSET(8) NUMBITS(2) [],
        CACHE_32B_PA OFFSET(12) NUMBITS(1) []
    ],
    pub DMA_SET_ID [
        SET_ID OFFSET(0) NUMBITS(2) []
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaRegs {
    base: u32,
}

impl DmaRegs {
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    pub const fn en(&self) -> Reg<DMA_EN::Register> {
        Reg::new(self.base + OFFSET_EN)
    }

    pub const fn data_format(&self) -> Reg<DMA_DATA_FORMAT::Register> {
        Reg::new(self.base + OFFSET_DATA_FORMAT)
    }

    pub const fn width(&self) -> Reg {
        Reg::new(self.base + OFFSET_WIDTH)
    }

    pub const fn height(&self) -> Reg {
        Reg::new(self.base + OFFSET_HEIGHT)
    }

    pub const fn stride(&self) -> Reg {
        Reg::new(self.base + OFFSET_STRIDE_1P)
    }

    pub const fn comp_ctrl(&self) -> Reg<DMA_COMP_CTRL::Register> {
        Reg::new(self.base + OFFSET_COMP_CTRL)
    }

    pub const fn header_stride(&self) -> Reg {
        Reg::new(self.base + OFFSET_HEADER_STRIDE_1P)
    }

    pub const fn bus_info(&self) -> Reg {
        Reg::new(self.base + OFFSET_BUS_INFO)
    }

    pub const fn votf_en(&self) -> Reg {
        Reg::new(self.base + OFFSET_VOTF_EN)
    }

    pub const fn set_id(&self) -> Reg<DMA_SET_ID::Register> {
        Reg::new(self.base + OFFSET_SET_ID)
    }

    /// Image base address slot of batch buffer `idx`.
    pub const fn img_addr(&self, idx: usize) -> Reg {
        Reg::new(self.base + OFFSET_IMG_BASE_ADDR_1P + (idx as u32) * 4)
    }

    /// Header base address slot of batch buffer `idx`.
    pub const fn header_addr(&self, idx: usize) -> Reg {
        Reg::new(self.base + OFFSET_HEADER_BASE_ADDR_1P + (idx as u32) * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_slots_fit_the_window() {
        let regs = DmaRegs::new(0x5000);
        assert_eq!(regs.img_addr(MAX_BATCH - 1).offset(), 0x505C);
        assert_eq!(regs.header_addr(MAX_BATCH - 1).offset(), 0x507C);
    }
}
