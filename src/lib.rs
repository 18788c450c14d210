//! Register, DMA-descriptor and frame-lifecycle core for Pablo ISP blocks.
//!
//! The crate programs one MTNR0 temporal noise reduction block: register
//! descriptions with a cached access layer, a table-driven DMA descriptor
//! builder, the feedback buffer arenas of the temporal mixer and the
//! hardware lifecycle controller that ties them to the frame interrupts.
//!
//! The surrounding services (PCC sequencer, frame manager, memory allocator
//! and clock) are consumed through the traits in [`device`] and [`osal`].

#![no_std]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod cloader;
mod config;
pub mod device;
pub mod dma;
mod err;
pub mod feedback;
pub mod geometry;
pub mod hal;
pub mod irq;
mod mtnr0;
mod osal;
pub mod registers;
pub mod tuning;

pub use config::*;
pub use err::*;
pub use mtnr0::*;
pub use osal::*;
