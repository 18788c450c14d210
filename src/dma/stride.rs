//! Stride and size arithmetic shared by every DMA channel.
//!
//! All functions are pure; the same inputs always produce the same value.

use super::{CompMode, DmaFormat, LossyQuality};

pub const fn align_up(value: u32, align: u32) -> u32 {
    if align == 0 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

pub const fn align_down(value: u32, align: u32) -> u32 {
    if align == 0 {
        value
    } else {
        value / align * align
    }
}

/// Bytes of one uncompressed line.
///
/// Packed formats take `pixel_size` bits per pixel, everything else the
/// memory bit width. Non-image data is one byte per element.
pub fn image_stride(
    bit_width: u32,
    pixel_size: u32,
    format: DmaFormat,
    width: u32,
    align: u32,
    is_image: bool,
) -> u32 {
    let bytes = if is_image {
        let bits = if format.is_packed() {
            pixel_size
        } else {
            bit_width
        };
        (width * bits).div_ceil(8)
    } else {
        width
    };

    align_up(bytes, align)
}

/// Bytes of one row of compression blocks.
pub fn payload_stride(
    mode: CompMode,
    pixel_size: u32,
    width: u32,
    align_64b: bool,
    quality: LossyQuality,
    block_width: u32,
    block_height: u32,
) -> u32 {
    let blocks = width.div_ceil(block_width);
    let raw = block_width * block_height * pixel_size / 8;
    let per_block = match mode {
        CompMode::None => return 0,
        CompMode::Lossless => raw,
        CompMode::Lossy => {
            let (num, den) = quality.ratio();
            raw * num / den
        }
    };
    let block_align = if align_64b { 64 } else { 32 };

    blocks * align_up(per_block, block_align)
}

/// Bytes of one header line: 4 bits per compression block.
pub fn header_stride(width: u32, block_width: u32, align: u32) -> u32 {
    let blocks = width.div_ceil(block_width);
    align_up(blocks.div_ceil(2), align)
}

/// Payload plane size of `height` lines.
pub fn payload_size(height: u32, block_height: u32, stride: u32) -> u32 {
    height.div_ceil(block_height) * stride
}
