//! Crop, radial-centre and motion-vector offset arithmetic.
//!
//! Everything here is side-effect free. The results feed the size and crop
//! registers and the stripe offsets of the DMA channels.

use crate::{IspError, dma::align_down};

/// Horizontal tiling of the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripeInput {
    pub index: u32,
    pub total_count: u32,
    /// Left edge of this stripe, margin included, in full-frame pixels.
    pub start_pos_x: u32,
    pub full_width: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    /// Times the same stripe is shot again, and which pass this is.
    pub repeat_num: u32,
    pub repeat_idx: u32,
}

/// `idx` is the first of `total` shots of a batch, stripe or repeat run.
pub fn is_first_shot(total: u32, idx: u32) -> bool {
    total <= 1 || idx == 0
}

impl StripeInput {
    pub fn is_enabled(&self) -> bool {
        self.total_count >= 2
    }

    /// Start position the hardware sees; the first stripe always starts at 0.
    pub fn start_pos(&self) -> u32 {
        if self.index != 0 { self.start_pos_x } else { 0 }
    }

    /// Whether another stripe of the same frame still follows this one.
    pub fn is_partial(&self) -> bool {
        self.total_count > 1 && self.index < self.total_count - 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// A horizontal window in full-frame coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropWindow {
    pub start: u32,
    pub width: u32,
}

/// Output crop of one stripe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripeCrop {
    /// Aligned write position of the stripe in the full frame.
    pub start_x: u32,
    /// Crop start inside the stripe input.
    pub img_x: u32,
    pub width: u32,
}

impl StripeCrop {
    pub fn window(&self) -> CropWindow {
        CropWindow {
            start: self.start_x,
            width: self.width,
        }
    }

    pub fn weight(&self) -> (u32, u32) {
        (self.img_x >> 1, self.width >> 1)
    }
}

/// Resolves which part of a stripe lands in the output frame.
///
/// `stripe_width` is the input width of the stripe with both margins.
/// The write position is aligned down to `align` (twice the compression
/// block width on MTNR0), and the pixels the alignment pulls in are kept
/// in the crop so consecutive stripes meet without a gap.
pub fn resolve_stripe_crop(
    full_width: u32,
    stripe_width: u32,
    stripe: &StripeInput,
    align: u32,
) -> StripeCrop {
    if !stripe.is_enabled() {
        return StripeCrop {
            start_x: 0,
            img_x: 0,
            width: full_width,
        };
    }

    let region_start = stripe.start_pos() + stripe.left_margin;
    let start_x = align_down(region_start, align).min(full_width);
    let align_margin = region_start.saturating_sub(start_x);
    let img_x = stripe.left_margin.saturating_sub(align_margin);
    let width = (stripe_width + align_margin)
        .saturating_sub(stripe.left_margin + stripe.right_margin)
        .min(full_width - start_x);

    StripeCrop {
        start_x,
        img_x,
        width,
    }
}

/// Trims a fixed margin from each side of an OTF stripe.
///
/// Returns `(x, width)` inside the stripe input; a side is only trimmed
/// when it carries a margin and enough width is left.
pub fn otf_margin_crop(width: u32, stripe: &StripeInput, margin: u32) -> (u32, u32) {
    let mut x = 0;
    let mut width = width;

    if stripe.left_margin > 0 && width > margin {
        x = margin;
        width -= margin;
    }
    if stripe.right_margin > 0 && width > margin {
        width -= margin;
    }

    (x, width)
}

/// Checks the L1 input against the L0 input: each side is half the L0
/// side, rounded up to an even value.
pub fn verify_l1_size(l0: Size, l1: Size) -> Result<(), IspError> {
    let expected = Size::new(half_even(l0.w), half_even(l0.h));
    if expected != l1 {
        error!(
            "[MTNR0] invalid size: l0({}x{}), l1({}x{}) vs expected ({}x{})",
            l0.w, l0.h, l1.w, l1.h, expected.w, expected.h
        );
        return Err(IspError::InvalidGeometry("l1 size does not match l0"));
    }
    Ok(())
}

fn half_even(v: u32) -> u32 {
    v.div_ceil(2).div_ceil(2) * 2
}

/// Sensor calibration and binning chain of the current frame.
///
/// Every binning ratio is in per-mille; 1000 means no binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadialConfig {
    pub sensor_full_width: u32,
    pub sensor_full_height: u32,
    pub sensor_binning_x: u32,
    pub sensor_binning_y: u32,
    pub sensor_crop_x: u32,
    pub sensor_crop_y: u32,
    pub bns_binning_x: u32,
    pub bns_binning_y: u32,
    pub sw_binning_x: u32,
    pub sw_binning_y: u32,
    pub rgbp_crop_offset_x: u32,
    pub rgbp_crop_offset_y: u32,
    pub rgbp_crop_w: u32,
    pub rgbp_crop_h: u32,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            sensor_full_width: 0,
            sensor_full_height: 0,
            sensor_binning_x: 1000,
            sensor_binning_y: 1000,
            sensor_crop_x: 0,
            sensor_crop_y: 0,
            bns_binning_x: 1000,
            bns_binning_y: 1000,
            sw_binning_x: 1000,
            sw_binning_y: 1000,
            rgbp_crop_offset_x: 0,
            rgbp_crop_offset_y: 0,
            rgbp_crop_w: 0,
            rgbp_crop_h: 0,
        }
    }
}

impl RadialConfig {
    /// Software binning ratios of 0 mean "not set".
    pub fn with_sw_binning(mut self, x: u32, y: u32) -> Self {
        self.sw_binning_x = if x != 0 { x } else { 1000 };
        self.sw_binning_y = if y != 0 { y } else { 1000 };
        self
    }
}

/// Total binning from the sensor to the block input, in 1/1024 units.
///
/// `frame_width` and `height` must be non-zero.
pub fn resolve_radial_binning(cfg: &RadialConfig, frame_width: u32, height: u32) -> (u32, u32) {
    const NORM: u64 = 1000 * 1000 * 1000;

    let x = u64::from(cfg.sensor_binning_x)
        * u64::from(cfg.bns_binning_x)
        * u64::from(cfg.sw_binning_x)
        * 1024
        * u64::from(cfg.rgbp_crop_w)
        / u64::from(frame_width.max(1))
        / NORM;
    let y = u64::from(cfg.sensor_binning_y)
        * u64::from(cfg.bns_binning_y)
        * u64::from(cfg.sw_binning_y)
        * 1024
        * u64::from(cfg.rgbp_crop_h)
        / u64::from(height.max(1))
        / NORM;

    (x as u32, y as u32)
}

/// Optical centre relative to the top-left pixel of this stripe, in
/// sensor full-resolution pixels. The result is negative when the
/// stripe starts left of (or above) the centre.
pub fn resolve_radial_center(cfg: &RadialConfig, strip_start_pos: u32) -> (i32, i32) {
    let sensor_center_x = (cfg.sensor_full_width >> 1) & !1;
    let sensor_center_y = (cfg.sensor_full_height >> 1) & !1;

    let offset_x = u64::from(cfg.sensor_crop_x)
        + u64::from(cfg.bns_binning_x)
            * (u64::from(cfg.rgbp_crop_offset_x) + u64::from(strip_start_pos))
            / 1000;
    let offset_y = u64::from(cfg.sensor_crop_y)
        + u64::from(cfg.bns_binning_y) * u64::from(cfg.rgbp_crop_offset_y) / 1000;

    let x = (u64::from(cfg.sensor_binning_x) * offset_x / 1000) as i32;
    let y = (u64::from(cfg.sensor_binning_y) * offset_y / 1000) as i32;

    (
        x.wrapping_sub(sensor_center_x as i32),
        y.wrapping_sub(sensor_center_y as i32),
    )
}

/// Sub-pixel phase of the motion-vector grid at a stripe start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MvResizeOffset {
    /// Truncating remainder of the 8.8 position; negative for downscales
    /// that start left of the first vector.
    pub x: i32,
    pub y: i32,
}

impl MvResizeOffset {
    const FIELD_MASK: u32 = 0x3FF;

    /// The x phase folded into one fixed-point unit, always in `[0, 256)`.
    pub fn x_phase(&self) -> u32 {
        self.x.rem_euclid(1 << 8) as u32
    }

    /// Register encodings: low 10 bits of the signed values.
    pub fn fields(&self) -> (u32, u32) {
        (
            self.x as u32 & Self::FIELD_MASK,
            self.y as u32 & Self::FIELD_MASK,
        )
    }
}

/// Resize offset of the motion-vector grid for a `in -> out` scale.
///
/// The inverse scale is 8.8 fixed point rounded to nearest; the position
/// term wraps at one fixed-point unit. `out_w` and `out_h` must be
/// non-zero.
pub fn resolve_motion_vector_resize_offset(
    in_w: u32,
    in_h: u32,
    out_w: u32,
    out_h: u32,
    tile_start_pos: u32,
) -> MvResizeOffset {
    debug_assert!(out_w != 0 && out_h != 0, "mv resize output must be non-zero");
    let out_w = out_w.max(1);
    let out_h = out_h.max(1);

    let inverse_scale_x = ((256 * in_w + out_w / 2) / out_w) as i32;
    let resized_offset_x = (inverse_scale_x - 256 + 1) / 2;
    let inverse_scale_y = ((256 * in_h + out_h / 2) / out_h) as i32;
    let resized_offset_y = (inverse_scale_y - 256 + 1) / 2;

    let m = ((tile_start_pos / 32) as i32)
        .wrapping_mul(inverse_scale_x)
        .wrapping_add(resized_offset_x);

    MvResizeOffset {
        x: m % (1 << 8),
        y: resized_offset_y,
    }
}
