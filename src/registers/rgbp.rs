//! RGBP v13 interrupt map.
//!
//! Only the interrupt side of the block is described here: which bit of
//! each line starts, latches and ends a frame, and which bits are errors.

pub const INTR0_FRAME_START: u32 = 0;
pub const INTR0_FRAME_END: u32 = 1;
pub const INTR0_CMDQ_HOLD: u32 = 2;
pub const INTR0_SETTING_DONE: u32 = 3;
pub const INTR0_C_LOADER_END: u32 = 4;
pub const INTR0_COREX_END_0: u32 = 5;
pub const INTR0_COREX_END_1: u32 = 6;
/// Frame-row line; the block latched the configuration of the frame.
pub const INTR0_ROW_COL: u32 = 7;
pub const INTR0_FREEZE_ON_ROW_COL: u32 = 8;
pub const INTR0_TRANS_STOP_DONE: u32 = 9;
pub const INTR0_CMDQ_ERROR: u32 = 10;
pub const INTR0_OTF_SEQ_ID_ERROR: u32 = 22;

/// Interrupt 1 carries error causes only, from bit 0 up.
pub const INTR1_ERROR_COUNT: u32 = 21;

/// CMDQ, C-loader, COREX, FIFO and VOTF error causes on interrupt 0.
pub const INT0_ERR_MASK: u32 =
    ((1 << (INTR0_OTF_SEQ_ID_ERROR + 1)) - 1) & !((1 << INTR0_CMDQ_ERROR) - 1);
/// VOTF flush and debug counter errors on interrupt 1.
pub const INT1_ERR_MASK: u32 = (1 << INTR1_ERROR_COUNT) - 1;

/// Status bits with nothing to do beyond tracing.
pub const INT0_INFO_MASK: u32 = (1 << INTR0_CMDQ_HOLD)
    | (1 << INTR0_C_LOADER_END)
    | (1 << INTR0_FREEZE_ON_ROW_COL)
    | (1 << INTR0_TRANS_STOP_DONE);

pub const INT0_EN_MASK: u32 = (1 << INTR0_FRAME_START)
    | (1 << INTR0_FRAME_END)
    | (1 << INTR0_SETTING_DONE)
    | (1 << INTR0_COREX_END_0)
    | (1 << INTR0_ROW_COL)
    | INT0_ERR_MASK;
pub const INT1_EN_MASK: u32 = INT1_ERR_MASK;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_masks() {
        assert_eq!(INT0_ERR_MASK, 0x007F_FC00);
        assert_eq!(INT1_ERR_MASK, 0x001F_FFFF);
        assert_eq!(INT0_ERR_MASK & INT0_INFO_MASK, 0);
        assert_eq!(INT0_EN_MASK & 0x3FF, 0xAB);
    }
}
