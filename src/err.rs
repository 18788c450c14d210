use crate::dma::ChannelRole;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IspError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unsupported DMA channel role {0:?}")]
    UnsupportedChannel(ChannelRole),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("unsupported compression mode {0}")]
    UnsupportedCompression(u32),
    #[error("unsupported DMA format {0}")]
    UnsupportedFormat(u32),
    #[error("hardware did not respond in time")]
    Timeout,
    #[error("out of memory")]
    NoMemory,
    #[error("device busy")]
    Busy,
    #[error("hardware block is not opened")]
    NotOpened,
    #[error("hardware block is not initialized")]
    NotInitialized,
}

impl IspError {
    /// Errors detected before any register is touched for the current frame.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            IspError::InvalidArgument
                | IspError::UnsupportedChannel(_)
                | IspError::InvalidGeometry(_)
                | IspError::UnsupportedCompression(_)
                | IspError::UnsupportedFormat(_)
        )
    }
}
