//! Pipeline error type

use bk_platform::camera::CameraError;
use bk_platform::dma::DmaError;
use bk_platform::jpeg::JpegError;
use bk_platform::lcd::LcdError;
use bk_platform::psram::PsramError;

use crate::config::ConfigError;
use crate::frame_buffer::FrameBufferError;
use crate::video::PipelineState;

/// Errors returned by [`crate::VideoPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineError {
    /// DMA channel operation failed
    #[error("dma: {0}")]
    Dma(DmaError),
    /// JPEG encoder or decoder failed
    #[error("jpeg: {0}")]
    Jpeg(JpegError),
    /// Display controller failed
    #[error("lcd: {0}")]
    Lcd(LcdError),
    /// PSRAM access failed
    #[error("psram: {0}")]
    Psram(PsramError),
    /// Camera sensor failed
    #[error("camera: {0}")]
    Camera(CameraError),
    /// Configuration rejected
    #[error("config: {0}")]
    Config(ConfigError),
    /// Frame pool misuse
    #[error("frame buffer: {0}")]
    FrameBuffer(FrameBufferError),
    /// Operation not valid in the current state
    #[error("invalid in state {0}")]
    InvalidState(PipelineState),
    /// A capture is already pending
    #[error("capture already pending")]
    CaptureBusy,
    /// Capture requested outside [`crate::config::PipelineMode::JpegCapture`]
    #[error("mode does not capture")]
    CaptureUnsupported,
}

impl From<DmaError> for PipelineError {
    fn from(e: DmaError) -> Self {
        Self::Dma(e)
    }
}

impl From<JpegError> for PipelineError {
    fn from(e: JpegError) -> Self {
        Self::Jpeg(e)
    }
}

impl From<LcdError> for PipelineError {
    fn from(e: LcdError) -> Self {
        Self::Lcd(e)
    }
}

impl From<PsramError> for PipelineError {
    fn from(e: PsramError) -> Self {
        Self::Psram(e)
    }
}

impl From<CameraError> for PipelineError {
    fn from(e: CameraError) -> Self {
        Self::Camera(e)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<FrameBufferError> for PipelineError {
    fn from(e: FrameBufferError) -> Self {
        Self::FrameBuffer(e)
    }
}

/// Pipeline result alias
pub type Result<T> = core::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_hal_errors() {
        let e: PipelineError = DmaError::Busy.into();
        assert_eq!(e, PipelineError::Dma(DmaError::Busy));
        assert_eq!(std::format!("{e}"), "dma: DMA channel busy");
    }

    #[test]
    fn test_state_in_message() {
        let e = PipelineError::InvalidState(PipelineState::Closed);
        assert_eq!(std::format!("{e}"), "invalid in state closed");
    }
}
