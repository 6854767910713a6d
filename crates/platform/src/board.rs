//! Board bundle: the set of peripherals the video pipeline drives.
//!
//! A board picks one concrete driver per peripheral. Error types are fixed
//! to the platform error enums so higher layers can report failures without
//! being generic over every driver.

use crate::camera::{CameraError, CameraSensor};
use crate::dma::{DmaAllocator, DmaChannel, DmaError};
use crate::jpeg::{JpegDecoder, JpegEncoder, JpegError};
use crate::lcd::{LcdDisplay, LcdError};
use crate::psram::{Psram, PsramError};

/// Concrete driver types for one board.
pub trait VideoBoard {
    /// DMA channel handle
    type DmaChannel: DmaChannel<Error = DmaError>;
    /// DMA channel allocator
    type Dma: DmaAllocator<Channel = Self::DmaChannel>;
    /// JPEG encoder + DVP input
    type Encoder: JpegEncoder<Error = JpegError>;
    /// JPEG decoder
    type Decoder: JpegDecoder<Error = JpegError>;
    /// Display controller
    type Lcd: LcdDisplay<Error = LcdError>;
    /// Frame-buffer memory
    type Psram: Psram<Error = PsramError>;
    /// DVP camera sensor
    type Camera: CameraSensor<Error = CameraError>;
}

/// Owned peripherals of a [`VideoBoard`].
pub struct Peripherals<B: VideoBoard> {
    /// DMA channel allocator
    pub dma: B::Dma,
    /// JPEG encoder
    pub encoder: B::Encoder,
    /// JPEG decoder
    pub decoder: B::Decoder,
    /// Display controller
    pub lcd: B::Lcd,
    /// PSRAM
    pub psram: B::Psram,
    /// Camera sensor
    pub camera: B::Camera,
}
