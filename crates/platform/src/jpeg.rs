//! JPEG engine abstraction
//!
//! The BK7256 JPEG block has two halves. The encoder takes YUV422 from the
//! DVP camera port and either passes the raw YUV to memory (`yuv_mode`) or
//! emits a JPEG bitstream into a FIFO that a DMA channel drains. The decoder
//! reads a bitstream from SRAM and writes a YUV422 frame, one MCU at a time,
//! raising an interrupt per MCU and one at the end of the frame.

/// Width of one YUV422 MCU in pixels.
pub const MCU_WIDTH: u16 = 16;

/// Height of one YUV422 MCU in pixels.
pub const MCU_HEIGHT: u16 = 8;

/// Encoder configuration for the DVP path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JpegEncConfig {
    /// Frame width in pixels
    pub x_pixel: u16,
    /// Frame height in pixels
    pub y_pixel: u16,
    /// Pass raw YUV through instead of encoding
    pub yuv_mode: bool,
    /// System clock divider feeding the encoder
    pub sys_clk_div: u8,
    /// Sensor MCLK divider
    pub mclk_div: u8,
}

impl JpegEncConfig {
    /// 480 x 272 configuration used by the RGB panel demos.
    #[must_use]
    pub const fn rgb_panel(yuv_mode: bool) -> Self {
        Self {
            x_pixel: 480,
            y_pixel: 272,
            yuv_mode,
            sys_clk_div: 4,
            mclk_div: 0,
        }
    }

    /// Frame dimensions must be whole MCUs.
    #[allow(clippy::arithmetic_side_effects)] // Safety: MCU_WIDTH/MCU_HEIGHT are non-zero constants
    pub fn validate(&self) -> Result<(), JpegError> {
        if self.x_pixel == 0 || self.y_pixel == 0 {
            return Err(JpegError::InvalidGeometry);
        }
        if self.x_pixel % MCU_WIDTH != 0 || self.y_pixel % MCU_HEIGHT != 0 {
            return Err(JpegError::InvalidGeometry);
        }
        Ok(())
    }

    /// MCU layout of one encoded frame.
    pub fn mcu_geometry(&self) -> Result<McuGeometry, JpegError> {
        self.validate()?;
        Ok(McuGeometry::new(self.x_pixel, self.y_pixel))
    }
}

/// Encoder interrupt sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JpegEncEvent {
    /// JPEG header written
    HeadOutput,
    /// First line of a new frame entered the encoder
    StartOfFrame,
    /// Bitstream for the frame fully pushed to the FIFO
    EndOfFrame,
    /// Raw YUV frame fully written (yuv_mode only)
    EndOfYuv,
}

/// MCU layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct McuGeometry {
    /// MCU columns
    pub columns: u16,
    /// MCU rows
    pub rows: u16,
}

impl McuGeometry {
    /// Layout for a `width` x `height` YUV422 frame; partial MCUs round up.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            columns: width.div_ceil(MCU_WIDTH),
            rows: height.div_ceil(MCU_HEIGHT),
        }
    }

    /// Total MCUs the decoder emits for one frame.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::from(self.columns).saturating_mul(u32::from(self.rows))
    }
}

/// JPEG errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JpegError {
    /// Frame size is zero or not a whole number of MCUs
    InvalidGeometry,
    /// Driver used before `driver_init`
    NotInitialized,
    /// Bitstream could not be parsed
    Corrupt,
    /// Engine is still processing the previous frame
    Busy,
}

impl core::fmt::Display for JpegError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidGeometry => write!(f, "JPEG frame size is not a whole number of MCUs"),
            Self::NotInitialized => write!(f, "JPEG driver not initialized"),
            Self::Corrupt => write!(f, "JPEG bitstream corrupt"),
            Self::Busy => write!(f, "JPEG engine busy"),
        }
    }
}

/// JPEG encoder (DVP input side).
pub trait JpegEncoder {
    /// Error type
    type Error: core::fmt::Debug + From<JpegError>;

    /// Power and clock the encoder block
    fn driver_init(&mut self) -> Result<(), Self::Error>;

    /// Power down the encoder block
    fn driver_deinit(&mut self) -> Result<(), Self::Error>;

    /// Configure the DVP port and encoder for `config`
    fn dvp_init(&mut self, config: &JpegEncConfig) -> Result<(), Self::Error>;

    /// Release the DVP port
    fn dvp_deinit(&mut self) -> Result<(), Self::Error>;

    /// Gate the encoder on or off without reconfiguring it
    fn set_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Switch between raw YUV output and JPEG output
    fn set_yuv_mode(&mut self, yuv: bool) -> Result<(), Self::Error>;

    /// Size in bytes of the last encoded frame
    fn frame_size(&self) -> u32;

    /// Address of the encoder output FIFO (DMA source)
    fn fifo_addr(&self) -> u32;
}

/// JPEG decoder.
pub trait JpegDecoder {
    /// Error type
    type Error: core::fmt::Debug + From<JpegError>;

    /// Power and clock the decoder block
    fn driver_init(&mut self) -> Result<(), Self::Error>;

    /// Power down the decoder block
    fn driver_deinit(&mut self) -> Result<(), Self::Error>;

    /// Parse the header at `src_addr`, arm the decoder to write into
    /// `dst_addr` and start decoding.
    fn init(&mut self, src_addr: u32, dst_addr: u32) -> Result<(), Self::Error>;

    /// Restart decoding with the addresses from the last `init`
    fn start(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_panel_mcu_count() {
        let geometry = JpegEncConfig::rgb_panel(false).mcu_geometry().unwrap();
        assert_eq!(geometry.columns, 30);
        assert_eq!(geometry.rows, 34);
        assert_eq!(geometry.total(), 1020);
    }

    #[test]
    fn test_partial_mcu_rounds_up() {
        let geometry = McuGeometry::new(20, 9);
        assert_eq!(geometry.total(), 4);
    }

    #[test]
    fn test_validate_rejects_ragged_width() {
        let cfg = JpegEncConfig {
            x_pixel: 470,
            ..JpegEncConfig::rgb_panel(true)
        };
        assert_eq!(cfg.validate(), Err(JpegError::InvalidGeometry));
    }
}
