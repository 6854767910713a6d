//! LCD display abstraction (8080 and RGB parallel interfaces)
//!
//! Both interfaces are fed from a data FIFO that a DMA channel writes into.
//! The RGB interface scans continuously once enabled and raises an
//! end-of-frame interrupt per refresh. The 8080 interface pushes one frame
//! per `RAM_WRITE` command and must be re-armed from its end-of-frame
//! interrupt.

/// 8080 "memory write" command: start writing at the window origin.
pub const RAM_WRITE: u8 = 0x2C;

/// 8080 "memory write continue" command.
pub const CONTINUE_WRITE: u8 = 0x3C;

/// Physical panel interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LcdInterface {
    /// Intel 8080 MCU bus with on-panel GRAM
    I8080,
    /// RGB parallel with continuous scan
    Rgb,
}

/// Root clock of the display block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LcdClock {
    /// 320 MHz
    Mhz320,
    /// 160 MHz
    Mhz160,
    /// 120 MHz
    Mhz120,
    /// 96 MHz
    Mhz96,
    /// 80 MHz
    Mhz80,
    /// 60 MHz
    Mhz60,
}

impl LcdClock {
    /// Frequency in hertz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Mhz320 => 320_000_000,
            Self::Mhz160 => 160_000_000,
            Self::Mhz120 => 120_000_000,
            Self::Mhz96 => 96_000_000,
            Self::Mhz80 => 80_000_000,
            Self::Mhz60 => 60_000_000,
        }
    }
}

/// Pixel format pushed into the data FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LcdDataFormat {
    /// RGB565
    Rgb565,
    /// YUYV as produced by the camera
    OriginalYuyv,
    /// UYVY byte order
    Uyvy,
    /// YYUV byte order
    Yyuv,
    /// UVYY byte order
    Uvyy,
    /// VUYY byte order, as produced by the JPEG decoder
    Vuyy,
}

impl LcdDataFormat {
    /// Bytes per pixel. Every supported format packs two bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        2
    }

    /// `true` for the YUV formats the display block converts to RGB.
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        !matches!(self, Self::Rgb565)
    }
}

/// Panel geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LcdGeometry {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
}

impl LcdGeometry {
    /// Create a geometry.
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Bytes in one frame of `format`.
    #[must_use]
    pub fn frame_bytes(&self, format: LcdDataFormat) -> u32 {
        u32::from(self.width)
            .saturating_mul(u32::from(self.height))
            .saturating_mul(format.bytes_per_pixel())
    }
}

/// Display interrupt sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdInt {
    /// RGB interface finished scanning a frame
    RgbOutputEof,
    /// 8080 interface finished pushing a frame
    I8080OutputEof,
}

/// LCD errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdError {
    /// Operation not valid for the initialised interface
    WrongInterface,
    /// Driver used before `driver_init`
    NotInitialized,
    /// Zero-sized geometry or divider out of range
    InvalidConfig,
}

impl core::fmt::Display for LcdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WrongInterface => write!(f, "LCD operation not valid for this interface"),
            Self::NotInitialized => write!(f, "LCD driver not initialized"),
            Self::InvalidConfig => write!(f, "invalid LCD configuration"),
        }
    }
}

/// Display controller.
pub trait LcdDisplay {
    /// Error type
    type Error: core::fmt::Debug + From<LcdError>;

    /// Select the root clock and power the display block
    fn driver_init(&mut self, clock: LcdClock) -> Result<(), Self::Error>;

    /// Configure the RGB interface
    fn rgb_init(
        &mut self,
        clk_div: u8,
        geometry: LcdGeometry,
        format: LcdDataFormat,
    ) -> Result<(), Self::Error>;

    /// Configure the 8080 interface
    fn i8080_init(&mut self, geometry: LcdGeometry, format: LcdDataFormat)
        -> Result<(), Self::Error>;

    /// Reprogram the pixel window without touching timing
    fn pixel_config(&mut self, geometry: LcdGeometry) -> Result<(), Self::Error>;

    /// Enable or disable output
    fn display_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Start or stop the 8080 data transfer
    fn i8080_start_transfer(&mut self, start: bool) -> Result<(), Self::Error>;

    /// Send a command byte on the 8080 bus
    fn i8080_write_cmd(&mut self, cmd: u8) -> Result<(), Self::Error>;

    /// Shut down the RGB interface
    fn rgb_deinit(&mut self) -> Result<(), Self::Error>;

    /// Shut down the 8080 interface
    fn i8080_deinit(&mut self) -> Result<(), Self::Error>;

    /// Address of the data FIFO for `interface` (DMA destination)
    fn data_fifo_addr(&self, interface: LcdInterface) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes() {
        let g = LcdGeometry::new(480, 272);
        assert_eq!(g.frame_bytes(LcdDataFormat::Vuyy), 261_120);
        assert_eq!(g.frame_bytes(LcdDataFormat::Rgb565), 261_120);
    }

    #[test]
    fn test_yuv_formats() {
        assert!(LcdDataFormat::OriginalYuyv.is_yuv());
        assert!(!LcdDataFormat::Rgb565.is_yuv());
    }
}
