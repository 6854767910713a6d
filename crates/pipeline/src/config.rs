//! Pipeline configuration
//!
//! Each demo mode has a constructor filled from the board defaults in
//! [`bk_platform::config`]; `with_*` setters adjust single fields and
//! [`PipelineConfig::validate`] rejects combinations the hardware cannot run.
//!
//! # Example
//!
//! ```
//! use bk_pipeline::config::PipelineConfig;
//! use bk_platform::camera::Fps;
//!
//! let cfg = PipelineConfig::rgb_jpeg_display()
//!     .with_fps(Fps::Fps20)
//!     .with_clk_div(12);
//! assert!(cfg.validate().is_ok());
//! ```

use bk_platform::camera::{CameraConfig, Fps};
use bk_platform::config::{
    DEFAULT_FPS, DEFAULT_JPEG_RGB_CLK_DIV, DEFAULT_LCD_CLOCK, DEFAULT_PSRAM,
    DEFAULT_RGB_CLK_DIV, DEFAULT_SOLID_COLOR_CLK_DIV, I8080_WARMUP_LEN, I8080_WARMUP_OFFSET,
    SOLID_COLOR_FRAMES,
};
use bk_platform::dma::MAX_TRANSFER_LEN;
use bk_platform::dma_safety::{
    I8080_HEIGHT, I8080_SEGMENT_COUNT, I8080_SEGMENT_LEN, I8080_WIDTH, RGB_HEIGHT,
    RGB_SEGMENT_COUNT, RGB_SEGMENT_LEN, RGB_WIDTH,
};
use bk_platform::jpeg::{JpegEncConfig, JpegError};
use bk_platform::lcd::{LcdClock, LcdDataFormat, LcdGeometry, LcdInterface};
use bk_platform::psram::{PsramConfig, PsramLayout, PsramRegion};

/// What the pipeline shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineMode {
    /// Raw camera YUV straight to the RGB panel
    YuvDisplay,
    /// Raw camera YUV with a foreground image blended in
    YuvBlend,
    /// Camera JPEG, decoded into alternating display frames
    JpegDisplay,
    /// As `JpegDisplay`, with on-demand still capture
    JpegCapture,
    /// Repeat-mode colour fill of the RGB panel
    SolidColor,
    /// Static frame pushed to an 8080 panel
    I8080,
}

impl PipelineMode {
    /// Panel interface the mode drives.
    pub fn interface(self) -> LcdInterface {
        match self {
            Self::I8080 => LcdInterface::I8080,
            _ => LcdInterface::Rgb,
        }
    }

    /// `true` for modes fed by the DVP camera.
    pub fn uses_camera(self) -> bool {
        matches!(
            self,
            Self::YuvDisplay | Self::YuvBlend | Self::JpegDisplay | Self::JpegCapture
        )
    }

    /// `true` for modes with a JPEG bitstream DMA and decoder.
    pub fn uses_jpeg(self) -> bool {
        matches!(self, Self::JpegDisplay | Self::JpegCapture)
    }

    /// `true` for modes that push frames as chained DMA segments.
    pub fn segmented(self) -> bool {
        !matches!(self, Self::SolidColor)
    }
}

/// Foreground image blended over camera frames.
///
/// The image is stored YUYV in [`PsramLayout::FOREGROUND`]. A pixel pair
/// equal to `key` is transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendConfig {
    /// Left edge in the display frame, pixels (even)
    pub x: u16,
    /// Top edge in the display frame, pixels
    pub y: u16,
    /// Image width in pixels (even)
    pub width: u16,
    /// Image height in pixels
    pub height: u16,
    /// Transparent YUYV pixel pair
    pub key: [u8; 4],
}

impl BlendConfig {
    /// Bytes of one foreground row.
    pub fn row_bytes(&self) -> usize {
        usize::from(self.width).saturating_mul(2)
    }

    /// Bytes of the whole foreground image.
    pub fn image_bytes(&self) -> usize {
        self.row_bytes().saturating_mul(usize::from(self.height))
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 120,
            height: 56,
            key: [0x00, 0x80, 0x00, 0x80],
        }
    }
}

/// Solid-colour test pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolidColorConfig {
    /// Word repeated into the FIFO (two RGB565 pixels)
    pub color: u32,
    /// LCD refreshes before the fill stops
    pub frames: u32,
}

impl Default for SolidColorConfig {
    fn default() -> Self {
        Self {
            color: 0xF800_F800,
            frames: SOLID_COLOR_FRAMES,
        }
    }
}

/// Configuration rejected by [`PipelineConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Segment length zero or above one DMA transfer
    SegmentLength,
    /// Zero segments per frame
    SegmentCount,
    /// Segment length not a multiple of the 32-bit DMA width
    Misaligned,
    /// Segments do not add up to one frame
    SegmentMismatch,
    /// Frame end beyond the 32-bit address space
    AddressOverflow,
    /// Frame larger than its PSRAM region
    FrameTooLarge,
    /// Both display regions overlap
    FrameOverlap,
    /// Camera or encoder size differs from the panel
    CameraMismatch,
    /// Encoder configuration rejected
    Jpeg(JpegError),
    /// Pixel clock divider of zero
    ClockDivider,
    /// Foreground image leaves the frame or has an odd width/edge
    BlendOutOfFrame,
    /// Solid colour fill with zero frames
    ZeroFrames,
    /// Warm-up scratch copy would land in the scanned frame or foreground
    WarmupOverlap,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SegmentLength => write!(f, "segment length out of range"),
            Self::SegmentCount => write!(f, "segment count is zero"),
            Self::Misaligned => write!(f, "segment length not word aligned"),
            Self::SegmentMismatch => write!(f, "segments do not cover one frame"),
            Self::AddressOverflow => write!(f, "frame overflows the address space"),
            Self::FrameTooLarge => write!(f, "frame larger than its PSRAM region"),
            Self::FrameOverlap => write!(f, "display frames overlap"),
            Self::CameraMismatch => write!(f, "camera size differs from panel"),
            Self::Jpeg(e) => write!(f, "encoder: {e}"),
            Self::ClockDivider => write!(f, "pixel clock divider is zero"),
            Self::BlendOutOfFrame => write!(f, "foreground image outside frame"),
            Self::ZeroFrames => write!(f, "solid colour frame count is zero"),
            Self::WarmupOverlap => write!(f, "warm-up scratch overlaps live data"),
        }
    }
}

impl From<JpegError> for ConfigError {
    fn from(e: JpegError) -> Self {
        Self::Jpeg(e)
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Operating mode
    pub mode: PipelineMode,
    /// Display block root clock
    pub clock: LcdClock,
    /// RGB pixel clock divider
    pub clk_div: u8,
    /// Panel size
    pub geometry: LcdGeometry,
    /// Pixel format in the FIFO
    pub format: LcdDataFormat,
    /// Bytes per LCD DMA segment
    pub segment_len: u32,
    /// Segments per frame
    pub segment_count: u32,
    /// Display frame regions; JPEG modes alternate between both
    pub frames: [PsramRegion; 2],
    /// Sensor output
    pub camera: CameraConfig,
    /// Encoder set-up
    pub jpeg: JpegEncConfig,
    /// PSRAM mode word
    pub psram: PsramConfig,
    /// Presented-frame rate cap; `None` shows every frame
    pub display_fps: Option<Fps>,
    /// Foreground image for `YuvBlend`
    pub blend: BlendConfig,
    /// Pattern for `SolidColor`
    pub solid_color: SolidColorConfig,
}

impl PipelineConfig {
    const fn rgb(mode: PipelineMode, clk_div: u8, format: LcdDataFormat, yuv: bool) -> Self {
        Self {
            mode,
            clock: DEFAULT_LCD_CLOCK,
            clk_div,
            geometry: LcdGeometry::new(RGB_WIDTH, RGB_HEIGHT),
            format,
            segment_len: RGB_SEGMENT_LEN,
            segment_count: RGB_SEGMENT_COUNT,
            frames: PsramLayout::DISPLAY,
            camera: CameraConfig {
                width: RGB_WIDTH,
                height: RGB_HEIGHT,
                fps: DEFAULT_FPS,
            },
            jpeg: JpegEncConfig::rgb_panel(yuv),
            psram: DEFAULT_PSRAM,
            display_fps: None,
            blend: BlendConfig {
                x: 0,
                y: 0,
                width: 120,
                height: 56,
                key: [0x00, 0x80, 0x00, 0x80],
            },
            solid_color: SolidColorConfig {
                color: 0xF800_F800,
                frames: SOLID_COLOR_FRAMES,
            },
        }
    }

    /// Camera YUV on the 480x272 RGB panel.
    pub const fn rgb_yuv_display() -> Self {
        Self::rgb(
            PipelineMode::YuvDisplay,
            DEFAULT_RGB_CLK_DIV,
            LcdDataFormat::OriginalYuyv,
            true,
        )
    }

    /// Camera YUV with the default foreground image blended in.
    pub const fn rgb_yuv_blend() -> Self {
        Self::rgb(
            PipelineMode::YuvBlend,
            DEFAULT_RGB_CLK_DIV,
            LcdDataFormat::OriginalYuyv,
            true,
        )
    }

    /// Camera JPEG decoded to the 480x272 RGB panel.
    pub const fn rgb_jpeg_display() -> Self {
        Self::rgb(
            PipelineMode::JpegDisplay,
            DEFAULT_JPEG_RGB_CLK_DIV,
            LcdDataFormat::Vuyy,
            false,
        )
    }

    /// As [`PipelineConfig::rgb_jpeg_display`] with still capture.
    pub const fn rgb_jpeg_capture() -> Self {
        Self::rgb(
            PipelineMode::JpegCapture,
            DEFAULT_JPEG_RGB_CLK_DIV,
            LcdDataFormat::Vuyy,
            false,
        )
    }

    /// Fill the RGB panel with `color` (two RGB565 pixels per word).
    pub const fn rgb_solid_color(color: u32) -> Self {
        let mut cfg = Self::rgb(
            PipelineMode::SolidColor,
            DEFAULT_SOLID_COLOR_CLK_DIV,
            LcdDataFormat::Rgb565,
            false,
        );
        cfg.solid_color.color = color;
        cfg
    }

    /// Frame 0 on the 320x480 8080 panel.
    pub const fn i8080_display() -> Self {
        let frame = PsramRegion {
            offset: 0,
            len: 0x6_0000,
        };
        let mut cfg = Self::rgb(
            PipelineMode::I8080,
            DEFAULT_RGB_CLK_DIV,
            LcdDataFormat::Rgb565,
            false,
        );
        cfg.geometry = LcdGeometry::new(I8080_WIDTH, I8080_HEIGHT);
        cfg.segment_len = I8080_SEGMENT_LEN;
        cfg.segment_count = I8080_SEGMENT_COUNT;
        cfg.frames = [frame, frame];
        cfg
    }

    /// Sensor frame rate.
    #[must_use]
    pub fn with_fps(mut self, fps: Fps) -> Self {
        self.camera.fps = fps;
        self
    }

    /// RGB pixel clock divider.
    #[must_use]
    pub fn with_clk_div(mut self, clk_div: u8) -> Self {
        self.clk_div = clk_div;
        self
    }

    /// Display block root clock.
    #[must_use]
    pub fn with_clock(mut self, clock: LcdClock) -> Self {
        self.clock = clock;
        self
    }

    /// LCD DMA segmentation.
    #[must_use]
    pub fn with_segments(mut self, segment_len: u32, segment_count: u32) -> Self {
        self.segment_len = segment_len;
        self.segment_count = segment_count;
        self
    }

    /// Cap the presented frame rate.
    #[must_use]
    pub fn with_display_fps(mut self, fps: Fps) -> Self {
        self.display_fps = Some(fps);
        self
    }

    /// Foreground image placement.
    #[must_use]
    pub fn with_blend(mut self, blend: BlendConfig) -> Self {
        self.blend = blend;
        self
    }

    /// Solid-colour pattern.
    #[must_use]
    pub fn with_solid_color(mut self, solid_color: SolidColorConfig) -> Self {
        self.solid_color = solid_color;
        self
    }

    /// PSRAM mode word.
    #[must_use]
    pub fn with_psram(mut self, psram: PsramConfig) -> Self {
        self.psram = psram;
        self
    }

    /// Bytes of one display frame.
    pub fn frame_bytes(&self) -> u32 {
        self.geometry.frame_bytes(self.format)
    }

    /// Destination of the warm-up copy: a short block behind display
    /// frame 0.
    ///
    /// With the default RGB layout this lies inside display frame 1, which
    /// holds nothing until the first decode after `start`.
    pub fn warmup_scratch(&self) -> Result<PsramRegion, ConfigError> {
        let offset = usize::try_from(I8080_WARMUP_OFFSET)
            .ok()
            .and_then(|o| self.frames[0].offset.checked_add(o))
            .ok_or(ConfigError::AddressOverflow)?;
        let len = usize::try_from(I8080_WARMUP_LEN).map_err(|_| ConfigError::AddressOverflow)?;
        Ok(PsramRegion { offset, len })
    }

    /// Check every field against the others.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.interface() == LcdInterface::Rgb && self.clk_div == 0 {
            return Err(ConfigError::ClockDivider);
        }

        if self.mode == PipelineMode::SolidColor {
            if self.solid_color.frames == 0 {
                return Err(ConfigError::ZeroFrames);
            }
            return Ok(());
        }

        if self.segment_len == 0 || self.segment_len > MAX_TRANSFER_LEN {
            return Err(ConfigError::SegmentLength);
        }
        if self.segment_count == 0 {
            return Err(ConfigError::SegmentCount);
        }
        if self.segment_len.trailing_zeros() < 2 {
            return Err(ConfigError::Misaligned);
        }
        let frame = self.frame_bytes();
        if self.segment_len.checked_mul(self.segment_count) != Some(frame) {
            return Err(ConfigError::SegmentMismatch);
        }
        let frame = usize::try_from(frame).map_err(|_| ConfigError::AddressOverflow)?;
        if self.frames.iter().any(|r| r.len < frame) {
            return Err(ConfigError::FrameTooLarge);
        }

        if self.mode.uses_jpeg() {
            let [a, b] = &self.frames;
            if a.overlaps(b) {
                return Err(ConfigError::FrameOverlap);
            }
        }

        let scanned = PsramRegion {
            offset: self.frames[0].offset,
            len: frame,
        };
        let scratch = self.warmup_scratch()?;
        if scratch.overlaps(&scanned)
            || (self.mode == PipelineMode::YuvBlend && scratch.overlaps(&PsramLayout::FOREGROUND))
        {
            return Err(ConfigError::WarmupOverlap);
        }

        if self.mode.uses_camera() {
            let g = self.geometry;
            if self.camera.width != g.width
                || self.camera.height != g.height
                || self.jpeg.x_pixel != g.width
                || self.jpeg.y_pixel != g.height
            {
                return Err(ConfigError::CameraMismatch);
            }
            self.jpeg.validate()?;
        }

        if self.mode == PipelineMode::YuvBlend {
            self.validate_blend()?;
        }
        Ok(())
    }

    fn validate_blend(&self) -> Result<(), ConfigError> {
        let b = &self.blend;
        let fits_x = b.x.checked_add(b.width).is_some_and(|r| r <= self.geometry.width);
        let fits_y = b.y.checked_add(b.height).is_some_and(|r| r <= self.geometry.height);
        let even = b.x % 2 == 0 && b.width % 2 == 0;
        if b.width == 0 || b.height == 0 || !fits_x || !fits_y || !even {
            return Err(ConfigError::BlendOutOfFrame);
        }
        if b.image_bytes() > PsramLayout::FOREGROUND.len {
            return Err(ConfigError::BlendOutOfFrame);
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::rgb_yuv_display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_validates() {
        for cfg in [
            PipelineConfig::rgb_yuv_display(),
            PipelineConfig::rgb_yuv_blend(),
            PipelineConfig::rgb_jpeg_display(),
            PipelineConfig::rgb_jpeg_capture(),
            PipelineConfig::rgb_solid_color(0x001F_001F),
            PipelineConfig::i8080_display(),
        ] {
            assert_eq!(cfg.validate(), Ok(()), "{:?}", cfg.mode);
        }
    }

    #[test]
    fn test_segments_must_cover_frame() {
        let cfg = PipelineConfig::rgb_yuv_display().with_segments(65_280, 3);
        assert_eq!(cfg.validate(), Err(ConfigError::SegmentMismatch));
    }

    #[test]
    fn test_segment_alignment() {
        let cfg = PipelineConfig::rgb_yuv_display().with_segments(130_560 / 2 + 2, 4);
        assert_eq!(cfg.validate(), Err(ConfigError::Misaligned));
    }

    #[test]
    fn test_oversize_segment() {
        let cfg = PipelineConfig::rgb_yuv_display().with_segments(130_560, 2);
        assert_eq!(cfg.validate(), Err(ConfigError::SegmentLength));
    }

    #[test]
    fn test_jpeg_frames_must_not_overlap() {
        let mut cfg = PipelineConfig::rgb_jpeg_display();
        cfg.frames[1] = cfg.frames[0];
        assert_eq!(cfg.validate(), Err(ConfigError::FrameOverlap));
    }

    #[test]
    fn test_blend_must_fit() {
        let cfg = PipelineConfig::rgb_yuv_blend().with_blend(BlendConfig {
            x: 400,
            ..BlendConfig::default()
        });
        assert_eq!(cfg.validate(), Err(ConfigError::BlendOutOfFrame));

        let odd = PipelineConfig::rgb_yuv_blend().with_blend(BlendConfig {
            x: 3,
            ..BlendConfig::default()
        });
        assert_eq!(odd.validate(), Err(ConfigError::BlendOutOfFrame));
    }

    #[test]
    fn test_zero_divider() {
        let cfg = PipelineConfig::rgb_jpeg_display().with_clk_div(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ClockDivider));
    }

    #[test]
    fn test_solid_color_needs_frames() {
        let cfg = PipelineConfig::rgb_solid_color(0).with_solid_color(SolidColorConfig {
            color: 0,
            frames: 0,
        });
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroFrames));
    }

    #[test]
    fn test_warmup_scratch_behind_frame0() {
        let rgb = PipelineConfig::rgb_jpeg_display().warmup_scratch().unwrap();
        assert_eq!(rgb.addr(), 0x6005_0000);
        assert!(rgb.overlaps(&PsramLayout::DISPLAY[1]));
        let i8080 = PipelineConfig::i8080_display();
        let scratch = i8080.warmup_scratch().unwrap();
        assert!(scratch.offset >= i8080.frame_bytes() as usize);
    }

    #[test]
    fn test_warmup_must_not_hit_foreground() {
        let mut cfg = PipelineConfig::rgb_yuv_blend();
        cfg.frames[0].offset = PsramLayout::FOREGROUND.offset - 0x5_0000;
        assert_eq!(cfg.validate(), Err(ConfigError::WarmupOverlap));
    }

    #[test]
    fn test_warmup_must_not_hit_scanned_frame() {
        let mut cfg = PipelineConfig::i8080_display();
        // 576 rows of RGB565 run past the 0x5_0000 scratch offset.
        cfg.geometry = LcdGeometry::new(320, 576);
        cfg.segment_count = 6;
        assert_eq!(cfg.validate(), Err(ConfigError::WarmupOverlap));
    }

    #[test]
    fn test_camera_must_match_panel() {
        let mut cfg = PipelineConfig::rgb_yuv_display();
        cfg.camera.width = 640;
        assert_eq!(cfg.validate(), Err(ConfigError::CameraMismatch));
    }
}
