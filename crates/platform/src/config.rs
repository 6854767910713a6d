//! Board configuration and constants
//!
//! Defaults for the BK7256 EVB video demos. Pipeline configurations start
//! from these values rather than hardcoding them.

use crate::camera::Fps;
use crate::lcd::LcdClock;
use crate::psram::PsramConfig;

/// Board name
pub const BOARD_NAME: &str = "BK7256 EVB";

/// Crate version (synchronized with Cargo.toml)
pub const PLATFORM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display block root clock used by every demo.
pub const DEFAULT_LCD_CLOCK: LcdClock = LcdClock::Mhz96;

/// RGB pixel clock divider giving a stable image on the 4.3" panel.
pub const DEFAULT_RGB_CLK_DIV: u8 = 8;

/// RGB pixel clock divider for the JPEG decode path (slower scan leaves
/// the decoder a wider window).
pub const DEFAULT_JPEG_RGB_CLK_DIV: u8 = 13;

/// RGB pixel clock divider for the solid-colour test pattern.
pub const DEFAULT_SOLID_COLOR_CLK_DIV: u8 = 5;

/// Camera frame rate used when none is given.
pub const DEFAULT_FPS: Fps = Fps::Fps25;

/// PSRAM mode word.
pub const DEFAULT_PSRAM: PsramConfig = PsramConfig::DEFAULT;

/// LCD refreshes the solid-colour test pattern runs before stopping.
pub const SOLID_COLOR_FRAMES: u32 = 400;

/// Length of the repeat-mode colour pattern in bytes (20 words).
pub const SOLID_COLOR_PATTERN_BYTES: u32 = 80;

/// Bytes moved by the 8080 warm-up memory-to-memory pass.
pub const I8080_WARMUP_LEN: u32 = 640;

/// Destination offset of the 8080 warm-up pass from the frame base.
pub const I8080_WARMUP_OFFSET: u32 = 0x5_0000;
