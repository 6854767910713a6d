//! External PSRAM abstraction
//!
//! Frame buffers are too large for on-chip SRAM, so display frames and the
//! foreground blend image live in PSRAM, memory-mapped at `0x6000_0000`
//! once the controller has been initialised with a mode word.
//!
//! # Memory Region Layout
//!
//! ```text
//! 0x6000_0000  ┌──────────────────────┐
//!              │  Display frame 0      │  256 KB (480x272 YUV422 fits)
//! 0x6004_0000  ├──────────────────────┤
//!              │  Display frame 1      │  256 KB
//! 0x6008_0000  ├──────────────────────┤
//!              │  JPEG frame 0         │  128 KB
//! 0x600A_0000  ├──────────────────────┤
//!              │  JPEG frame 1         │  128 KB
//! 0x600C_0000  ├──────────────────────┤
//!              │  (spare)              │
//! 0x6020_0000  ├──────────────────────┤
//!              │  Foreground image     │  1 MB
//! 0x6030_0000  └──────────────────────┘
//! ```
//!
//! The 8080 panel (320x480) does not fit a 256 KB slot; it uses the
//! display frame 0 address and the blend/JPEG slots are unused in that mode.

use crate::dma_safety::PSRAM_BASE;

/// PSRAM controller mode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct PsramConfig(pub u32);

impl PsramConfig {
    /// Mode word used by every video demo on the BK7256 EVB.
    pub const DEFAULT: Self = Self(0x0005_4043);
}

impl Default for PsramConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// PSRAM errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PsramError {
    /// Access past the end of the device
    OutOfBounds,
    /// Accessed before `init`
    NotInitialized,
}

impl core::fmt::Display for PsramError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "PSRAM access out of bounds"),
            Self::NotInitialized => write!(f, "PSRAM not initialized"),
        }
    }
}

/// External PSRAM interface.
///
/// On hardware this wraps the memory-mapped window; in tests it wraps a
/// heap-allocated `Vec<u8>`. Offsets are relative to [`Psram::base_addr`].
pub trait Psram {
    /// Error type
    type Error: core::fmt::Debug + From<PsramError>;

    /// Bring up the controller
    fn init(&mut self, config: PsramConfig) -> Result<(), Self::Error>;

    /// Power down the controller
    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Read bytes at `offset`.
    ///
    /// Returns `Err` if `offset + buf.len() > capacity()`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write bytes at `offset`.
    ///
    /// Returns `Err` if `offset + data.len() > capacity()`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;

    /// Fill `len` bytes starting at `offset` with `byte`.
    fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), Self::Error>;

    /// Total capacity in bytes.
    fn capacity(&self) -> usize;

    /// Bus address of offset 0.
    fn base_addr(&self) -> u32 {
        PSRAM_BASE
    }
}

/// A named region of PSRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PsramRegion {
    /// Byte offset from the PSRAM base
    pub offset: usize,
    /// Region length in bytes
    pub len: usize,
}

impl PsramRegion {
    /// Bus address of the region start.
    #[must_use]
    pub fn addr(&self) -> u32 {
        PSRAM_BASE.saturating_add(u32::try_from(self.offset).unwrap_or(u32::MAX))
    }

    /// End offset (exclusive).
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.len)
    }

    /// `true` if the two regions share any byte.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Number of display frames kept in PSRAM.
pub const DISPLAY_FRAME_COUNT: usize = 2;

/// Number of JPEG frames kept in PSRAM.
pub const JPEG_FRAME_COUNT: usize = 2;

const DISPLAY_SLOT: usize = 256 * 1024;
const JPEG_SLOT: usize = 128 * 1024;

/// Canonical PSRAM layout for the video pipeline.
pub struct PsramLayout;

impl PsramLayout {
    /// Display frames, scanned out to the LCD
    pub const DISPLAY: [PsramRegion; DISPLAY_FRAME_COUNT] = [
        PsramRegion {
            offset: 0,
            len: DISPLAY_SLOT,
        },
        PsramRegion {
            offset: DISPLAY_SLOT,
            len: DISPLAY_SLOT,
        },
    ];

    /// Encoded JPEG frames
    pub const JPEG: [PsramRegion; JPEG_FRAME_COUNT] = [
        PsramRegion {
            offset: 2 * DISPLAY_SLOT,
            len: JPEG_SLOT,
        },
        PsramRegion {
            offset: 2 * DISPLAY_SLOT + JPEG_SLOT,
            len: JPEG_SLOT,
        },
    ];

    /// Foreground image blended over camera frames
    pub const FOREGROUND: PsramRegion = PsramRegion {
        offset: 0x0020_0000,
        len: 1024 * 1024,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma_safety::{PSRAM_SIZE_BYTES, RGB_FRAME_BYTES};

    #[test]
    fn test_layout_does_not_overlap() {
        let mut all: heapless::Vec<PsramRegion, 8> = heapless::Vec::new();
        all.extend_from_slice(&PsramLayout::DISPLAY).unwrap();
        all.extend_from_slice(&PsramLayout::JPEG).unwrap();
        all.push(PsramLayout::FOREGROUND).unwrap();
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
            assert!(a.end() <= PSRAM_SIZE_BYTES);
        }
    }

    #[test]
    fn test_display_slot_holds_rgb_frame() {
        for region in PsramLayout::DISPLAY {
            assert!(region.len >= RGB_FRAME_BYTES as usize);
        }
    }

    #[test]
    fn test_region_addr() {
        assert_eq!(PsramLayout::DISPLAY[0].addr(), 0x6000_0000);
        assert_eq!(PsramLayout::FOREGROUND.addr(), 0x6020_0000);
    }
}
