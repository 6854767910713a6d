//! DMA reachability marker traits and frame sizing constants for BK7256.
//!
//! ## DMA Accessibility on BK7256
//!
//! | Memory Region | Base Address | Size   | General DMA | Use case |
//! |---------------|-------------|--------|-------------|----------|
//! | ITCM/DTCM     | 0x1000_0000 | 32 KB  | NO          | CPU-only: ISR scratch |
//! | SRAM          | 0x3000_0000 | 512 KB | YES         | JPEG bitstream, small patterns |
//! | PSRAM         | 0x6000_0000 | 8 MB   | YES         | Display frames, blend images |
//!
//! The vendor headers name the memory endpoint of a DMA transfer
//! `DMA_DEV_DTCM` even when it points at SRAM or PSRAM; only the real
//! tightly-coupled memory is invisible to the controller.
//!
//! ## Frame segmentation
//!
//! A single DMA transfer moves at most 64 KB, so one display frame is sent
//! to the LCD FIFO as a chain of equal segments, re-armed from the finish
//! interrupt:
//!
//! ```text
//! RGB  480 x 272 x 2 B = 261_120 B = 4 x 65_280 B
//! 8080 320 x 480 x 2 B = 307_200 B = 5 x 61_440 B
//! ```

use crate::dma::MAX_TRANSFER_LEN;

// ── Memory region addresses ──────────────────────────────────────────────────

/// Base address of on-chip SRAM (general DMA accessible).
pub const SRAM_BASE: u32 = 0x3000_0000;

/// Size of on-chip SRAM in bytes (512 KB).
pub const SRAM_SIZE_BYTES: usize = 512 * 1024;

/// Base address of the PSRAM window.
pub const PSRAM_BASE: u32 = 0x6000_0000;

/// Size of the PSRAM window in bytes (8 MB).
pub const PSRAM_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// True: DTCM is NOT DMA-accessible. Place no DMA buffers here.
pub const DTCM_NOT_DMA_ACCESSIBLE: bool = true;

// ── RGB panel constants ──────────────────────────────────────────────────────

/// RGB panel width in pixels.
pub const RGB_WIDTH: u16 = 480;

/// RGB panel height in pixels.
pub const RGB_HEIGHT: u16 = 272;

/// Bytes per pixel for YUV422 and RGB565 frames.
pub const BYTES_PER_PIXEL: u32 = 2;

/// One RGB frame in bytes (480 x 272 x 2).
pub const RGB_FRAME_BYTES: u32 = RGB_WIDTH as u32 * RGB_HEIGHT as u32 * BYTES_PER_PIXEL;

/// Length of one LCD DMA segment for the RGB panel.
pub const RGB_SEGMENT_LEN: u32 = 65_280;

/// Segments per RGB frame.
pub const RGB_SEGMENT_COUNT: u32 = 4;

// ── 8080 panel constants ─────────────────────────────────────────────────────

/// 8080 panel width in pixels.
pub const I8080_WIDTH: u16 = 320;

/// 8080 panel height in pixels.
pub const I8080_HEIGHT: u16 = 480;

/// One 8080 frame in bytes (320 x 480 x 2).
pub const I8080_FRAME_BYTES: u32 = I8080_WIDTH as u32 * I8080_HEIGHT as u32 * BYTES_PER_PIXEL;

/// Length of one LCD DMA segment for the 8080 panel.
pub const I8080_SEGMENT_LEN: u32 = 61_440;

/// Segments per 8080 frame.
pub const I8080_SEGMENT_COUNT: u32 = 5;

// ── JPEG constants ───────────────────────────────────────────────────────────

/// Size of the SRAM bitstream buffer the JPEG DMA fills.
pub const JPEG_BITSTREAM_BYTES: u32 = MAX_TRANSFER_LEN;

/// SRAM address of the JPEG bitstream buffer.
pub const JPEG_BITSTREAM_ADDR: u32 = SRAM_BASE;

// ── Marker traits ────────────────────────────────────────────────────────────

/// Marker trait: memory region reachable by the general DMA controller.
///
/// # Safety
/// Only implement for zero-sized types representing memory regions that the
/// BK7256 general DMA can physically address. Implementing it for DTCM makes
/// transfers silently read or write nothing.
pub unsafe trait DmaAccessible: Sized {
    /// First address of the region.
    const BASE: u32;
    /// Region size in bytes.
    const SIZE: usize;

    /// `true` when `[addr, addr + len)` lies inside this region.
    #[allow(clippy::arithmetic_side_effects)] // Safety: all operands widened to u64
    fn contains(addr: u32, len: u32) -> bool {
        let start = u64::from(Self::BASE);
        let end = start + Self::SIZE as u64;
        let a = u64::from(addr);
        a >= start && a + u64::from(len) <= end
    }
}

// ── Region zero-sized types ──────────────────────────────────────────────────

/// Zero-sized type representing on-chip SRAM.
///
/// Holds the JPEG bitstream buffer and the small colour pattern used by the
/// repeat-mode fill.
#[derive(Debug, Clone, Copy)]
pub struct SramRegion;

// SAFETY: SRAM at 0x3000_0000 sits on the AHB matrix next to the general DMA.
unsafe impl DmaAccessible for SramRegion {
    const BASE: u32 = SRAM_BASE;
    const SIZE: usize = SRAM_SIZE_BYTES;
}

/// Zero-sized type representing PSRAM.
///
/// Holds display frames and the foreground blend image.
#[derive(Debug, Clone, Copy)]
pub struct PsramRegion;

// SAFETY: PSRAM is memory-mapped at 0x6000_0000 through the PSRAM controller,
// which the general DMA can master once `Psram::init` has run.
unsafe impl DmaAccessible for PsramRegion {
    const BASE: u32 = PSRAM_BASE;
    const SIZE: usize = PSRAM_SIZE_BYTES;
}

/// Zero-sized type representing DTCM (CPU-only, NOT DMA-accessible).
#[derive(Debug, Clone, Copy)]
pub struct DtcmRegion;
// DtcmRegion does NOT implement DmaAccessible.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psram_contains() {
        assert!(PsramRegion::contains(PSRAM_BASE, RGB_FRAME_BYTES));
        assert!(!PsramRegion::contains(SRAM_BASE, 4));
        assert!(!PsramRegion::contains(PSRAM_BASE + PSRAM_SIZE_BYTES as u32 - 2, 4));
    }

    #[test]
    fn test_sram_holds_bitstream() {
        assert!(SramRegion::contains(JPEG_BITSTREAM_ADDR, JPEG_BITSTREAM_BYTES));
    }
}
