//! Architecture tests: DMA reachability and frame segmentation constants.

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::assertions_on_constants)]

use bk_platform::dma::MAX_TRANSFER_LEN;
use bk_platform::dma_safety::{
    DmaAccessible, DtcmRegion, PsramRegion, SramRegion, DTCM_NOT_DMA_ACCESSIBLE,
    I8080_FRAME_BYTES, I8080_SEGMENT_COUNT, I8080_SEGMENT_LEN, JPEG_BITSTREAM_ADDR,
    JPEG_BITSTREAM_BYTES, PSRAM_BASE, RGB_FRAME_BYTES, RGB_SEGMENT_COUNT, RGB_SEGMENT_LEN,
};
use bk_platform::psram::PsramLayout;

#[test]
fn region_markers_are_zero_sized() {
    assert_eq!(core::mem::size_of::<SramRegion>(), 0);
    assert_eq!(core::mem::size_of::<PsramRegion>(), 0);
    assert_eq!(core::mem::size_of::<DtcmRegion>(), 0);
}

#[test]
fn sram_and_psram_are_dma_accessible() {
    fn assert_dma_accessible<T: DmaAccessible>() {}
    assert_dma_accessible::<SramRegion>();
    assert_dma_accessible::<PsramRegion>();
}

#[test]
fn dtcm_region_not_dma_accessible() {
    assert!(DTCM_NOT_DMA_ACCESSIBLE);
}

#[test]
fn rgb_frame_is_whole_segments() {
    assert_eq!(RGB_SEGMENT_LEN * RGB_SEGMENT_COUNT, RGB_FRAME_BYTES);
    assert!(RGB_SEGMENT_LEN <= MAX_TRANSFER_LEN);
}

#[test]
fn i8080_frame_is_whole_segments() {
    assert_eq!(I8080_SEGMENT_LEN * I8080_SEGMENT_COUNT, I8080_FRAME_BYTES);
    assert!(I8080_SEGMENT_LEN <= MAX_TRANSFER_LEN);
}

#[test]
fn segments_are_word_aligned() {
    assert_eq!(RGB_SEGMENT_LEN % 4, 0);
    assert_eq!(I8080_SEGMENT_LEN % 4, 0);
}

#[test]
fn jpeg_bitstream_fits_one_transfer() {
    assert_eq!(JPEG_BITSTREAM_BYTES, MAX_TRANSFER_LEN);
    assert!(SramRegion::contains(JPEG_BITSTREAM_ADDR, JPEG_BITSTREAM_BYTES));
}

#[test]
fn every_layout_region_is_in_psram() {
    for region in PsramLayout::DISPLAY
        .iter()
        .chain(PsramLayout::JPEG.iter())
        .chain(core::iter::once(&PsramLayout::FOREGROUND))
    {
        let len = u32::try_from(region.len).unwrap();
        assert!(PsramRegion::contains(region.addr(), len), "{region:?}");
    }
}

#[test]
fn warmup_target_lies_past_every_scanned_frame() {
    use bk_platform::config::{I8080_WARMUP_LEN, I8080_WARMUP_OFFSET};

    // The warm-up copy lands behind the frame it walks, never inside it.
    assert!(I8080_WARMUP_OFFSET >= I8080_FRAME_BYTES);
    assert!(I8080_WARMUP_OFFSET >= RGB_FRAME_BYTES);
    assert!(PsramRegion::contains(PSRAM_BASE, I8080_FRAME_BYTES));
    assert!(PsramRegion::contains(
        PSRAM_BASE + I8080_WARMUP_OFFSET,
        I8080_WARMUP_LEN
    ));
    // RGB modes: the scratch falls inside display frame 1, which holds no
    // decoded frame until streaming starts.
    let scratch = PsramLayout::DISPLAY[0].offset + I8080_WARMUP_OFFSET as usize;
    let frame1 = PsramLayout::DISPLAY[1];
    assert!(scratch >= frame1.offset && scratch + I8080_WARMUP_LEN as usize <= frame1.end());
}
