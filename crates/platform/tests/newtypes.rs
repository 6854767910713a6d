//! Type system enforcement tests for hardware newtypes.

use bk_platform::camera::{CameraConfig, Fps, UnsupportedFps};
use bk_platform::dma::{DmaError, DmaId, DMA_CHANNEL_COUNT};
use bk_platform::jpeg::{JpegEncConfig, JpegError};
use bk_platform::lcd::{LcdClock, LcdDataFormat, LcdGeometry};
use bk_platform::psram::PsramConfig;
use proptest::prelude::*;

// ── DmaId ────────────────────────────────────────────────────────────────────

#[test]
fn dma_id_is_one_byte() {
    assert_eq!(core::mem::size_of::<DmaId>(), 1);
}

#[test]
fn dma_id_round_trips_index() {
    for i in 0..DMA_CHANNEL_COUNT {
        assert_eq!(DmaId::new(i).unwrap().index(), i);
    }
}

proptest! {
    #[test]
    fn dma_id_rejects_out_of_range(index in DMA_CHANNEL_COUNT..=u8::MAX) {
        prop_assert_eq!(DmaId::new(index), Err(DmaError::InvalidChannel));
    }

    #[test]
    fn fps_accepts_only_table_rates(value in 0u32..100) {
        let parsed = Fps::try_from(value);
        let supported = matches!(value, 5 | 10 | 20 | 25 | 30);
        prop_assert_eq!(parsed.is_ok(), supported);
        if let Ok(fps) = parsed {
            prop_assert_eq!(fps.hz(), value);
        } else {
            prop_assert_eq!(parsed, Err(UnsupportedFps(value)));
        }
    }
}

// ── Fps / CameraConfig ──────────────────────────────────────────────────────

#[test]
fn fps_orders_by_rate() {
    assert!(Fps::Fps5 < Fps::Fps30);
}

#[test]
fn camera_word_keeps_height_and_rate_separate() {
    let cfg = CameraConfig {
        width: 640,
        height: 480,
        fps: Fps::Fps30,
    };
    assert_eq!(cfg.packed() >> 16, 480);
    assert_eq!(cfg.packed() & 0xFFFF, 30);
}

// ── PSRAM mode word ─────────────────────────────────────────────────────────

#[test]
fn psram_default_mode_word() {
    assert_eq!(PsramConfig::default(), PsramConfig(0x0005_4043));
}

// ── LCD ─────────────────────────────────────────────────────────────────────

#[test]
fn lcd_clock_hz() {
    assert_eq!(LcdClock::Mhz96.hz(), 96_000_000);
    assert_eq!(LcdClock::Mhz320.hz(), 320_000_000);
}

#[test]
fn i8080_frame_bytes() {
    assert_eq!(
        LcdGeometry::new(320, 480).frame_bytes(LcdDataFormat::Rgb565),
        307_200
    );
}

// ── JPEG ────────────────────────────────────────────────────────────────────

#[test]
fn jpeg_zero_size_rejected() {
    let cfg = JpegEncConfig {
        y_pixel: 0,
        ..JpegEncConfig::rgb_panel(false)
    };
    assert_eq!(cfg.validate(), Err(JpegError::InvalidGeometry));
}
