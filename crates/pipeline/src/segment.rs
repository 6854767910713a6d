//! Chained DMA segments
//!
//! One DMA transfer moves at most [`MAX_TRANSFER_LEN`] bytes, so a display
//! frame is pushed to the LCD FIFO as `segment_count` transfers of
//! `segment_len` bytes each. The finish interrupt of every segment re-arms
//! the channel with the next source address; after the last segment the
//! chain rewinds to the frame base and reports the frame boundary.
//!
//! ```text
//! base                                                      base + frame_len
//!  ├── seg 0 ──┼── seg 1 ──┼── seg 2 ──┼── seg 3 ──┤
//!   ISR: Rearm  ISR: Rearm  ISR: Rearm  ISR: FrameComplete (rewind to base)
//! ```

use bk_platform::dma::MAX_TRANSFER_LEN;

use crate::config::ConfigError;

/// What the finish interrupt must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SegmentStep {
    /// Point the channel at `next_addr` and start it again.
    Rearm {
        /// Source address of the next segment
        next_addr: u32,
    },
    /// The whole frame went out. The channel source must be reset to
    /// `rewind_addr` but not restarted.
    FrameComplete {
        /// Base of the frame the next start will send
        rewind_addr: u32,
    },
}

/// Segment cursor over one frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SegmentChain {
    base: u32,
    segment_len: u32,
    segment_count: u32,
    index: u32,
    next_base: Option<u32>,
}

impl SegmentChain {
    /// Create a chain over `[base, base + segment_len * segment_count)`.
    pub fn new(base: u32, segment_len: u32, segment_count: u32) -> Result<Self, ConfigError> {
        if segment_len == 0 || segment_len > MAX_TRANSFER_LEN {
            return Err(ConfigError::SegmentLength);
        }
        if segment_count == 0 {
            return Err(ConfigError::SegmentCount);
        }
        let chain = Self {
            base,
            segment_len,
            segment_count,
            index: 0,
            next_base: None,
        };
        chain.check_base(base)?;
        Ok(chain)
    }

    fn check_base(&self, base: u32) -> Result<(), ConfigError> {
        self.segment_len
            .checked_mul(self.segment_count)
            .and_then(|len| base.checked_add(len))
            .map(|_| ())
            .ok_or(ConfigError::AddressOverflow)
    }

    /// Frame base address.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Bytes per segment.
    pub fn segment_len(&self) -> u32 {
        self.segment_len
    }

    /// Segments per frame.
    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    /// Segments already sent in the current frame.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// `true` when no segment of the current frame has been sent.
    pub fn at_frame_start(&self) -> bool {
        self.index == 0
    }

    /// Bytes per frame.
    #[allow(clippy::arithmetic_side_effects)] // Safety: product checked in new()
    pub fn frame_len(&self) -> u32 {
        self.segment_len * self.segment_count
    }

    /// Source address of the segment the channel sends next.
    #[allow(clippy::arithmetic_side_effects)] // Safety: index < segment_count, sum checked in new()
    pub fn current_addr(&self) -> u32 {
        self.base + self.segment_len * self.index
    }

    /// Advance after a segment finished.
    #[allow(clippy::arithmetic_side_effects)] // Safety: index < segment_count before the increment
    pub fn on_segment_done(&mut self) -> SegmentStep {
        self.index += 1;
        if self.index >= self.segment_count {
            self.index = 0;
            if let Some(next) = self.next_base.take() {
                self.base = next;
            }
            SegmentStep::FrameComplete {
                rewind_addr: self.base,
            }
        } else {
            SegmentStep::Rearm {
                next_addr: self.current_addr(),
            }
        }
    }

    /// Send the next frame from `base`.
    ///
    /// Applied immediately at a frame boundary, otherwise deferred until the
    /// current frame completes.
    pub fn rebase(&mut self, base: u32) -> Result<(), ConfigError> {
        self.check_base(base)?;
        if self.at_frame_start() {
            self.base = base;
            self.next_base = None;
        } else {
            self.next_base = Some(base);
        }
        Ok(())
    }

    /// Abandon the current frame and rewind.
    pub fn reset(&mut self) {
        self.index = 0;
        if let Some(next) = self.next_base.take() {
            self.base = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_frame_walk() {
        let mut chain = SegmentChain::new(0x6000_0000, 65_280, 4).unwrap();
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::Rearm {
                next_addr: 0x6000_0000 + 65_280
            }
        );
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::Rearm {
                next_addr: 0x6000_0000 + 2 * 65_280
            }
        );
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::Rearm {
                next_addr: 0x6000_0000 + 3 * 65_280
            }
        );
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::FrameComplete {
                rewind_addr: 0x6000_0000
            }
        );
        assert!(chain.at_frame_start());
    }

    #[test]
    fn test_single_segment_frame() {
        let mut chain = SegmentChain::new(0x3000_0000, 1024, 1).unwrap();
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::FrameComplete {
                rewind_addr: 0x3000_0000
            }
        );
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert_eq!(
            SegmentChain::new(0, 0, 4),
            Err(ConfigError::SegmentLength)
        );
        assert_eq!(
            SegmentChain::new(0, MAX_TRANSFER_LEN + 4, 4),
            Err(ConfigError::SegmentLength)
        );
        assert_eq!(SegmentChain::new(0, 64, 0), Err(ConfigError::SegmentCount));
        assert_eq!(
            SegmentChain::new(u32::MAX - 100, 64, 4),
            Err(ConfigError::AddressOverflow)
        );
    }

    #[test]
    fn test_rebase_mid_frame_waits_for_boundary() {
        let mut chain = SegmentChain::new(0x6000_0000, 100, 2).unwrap();
        chain.on_segment_done();
        chain.rebase(0x6004_0000).unwrap();
        assert_eq!(chain.base(), 0x6000_0000);
        assert_eq!(
            chain.on_segment_done(),
            SegmentStep::FrameComplete {
                rewind_addr: 0x6004_0000
            }
        );
        assert_eq!(chain.current_addr(), 0x6004_0000);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut chain = SegmentChain::new(0x6000_0000, 100, 3).unwrap();
        chain.on_segment_done();
        chain.reset();
        assert_eq!(chain.current_addr(), 0x6000_0000);
    }
}
