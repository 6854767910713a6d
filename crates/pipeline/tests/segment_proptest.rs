//! Property tests for segment chaining and the display hand-off.

use bk_pipeline::pingpong::{Handoff, PingPong};
use bk_pipeline::segment::{SegmentChain, SegmentStep};
use bk_platform::dma::MAX_TRANSFER_LEN;
use proptest::prelude::*;

proptest! {
    /// Walking one frame visits every segment base once, in order, and
    /// reports the boundary exactly at the end.
    #[test]
    fn chain_visits_each_segment(
        base in 0x6000_0000u32..0x6010_0000,
        len in 1u32..=MAX_TRANSFER_LEN,
        count in 1u32..16,
    ) {
        let mut chain = SegmentChain::new(base, len, count).unwrap();
        let mut addrs = vec![chain.current_addr()];
        for _ in 1..count {
            match chain.on_segment_done() {
                SegmentStep::Rearm { next_addr } => addrs.push(next_addr),
                SegmentStep::FrameComplete { .. } => prop_assert!(false, "frame ended early"),
            }
        }
        prop_assert_eq!(
            chain.on_segment_done(),
            SegmentStep::FrameComplete { rewind_addr: base }
        );
        for (i, addr) in addrs.iter().enumerate() {
            prop_assert_eq!(*addr, base + len * i as u32);
        }
        prop_assert_eq!(chain.frame_len(), len * count);
        prop_assert!(chain.at_frame_start());
    }

    /// A rebase requested mid-frame never changes the segments of the frame
    /// in flight.
    #[test]
    fn rebase_only_applies_at_boundary(
        count in 2u32..8,
        split in 1u32..8,
    ) {
        let split = split.min(count - 1);
        let mut chain = SegmentChain::new(0x6000_0000, 1024, count).unwrap();
        for _ in 0..split {
            chain.on_segment_done();
        }
        chain.rebase(0x6004_0000).unwrap();
        for i in split..count - 1 {
            prop_assert_eq!(
                chain.on_segment_done(),
                SegmentStep::Rearm { next_addr: 0x6000_0000 + 1024 * (i + 1) }
            );
        }
        prop_assert_eq!(
            chain.on_segment_done(),
            SegmentStep::FrameComplete { rewind_addr: 0x6004_0000 }
        );
    }

    /// Whatever order producer and consumer events arrive in, the slot the
    /// producer writes is never the one being scanned.
    #[test]
    fn pingpong_never_hands_out_slot_in_use(ops in prop::collection::vec(0u8..4, 1..64)) {
        let mut pp = PingPong::new(0u8, 1u8);
        let mut writing = None;
        for op in ops {
            match op {
                0 if !pp.is_producing() => {
                    writing = Some(*pp.back());
                    pp.producer_started();
                }
                1 if pp.is_producing() => {
                    writing = None;
                    pp.producer_done();
                }
                2 if !pp.is_scanning() => pp.consumer_started(),
                3 if pp.is_scanning() => {
                    let was = *pp.front();
                    if pp.consumer_done() == Handoff::Swapped {
                        prop_assert_ne!(*pp.front(), was);
                    }
                }
                _ => {}
            }
            prop_assert_ne!(pp.front(), pp.back());
            if let Some(slot) = writing {
                prop_assert_ne!(*pp.front(), slot);
            }
            if pp.is_scanning() {
                let mut copy = pp.clone();
                let front = *copy.front();
                prop_assert_eq!(copy.producer_done(), Handoff::Pending);
                prop_assert_eq!(*copy.front(), front);
            }
        }
    }
}
