//! Double-buffer hand-off between a producer (decoder) and the LCD.
//!
//! The LCD scans `front`; the producer fills `back`. Buffers only swap when
//! the producer has finished a frame *and* the LCD is between frames, so the
//! producer never writes into memory that is being scanned out. A frame
//! waiting in `back` is given up as soon as the producer starts writing over
//! it.

/// Result of a hand-off attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handoff {
    /// Buffers swapped; `front` is the fresh frame.
    Swapped,
    /// The other side is still busy; the frame waits in `back`.
    Pending,
}

/// Two slots with front/back roles.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    slots: [T; 2],
    front: usize,
    produced: bool,
    producing: bool,
    consumed: bool,
    swaps: u32,
    replaced: u32,
}

impl<T> PingPong<T> {
    /// `front` is scanned first; the LCD starts idle.
    pub const fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            front: 0,
            produced: false,
            producing: false,
            consumed: true,
            swaps: 0,
            replaced: 0,
        }
    }

    /// Slot the LCD scans.
    pub fn front(&self) -> &T {
        let [a, b] = &self.slots;
        if self.front == 0 {
            a
        } else {
            b
        }
    }

    /// Slot the producer writes.
    pub fn back(&self) -> &T {
        let [a, b] = &self.slots;
        if self.front == 0 {
            b
        } else {
            a
        }
    }

    /// Producer begins writing `back`.
    ///
    /// A frame still waiting there is replaced and will not be swapped in.
    pub fn producer_started(&mut self) {
        if self.produced {
            self.produced = false;
            self.replaced = self.replaced.saturating_add(1);
        }
        self.producing = true;
    }

    /// Producer finished writing `back`.
    ///
    /// Finishing again before the previous frame was shown replaces it.
    pub fn producer_done(&mut self) -> Handoff {
        if self.produced {
            self.replaced = self.replaced.saturating_add(1);
        }
        self.producing = false;
        self.produced = true;
        if self.consumed {
            self.swap();
            Handoff::Swapped
        } else {
            Handoff::Pending
        }
    }

    /// LCD started scanning `front`.
    pub fn consumer_started(&mut self) {
        self.consumed = false;
    }

    /// LCD finished scanning `front`. Swaps if a frame was pending and the
    /// producer is not writing `back`.
    pub fn consumer_done(&mut self) -> Handoff {
        self.consumed = true;
        if self.produced && !self.producing {
            self.swap();
            Handoff::Swapped
        } else {
            Handoff::Pending
        }
    }

    /// A produced frame is waiting for the LCD.
    pub fn is_pending(&self) -> bool {
        self.produced
    }

    /// `true` between [`PingPong::producer_started`] and
    /// [`PingPong::producer_done`].
    pub fn is_producing(&self) -> bool {
        self.producing
    }

    /// `true` while the LCD is scanning `front`.
    pub fn is_scanning(&self) -> bool {
        !self.consumed
    }

    /// Completed swaps.
    pub fn swaps(&self) -> u32 {
        self.swaps
    }

    /// Frames overwritten before the LCD showed them.
    pub fn replaced(&self) -> u32 {
        self.replaced
    }

    fn swap(&mut self) {
        self.front ^= 1;
        self.produced = false;
        self.swaps = self.swaps.wrapping_add(1);
    }

    /// Back to the initial roles.
    pub fn reset(&mut self) {
        self.front = 0;
        self.produced = false;
        self.producing = false;
        self.consumed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_lcd_swaps_immediately() {
        let mut pp = PingPong::new('a', 'b');
        assert_eq!(pp.producer_done(), Handoff::Swapped);
        assert_eq!(*pp.front(), 'b');
        assert_eq!(*pp.back(), 'a');
    }

    #[test]
    fn test_busy_lcd_defers_swap() {
        let mut pp = PingPong::new('a', 'b');
        pp.consumer_started();
        assert_eq!(pp.producer_done(), Handoff::Pending);
        assert_eq!(*pp.front(), 'a');
        assert!(pp.is_pending());
        assert_eq!(pp.consumer_done(), Handoff::Swapped);
        assert_eq!(*pp.front(), 'b');
        assert!(!pp.is_pending());
    }

    #[test]
    fn test_consumer_done_without_frame_keeps_front() {
        let mut pp = PingPong::new(1, 2);
        pp.consumer_started();
        assert_eq!(pp.consumer_done(), Handoff::Pending);
        assert_eq!(*pp.front(), 1);
    }

    #[test]
    fn test_second_frame_replaces_pending() {
        let mut pp = PingPong::new(1, 2);
        pp.consumer_started();
        pp.producer_done();
        pp.producer_done();
        assert_eq!(pp.replaced(), 1);
        assert_eq!(pp.consumer_done(), Handoff::Swapped);
        assert_eq!(pp.swaps(), 1);
    }

    #[test]
    fn test_overwriting_pending_frame_blocks_swap() {
        let mut pp = PingPong::new(1, 2);
        pp.consumer_started();
        assert_eq!(pp.producer_done(), Handoff::Pending);
        pp.producer_started();
        assert_eq!(pp.replaced(), 1);
        assert!(!pp.is_pending());
        assert_eq!(pp.consumer_done(), Handoff::Pending);
        assert_eq!(*pp.front(), 1);
        assert_eq!(pp.producer_done(), Handoff::Swapped);
        assert_eq!(*pp.front(), 2);
        assert!(!pp.is_producing());
    }
}
