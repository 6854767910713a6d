//! PSRAM frame pool shared by producers (encoder, decoder) and consumers.
//!
//! Every slot maps to a fixed [`PsramRegion`] from [`PsramLayout`]. A
//! producer allocates the oldest free slot of a type, fills it, then calls
//! [`FramePool::complete`]. The newest complete frame is handed to every
//! registered consumer that is not still holding an earlier frame; each
//! delivery takes one lock on the slot. When no consumer is idle the frame
//! stays complete and is the first candidate to be overwritten.
//!
//! ```text
//! Invalid ──alloc──► Alloced ──complete──► Framed ──deliver──► Alloced (lock n)
//!                       ▲                    │                     │
//!                       └──────alloc─────────┘◄──release (lock 0)──┘
//! ```

use bk_platform::psram::{PsramLayout, PsramRegion, DISPLAY_FRAME_COUNT, JPEG_FRAME_COUNT};
use heapless::Vec;

/// Total slots in the pool.
pub const FRAME_SLOT_COUNT: usize = DISPLAY_FRAME_COUNT + JPEG_FRAME_COUNT;

/// Number of consumer modules.
pub const FRAME_MODULE_COUNT: usize = 4;

/// Slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameId(u8);

impl FrameId {
    /// Raw slot index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Content kind of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameType {
    /// Decoded YUV frame ready for the LCD
    Display,
    /// Encoded JPEG bitstream
    Jpeg,
}

/// Slot life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameState {
    /// Never written since reset
    Invalid,
    /// Owned by a producer or locked by consumers
    Alloced,
    /// Holds a complete frame nobody is using
    Framed,
}

/// Frame consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameModule {
    /// Network streaming (JPEG)
    Wifi,
    /// JPEG decoder (JPEG)
    Decoder,
    /// Still capture to storage (JPEG)
    Capture,
    /// LCD (display frames)
    Display,
}

impl FrameModule {
    const ALL: [Self; FRAME_MODULE_COUNT] = [Self::Wifi, Self::Decoder, Self::Capture, Self::Display];

    fn slot(self) -> usize {
        match self {
            Self::Wifi => 0,
            Self::Decoder => 1,
            Self::Capture => 2,
            Self::Display => 3,
        }
    }

    /// Frame type this module consumes.
    pub fn frame_type(self) -> FrameType {
        match self {
            Self::Wifi | Self::Decoder | Self::Capture => FrameType::Jpeg,
            Self::Display => FrameType::Display,
        }
    }
}

/// Frame pool errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameBufferError {
    /// Slot index out of range
    InvalidFrame,
    /// `complete` on a slot the producer does not own
    NotAllocated,
    /// Frame length exceeds the slot
    TooLarge,
    /// `release` on a slot with no outstanding lock
    NotLocked,
    /// `release` by a module that was never handed this slot
    NotHeld,
}

impl core::fmt::Display for FrameBufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidFrame => write!(f, "invalid frame slot"),
            Self::NotAllocated => write!(f, "frame slot not allocated"),
            Self::TooLarge => write!(f, "frame larger than slot"),
            Self::NotLocked => write!(f, "frame released without a lock"),
            Self::NotHeld => write!(f, "frame not held by this module"),
        }
    }
}

/// One pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameSlot {
    /// Slot index
    pub id: FrameId,
    /// Content kind
    pub kind: FrameType,
    /// Backing PSRAM region
    pub region: PsramRegion,
    /// Life-cycle state
    pub state: FrameState,
    /// Completion order; larger is newer
    pub sequence: u32,
    /// Valid bytes
    pub length: usize,
    /// Outstanding consumer locks
    pub lock: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct Consumer {
    registered: bool,
    holding: Option<FrameId>,
}

/// Consumers a completed frame was handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Frame handed out, `None` when every consumer was busy
    pub frame: Option<FrameId>,
    /// Modules that now hold a lock on `frame`
    pub modules: Vec<FrameModule, FRAME_MODULE_COUNT>,
}

/// The pool.
#[derive(Debug, Clone)]
pub struct FramePool {
    slots: [FrameSlot; FRAME_SLOT_COUNT],
    consumers: [Consumer; FRAME_MODULE_COUNT],
    sequence: u32,
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePool {
    /// Pool over the canonical PSRAM layout, every slot `Invalid`.
    pub fn new() -> Self {
        let slot = |index: usize, kind, region| FrameSlot {
            id: FrameId(u8::try_from(index).unwrap_or(u8::MAX)),
            kind,
            region,
            state: FrameState::Invalid,
            sequence: 0,
            length: 0,
            lock: 0,
        };
        let [d0, d1] = PsramLayout::DISPLAY;
        let [j0, j1] = PsramLayout::JPEG;
        Self {
            slots: [
                slot(0, FrameType::Display, d0),
                slot(1, FrameType::Display, d1),
                slot(2, FrameType::Jpeg, j0),
                slot(3, FrameType::Jpeg, j1),
            ],
            consumers: [Consumer::default(); FRAME_MODULE_COUNT],
            sequence: 0,
        }
    }

    /// Drop every frame and registration.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Slot metadata.
    pub fn slot(&self, id: FrameId) -> Option<&FrameSlot> {
        self.slots.get(id.index())
    }

    fn slot_mut(&mut self, id: FrameId) -> Result<&mut FrameSlot, FrameBufferError> {
        self.slots
            .get_mut(id.index())
            .ok_or(FrameBufferError::InvalidFrame)
    }

    /// Start delivering frames of the module's type to `module`.
    pub fn register(&mut self, module: FrameModule) {
        if let Some(c) = self.consumers.get_mut(module.slot()) {
            c.registered = true;
        }
    }

    /// Stop delivering to `module`. A frame it still holds stays locked
    /// until released.
    pub fn deregister(&mut self, module: FrameModule) {
        if let Some(c) = self.consumers.get_mut(module.slot()) {
            c.registered = false;
        }
    }

    fn idle(&self, module: FrameModule) -> bool {
        self.consumers
            .get(module.slot())
            .is_some_and(|c| c.registered && c.holding.is_none())
    }

    /// `true` when no registered consumer of `kind` can take a frame.
    pub fn is_frozen(&self, kind: FrameType) -> bool {
        !FrameModule::ALL
            .iter()
            .any(|m| m.frame_type() == kind && self.idle(*m))
    }

    /// Take the least recently completed slot of `kind` that nobody owns.
    pub fn alloc(&mut self, kind: FrameType) -> Option<FrameId> {
        let id = self
            .slots
            .iter()
            .filter(|s| s.kind == kind && s.state != FrameState::Alloced)
            .min_by_key(|s| s.sequence)
            .map(|s| s.id)?;
        let slot = self.slot_mut(id).ok()?;
        slot.state = FrameState::Alloced;
        slot.length = 0;
        Some(id)
    }

    /// Producer gives a slot back without completing it.
    pub fn abandon(&mut self, id: FrameId) -> Result<(), FrameBufferError> {
        let slot = self.slot_mut(id)?;
        if slot.state != FrameState::Alloced || slot.lock != 0 {
            return Err(FrameBufferError::NotAllocated);
        }
        slot.state = FrameState::Framed;
        Ok(())
    }

    /// Producer finished writing `length` bytes into `id`.
    pub fn complete(&mut self, id: FrameId, length: usize) -> Result<Delivery, FrameBufferError> {
        let sequence = self.sequence.wrapping_add(1);
        let slot = self.slot_mut(id)?;
        if slot.state != FrameState::Alloced || slot.lock != 0 {
            return Err(FrameBufferError::NotAllocated);
        }
        if length > slot.region.len {
            return Err(FrameBufferError::TooLarge);
        }
        slot.state = FrameState::Framed;
        slot.length = length;
        slot.sequence = sequence;
        let kind = slot.kind;
        self.sequence = sequence;

        let mut delivery = Delivery {
            frame: None,
            modules: Vec::new(),
        };
        if self.is_frozen(kind) {
            return Ok(delivery);
        }
        let Some(newest) = self.newest(kind) else {
            return Ok(delivery);
        };
        for module in FrameModule::ALL {
            if module.frame_type() != kind || !self.idle(module) {
                continue;
            }
            if let Some(c) = self.consumers.get_mut(module.slot()) {
                c.holding = Some(newest);
            }
            // capacity equals the module count
            let _ = delivery.modules.push(module);
        }
        let slot = self.slot_mut(newest)?;
        slot.lock = u8::try_from(delivery.modules.len()).unwrap_or(u8::MAX);
        slot.state = if slot.lock == 0 {
            FrameState::Framed
        } else {
            FrameState::Alloced
        };
        delivery.frame = Some(newest);
        Ok(delivery)
    }

    fn newest(&self, kind: FrameType) -> Option<FrameId> {
        self.slots
            .iter()
            .filter(|s| s.kind == kind && s.state == FrameState::Framed)
            .max_by_key(|s| s.sequence)
            .map(|s| s.id)
    }

    /// `module` is done with frame `id`.
    pub fn release(&mut self, id: FrameId, module: FrameModule) -> Result<(), FrameBufferError> {
        let held = self
            .consumers
            .get(module.slot())
            .and_then(|c| c.holding);
        let slot = self.slot_mut(id)?;
        if slot.lock == 0 {
            return Err(FrameBufferError::NotLocked);
        }
        if held != Some(id) {
            return Err(FrameBufferError::NotHeld);
        }
        slot.lock = slot.lock.saturating_sub(1);
        if slot.lock == 0 {
            slot.state = FrameState::Framed;
        }
        if let Some(c) = self.consumers.get_mut(module.slot()) {
            c.holding = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = FramePool::new();
        let a = pool.alloc(FrameType::Jpeg).unwrap();
        let b = pool.alloc(FrameType::Jpeg).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.alloc(FrameType::Jpeg), None);
        assert!(pool.alloc(FrameType::Display).is_some());
    }

    #[test]
    fn test_complete_without_consumers_keeps_frame() {
        let mut pool = FramePool::new();
        let id = pool.alloc(FrameType::Jpeg).unwrap();
        let delivery = pool.complete(id, 1000).unwrap();
        assert_eq!(delivery.frame, None);
        assert_eq!(pool.slot(id).unwrap().state, FrameState::Framed);
    }

    #[test]
    fn test_release_unlocked_is_error() {
        let mut pool = FramePool::new();
        let id = pool.alloc(FrameType::Display).unwrap();
        assert_eq!(
            pool.release(id, FrameModule::Display),
            Err(FrameBufferError::NotLocked)
        );
    }

    #[test]
    fn test_complete_rejects_oversize() {
        let mut pool = FramePool::new();
        let id = pool.alloc(FrameType::Jpeg).unwrap();
        let len = pool.slot(id).unwrap().region.len + 1;
        assert_eq!(pool.complete(id, len), Err(FrameBufferError::TooLarge));
    }
}
